//! Genome-wide fixed-size bin counts.

use crate::core::error::{FragError, Result};
use crate::genome::ChromSizes;
use crate::pipeline::matrix::count_matrix::{count_features, CountMatrix, CountingStrategy};
use crate::pipeline::preprocess::FragmentStore;
use log::info;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Settings for [`add_tile_matrix`].
#[derive(Debug, Clone)]
pub struct TileOptions {
    pub bin_size: u64,
    pub strategy: CountingStrategy,
    pub exclude_chroms: Vec<String>,
    pub count_duplicates: bool,
}

impl Default for TileOptions {
    fn default() -> Self {
        TileOptions {
            bin_size: 500,
            strategy: CountingStrategy::Insertion,
            exclude_chroms: vec!["chrM".to_string(), "chrY".to_string(), "M".to_string(), "Y".to_string()],
            count_duplicates: false,
        }
    }
}

/// Bin layout over a genome: bin `i` of a chromosome maps to column
/// `offset + i`.
#[derive(Debug, Clone)]
pub struct GenomeBins {
    bin_size: u64,
    chroms: FxHashMap<String, (usize, u64)>,
    names: Vec<String>,
}

impl GenomeBins {
    pub fn new(chrom_sizes: &ChromSizes, bin_size: u64) -> Result<Self> {
        if bin_size == 0 {
            return Err(FragError::InvalidInput("bin_size must be > 0".to_string()));
        }
        let mut chroms = FxHashMap::default();
        let mut names = Vec::new();
        for (chrom, len) in chrom_sizes.iter() {
            chroms.insert(chrom.to_string(), (names.len(), len));
            let mut start = 0;
            while start < len {
                let end = (start + bin_size).min(len);
                names.push(format!("{}:{}-{}", chrom, start, end));
                start = end;
            }
        }
        Ok(GenomeBins {
            bin_size,
            chroms,
            names,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Column of the bin holding `pos`, if the position is on the genome.
    #[inline]
    pub fn bin_of(&self, chrom: &str, pos: u64) -> Option<usize> {
        let &(offset, len) = self.chroms.get(chrom)?;
        if pos >= len {
            return None;
        }
        Some(offset + (pos / self.bin_size) as usize)
    }

    /// Columns of all bins overlapping `[start, end)`.
    pub fn bins_of_range(&self, chrom: &str, start: u64, end: u64) -> std::ops::Range<usize> {
        match self.chroms.get(chrom) {
            Some(&(offset, len)) if start < len && end > start => {
                let first = offset + (start / self.bin_size) as usize;
                let last = offset + ((end.min(len) - 1) / self.bin_size) as usize;
                first..last + 1
            }
            _ => 0..0,
        }
    }
}

/// Build the cell-by-bin matrix.
pub fn add_tile_matrix(store: &FragmentStore, options: &TileOptions) -> Result<CountMatrix> {
    let genome = store.chrom_sizes().without(&options.exclude_chroms);
    let bins = GenomeBins::new(&genome, options.bin_size)?;
    info!(
        "Counting {} cells over {} bins of {} bp",
        store.n_obs(),
        bins.len(),
        options.bin_size
    );

    let data = count_features(
        store,
        bins.len(),
        options.count_duplicates,
        |fragment, weight, row| match options.strategy {
            CountingStrategy::Insertion => {
                for pos in fragment.insertion_sites() {
                    if let Some(bin) = bins.bin_of(&fragment.chrom, pos) {
                        row.push((bin, weight));
                    }
                }
            }
            CountingStrategy::PairedInsertion => {
                let mut seen: SmallVec<[usize; 2]> = SmallVec::new();
                for pos in fragment.insertion_sites() {
                    if let Some(bin) = bins.bin_of(&fragment.chrom, pos) {
                        if !seen.contains(&bin) {
                            seen.push(bin);
                            row.push((bin, weight));
                        }
                    }
                }
            }
            CountingStrategy::Fragment => {
                for bin in bins.bins_of_range(&fragment.chrom, fragment.start, fragment.end) {
                    row.push((bin, weight));
                }
            }
        },
    )?;

    CountMatrix::new(store.barcodes(), bins.names().to_vec(), data)
}
