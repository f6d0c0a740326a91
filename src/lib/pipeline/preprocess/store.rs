//! In-memory per-cell fragment collections.

use crate::core::error::{FragError, Result};
use crate::core::io::{open_for_write, Compression};
use crate::fragment::{Fragment, FragmentReader};
use crate::genome::ChromSizes;
use itertools::Itertools;
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::io::Write;
use std::path::Path;

/// Fragments of one cell, sorted by chromosome order then coordinates.
/// Records do not carry the barcode; it lives on the cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFragments {
    pub barcode: String,
    pub fragments: Vec<Fragment>,
}

/// All cells of a dataset together with the genome they were mapped to.
#[derive(Debug, Clone)]
pub struct FragmentStore {
    chrom_sizes: ChromSizes,
    cells: Vec<CellFragments>,
}

impl FragmentStore {
    /// Build a store, sorting every cell's fragments by the chromosome order
    /// of `chrom_sizes`. Fragments on unknown chromosomes are rejected.
    pub fn new(chrom_sizes: ChromSizes, mut cells: Vec<CellFragments>) -> Result<Self> {
        for cell in cells.iter_mut() {
            for f in &cell.fragments {
                if !chrom_sizes.contains(&f.chrom) {
                    return Err(FragError::UnknownChromosome(f.chrom.clone()));
                }
            }
            sort_fragments(&mut cell.fragments, &chrom_sizes);
        }
        Ok(FragmentStore { chrom_sizes, cells })
    }

    /// Load an already imported fragment file without QC filtering. Records on
    /// chromosomes missing from `chrom_sizes` are skipped.
    pub fn load<P: AsRef<Path>>(path: P, chrom_sizes: ChromSizes) -> Result<Self> {
        let mut by_barcode: FxHashMap<String, Vec<Fragment>> = FxHashMap::default();
        let mut skipped = 0u64;
        for fragment in FragmentReader::from_path(path.as_ref())? {
            let mut fragment = fragment?;
            if !chrom_sizes.contains(&fragment.chrom) {
                skipped += 1;
                continue;
            }
            let barcode = fragment.barcode.take().ok_or_else(|| {
                FragError::InvalidInput("fragment record without a barcode".to_string())
            })?;
            by_barcode.entry(barcode).or_default().push(fragment);
        }
        if skipped > 0 {
            warn!("Skipped {} fragments on chromosomes absent from the genome", skipped);
        }
        let mut cells: Vec<CellFragments> = by_barcode
            .into_iter()
            .map(|(barcode, fragments)| CellFragments { barcode, fragments })
            .collect();
        cells.sort_by(|a, b| a.barcode.cmp(&b.barcode));
        info!(
            "Loaded {} cells from {}",
            cells.len(),
            path.as_ref().display()
        );
        Self::new(chrom_sizes, cells)
    }

    pub fn chrom_sizes(&self) -> &ChromSizes {
        &self.chrom_sizes
    }

    pub fn cells(&self) -> &[CellFragments] {
        &self.cells
    }

    pub fn n_obs(&self) -> usize {
        self.cells.len()
    }

    pub fn barcodes(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.barcode.clone()).collect()
    }

    pub fn n_fragments(&self) -> usize {
        self.cells.iter().map(|c| c.fragments.len()).sum()
    }

    /// Keep only the listed barcodes, in store order.
    pub fn retain_barcodes(&mut self, keep: &[String]) {
        let keep: rustc_hash::FxHashSet<&str> = keep.iter().map(|s| s.as_str()).collect();
        self.cells.retain(|c| keep.contains(c.barcode.as_str()));
    }

    /// Write all fragments with their barcodes, sorted by genome position.
    pub fn write_fragments<P: AsRef<Path>>(&self, path: P, compression: Compression) -> Result<()> {
        let mut writer = open_for_write(path.as_ref(), compression)?;
        for (barcode, f) in merge_by_position(self.cells.iter(), &self.chrom_sizes) {
            writeln!(writer, "{}", f.in_cell(barcode))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Merge the sorted fragments of several cells into one stream ordered by
/// chromosome, start, end and barcode.
pub fn merge_by_position<'a, I>(
    cells: I,
    chrom_sizes: &'a ChromSizes,
) -> impl Iterator<Item = (&'a str, &'a Fragment)> + 'a
where
    I: Iterator<Item = &'a CellFragments> + 'a,
{
    let key = move |(barcode, f): &(&'a str, &'a Fragment)| {
        (
            chrom_sizes.id_of(&f.chrom).unwrap_or(usize::MAX),
            f.start,
            f.end,
            *barcode,
        )
    };
    cells
        .map(|cell| {
            cell.fragments
                .iter()
                .map(move |f| (cell.barcode.as_str(), f))
        })
        .kmerge_by(move |a, b| key(a) < key(b))
}

/// Sort by chromosome order of `chrom_sizes`, then start, then end.
pub fn sort_fragments(fragments: &mut [Fragment], chrom_sizes: &ChromSizes) {
    fragments.sort_by(|a, b| {
        let ca = chrom_sizes.id_of(&a.chrom).unwrap_or(usize::MAX);
        let cb = chrom_sizes.id_of(&b.chrom).unwrap_or(usize::MAX);
        ca.cmp(&cb)
            .then(a.start.cmp(&b.start))
            .then(a.end.cmp(&b.end))
    });
}
