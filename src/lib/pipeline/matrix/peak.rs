//! Counts over arbitrary region sets: peaks and gene activity.

use crate::core::error::{FragError, Result};
use crate::genome::{Gene, GenomicRange, RegionIndex};
use crate::pipeline::matrix::count_matrix::{count_features, CountMatrix, CountingStrategy};
use crate::pipeline::preprocess::FragmentStore;
use log::info;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Count fragments over `regions`; column `i` is `regions[i]`.
fn count_regions(
    store: &FragmentStore,
    regions: &[GenomicRange],
    strategy: CountingStrategy,
    count_duplicates: bool,
) -> Result<nalgebra_sparse::CsrMatrix<u32>> {
    let index = RegionIndex::enumerated(regions);
    count_features(
        store,
        regions.len(),
        count_duplicates,
        |fragment, weight, row| match strategy {
            CountingStrategy::Insertion => {
                for pos in fragment.insertion_sites() {
                    row.extend(index.find(&fragment.chrom, pos, pos + 1).map(|iv| (iv.val, weight)));
                }
            }
            CountingStrategy::PairedInsertion => {
                let mut seen: SmallVec<[usize; 4]> = SmallVec::new();
                for pos in fragment.insertion_sites() {
                    for iv in index.find(&fragment.chrom, pos, pos + 1) {
                        if !seen.contains(&iv.val) {
                            seen.push(iv.val);
                            row.push((iv.val, weight));
                        }
                    }
                }
            }
            CountingStrategy::Fragment => {
                row.extend(
                    index
                        .find(&fragment.chrom, fragment.start, fragment.end)
                        .map(|iv| (iv.val, weight)),
                );
            }
        },
    )
}

/// Build the cell-by-peak matrix. Peaks keep their input order and may
/// overlap; each overlapping peak receives the count.
pub fn make_peak_matrix(
    store: &FragmentStore,
    peaks: &[GenomicRange],
    strategy: CountingStrategy,
    count_duplicates: bool,
) -> Result<CountMatrix> {
    if peaks.is_empty() {
        return Err(FragError::EmptyData("peak set is empty".to_string()));
    }
    info!("Counting {} cells over {} peaks", store.n_obs(), peaks.len());
    let data = count_regions(store, peaks, strategy, count_duplicates)?;
    let names = peaks.iter().map(|p| p.to_string()).collect();
    CountMatrix::new(store.barcodes(), names, data)
}

/// Build the cell-by-gene activity matrix from insertions in gene bodies
/// extended by `upstream`/`downstream` bp. Genes sharing a name are
/// represented by their first record.
pub fn make_gene_matrix(
    store: &FragmentStore,
    genes: &[Gene],
    upstream: u64,
    downstream: u64,
) -> Result<CountMatrix> {
    let mut seen = FxHashSet::default();
    let (names, regions): (Vec<String>, Vec<GenomicRange>) = genes
        .iter()
        .filter(|g| seen.insert(g.name.clone()))
        .map(|g| (g.name.clone(), g.extended(upstream, downstream)))
        .unzip();
    if names.is_empty() {
        return Err(FragError::EmptyData("gene set is empty".to_string()));
    }
    info!("Counting {} cells over {} genes", store.n_obs(), names.len());
    let data = count_regions(store, &regions, CountingStrategy::Insertion, false)?;
    CountMatrix::new(store.barcodes(), names, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Fragment;
    use crate::genome::{ChromSizes, Strand};
    use crate::pipeline::preprocess::CellFragments;

    fn store() -> FragmentStore {
        let genome: ChromSizes = [("chr1", 10_000)].into_iter().collect();
        FragmentStore::new(
            genome,
            vec![CellFragments {
                barcode: "A".into(),
                fragments: vec![Fragment::new("chr1", 100, 150), Fragment::new("chr1", 1_000, 3_000)],
            }],
        )
        .unwrap()
    }

    #[test]
    fn peaks_with_overlap() {
        let peaks = vec![
            GenomicRange::new("chr1", 90, 160),
            GenomicRange::new("chr1", 140, 200),
            GenomicRange::new("chr1", 5_000, 6_000),
        ];
        let m = make_peak_matrix(&store(), &peaks, CountingStrategy::Insertion, false).unwrap();
        assert_eq!(m.var_names[0], "chr1:90-160");
        let row = m.data.row(0);
        assert_eq!(row.col_indices(), &[0, 1]);
        assert_eq!(row.values(), &[2, 1]);

        let m = make_peak_matrix(&store(), &peaks, CountingStrategy::Fragment, false).unwrap();
        assert_eq!(m.data.row(0).values(), &[1, 1]);
        assert!(make_peak_matrix(&store(), &[], CountingStrategy::Insertion, false).is_err());
    }

    #[test]
    fn gene_activity_uses_promoters() {
        let gene = |name: &str, start, end, strand| Gene {
            name: name.into(),
            id: name.into(),
            chrom: "chr1".into(),
            start,
            end,
            strand,
        };
        let genes = vec![
            gene("up", 2_000, 2_500, Strand::Forward),
            gene("down", 3_100, 4_000, Strand::Reverse),
            gene("up", 8_000, 9_000, Strand::Forward),
        ];
        let m = make_gene_matrix(&store(), &genes, 1_000, 0).unwrap();
        assert_eq!(m.var_names, vec!["up".to_string(), "down".to_string()]);
        // "up" spans 1000-2500: insertion at 1000 only
        // "down" spans 3100-5000: no insertions
        let row = m.data.row(0);
        assert_eq!(row.col_indices(), &[0]);
        assert_eq!(row.values(), &[1]);
    }
}
