//! Per-cell quality metrics: fragment counts, duplication, mitochondrial
//! fraction and TSS enrichment.

use crate::core::error::Result;
use crate::core::io::{get_tsv_reader, get_writer, Compression};
use crate::fragment::Fragment;
use crate::genome::{Gene, GenomicRange, RegionIndex, Strand};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Half-width of the window around each TSS, in bp.
pub const TSS_FLANK: u64 = 2000;
/// Number of outermost positions on each side used as background.
pub const TSS_BACKGROUND: usize = 100;
/// Moving-average width applied before taking the profile maximum.
pub const TSS_SMOOTH: usize = 11;

const PROFILE_LEN: usize = (2 * TSS_FLANK + 1) as usize;

/// Quality metrics of one cell barcode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct QualityControl {
    pub n_fragment: u64,
    pub frac_dup: f64,
    pub frac_mito: f64,
    pub tsse: f64,
}

/// TSS windows used for enrichment scoring.
#[derive(Debug, Clone)]
pub struct TssIndex {
    windows: RegionIndex<(u64, bool)>,
}

impl TssIndex {
    /// Unique (chromosome, position, strand) TSS sites of the given genes.
    pub fn from_genes(genes: &[Gene]) -> Self {
        let mut sites: Vec<(String, u64, bool)> = genes
            .iter()
            .map(|g| (g.chrom.clone(), g.tss(), g.strand == Strand::Reverse))
            .collect();
        sites.sort();
        sites.dedup();
        let windows = RegionIndex::from_ranges(
            sites.into_iter().map(|(chrom, tss, reverse)| {
                (
                    GenomicRange::new(chrom, tss.saturating_sub(TSS_FLANK), tss + TSS_FLANK + 1),
                    (tss, reverse),
                )
            }),
            false,
        );
        TssIndex { windows }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Add the insertions of `fragment` to a per-offset profile.
    fn add_to_profile(&self, fragment: &Fragment, profile: &mut [u64]) {
        for pos in fragment.insertion_sites() {
            for iv in self.windows.find(&fragment.chrom, pos, pos + 1) {
                let (tss, reverse) = iv.val;
                let offset = if reverse {
                    TSS_FLANK as i64 + tss as i64 - pos as i64
                } else {
                    TSS_FLANK as i64 + pos as i64 - tss as i64
                };
                if (0..PROFILE_LEN as i64).contains(&offset) {
                    profile[offset as usize] += 1;
                }
            }
        }
    }

    /// TSS enrichment of one cell's fragments.
    pub fn enrichment<'a, I>(&self, fragments: I) -> f64
    where
        I: IntoIterator<Item = &'a Fragment>,
    {
        let mut profile = vec![0u64; PROFILE_LEN];
        fragments
            .into_iter()
            .for_each(|f| self.add_to_profile(f, &mut profile));
        enrichment_from_profile(&profile)
    }
}

/// Score a TSS-centred insertion profile: smoothed maximum over the mean of
/// the outermost positions.
pub fn enrichment_from_profile(profile: &[u64]) -> f64 {
    let n = profile.len();
    if n < 2 * TSS_BACKGROUND {
        return 0.0;
    }
    let background: u64 = profile[..TSS_BACKGROUND].iter().sum::<u64>()
        + profile[n - TSS_BACKGROUND..].iter().sum::<u64>();
    let flank = background as f64 / (2 * TSS_BACKGROUND) as f64 + 0.1;

    let half = TSS_SMOOTH / 2;
    let peak = (half..n - half)
        .map(|i| profile[i - half..=i + half].iter().sum::<u64>() as f64 / TSS_SMOOTH as f64)
        .fold(0.0f64, f64::max);
    peak / flank
}

/// Running QC tallies for one barcode while fragments stream in.
#[derive(Debug, Clone, Default)]
pub struct QcAccumulator {
    pub unique_nuclear: u64,
    pub unique_total: u64,
    pub reads_total: u64,
    pub unique_mito: u64,
}

impl QcAccumulator {
    pub fn add(&mut self, fragment: &Fragment, is_mito: bool) {
        self.unique_total += 1;
        self.reads_total += fragment.count as u64;
        if is_mito {
            self.unique_mito += 1;
        } else {
            self.unique_nuclear += 1;
        }
    }

    pub fn finish(&self, tsse: f64) -> QualityControl {
        let frac_dup = if self.reads_total == 0 {
            0.0
        } else {
            1.0 - self.unique_total as f64 / self.reads_total as f64
        };
        let frac_mito = if self.unique_total == 0 {
            0.0
        } else {
            self.unique_mito as f64 / self.unique_total as f64
        };
        QualityControl {
            n_fragment: self.unique_nuclear,
            frac_dup,
            frac_mito,
            tsse,
        }
    }
}

#[derive(Serialize)]
struct QcRow<'a> {
    barcode: &'a str,
    n_fragment: u64,
    frac_dup: f64,
    frac_mito: f64,
    tsse: f64,
}

/// Write a QC table with a header row.
pub fn write_qc<P: AsRef<Path>>(path: P, qc: &[(String, QualityControl)]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = get_writer(path, Compression::from_path(path), true)?;
    for (barcode, qc) in qc {
        writer.serialize(QcRow {
            barcode,
            n_fragment: qc.n_fragment,
            frac_dup: qc.frac_dup,
            frac_mito: qc.frac_mito,
            tsse: qc.tsse,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Deserialize)]
struct QcRecord {
    barcode: String,
    n_fragment: u64,
    frac_dup: f64,
    frac_mito: f64,
    tsse: f64,
}

/// Read a table written by [`write_qc`].
pub fn read_qc<P: AsRef<Path>>(path: P) -> Result<Vec<(String, QualityControl)>> {
    let mut reader = get_tsv_reader(path, true)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let record: QcRecord = record?;
        rows.push((
            record.barcode,
            QualityControl {
                n_fragment: record.n_fragment,
                frac_dup: record.frac_dup,
                frac_mito: record.frac_mito,
                tsse: record.tsse,
            },
        ));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplication_and_mito_fractions() {
        let mut acc = QcAccumulator::default();
        let mut dup = Fragment::new("chr1", 0, 100);
        dup.count = 3;
        acc.add(&dup, false);
        acc.add(&Fragment::new("chr1", 200, 300), false);
        acc.add(&Fragment::new("chrM", 0, 50), true);
        let qc = acc.finish(1.5);
        assert_eq!(qc.n_fragment, 2);
        assert!((qc.frac_dup - (1.0 - 3.0 / 5.0)).abs() < 1e-12);
        assert!((qc.frac_mito - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(qc.tsse, 1.5);
    }

    #[test]
    fn flat_profile_scores_near_one() {
        let profile = vec![10u64; PROFILE_LEN];
        let score = enrichment_from_profile(&profile);
        assert!((score - 10.0 / 10.1).abs() < 1e-9);
    }

    #[test]
    fn enrichment_at_tss() {
        let gene = Gene {
            name: "g".into(),
            id: "g".into(),
            chrom: "chr1".into(),
            start: 10_000,
            end: 20_000,
            strand: Strand::Forward,
        };
        let index = TssIndex::from_genes(&[gene.clone(), gene]);
        // 20 fragments centred on the TSS, none in the background
        let fragments: Vec<Fragment> = (0..20)
            .map(|i| Fragment::new("chr1", 9_995 + i % 3, 10_005 + i % 3))
            .collect();
        let score = index.enrichment(fragments.iter());
        assert!(score > 10.0, "score = {}", score);

        let far: Vec<Fragment> = vec![Fragment::new("chr1", 50_000, 50_100)];
        assert_eq!(index.enrichment(far.iter()), 0.0);
    }

    #[test]
    fn reverse_strand_profile_is_mirrored() {
        let gene = Gene {
            name: "r".into(),
            id: "r".into(),
            chrom: "chr1".into(),
            start: 10_000,
            end: 20_001,
            strand: Strand::Reverse,
        };
        let index = TssIndex::from_genes(&[gene]);
        let stranded = |s: u64, e: u64, strand| {
            let mut f = Fragment::new("chr1", s, e);
            f.strand = Some(strand);
            f
        };

        // 100 bp past the 3' end of the gene in genome order is upstream
        let mut profile = vec![0u64; PROFILE_LEN];
        index.add_to_profile(&stranded(20_100, 20_300, Strand::Forward), &mut profile);
        assert_eq!(profile[TSS_FLANK as usize - 100], 1);
        assert_eq!(profile.iter().sum::<u64>(), 1);

        let mut profile = vec![0u64; PROFILE_LEN];
        index.add_to_profile(&stranded(19_700, 19_901, Strand::Reverse), &mut profile);
        assert_eq!(profile[TSS_FLANK as usize + 100], 1);
        assert_eq!(profile.iter().sum::<u64>(), 1);

        let at_tss: Vec<Fragment> = (0..20)
            .map(|i| Fragment::new("chr1", 19_995 + i % 3, 20_005 + i % 3))
            .collect();
        assert!(index.enrichment(at_tss.iter()) > 10.0);
        let at_gene_start: Vec<Fragment> = (0..20)
            .map(|i| Fragment::new("chr1", 9_995 + i % 3, 10_005 + i % 3))
            .collect();
        assert_eq!(index.enrichment(at_gene_start.iter()), 0.0);
    }

    #[test]
    fn qc_table_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qc.tsv");
        write_qc(
            &path,
            &[("A".to_string(), QualityControl { n_fragment: 5, ..Default::default() })],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("barcode\tn_fragment\tfrac_dup\tfrac_mito\ttsse")
        );
        assert!(lines.next().unwrap().starts_with("A\t5\t"));

        let back = read_qc(&path).unwrap();
        assert_eq!(back[0].0, "A");
        assert_eq!(back[0].1.n_fragment, 5);
    }
}
