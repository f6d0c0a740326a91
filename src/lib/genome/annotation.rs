//! Gene annotations from GTF files.

use crate::core::error::{FragError, Result};
use crate::core::io::open_for_read;
use crate::genome::{GenomicRange, Strand};
use bio::bio_types::strand::Strand as BioStrand;
use bio::io::gff;
use log::{debug, info};
use std::path::Path;

/// A gene body with its name and strand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub name: String,
    pub id: String,
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl Gene {
    /// 0-based position of the transcription start site.
    pub fn tss(&self) -> u64 {
        match self.strand {
            Strand::Forward => self.start,
            Strand::Reverse => self.end.saturating_sub(1),
        }
    }

    /// Gene body extended by `upstream` bp at the 5' end and `downstream` bp
    /// at the 3' end.
    pub fn extended(&self, upstream: u64, downstream: u64) -> GenomicRange {
        let (left, right) = match self.strand {
            Strand::Forward => (upstream, downstream),
            Strand::Reverse => (downstream, upstream),
        };
        GenomicRange::new(
            self.chrom.clone(),
            self.start.saturating_sub(left),
            self.end + right,
        )
    }
}

/// Gene record from a GTF feature. `None` for non-gene features.
fn gene_from_record(record: &gff::Record) -> Result<Option<Gene>> {
    if record.feature_type() != "gene" {
        return Ok(None);
    }
    // GTF is 1-based and closed
    let (start, end) = (*record.start(), *record.end());
    if start == 0 || end < start {
        return Err(FragError::InvalidInput(format!(
            "invalid GTF coordinates {}:{}-{}",
            record.seqname(),
            start,
            end
        )));
    }
    let strand = match record.strand() {
        Some(BioStrand::Reverse) => Strand::Reverse,
        _ => Strand::Forward,
    };
    let attributes = record.attributes();
    let id = attributes.get("gene_id").cloned().ok_or_else(|| {
        FragError::InvalidInput(format!(
            "gene at {}:{} has no gene_id",
            record.seqname(),
            start
        ))
    })?;
    let name = attributes
        .get("gene_name")
        .cloned()
        .unwrap_or_else(|| id.clone());

    Ok(Some(Gene {
        name,
        id,
        chrom: record.seqname().to_string(),
        start: start - 1,
        end,
        strand,
    }))
}

/// Read all `gene` records from a GTF file (gzip aware), in file order.
pub fn read_genes_from_gtf<P: AsRef<Path>>(path: P) -> Result<Vec<Gene>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FragError::FileNotFound(path.display().to_string()));
    }
    info!("Reading gene annotation from {}", path.display());
    let mut reader = gff::Reader::new(open_for_read(path)?, gff::GffType::GTF2);
    let mut genes = Vec::new();
    for record in reader.records() {
        if let Some(gene) = gene_from_record(&record?)? {
            genes.push(gene);
        }
    }
    debug!("Parsed {} genes", genes.len());
    if genes.is_empty() {
        return Err(FragError::EmptyData(format!(
            "no gene records in {}",
            path.display()
        )));
    }
    Ok(genes)
}
