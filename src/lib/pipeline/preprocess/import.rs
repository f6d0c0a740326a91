//! Fragment file import with per-cell quality control.

use crate::core::error::{FragError, Result};
use crate::fragment::{BarcodeWhitelist, Fragment};
use crate::genome::ChromSizes;
use crate::pipeline::preprocess::qc::{QcAccumulator, QualityControl, TssIndex};
use crate::pipeline::preprocess::store::{sort_fragments, CellFragments, FragmentStore};
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Settings for [`import_fragments`].
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub chrom_sizes: ChromSizes,
    pub whitelist: Option<BarcodeWhitelist>,
    pub min_num_fragments: u64,
    pub shift_left: i64,
    pub shift_right: i64,
    pub mito_chroms: Vec<String>,
    pub tss: Option<TssIndex>,
    /// Number of records between progress messages.
    pub chunk_size: usize,
}

impl ImportOptions {
    pub fn new(chrom_sizes: ChromSizes) -> Self {
        ImportOptions {
            chrom_sizes,
            whitelist: None,
            min_num_fragments: 200,
            shift_left: 0,
            shift_right: 0,
            mito_chroms: vec!["chrM".to_string(), "M".to_string()],
            tss: None,
            chunk_size: 5_000_000,
        }
    }

    fn is_mito(&self, chrom: &str) -> bool {
        self.mito_chroms.iter().any(|m| m == chrom)
    }
}

/// Result of an import: retained cells and the QC of every retained cell.
#[derive(Debug, Clone)]
pub struct ImportedFragments {
    pub store: FragmentStore,
    pub qc: Vec<(String, QualityControl)>,
}

#[derive(Default)]
struct CellBuilder {
    qc: QcAccumulator,
    fragments: Vec<Fragment>,
}

fn shift(fragment: &mut Fragment, left: i64, right: i64, chrom_len: u64) -> bool {
    let start = fragment.start as i64 + left;
    let end = (fragment.end as i64 + right).min(chrom_len as i64);
    if start < 0 || end <= start {
        return false;
    }
    fragment.start = start as u64;
    fragment.end = end as u64;
    true
}

/// Group fragments by barcode, compute QC and keep cells with at least
/// `min_num_fragments` unique nuclear fragments.
///
/// Mitochondrial fragments count toward QC but are not kept. Fragments on
/// chromosomes absent from the genome are dropped, except mitochondrial ones
/// which are always tallied.
pub fn import_fragments<I>(fragments: I, options: &ImportOptions) -> Result<ImportedFragments>
where
    I: IntoIterator<Item = Result<Fragment>>,
{
    let mut cells: FxHashMap<String, CellBuilder> = FxHashMap::default();
    let mut n_records = 0usize;
    let mut n_unknown_chrom = 0usize;
    let mut n_no_barcode = 0usize;

    for fragment in fragments {
        let mut fragment = fragment?;
        n_records += 1;
        if n_records % options.chunk_size.max(1) == 0 {
            info!("Processed {} fragment records", n_records);
        }

        let barcode = match fragment.barcode.take() {
            Some(b) => b,
            None => {
                n_no_barcode += 1;
                continue;
            }
        };
        if let Some(whitelist) = &options.whitelist {
            if !whitelist.is_valid(&barcode) {
                continue;
            }
        }

        let is_mito = options.is_mito(&fragment.chrom);
        let chrom_len = options.chrom_sizes.get(&fragment.chrom);
        if chrom_len.is_none() && !is_mito {
            n_unknown_chrom += 1;
            continue;
        }

        let cell = cells.entry(barcode).or_default();
        cell.qc.add(&fragment, is_mito);
        if !is_mito {
            if let Some(len) = chrom_len {
                if shift(&mut fragment, options.shift_left, options.shift_right, len) {
                    cell.fragments.push(fragment);
                }
            }
        }
    }

    if n_no_barcode > 0 {
        warn!("{} records had no barcode and were ignored", n_no_barcode);
    }
    if n_unknown_chrom > 0 {
        debug!(
            "{} records on chromosomes absent from the genome were dropped",
            n_unknown_chrom
        );
    }
    info!(
        "Read {} records from {} barcodes",
        n_records,
        cells.len()
    );

    let chrom_sizes = &options.chrom_sizes;
    let mut kept: Vec<(CellFragments, QualityControl)> = cells
        .into_par_iter()
        .filter(|(_, cell)| cell.qc.unique_nuclear >= options.min_num_fragments)
        .map(|(barcode, mut cell)| {
            sort_fragments(&mut cell.fragments, chrom_sizes);
            let tsse = options
                .tss
                .as_ref()
                .map_or(0.0, |tss| tss.enrichment(cell.fragments.iter()));
            let qc = cell.qc.finish(tsse);
            (
                CellFragments {
                    barcode,
                    fragments: cell.fragments,
                },
                qc,
            )
        })
        .collect();
    kept.sort_by(|a, b| a.0.barcode.cmp(&b.0.barcode));

    if kept.is_empty() {
        return Err(FragError::EmptyData(format!(
            "no barcode has at least {} fragments",
            options.min_num_fragments
        )));
    }
    info!(
        "Retained {} cells with >= {} unique fragments",
        kept.len(),
        options.min_num_fragments
    );

    let qc = kept
        .iter()
        .map(|(cell, qc)| (cell.barcode.clone(), *qc))
        .collect();
    let cells = kept.into_iter().map(|(cell, _)| cell).collect();
    Ok(ImportedFragments {
        store: FragmentStore::new(options.chrom_sizes.clone(), cells)?,
        qc,
    })
}

/// Number of fragment records per barcode, for knee plots and cell calling.
pub fn get_barcode_count<I>(fragments: I) -> Result<Vec<(String, u64)>>
where
    I: IntoIterator<Item = Result<Fragment>>,
{
    let mut counts: FxHashMap<String, u64> = FxHashMap::default();
    for fragment in fragments {
        if let Some(barcode) = fragment?.barcode {
            *counts.entry(barcode).or_default() += 1;
        }
    }
    let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(counts)
}
