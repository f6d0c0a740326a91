mod args;

use anyhow::{Context, Result};
use fragtk_lib::fragment::{BarcodeWhitelist, FragmentReader};
use fragtk_lib::genome::read_genes_from_gtf;
use fragtk_lib::pipeline::preprocess::{import_fragments, write_qc, ImportOptions, TssIndex};
use fragtk_lib::utils::{self, Compression};
use log::info;

use crate::commands::common;

pub use args::{ImportArgs, ImportConfig};

/// Execute the `import` command end-to-end.
pub fn run_import(args: ImportArgs) -> Result<()> {
    let config: ImportConfig = args.into();
    config.validate()?;

    info!("Running fragtk import on {:?}", config.fragments);
    let threads = common::configure_global_thread_pool(config.threads)?;

    let mut options = ImportOptions::new(common::load_chrom_sizes(&config.chrom_sizes)?);
    options.min_num_fragments = config.min_fragments;
    options.shift_left = config.shift_left;
    options.shift_right = config.shift_right;
    options.mito_chroms = config.mito_chroms.clone();
    options.chunk_size = config.chunk_size;

    if let Some(path) = &config.whitelist {
        let whitelist = BarcodeWhitelist::from_file(path)
            .with_context(|| format!("Failed to read whitelist {}", path.display()))?;
        info!("Restricting import to {} whitelisted barcodes", whitelist.len());
        options.whitelist = Some(whitelist);
    }
    if let Some(path) = &config.gtf {
        let genes = read_genes_from_gtf(path)
            .with_context(|| format!("Failed to read annotation {}", path.display()))?;
        info!("Computing TSS enrichment over {} genes", genes.len());
        options.tss = Some(TssIndex::from_genes(&genes));
    }

    let reader = FragmentReader::from_path(&config.fragments)?;
    let imported = import_fragments(reader, &options)?;

    let output = common::ensure_gz_path(&config.output);
    utils::make_parent_dirs(&output)?;
    imported
        .store
        .write_fragments(&output, Compression::gzip().with_threads(threads))?;

    if let Some(qc_path) = &config.qc {
        utils::make_parent_dirs(qc_path)?;
        write_qc(qc_path, &imported.qc)?;
        info!("QC metrics -> {:?}", qc_path);
    }

    info!(
        "Import complete: {} cells, {} fragments -> {:?}",
        imported.store.n_obs(),
        imported.store.n_fragments(),
        output
    );
    Ok(())
}
