mod args;

use anyhow::{Context, Result};
use fragtk_lib::core::sparse::SparseOps;
use fragtk_lib::genome::intervals::read_bed_regions;
use fragtk_lib::genome::{read_genes_from_gtf, RegionIndex};
use fragtk_lib::pipeline::matrix::{
    add_tile_matrix, make_gene_matrix, make_peak_matrix, select_features, write_h5ad, CountMatrix,
    TileOptions,
};
use fragtk_lib::pipeline::preprocess::{read_qc, FragmentStore};
use fragtk_lib::pipeline::validation::validate_output_path;
use log::info;

use crate::commands::common;

pub use args::{MatrixArgs, MatrixConfig, MatrixMode};

fn count(store: &FragmentStore, config: &MatrixConfig) -> Result<CountMatrix> {
    let matrix = match config.mode {
        MatrixMode::Tile => add_tile_matrix(
            store,
            &TileOptions {
                bin_size: config.bin_size,
                strategy: config.strategy,
                exclude_chroms: config.exclude_chroms.clone(),
                count_duplicates: config.count_duplicates,
            },
        )?,
        MatrixMode::Peak => {
            let path = config.peaks.as_ref().context("peak mode requires --peaks")?;
            let peaks = read_bed_regions(path)
                .with_context(|| format!("Failed to read peaks from {}", path.display()))?;
            make_peak_matrix(store, &peaks, config.strategy, config.count_duplicates)?
        }
        MatrixMode::Gene => {
            let path = config.gtf.as_ref().context("gene mode requires --gtf")?;
            let genes = read_genes_from_gtf(path)
                .with_context(|| format!("Failed to read annotation {}", path.display()))?;
            make_gene_matrix(store, &genes, config.upstream, config.downstream)?
        }
    };
    Ok(matrix)
}

/// Build the count matrix for `config` from an imported fragment file,
/// shared with the `scrublet` command.
pub(crate) fn build_matrix(config: &MatrixConfig) -> Result<CountMatrix> {
    let mut store = common::load_store(&config.fragments, &config.chrom_sizes)?;
    if let Some(path) = &config.cells {
        let cells = common::read_barcode_list(path)?;
        store.retain_barcodes(&cells);
        info!("Restricted to {} of {} listed cells", store.n_obs(), cells.len());
    }

    let matrix = count(&store, config)?;
    let (density, nnz, _) = SparseOps::get_density_stats(&matrix.data);
    info!(
        "Counted {} cells x {} features ({} non-zero, density {:.4})",
        matrix.n_obs(),
        matrix.n_vars(),
        nnz,
        density
    );

    match &config.selection {
        Some(selection) => {
            let blacklist = config
                .blacklist
                .as_ref()
                .map(RegionIndex::<()>::from_bed)
                .transpose()?;
            let features = select_features(&matrix, selection, blacklist.as_ref())?;
            info!("Selected {} of {} features", features.len(), matrix.n_vars());
            Ok(matrix.select_vars(&features)?)
        }
        None => Ok(matrix),
    }
}

/// Execute the `matrix` command end-to-end.
pub fn run_matrix(args: MatrixArgs) -> Result<()> {
    let config: MatrixConfig = args.into();
    config.validate()?;
    common::configure_global_thread_pool(config.threads)?;
    info!("Running fragtk matrix ({:?}) on {:?}", config.mode, config.fragments);

    let matrix = build_matrix(&config)?;
    let qc = config.qc.as_ref().map(read_qc).transpose()?;

    validate_output_path(&config.output, ".h5ad")?;
    fragtk_lib::utils::make_parent_dirs(&config.output)?;
    write_h5ad(&matrix, qc.as_deref(), &config.output)?;
    info!("Matrix complete -> {:?}", config.output);
    Ok(())
}
