mod args;

use anyhow::Result;
use fragtk_lib::pipeline::export::export_coverage;
use log::info;

use crate::commands::common;

pub use args::{ExportCoverageArgs, ExportCoverageConfig, NormalizationArg};

/// Execute the `export-coverage` command end-to-end.
pub fn run_export_coverage(args: ExportCoverageArgs) -> Result<()> {
    let config: ExportCoverageConfig = args.into();
    config.validate()?;
    common::configure_global_thread_pool(config.threads)?;

    let options = config.coverage_options()?;
    let mut store = common::load_store(&config.fragments, &config.chrom_sizes)?;
    let group_by = common::group_cells(&mut store, &config.groups)?;

    let files = export_coverage(&store, &group_by, &config.out_dir, &options)?;
    for (group, path) in &files {
        info!("{} -> {:?}", group, path);
    }
    info!("Exported {} coverage tracks to {:?}", files.len(), config.out_dir);
    Ok(())
}
