mod args;

use anyhow::Result;
use fragtk_lib::pipeline::export::export_fragments;
use log::info;

use crate::commands::common;

pub use args::{ExportFragmentsArgs, ExportFragmentsConfig};

/// Execute the `export-fragments` command end-to-end.
pub fn run_export_fragments(args: ExportFragmentsArgs) -> Result<()> {
    let config: ExportFragmentsConfig = args.into();
    config.validate()?;
    common::configure_global_thread_pool(config.threads)?;

    let mut store = common::load_store(&config.fragments, &config.chrom_sizes)?;
    let group_by = common::group_cells(&mut store, &config.groups)?;

    let files = export_fragments(&store, &group_by, &config.out_dir, &config.options)?;
    for (group, path) in &files {
        info!("{} -> {:?}", group, path);
    }
    info!("Exported {} groups to {:?}", files.len(), config.out_dir);
    Ok(())
}
