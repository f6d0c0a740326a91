mod args;

use anyhow::Result;
use fragtk_lib::genome::RegionIndex;
use fragtk_lib::pipeline::doublet::{filter_doublets, scrublet};
use fragtk_lib::pipeline::matrix::select_features;
use fragtk_lib::utils::{self, Compression};
use log::info;
use serde::Serialize;

use crate::commands::{common, matrix};

pub use args::{ScrubletArgs, ScrubletConfig};

#[derive(Serialize)]
struct ScoreRow<'a> {
    barcode: &'a str,
    doublet_score: f64,
    is_doublet: bool,
}

/// Execute the `scrublet` command end-to-end.
pub fn run_scrublet(args: ScrubletArgs) -> Result<()> {
    let config: ScrubletConfig = args.into();
    config.validate()?;
    common::configure_global_thread_pool(config.matrix.threads)?;
    info!("Running fragtk scrublet on {:?}", config.matrix.fragments);

    let counts = matrix::build_matrix(&config.matrix)?;
    let blacklist = config
        .matrix
        .blacklist
        .as_ref()
        .map(RegionIndex::<()>::from_bed)
        .transpose()?;
    let features = select_features(&counts, &config.selection, blacklist.as_ref())?;
    info!("Scoring doublets over {} features", features.len());

    let scores = scrublet(&counts, Some(&features), &config.options)?;

    utils::make_parent_dirs(&config.output)?;
    let mut writer = utils::get_writer(&config.output, Compression::from_path(&config.output), true)?;
    for ((barcode, &score), &is_doublet) in scores
        .obs_names
        .iter()
        .zip(&scores.obs_scores)
        .zip(&scores.is_doublet)
    {
        writer.serialize(ScoreRow {
            barcode,
            doublet_score: score,
            is_doublet,
        })?;
    }
    writer.flush()?;
    info!(
        "Doublet scores (threshold {:.4}, {:.2}% called doublets) -> {:?}",
        scores.threshold,
        100.0 * scores.doublet_rate(),
        config.output
    );

    if let Some(path) = &config.singlets {
        let singlets = filter_doublets(&scores, None);
        let n = common::write_lines(path, &singlets)?;
        info!("{} singlets -> {:?}", n, path);
    }
    Ok(())
}
