mod args;

use anyhow::{anyhow, Context, Result};
use fragtk_lib::pipeline::integration::{
    harmony, mnc_correct, read_batches, read_embedding, write_embedding,
};
use fragtk_lib::pipeline::validation::validate_matrix_dimensions;
use fragtk_lib::utils;
use log::info;

use crate::commands::common;

pub use args::{IntegrateArgs, IntegrateConfig, IntegrationMethod};

/// Execute the `integrate` command end-to-end.
pub fn run_integrate(args: IntegrateArgs) -> Result<()> {
    let config: IntegrateConfig = args.into();
    config.validate()?;
    common::configure_global_thread_pool(config.threads)?;

    let (names, embedding) = read_embedding(&config.embedding)
        .with_context(|| format!("Failed to read embedding {}", config.embedding.display()))?;
    let table = read_batches(&config.batches)?;
    let batches = names
        .iter()
        .map(|n| {
            table
                .get(n)
                .cloned()
                .ok_or_else(|| anyhow!("cell {} has no batch in {}", n, config.batches.display()))
        })
        .collect::<Result<Vec<String>>>()?;
    info!(
        "Integrating {} cells x {} dimensions with {:?}",
        embedding.nrows(),
        embedding.ncols(),
        config.method
    );

    let corrected = match config.method {
        IntegrationMethod::Harmony => harmony(&embedding, &batches, &config.harmony)?,
        IntegrationMethod::Mnc => mnc_correct(&embedding, &batches, &config.mnc)?,
    };
    validate_matrix_dimensions(corrected.shape(), embedding.shape())?;

    utils::make_parent_dirs(&config.output)?;
    write_embedding(&config.output, &names, &corrected)?;
    info!("Integration complete -> {:?}", config.output);
    Ok(())
}
