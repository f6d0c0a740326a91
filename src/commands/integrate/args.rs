use fragtk_lib::pipeline::integration::{HarmonyOptions, MncOptions};
use fragtk_lib::pipeline::validation::{validate_input_files, validate_threshold, ValidationConfig};
use std::path::PathBuf;
use std::str::FromStr;
use structopt::StructOpt;

/// Batch correction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMethod {
    Harmony,
    Mnc,
}

impl FromStr for IntegrationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "harmony" => Ok(IntegrationMethod::Harmony),
            "mnc" | "mnc-correct" => Ok(IntegrationMethod::Mnc),
            other => Err(format!("unknown integration method: {}", other)),
        }
    }
}

/// CLI arguments for the `integrate` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "integrate")]
pub struct IntegrateArgs {
    /// Embedding TSV: barcode followed by one column per dimension.
    #[structopt(long, short = "e")]
    pub embedding: PathBuf,

    /// Two-column `barcode<TAB>batch` table covering every embedded cell.
    #[structopt(long, short = "b")]
    pub batches: PathBuf,

    /// Corrected embedding output, same layout as the input.
    #[structopt(long, short = "o")]
    pub output: PathBuf,

    /// harmony or mnc.
    #[structopt(long, short = "m", default_value = "harmony")]
    pub method: IntegrationMethod,

    /// Number of clusters. Harmony defaults to min(100, n_cells / 30), mnc to 40.
    #[structopt(long)]
    pub n_clusters: Option<usize>,

    /// Harmony diversity penalty.
    #[structopt(long, default_value = "2.0")]
    pub theta: f64,

    /// Harmony soft-clustering width.
    #[structopt(long, default_value = "0.1")]
    pub sigma: f64,

    /// Harmony ridge penalty.
    #[structopt(long, default_value = "1.0")]
    pub lambda: f64,

    /// Harmony rounds.
    #[structopt(long, default_value = "10")]
    pub max_iter: usize,

    /// Paired centroids averaged per cell (mnc).
    #[structopt(long, default_value = "5")]
    pub n_neighbors: usize,

    /// Correction rounds (mnc).
    #[structopt(long, default_value = "1")]
    pub n_iter: usize,

    /// Number of worker threads to use.
    #[structopt(long, short = "t", default_value = "4")]
    pub threads: usize,
}

/// Normalised configuration derived from [`IntegrateArgs`].
#[derive(Debug, Clone)]
pub struct IntegrateConfig {
    pub embedding: PathBuf,
    pub batches: PathBuf,
    pub output: PathBuf,
    pub method: IntegrationMethod,
    pub harmony: HarmonyOptions,
    pub mnc: MncOptions,
    pub threads: usize,
}

impl From<IntegrateArgs> for IntegrateConfig {
    fn from(args: IntegrateArgs) -> IntegrateConfig {
        let mnc_defaults = MncOptions::default();
        IntegrateConfig {
            embedding: args.embedding,
            batches: args.batches,
            output: args.output,
            method: args.method,
            harmony: HarmonyOptions {
                n_clusters: args.n_clusters,
                sigma: args.sigma,
                theta: args.theta,
                lambda: args.lambda,
                max_iter: args.max_iter,
                ..Default::default()
            },
            mnc: MncOptions {
                n_clusters: args.n_clusters.unwrap_or(mnc_defaults.n_clusters),
                n_neighbors: args.n_neighbors,
                n_iter: args.n_iter,
                ..mnc_defaults
            },
            threads: args.threads,
        }
    }
}

impl IntegrateConfig {
    pub fn validate(&self) -> fragtk_lib::Result<()> {
        ValidationConfig {
            num_threads: self.threads,
            ..Default::default()
        }
        .validate()?;
        match self.method {
            IntegrationMethod::Harmony => {
                validate_threshold("sigma", self.harmony.sigma, f64::MIN_POSITIVE, f64::MAX)?;
                validate_threshold("theta", self.harmony.theta, 0.0, f64::MAX)?;
                validate_threshold("lambda", self.harmony.lambda, 0.0, f64::MAX)?;
            }
            IntegrationMethod::Mnc => {
                if self.mnc.n_clusters == 0 || self.mnc.n_neighbors == 0 {
                    return Err(fragtk_lib::FragError::InvalidInput(
                        "n_clusters and n_neighbors must be greater than 0".to_string(),
                    ));
                }
            }
        }
        validate_input_files(&[&self.embedding, &self.batches])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harmony_is_default() {
        let args = IntegrateArgs::from_iter_safe(&[
            "integrate", "-e", "pca.tsv", "-b", "batch.tsv", "-o", "out.tsv",
        ])
        .unwrap();
        let config: IntegrateConfig = args.into();

        assert_eq!(config.method, IntegrationMethod::Harmony);
        assert_eq!(config.harmony.theta, 2.0);
        assert_eq!(config.harmony.n_clusters, None);
        assert_eq!(config.mnc.n_clusters, 40);
    }

    #[test]
    fn cluster_count_shared_by_methods() {
        let args = IntegrateArgs::from_iter_safe(&[
            "integrate", "-e", "pca.tsv", "-b", "batch.tsv", "-o", "out.tsv", "-m", "mnc",
            "--n-clusters", "12",
        ])
        .unwrap();
        let config: IntegrateConfig = args.into();

        assert_eq!(config.method, IntegrationMethod::Mnc);
        assert_eq!(config.mnc.n_clusters, 12);
        assert_eq!(config.harmony.n_clusters, Some(12));
    }

    #[test]
    fn zero_sigma_rejected() {
        let args = IntegrateArgs::from_iter_safe(&[
            "integrate", "-e", "pca.tsv", "-b", "batch.tsv", "-o", "out.tsv", "--sigma", "0",
            "-t", "1",
        ])
        .unwrap();
        let config: IntegrateConfig = args.into();
        assert!(matches!(
            config.validate(),
            Err(fragtk_lib::FragError::ThresholdValidation { .. })
        ));
    }
}
