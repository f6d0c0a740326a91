use fragtk_lib::pipeline::doublet::ScrubletOptions;
use fragtk_lib::pipeline::matrix::{CountingStrategy, FeatureSelection, TileOptions};
use fragtk_lib::pipeline::validation::validate_threshold;
use std::path::PathBuf;
use structopt::StructOpt;

use crate::commands::matrix::{MatrixConfig, MatrixMode};

/// CLI arguments for the `scrublet` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "scrublet")]
pub struct ScrubletArgs {
    /// Imported fragment file (output of `fragtk import`).
    pub fragments: PathBuf,

    /// Two-column `chrom<TAB>length` file.
    #[structopt(long, short = "g")]
    pub chrom_sizes: PathBuf,

    /// Output TSV with the doublet score of every cell.
    #[structopt(long, short = "o")]
    pub output: PathBuf,

    /// Also write the barcodes called singlets to this file.
    #[structopt(long)]
    pub singlets: Option<PathBuf>,

    /// Score only the barcodes in this file.
    #[structopt(long)]
    pub cells: Option<PathBuf>,

    /// Tile width in bp of the matrix used for scoring.
    #[structopt(long, short = "b", default_value = "500")]
    pub bin_size: u64,

    /// Number of most accessible tiles used as features.
    #[structopt(long, default_value = "500000")]
    pub n_features: usize,

    /// BED of regions excluded from the features.
    #[structopt(long)]
    pub blacklist: Option<PathBuf>,

    /// Principal components of the doublet embedding.
    #[structopt(long, default_value = "15")]
    pub n_comps: usize,

    /// Simulated doublets per observed cell.
    #[structopt(long, default_value = "2.0")]
    pub sim_doublet_ratio: f64,

    /// Expected fraction of doublets among the cells.
    #[structopt(long, default_value = "0.1")]
    pub expected_doublet_rate: f64,

    /// Neighbours per cell; defaults to round(0.5 * sqrt(n_cells)).
    #[structopt(long, short = "k")]
    pub n_neighbors: Option<usize>,

    /// Fixed doublet score threshold instead of the automatic one.
    #[structopt(long)]
    pub threshold: Option<f64>,

    /// Seed of the doublet simulation.
    #[structopt(long, default_value = "0")]
    pub random_state: u64,

    /// Number of worker threads to use.
    #[structopt(long, short = "t", default_value = "4")]
    pub threads: usize,
}

/// Normalised configuration derived from [`ScrubletArgs`].
#[derive(Debug, Clone)]
pub struct ScrubletConfig {
    pub matrix: MatrixConfig,
    pub selection: FeatureSelection,
    pub options: ScrubletOptions,
    pub output: PathBuf,
    pub singlets: Option<PathBuf>,
}

impl From<ScrubletArgs> for ScrubletConfig {
    fn from(args: ScrubletArgs) -> ScrubletConfig {
        let matrix = MatrixConfig {
            fragments: args.fragments,
            chrom_sizes: args.chrom_sizes,
            output: args.output.clone(),
            mode: MatrixMode::Tile,
            bin_size: args.bin_size,
            exclude_chroms: TileOptions::default().exclude_chroms,
            peaks: None,
            gtf: None,
            upstream: 0,
            downstream: 0,
            strategy: CountingStrategy::Insertion,
            count_duplicates: false,
            selection: None,
            blacklist: args.blacklist,
            cells: args.cells,
            qc: None,
            threads: args.threads,
        };
        ScrubletConfig {
            matrix,
            selection: FeatureSelection {
                n_features: args.n_features,
                ..Default::default()
            },
            options: ScrubletOptions {
                n_comps: args.n_comps,
                sim_doublet_ratio: args.sim_doublet_ratio,
                expected_doublet_rate: args.expected_doublet_rate,
                n_neighbors: args.n_neighbors,
                threshold: args.threshold,
                random_state: args.random_state,
            },
            output: args.output,
            singlets: args.singlets,
        }
    }
}

impl ScrubletConfig {
    pub fn validate(&self) -> fragtk_lib::Result<()> {
        self.matrix.validate()?;
        validate_threshold("expected_doublet_rate", self.options.expected_doublet_rate, 0.0, 1.0)?;
        validate_threshold("sim_doublet_ratio", self.options.sim_doublet_ratio, 0.0, 100.0)?;
        if self.options.n_comps == 0 || self.selection.n_features == 0 {
            return Err(fragtk_lib::FragError::InvalidInput(
                "n_comps and n_features must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_scrublet() {
        let args = ScrubletArgs::from_iter_safe(&[
            "scrublet",
            "frags.tsv.gz",
            "-g",
            "hg38.sizes",
            "-o",
            "scores.tsv",
        ])
        .unwrap();
        let config: ScrubletConfig = args.into();

        assert_eq!(config.options.n_comps, 15);
        assert_eq!(config.options.sim_doublet_ratio, 2.0);
        assert_eq!(config.options.expected_doublet_rate, 0.1);
        assert_eq!(config.options.n_neighbors, None);
        assert_eq!(config.matrix.mode, MatrixMode::Tile);
        assert!(config.matrix.selection.is_none());
        assert_eq!(config.selection.n_features, 500_000);
    }

    #[test]
    fn explicit_threshold_and_seed() {
        let args = ScrubletArgs::from_iter_safe(&[
            "scrublet",
            "frags.tsv.gz",
            "-g",
            "hg38.sizes",
            "-o",
            "scores.tsv",
            "--threshold",
            "0.35",
            "--random-state",
            "7",
            "-k",
            "12",
        ])
        .unwrap();
        let config: ScrubletConfig = args.into();

        assert_eq!(config.options.threshold, Some(0.35));
        assert_eq!(config.options.random_state, 7);
        assert_eq!(config.options.n_neighbors, Some(12));
    }
}
