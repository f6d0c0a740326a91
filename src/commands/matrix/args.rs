use fragtk_lib::pipeline::matrix::{CountingStrategy, FeatureSelection, TileOptions};
use fragtk_lib::pipeline::validation::{validate_input_files, ValidationConfig};
use fragtk_lib::FragError;
use std::path::PathBuf;
use std::str::FromStr;
use structopt::StructOpt;

/// Feature space of the count matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    Tile,
    Peak,
    Gene,
}

impl FromStr for MatrixMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tile" | "bin" => Ok(MatrixMode::Tile),
            "peak" => Ok(MatrixMode::Peak),
            "gene" => Ok(MatrixMode::Gene),
            other => Err(format!("unknown matrix mode: {}", other)),
        }
    }
}

/// CLI arguments for the `matrix` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "matrix")]
pub struct MatrixArgs {
    /// Imported fragment file (output of `fragtk import`).
    pub fragments: PathBuf,

    /// Two-column `chrom<TAB>length` file.
    #[structopt(long, short = "g")]
    pub chrom_sizes: PathBuf,

    /// Output AnnData (.h5ad) file.
    #[structopt(long, short = "o")]
    pub output: PathBuf,

    /// Features to count: tile, peak or gene.
    #[structopt(long, short = "m", default_value = "tile")]
    pub mode: MatrixMode,

    /// Tile width in bp.
    #[structopt(long, short = "b", default_value = "500")]
    pub bin_size: u64,

    /// Chromosomes left out of the tile matrix, comma separated
    /// (default: chrM,chrY,M,Y).
    #[structopt(long, use_delimiter = true)]
    pub exclude_chroms: Vec<String>,

    /// Peak BED file (peak mode).
    #[structopt(long)]
    pub peaks: Option<PathBuf>,

    /// Gene annotation GTF (gene mode).
    #[structopt(long)]
    pub gtf: Option<PathBuf>,

    /// Promoter extension upstream of each gene (gene mode).
    #[structopt(long, default_value = "2000")]
    pub upstream: u64,

    /// Extension downstream of each gene end (gene mode).
    #[structopt(long, default_value = "0")]
    pub downstream: u64,

    /// insertion, fragment or paired-insertion.
    #[structopt(long, default_value = "insertion")]
    pub counting_strategy: CountingStrategy,

    /// Weight records by their duplicate count.
    #[structopt(long)]
    pub count_duplicates: bool,

    /// Keep only this many most accessible features.
    #[structopt(long)]
    pub n_features: Option<usize>,

    /// Fraction of low-count features dropped before feature selection.
    #[structopt(long, default_value = "0.005")]
    pub filter_lower_quantile: f64,

    /// Fraction of high-count features dropped before feature selection.
    #[structopt(long, default_value = "0.005")]
    pub filter_upper_quantile: f64,

    /// BED of regions whose features are never selected.
    #[structopt(long)]
    pub blacklist: Option<PathBuf>,

    /// Restrict the matrix to the barcodes in this file.
    #[structopt(long)]
    pub cells: Option<PathBuf>,

    /// QC table stored as obs columns.
    #[structopt(long)]
    pub qc: Option<PathBuf>,

    /// Number of worker threads to use.
    #[structopt(long, short = "t", default_value = "4")]
    pub threads: usize,
}

/// Normalised configuration derived from [`MatrixArgs`].
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub fragments: PathBuf,
    pub chrom_sizes: PathBuf,
    pub output: PathBuf,
    pub mode: MatrixMode,
    pub bin_size: u64,
    pub exclude_chroms: Vec<String>,
    pub peaks: Option<PathBuf>,
    pub gtf: Option<PathBuf>,
    pub upstream: u64,
    pub downstream: u64,
    pub strategy: CountingStrategy,
    pub count_duplicates: bool,
    pub selection: Option<FeatureSelection>,
    pub blacklist: Option<PathBuf>,
    pub cells: Option<PathBuf>,
    pub qc: Option<PathBuf>,
    pub threads: usize,
}

impl From<MatrixArgs> for MatrixConfig {
    fn from(args: MatrixArgs) -> MatrixConfig {
        let selection = args.n_features.map(|n_features| FeatureSelection {
            n_features,
            filter_lower_quantile: args.filter_lower_quantile,
            filter_upper_quantile: args.filter_upper_quantile,
        });
        let exclude_chroms = if args.exclude_chroms.is_empty() {
            TileOptions::default().exclude_chroms
        } else {
            args.exclude_chroms
        };
        MatrixConfig {
            fragments: args.fragments,
            chrom_sizes: args.chrom_sizes,
            output: args.output,
            mode: args.mode,
            bin_size: args.bin_size,
            exclude_chroms,
            peaks: args.peaks,
            gtf: args.gtf,
            upstream: args.upstream,
            downstream: args.downstream,
            strategy: args.counting_strategy,
            count_duplicates: args.count_duplicates,
            selection,
            blacklist: args.blacklist,
            cells: args.cells,
            qc: args.qc,
            threads: args.threads,
        }
    }
}

impl MatrixConfig {
    pub fn validate(&self) -> fragtk_lib::Result<()> {
        let defaults = FeatureSelection::default();
        let selection = self.selection.as_ref().unwrap_or(&defaults);
        ValidationConfig {
            filter_lower_quantile: selection.filter_lower_quantile,
            filter_upper_quantile: selection.filter_upper_quantile,
            bin_size: self.bin_size,
            num_threads: self.threads,
            ..Default::default()
        }
        .validate()?;

        match self.mode {
            MatrixMode::Peak if self.peaks.is_none() => {
                return Err(FragError::Config("peak mode requires --peaks".to_string()))
            }
            MatrixMode::Gene if self.gtf.is_none() => {
                return Err(FragError::Config("gene mode requires --gtf".to_string()))
            }
            _ => {}
        }

        let mut inputs = vec![&self.fragments, &self.chrom_sizes];
        inputs.extend(self.peaks.iter());
        inputs.extend(self.gtf.iter());
        inputs.extend(self.blacklist.iter());
        inputs.extend(self.cells.iter());
        inputs.extend(self.qc.iter());
        validate_input_files(&inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> MatrixConfig {
        let mut argv = vec!["matrix", "frags.tsv.gz", "-g", "hg38.sizes", "-o", "out.h5ad"];
        argv.extend_from_slice(extra);
        MatrixArgs::from_iter_safe(&argv).unwrap().into()
    }

    #[test]
    fn tile_defaults() {
        let config = parse(&[]);
        assert_eq!(config.mode, MatrixMode::Tile);
        assert_eq!(config.bin_size, 500);
        assert_eq!(config.exclude_chroms, vec!["chrM", "chrY", "M", "Y"]);
        assert_eq!(config.strategy, CountingStrategy::Insertion);
        assert!(config.selection.is_none());
    }

    #[test]
    fn exclusion_list_overrides_default() {
        let config = parse(&["--exclude-chroms", "chrM,chrX"]);
        assert_eq!(config.exclude_chroms, vec!["chrM", "chrX"]);
    }

    #[test]
    fn feature_selection_carries_quantiles() {
        let config = parse(&["--n-features", "1000", "--filter-upper-quantile", "0.01"]);
        let selection = config.selection.unwrap();
        assert_eq!(selection.n_features, 1000);
        assert_eq!(selection.filter_upper_quantile, 0.01);
        assert_eq!(selection.filter_lower_quantile, 0.005);
    }

    #[test]
    fn peak_mode_needs_peaks() {
        let config = parse(&["--mode", "peak", "-t", "1"]);
        assert!(matches!(config.validate(), Err(FragError::Config(_))));
    }

    #[test]
    fn unknown_mode_rejected() {
        assert!(MatrixArgs::from_iter_safe(&[
            "matrix", "f.tsv", "-g", "g.sizes", "-o", "o.h5ad", "--mode", "motif"
        ])
        .is_err());
    }
}
