use fragtk_lib::pipeline::export::ExportFragmentsOptions;
use fragtk_lib::pipeline::validation::validate_input_files;
use fragtk_lib::utils::{Compression, DEFAULT_GZIP_LEVEL, MAX_GZIP_LEVEL};
use std::path::PathBuf;
use structopt::StructOpt;

/// CLI arguments for the `export-fragments` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "export-fragments")]
pub struct ExportFragmentsArgs {
    /// Imported fragment file (output of `fragtk import`).
    pub fragments: PathBuf,

    /// Two-column `chrom<TAB>length` file.
    #[structopt(long, short = "g")]
    pub chrom_sizes: PathBuf,

    /// Two-column `barcode<TAB>group` table; unlisted cells are skipped.
    #[structopt(long)]
    pub groups: PathBuf,

    /// Output directory, created when missing.
    #[structopt(long, short = "o")]
    pub out_dir: PathBuf,

    /// Only export these groups, comma separated.
    #[structopt(long, use_delimiter = true)]
    pub selections: Vec<String>,

    /// Minimum fragment length.
    #[structopt(long)]
    pub min_fragment_length: Option<u64>,

    /// Maximum fragment length.
    #[structopt(long)]
    pub max_fragment_length: Option<u64>,

    /// Text prepended to each output file name.
    #[structopt(long, default_value = "")]
    pub prefix: String,

    /// Text appended to each output file name.
    #[structopt(long, default_value = ".tsv.gz")]
    pub suffix: String,

    /// Output compression: gzip or none.
    #[structopt(long, default_value = "gzip")]
    pub compression: Compression,

    /// Gzip level, 0 (fastest) to 9 (smallest).
    #[structopt(long, default_value = "6")]
    pub compression_level: u32,

    /// Number of worker threads to use.
    #[structopt(long, short = "t", default_value = "4")]
    pub threads: usize,
}

/// Normalised configuration derived from [`ExportFragmentsArgs`].
#[derive(Debug, Clone)]
pub struct ExportFragmentsConfig {
    pub fragments: PathBuf,
    pub chrom_sizes: PathBuf,
    pub groups: PathBuf,
    pub out_dir: PathBuf,
    pub options: ExportFragmentsOptions,
    pub threads: usize,
}

impl From<ExportFragmentsArgs> for ExportFragmentsConfig {
    fn from(args: ExportFragmentsArgs) -> ExportFragmentsConfig {
        ExportFragmentsConfig {
            fragments: args.fragments,
            chrom_sizes: args.chrom_sizes,
            groups: args.groups,
            out_dir: args.out_dir,
            options: ExportFragmentsOptions {
                selections: if args.selections.is_empty() {
                    None
                } else {
                    Some(args.selections)
                },
                min_fragment_length: args.min_fragment_length,
                max_fragment_length: args.max_fragment_length,
                prefix: args.prefix,
                suffix: args.suffix,
                compression: args.compression.with_level(args.compression_level),
            },
            threads: args.threads,
        }
    }
}

impl ExportFragmentsConfig {
    pub fn validate(&self) -> fragtk_lib::Result<()> {
        if let (Some(lo), Some(hi)) = (
            self.options.min_fragment_length,
            self.options.max_fragment_length,
        ) {
            if lo > hi {
                return Err(fragtk_lib::FragError::InvalidInput(format!(
                    "min_fragment_length ({}) exceeds max_fragment_length ({})",
                    lo, hi
                )));
            }
        }
        let level = self.options.compression.level().unwrap_or(DEFAULT_GZIP_LEVEL);
        if level > MAX_GZIP_LEVEL {
            return Err(fragtk_lib::FragError::ThresholdValidation {
                field: "compression_level".to_string(),
                min: 0.0,
                max: MAX_GZIP_LEVEL as f64,
                value: level as f64,
            });
        }
        validate_input_files(&[&self.fragments, &self.chrom_sizes, &self.groups])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_write_gzip_tsv() {
        let args = ExportFragmentsArgs::from_iter_safe(&[
            "export-fragments", "frags.tsv.gz", "-g", "hg38.sizes", "--groups", "clusters.tsv",
            "-o", "by_cluster",
        ])
        .unwrap();
        let config: ExportFragmentsConfig = args.into();

        assert_eq!(config.options.suffix, ".tsv.gz");
        assert!(matches!(config.options.compression, Compression::Gzip { .. }));
        assert!(config.options.selections.is_none());
        assert_eq!(config.options.compression.level(), Some(DEFAULT_GZIP_LEVEL));
    }

    #[test]
    fn compression_level_is_passed_through() {
        let args = ExportFragmentsArgs::from_iter_safe(&[
            "export-fragments", "frags.tsv.gz", "-g", "hg38.sizes", "--groups", "clusters.tsv",
            "-o", "out", "--compression-level", "9",
        ])
        .unwrap();
        let config: ExportFragmentsConfig = args.into();
        assert_eq!(config.options.compression, Compression::Gzip { level: 9, threads: 1 });

        let args = ExportFragmentsArgs::from_iter_safe(&[
            "export-fragments", "frags.tsv.gz", "-g", "hg38.sizes", "--groups", "clusters.tsv",
            "-o", "out", "--compression-level", "10",
        ])
        .unwrap();
        let config: ExportFragmentsConfig = args.into();
        assert!(matches!(
            config.validate(),
            Err(fragtk_lib::FragError::ThresholdValidation { .. })
        ));
    }

    #[test]
    fn selections_and_lengths() {
        let args = ExportFragmentsArgs::from_iter_safe(&[
            "export-fragments", "frags.tsv.gz", "-g", "hg38.sizes", "--groups", "clusters.tsv",
            "-o", "out", "--selections", "B,T", "--min-fragment-length", "300",
            "--max-fragment-length", "100", "--compression", "none",
        ])
        .unwrap();
        let config: ExportFragmentsConfig = args.into();

        assert_eq!(
            config.options.selections,
            Some(vec!["B".to_string(), "T".to_string()])
        );
        assert_eq!(config.options.compression, Compression::None);
        assert!(config.validate().is_err());
    }
}
