use fragtk_lib::engine::par_granges;
use fragtk_lib::genome::RegionIndex;
use fragtk_lib::pipeline::export::{CoverageOptions, CoverageOutputFormat, Normalization};
use fragtk_lib::pipeline::matrix::CountingStrategy;
use fragtk_lib::pipeline::validation::{validate_input_files, ValidationConfig};
use fragtk_lib::utils::{Compression, DEFAULT_GZIP_LEVEL, MAX_GZIP_LEVEL};
use std::path::PathBuf;
use std::str::FromStr;
use structopt::StructOpt;

/// Normalization method, or `none` for raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationArg(pub Option<Normalization>);

impl FromStr for NormalizationArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("raw") {
            Ok(NormalizationArg(None))
        } else {
            s.parse().map(|n| NormalizationArg(Some(n)))
        }
    }
}

/// CLI arguments for the `export-coverage` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "export-coverage")]
pub struct ExportCoverageArgs {
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

    /// Bin size in bp.
    #[structopt(long, short = "r", default_value = "1")]
    pub resolution: u64,

    /// BED of regions whose records are skipped.
    #[structopt(long)]
    pub blacklist: Option<PathBuf>,

    /// RPKM, CPM, BPM, RPGC or none.
    #[structopt(long, short = "n", default_value = "RPKM")]
    pub normalization: NormalizationArg,

    /// Only records overlapping these BED regions count towards normalization.
    #[structopt(long)]
    pub include_for_norm: Option<PathBuf>,

    /// Records overlapping these BED regions never count towards normalization.
    #[structopt(long)]
    pub exclude_for_norm: Option<PathBuf>,

    /// Effective genome size for RPGC; defaults to the total genome length.
    #[structopt(long)]
    pub effective_genome_size: Option<u64>,

    /// Minimum fragment length.
    #[structopt(long)]
    pub min_fragment_length: Option<u64>,

    /// Maximum fragment length.
    #[structopt(long, default_value = "2000")]
    pub max_fragment_length: u64,

    /// fragment, insertion or paired-insertion.
    #[structopt(long, default_value = "fragment")]
    pub counting_strategy: CountingStrategy,

    /// Box smoothing window in bp.
    #[structopt(long)]
    pub smooth_length: Option<u64>,

    /// Text prepended to each output file name.
    #[structopt(long, default_value = "")]
    pub prefix: String,

    /// Text appended to each output file name [default: .bedgraph.gz or .bw].
    #[structopt(long)]
    pub suffix: Option<String>,

    /// Track format: bedgraph or bigwig.
    #[structopt(long, short = "f", default_value = "bedgraph")]
    pub format: CoverageOutputFormat,

    /// bedGraph compression: gzip or none.
    #[structopt(long, default_value = "gzip")]
    pub compression: Compression,

    /// Gzip level, 0 (fastest) to 9 (smallest).
    #[structopt(long, default_value = "6")]
    pub compression_level: u32,

    /// Number of worker threads to use.
    #[structopt(long, short = "t", default_value = "4")]
    pub threads: usize,

    /// Ideal base pairs per worker, rounded up to whole bins.
    #[structopt(long, short = "c", default_value = par_granges::CHUNKSIZE_STR.as_str())]
    pub chunksize: u64,
}

/// Normalised configuration derived from [`ExportCoverageArgs`]. Region files
/// are loaded by [`ExportCoverageConfig::coverage_options`].
#[derive(Debug, Clone)]
pub struct ExportCoverageConfig {
    pub fragments: PathBuf,
    pub chrom_sizes: PathBuf,
    pub groups: PathBuf,
    pub out_dir: PathBuf,
    pub blacklist: Option<PathBuf>,
    pub include_for_norm: Option<PathBuf>,
    pub exclude_for_norm: Option<PathBuf>,
    pub options: CoverageOptions,
    pub threads: usize,
}

impl From<ExportCoverageArgs> for ExportCoverageConfig {
    fn from(args: ExportCoverageArgs) -> ExportCoverageConfig {
        let options = CoverageOptions {
            selections: if args.selections.is_empty() {
                None
            } else {
                Some(args.selections)
            },
            resolution: args.resolution,
            normalization: args.normalization.0,
            effective_genome_size: args.effective_genome_size,
            min_fragment_length: args.min_fragment_length,
            max_fragment_length: Some(args.max_fragment_length),
            counting_strategy: args.counting_strategy,
            smooth_length: args.smooth_length,
            prefix: args.prefix,
            suffix: args
                .suffix
                .unwrap_or_else(|| args.format.default_suffix().to_string()),
            format: args.format,
            compression: args.compression.with_level(args.compression_level),
            threads: Some(args.threads),
            chunksize: args.chunksize,
            ..Default::default()
        };
        ExportCoverageConfig {
            fragments: args.fragments,
            chrom_sizes: args.chrom_sizes,
            groups: args.groups,
            out_dir: args.out_dir,
            blacklist: args.blacklist,
            include_for_norm: args.include_for_norm,
            exclude_for_norm: args.exclude_for_norm,
            options,
            threads: args.threads,
        }
    }
}

impl ExportCoverageConfig {
    pub fn validate(&self) -> fragtk_lib::Result<()> {
        ValidationConfig {
            bin_size: self.options.resolution,
            chunk_size: self.options.chunksize as usize,
            num_threads: self.threads,
            ..Default::default()
        }
        .validate()?;
        let level = self.options.compression.level().unwrap_or(DEFAULT_GZIP_LEVEL);
        if level > MAX_GZIP_LEVEL {
            return Err(fragtk_lib::FragError::ThresholdValidation {
                field: "compression_level".to_string(),
                min: 0.0,
                max: MAX_GZIP_LEVEL as f64,
                value: level as f64,
            });
        }

        let mut inputs = vec![&self.fragments, &self.chrom_sizes, &self.groups];
        inputs.extend(self.blacklist.iter());
        inputs.extend(self.include_for_norm.iter());
        inputs.extend(self.exclude_for_norm.iter());
        validate_input_files(&inputs)
    }

    /// Coverage settings with the region files loaded.
    pub fn coverage_options(&self) -> fragtk_lib::Result<CoverageOptions> {
        let load = |path: &Option<PathBuf>| path.as_ref().map(RegionIndex::<()>::from_bed).transpose();
        Ok(CoverageOptions {
            blacklist: load(&self.blacklist)?,
            include_for_norm: load(&self.include_for_norm)?,
            exclude_for_norm: load(&self.exclude_for_norm)?,
            ..self.options.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> ExportCoverageConfig {
        let mut argv = vec![
            "export-coverage", "frags.tsv.gz", "-g", "hg38.sizes", "--groups", "clusters.tsv",
            "-o", "tracks",
        ];
        argv.extend_from_slice(extra);
        ExportCoverageArgs::from_iter_safe(&argv).unwrap().into()
    }

    #[test]
    fn defaults_match_library() {
        let config = parse(&[]);
        let defaults = CoverageOptions::default();

        assert_eq!(config.options.resolution, defaults.resolution);
        assert_eq!(config.options.normalization, Some(Normalization::RPKM));
        assert_eq!(config.options.max_fragment_length, Some(2000));
        assert_eq!(config.options.counting_strategy, CountingStrategy::Fragment);
        assert_eq!(config.options.suffix, ".bedgraph.gz");
        assert_eq!(config.options.chunksize, par_granges::CHUNKSIZE);
        assert_eq!(config.options.format, CoverageOutputFormat::BedGraph);
        assert_eq!(config.options.compression.level(), Some(DEFAULT_GZIP_LEVEL));
    }

    #[test]
    fn bigwig_format_and_level() {
        let config = parse(&["--format", "bigwig", "--compression-level", "1"]);
        assert_eq!(config.options.format, CoverageOutputFormat::BigWig);
        assert_eq!(config.options.suffix, ".bw");
        assert_eq!(config.options.compression.level(), Some(1));

        let config = parse(&["-f", "bigwig", "--suffix", ".bigWig"]);
        assert_eq!(config.options.suffix, ".bigWig");

        let config = parse(&["--compression-level", "12", "-t", "1"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn raw_counts_and_smoothing() {
        let config = parse(&[
            "-n", "none", "-r", "50", "--smooth-length", "150", "--counting-strategy",
            "insertion",
        ]);

        assert_eq!(config.options.normalization, None);
        assert_eq!(config.options.resolution, 50);
        assert_eq!(config.options.smooth_length, Some(150));
        assert_eq!(config.options.counting_strategy, CountingStrategy::Insertion);
    }

    #[test]
    fn normalization_names() {
        assert_eq!(
            "cpm".parse::<NormalizationArg>().unwrap(),
            NormalizationArg(Some(Normalization::CPM))
        );
        assert!("tpm".parse::<NormalizationArg>().is_err());
    }

    #[test]
    fn zero_resolution_rejected() {
        let config = parse(&["-r", "0", "-t", "1"]);
        assert!(config.validate().is_err());
    }
}
