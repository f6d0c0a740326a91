use fragtk_lib::pipeline::validation::{validate_input_files, ValidationConfig};
use std::path::PathBuf;
use structopt::StructOpt;

use crate::commands::MITO_CONTIGS;

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "import")]
pub struct ImportArgs {
    /// Raw fragment file (plain, gzip, or `-` for stdin).
    pub fragments: PathBuf,

    /// Two-column `chrom<TAB>length` file. Fragments elsewhere are dropped.
    #[structopt(long, short = "g")]
    pub chrom_sizes: PathBuf,

    /// Output fragment file of retained cells (`.gz` will be appended when missing).
    #[structopt(long, short = "o")]
    pub output: PathBuf,

    /// Write per-cell QC metrics to this TSV.
    #[structopt(long)]
    pub qc: Option<PathBuf>,

    /// Only import barcodes listed in this file.
    #[structopt(long, short = "w")]
    pub whitelist: Option<PathBuf>,

    /// Minimum unique nuclear fragments for a barcode to be kept.
    #[structopt(long, default_value = "200")]
    pub min_fragments: u64,

    /// Offset added to every fragment start, e.g. `--shift-left=4`.
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    pub shift_left: i64,

    /// Offset added to every fragment end, e.g. `--shift-right=-5`.
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    pub shift_right: i64,

    /// Mitochondrial chromosome names, comma separated.
    #[structopt(long, use_delimiter = true)]
    pub mito: Vec<String>,

    /// Gene annotation (GTF) used for TSS enrichment scores.
    #[structopt(long)]
    pub gtf: Option<PathBuf>,

    /// Records between progress messages.
    #[structopt(long, default_value = "5000000")]
    pub chunk_size: usize,

    /// Number of worker threads to use.
    #[structopt(long, short = "t", default_value = "4")]
    pub threads: usize,
}

/// Normalised configuration derived from [`ImportArgs`].
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub fragments: PathBuf,
    pub chrom_sizes: PathBuf,
    pub output: PathBuf,
    pub qc: Option<PathBuf>,
    pub whitelist: Option<PathBuf>,
    pub min_fragments: u64,
    pub shift_left: i64,
    pub shift_right: i64,
    pub mito_chroms: Vec<String>,
    pub gtf: Option<PathBuf>,
    pub chunk_size: usize,
    pub threads: usize,
}

impl From<ImportArgs> for ImportConfig {
    fn from(args: ImportArgs) -> ImportConfig {
        let mito_chroms = if args.mito.is_empty() {
            MITO_CONTIGS.iter().map(|s| s.to_string()).collect()
        } else {
            args.mito
        };
        ImportConfig {
            fragments: args.fragments,
            chrom_sizes: args.chrom_sizes,
            output: args.output,
            qc: args.qc,
            whitelist: args.whitelist,
            min_fragments: args.min_fragments,
            shift_left: args.shift_left,
            shift_right: args.shift_right,
            mito_chroms,
            gtf: args.gtf,
            chunk_size: args.chunk_size,
            threads: args.threads,
        }
    }
}

impl ImportConfig {
    pub fn validate(&self) -> fragtk_lib::Result<()> {
        ValidationConfig {
            chunk_size: self.chunk_size,
            num_threads: self.threads,
            ..Default::default()
        }
        .validate()?;

        let mut inputs = vec![&self.fragments, &self.chrom_sizes];
        inputs.extend(self.whitelist.iter());
        inputs.extend(self.gtf.iter());
        validate_input_files(&inputs)
    }
}
