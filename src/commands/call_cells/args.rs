use fragtk_lib::pipeline::preprocess::{CallCellsOptions, CellFilter};
use fragtk_lib::pipeline::validation::{validate_input_files, validate_threshold};
use std::path::PathBuf;
use structopt::StructOpt;

/// CLI arguments for the `call-cells` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "call-cells")]
pub struct CallCellsArgs {
    /// Fragment file with barcodes in the fourth column.
    pub fragments: PathBuf,

    /// Output list of called cell barcodes, one per line.
    #[structopt(long, short = "o")]
    pub output: PathBuf,

    /// Expected number of cells. Without it the knee of the rank curve is used.
    #[structopt(long, short = "n")]
    pub expected_cells: Option<usize>,

    /// Minimum fragment records for a barcode to be called.
    #[structopt(long, default_value = "1000")]
    pub min_counts: u64,

    /// Also write the fragment count of every barcode to this TSV.
    #[structopt(long)]
    pub counts: Option<PathBuf>,

    /// QC table written by `fragtk import`; enables the QC filters below.
    #[structopt(long)]
    pub qc: Option<PathBuf>,

    /// Minimum unique fragments in the QC table.
    #[structopt(long)]
    pub min_fragments: Option<u64>,

    /// Maximum unique fragments in the QC table.
    #[structopt(long)]
    pub max_fragments: Option<u64>,

    /// Minimum TSS enrichment.
    #[structopt(long)]
    pub min_tsse: Option<f64>,

    /// Maximum TSS enrichment.
    #[structopt(long)]
    pub max_tsse: Option<f64>,
}

/// Normalised configuration derived from [`CallCellsArgs`].
#[derive(Debug, Clone)]
pub struct CallCellsConfig {
    pub fragments: PathBuf,
    pub output: PathBuf,
    pub counts: Option<PathBuf>,
    pub qc: Option<PathBuf>,
    pub calling: CallCellsOptions,
    pub filter: CellFilter,
}

impl From<CallCellsArgs> for CallCellsConfig {
    fn from(args: CallCellsArgs) -> CallCellsConfig {
        CallCellsConfig {
            fragments: args.fragments,
            output: args.output,
            counts: args.counts,
            qc: args.qc,
            calling: CallCellsOptions {
                expected_cells: args.expected_cells,
                min_counts: args.min_counts,
            },
            filter: CellFilter {
                min_counts: args.min_fragments,
                max_counts: args.max_fragments,
                min_tsse: args.min_tsse,
                max_tsse: args.max_tsse,
            },
        }
    }
}

impl CallCellsConfig {
    pub fn has_qc_filter(&self) -> bool {
        let f = &self.filter;
        f.min_counts.is_some() || f.max_counts.is_some() || f.min_tsse.is_some() || f.max_tsse.is_some()
    }

    pub fn validate(&self) -> fragtk_lib::Result<()> {
        for (name, value) in [("min_tsse", self.filter.min_tsse), ("max_tsse", self.filter.max_tsse)] {
            if let Some(v) = value {
                validate_threshold(name, v, 0.0, f64::MAX)?;
            }
        }
        if self.calling.expected_cells == Some(0) {
            return Err(fragtk_lib::FragError::InvalidInput(
                "expected_cells must be greater than 0".to_string(),
            ));
        }
        let mut inputs = vec![&self.fragments];
        inputs.extend(self.qc.iter());
        validate_input_files(&inputs)
    }
}
