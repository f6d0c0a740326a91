pub mod call_cells;
pub mod common;
pub mod export_coverage;
pub mod export_fragments;
pub mod import;
pub mod integrate;
pub mod list;
pub mod matrix;
pub mod scrublet;

pub use call_cells::{run_call_cells, CallCellsArgs};
pub use export_coverage::{run_export_coverage, ExportCoverageArgs};
pub use export_fragments::{run_export_fragments, ExportFragmentsArgs};
pub use import::{run_import, ImportArgs};
pub use integrate::{run_integrate, IntegrateArgs};
pub use list::{run_list, ListArgs};
pub use matrix::{run_matrix, MatrixArgs};
pub use scrublet::{run_scrublet, ScrubletArgs};

/// Mitochondrial contig names recognised by default.
pub const MITO_CONTIGS: &[&str] = &["chrM", "M", "MT", "chrMT"];
