//! Fragment-file processing: import with QC, cell calling and filtering.
//!
//! - [`import`]: group fragments by barcode and compute QC
//! - [`qc`]: quality metrics and TSS enrichment
//! - [`call_cells`]: knee / expected-cells calling and QC filters
//! - [`store`]: in-memory per-cell fragment collections

pub mod call_cells;
pub mod import;
pub mod qc;
pub mod store;

pub use call_cells::{call_cells, filter_cells, CallCellsOptions, CellFilter};
pub use import::{get_barcode_count, import_fragments, ImportOptions, ImportedFragments};
pub use qc::{read_qc, write_qc, QualityControl, TssIndex};
pub use store::{merge_by_position, CellFragments, FragmentStore};
