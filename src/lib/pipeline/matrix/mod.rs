//! Matrix operations: cell-by-feature count matrices and their output.
//!
//! - [`count_matrix`]: the [`CountMatrix`] type and counting strategies
//! - [`tile`]: genome-wide bin matrices
//! - [`peak`]: peak and gene activity matrices
//! - [`features`]: accessibility-based feature selection
//! - [`anndata_output`]: H5AD writer

pub mod anndata_output;
pub mod count_matrix;
pub mod features;
pub mod peak;
pub mod tile;

pub use anndata_output::write_h5ad;
pub use count_matrix::{CountMatrix, CountingStrategy};
pub use features::{select_features, FeatureSelection};
pub use peak::{make_gene_matrix, make_peak_matrix};
pub use tile::{add_tile_matrix, GenomeBins, TileOptions};
