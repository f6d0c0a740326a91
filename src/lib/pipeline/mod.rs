//! Analysis stages built on the core, genome and engine modules.
//!
//! - [`preprocess`]: fragment import, QC, cell calling
//! - [`matrix`]: tile, peak and gene count matrices
//! - [`doublet`]: doublet scoring and removal
//! - [`integration`]: batch correction of embeddings
//! - [`export`]: grouped fragment files and coverage tracks
//! - [`validation`]: parameter and path checks

pub mod doublet;
pub mod export;
pub mod integration;
pub mod matrix;
pub mod preprocess;
pub mod validation;

pub mod prelude {
    pub use super::doublet::{filter_doublets, scrublet, DoubletScores, ScrubletOptions};
    pub use super::export::{
        export_coverage, export_fragments, CoverageOptions, ExportFragmentsOptions, Normalization,
    };
    pub use super::integration::{harmony, mnc_correct, HarmonyOptions, MncOptions};
    pub use super::matrix::{
        add_tile_matrix, make_gene_matrix, make_peak_matrix, select_features, write_h5ad,
        CountMatrix, CountingStrategy, FeatureSelection, TileOptions,
    };
    pub use super::preprocess::{
        call_cells, filter_cells, import_fragments, CallCellsOptions, CellFilter, FragmentStore,
        ImportOptions, QualityControl,
    };
}
