//! fragtk: single-cell chromatin accessibility toolkit
//!
//! fragtk is a parallel toolkit for single-cell ATAC-seq fragment files.
//! The library provides functionality for:
//! 1. Importing fragment files with per-cell quality control and cell calling
//! 2. Building tile, peak and gene count matrices and writing them as AnnData
//! 3. Doublet scoring and batch integration of embeddings
//! 4. Exporting grouped fragment files and binned coverage tracks
//!
//! # Modules
//!
//! The main modules are:
//! - [`core`]: errors, IO, concurrency and sparse matrix helpers
//! - [`genome`]: chromosome sizes, genomic ranges, interval indexes and gene annotation
//! - [`fragment`]: fragment records, streaming reader and barcode whitelists
//! - [`engine`]: parallel genomic range executor, linear algebra and kNN
//! - [`pipeline`]: preprocessing, matrices, doublets, integration and export
//! - [`catalog`]: index of the public operations
//! - [`utils`]: re-exports of commonly used helpers

pub mod catalog;
pub mod core;
pub mod engine;
pub mod fragment;
pub mod genome;
pub mod pipeline;
pub mod utils;

pub use crate::core::error::{FragError, Result};

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::fragment::{BarcodeWhitelist, Fragment, FragmentReader};
    pub use crate::genome::{ChromSizes, GenomicRange, RegionIndex};
    pub use crate::pipeline::prelude::*;
}
