//! Compute engines shared by the pipeline stages.
//!
//! - [`par_granges`]: parallel executor over genomic ranges
//! - [`linalg`]: TF-IDF, log normalisation and PCA
//! - [`knn`]: exact nearest neighbours

pub mod knn;
pub mod linalg;
pub mod par_granges;

pub use knn::{knn, Neighbors};
pub use linalg::{l2_normalize_rows, log_normalize, pca, tfidf};
pub use par_granges::{ParGranges, RegionProcessor};
