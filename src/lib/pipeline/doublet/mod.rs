//! Doublet detection.

pub mod scrublet;

pub use scrublet::{filter_doublets, otsu_threshold, scrublet, DoubletScores, ScrubletOptions};
