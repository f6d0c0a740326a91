//! Parallel genomic range processing utilities.
//!
//! The [`ParGranges`] executor fans out genomic regions across a Rayon pool and
//! streams each region's results through a bounded crossbeam channel. Callers
//! implement [`RegionProcessor`] to define per-region work while sharing
//! chunking, region restriction and progress reporting.

mod intervals;
mod scheduler;
mod types;

pub use scheduler::ParGranges;
pub use types::{RegionProcessor, CHANNEL_SIZE_MODIFIER, CHUNKSIZE, CHUNKSIZE_STR};
