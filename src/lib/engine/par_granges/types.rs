use lazy_static::lazy_static;
use serde::Serialize;

/// Number of bytes in a gigabyte.
pub const BYTES_IN_A_GIGABYTE: usize = 1024 * 1024 * 1024;

/// A modifier applied to the channel size formula: `(BYTES_IN_A_GIGABYTE * modifier) * threads / size_of(R::P)`.
pub const CHANNEL_SIZE_MODIFIER: f64 = 0.15;

/// Ideal number of basepairs each worker receives. Total bp in memory at one time ≈ `threads * chunksize`.
pub const CHUNKSIZE: u64 = 1_000_000;

lazy_static! {
    /// [`CHUNKSIZE`] as a string.
    pub static ref CHUNKSIZE_STR: String = CHUNKSIZE.to_string();
}

/// Trait defining how genomic regions are processed.
pub trait RegionProcessor {
    /// The type returned when processing a region.
    type P: 'static + Send + Sync + Serialize;

    /// Process the region `start..stop` (0-based, half-open) of the chromosome
    /// with index `tid` in the executor's [`ChromSizes`](crate::genome::ChromSizes).
    fn process_region(&self, tid: u32, start: u64, stop: u64) -> Vec<Self::P>;
}
