//! Reference genome descriptions: chromosome sizes, genomic ranges, interval
//! indexes for fast overlap queries, and gene annotations.

pub mod annotation;
pub mod chrom_sizes;
pub mod intervals;
pub mod region;

pub use annotation::{read_genes_from_gtf, Gene};
pub use chrom_sizes::ChromSizes;
pub use intervals::RegionIndex;
pub use region::{GenomicRange, Strand};
