//! Export of grouped fragments and coverage tracks.

pub mod coverage;
pub mod fragments;

pub use coverage::{
    create_bedgraph, export_coverage, write_bigwig, BedGraph, CoverageOptions, CoverageOutputFormat,
    Normalization,
};
pub use fragments::{export_fragments, ExportFragmentsOptions};
