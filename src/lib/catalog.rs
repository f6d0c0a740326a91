//! Static index of the public operations, grouped by category.
//!
//! Each entry names a library function and the `fragtk` subcommand that runs
//! it. `fragtk list` prints this table.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Dotted name, `<namespace>.<function>`.
    pub name: &'static str,
    /// Library path of the implementing function.
    pub path: &'static str,
    /// Subcommand exposing the operation.
    pub command: &'static str,
    pub summary: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub title: &'static str,
    pub operations: &'static [Operation],
}

pub static CATALOG: &[Category] = &[
    Category {
        title: "Fragment file",
        operations: &[
            Operation {
                name: "pp.import_fragments",
                path: "pipeline::preprocess::import_fragments",
                command: "import",
                summary: "Import a fragment file, compute per-cell QC and keep passing cells",
            },
            Operation {
                name: "pp.get_barcode_count",
                path: "pipeline::preprocess::get_barcode_count",
                command: "call-cells",
                summary: "Count fragments per barcode",
            },
            Operation {
                name: "pp.call_cells",
                path: "pipeline::preprocess::call_cells",
                command: "call-cells",
                summary: "Select cell barcodes from the barcode rank curve",
            },
            Operation {
                name: "pp.filter_cells",
                path: "pipeline::preprocess::filter_cells",
                command: "call-cells",
                summary: "Keep cells whose QC metrics fall within the given bounds",
            },
        ],
    },
    Category {
        title: "Matrix operation",
        operations: &[
            Operation {
                name: "pp.add_tile_matrix",
                path: "pipeline::matrix::add_tile_matrix",
                command: "matrix",
                summary: "Count insertions in genome-wide bins",
            },
            Operation {
                name: "pp.make_peak_matrix",
                path: "pipeline::matrix::make_peak_matrix",
                command: "matrix",
                summary: "Count insertions in a set of peaks",
            },
            Operation {
                name: "pp.make_gene_matrix",
                path: "pipeline::matrix::make_gene_matrix",
                command: "matrix",
                summary: "Gene activity from promoter-extended gene bodies",
            },
            Operation {
                name: "pp.select_features",
                path: "pipeline::matrix::select_features",
                command: "matrix",
                summary: "Pick the most accessible features",
            },
        ],
    },
    Category {
        title: "Doublet removal",
        operations: &[
            Operation {
                name: "pp.scrublet",
                path: "pipeline::doublet::scrublet",
                command: "scrublet",
                summary: "Score cells for being doublets with simulated doublets",
            },
            Operation {
                name: "pp.filter_doublets",
                path: "pipeline::doublet::filter_doublets",
                command: "scrublet",
                summary: "Remove cells called as doublets",
            },
        ],
    },
    Category {
        title: "Data integration",
        operations: &[
            Operation {
                name: "pp.harmony",
                path: "pipeline::integration::harmony",
                command: "integrate",
                summary: "Harmony batch correction of an embedding",
            },
            Operation {
                name: "pp.mnc_correct",
                path: "pipeline::integration::mnc_correct",
                command: "integrate",
                summary: "Batch correction by mutual nearest centroids",
            },
        ],
    },
    Category {
        title: "Export",
        operations: &[
            Operation {
                name: "ex.export_fragments",
                path: "pipeline::export::export_fragments",
                command: "export-fragments",
                summary: "Write fragments of each cell group to its own file",
            },
            Operation {
                name: "ex.export_coverage",
                path: "pipeline::export::export_coverage",
                command: "export-coverage",
                summary: "Write a bedGraph coverage track for each cell group",
            },
        ],
    },
];

/// Look an operation up by its dotted name or bare function name.
pub fn resolve(name: &str) -> Option<&'static Operation> {
    CATALOG
        .iter()
        .flat_map(|c| c.operations.iter())
        .find(|op| op.name == name || op.name.split('.').nth(1) == Some(name))
}

/// Every distinct subcommand named in the catalog.
pub fn commands() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for op in CATALOG.iter().flat_map(|c| c.operations.iter()) {
        if !out.contains(&op.command) {
            out.push(op.command);
        }
    }
    out
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.len()))?;
        for op in self.operations {
            writeln!(f, "  {:<24} {:<18} {}", op.name, op.command, op.summary)?;
        }
        Ok(())
    }
}
