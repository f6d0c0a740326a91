//! fragtk - single-cell chromatin accessibility fragment toolkit
//!
//! fragtk turns raw Tn5 fragment files from single-cell ATAC-seq into
//! cell-by-feature count matrices, scores doublets, corrects batch effects in
//! embeddings, and exports per-group fragment files and coverage tracks.
//!
//! # Tools
//!
//! - `import`: group fragments by barcode, compute QC, keep passing cells
//! - `call-cells`: pick cell barcodes from the barcode rank curve
//! - `matrix`: tile, peak or gene count matrix as AnnData
//! - `scrublet`: doublet scores from simulated doublets
//! - `integrate`: Harmony or mutual-nearest-centroid batch correction
//! - `export-fragments`: one fragment file per cell group
//! - `export-coverage`: one bedGraph or BigWig track per cell group
//! - `list`: the catalog of operations
//!
//! # Usage
//!
//! ```bash
//! # Import and QC
//! fragtk import fragments.tsv.gz -g hg38.sizes --gtf genes.gtf.gz -o cells.tsv.gz --qc qc.tsv
//!
//! # 5 kb tile matrix over the top 50k tiles
//! fragtk matrix cells.tsv.gz -g hg38.sizes -b 5000 --n-features 50000 --qc qc.tsv -o tiles.h5ad
//!
//! # Coverage tracks per cluster
//! fragtk export-coverage cells.tsv.gz -g hg38.sizes --groups clusters.tsv -o tracks -r 50 -n CPM
//! ```

extern crate fragtk_lib;
pub mod commands;
use anyhow::Result;
use env_logger::Env;
use fragtk_lib::utils;
use log::*;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case", author, about)]
/// Single-cell ATAC-seq fragment processing with fragtk
struct Args {
    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
enum Subcommand {
    /// Import a fragment file with per-cell QC
    Import(commands::ImportArgs),
    /// Call cell barcodes and filter them on QC
    CallCells(commands::CallCellsArgs),
    /// Build a tile, peak or gene count matrix
    Matrix(commands::MatrixArgs),
    /// Score and remove doublets
    Scrublet(commands::ScrubletArgs),
    /// Batch-correct a cell embedding
    Integrate(commands::IntegrateArgs),
    /// Write fragments of each cell group to its own file
    ExportFragments(commands::ExportFragmentsArgs),
    /// Write a coverage track for each cell group
    ExportCoverage(commands::ExportCoverageArgs),
    /// List the available operations
    List(commands::ListArgs),
}

impl Subcommand {
    fn run(self) -> Result<()> {
        match self {
            Subcommand::Import(args) => commands::run_import(args)?,
            Subcommand::CallCells(args) => commands::run_call_cells(args)?,
            Subcommand::Matrix(args) => commands::run_matrix(args)?,
            Subcommand::Scrublet(args) => commands::run_scrublet(args)?,
            Subcommand::Integrate(args) => commands::run_integrate(args)?,
            Subcommand::ExportFragments(args) => commands::run_export_fragments(args)?,
            Subcommand::ExportCoverage(args) => commands::run_export_coverage(args)?,
            Subcommand::List(args) => commands::run_list(args)?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = Args::from_args().subcommand.run() {
        if utils::is_broken_pipe(&err) {
            std::process::exit(0);
        }
        error!("{}", err);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragtk_lib::catalog;

    #[test]
    fn every_catalog_command_is_a_subcommand() {
        for command in catalog::commands() {
            let err = Args::from_iter_safe(&["fragtk", command, "--help"])
                .err()
                .unwrap_or_else(|| panic!("{} parsed without required arguments", command));
            assert_eq!(
                err.kind,
                structopt::clap::ErrorKind::HelpDisplayed,
                "{} is not a subcommand",
                command
            );
        }
    }

    #[test]
    fn list_parses_without_arguments() {
        let args = Args::from_iter_safe(&["fragtk", "list"]).unwrap();
        assert!(matches!(args.subcommand, Subcommand::List(_)));
    }
}
