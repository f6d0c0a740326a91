mod args;

use anyhow::{Context, Result};
use fragtk_lib::fragment::FragmentReader;
use fragtk_lib::pipeline::preprocess::{call_cells, filter_cells, get_barcode_count, read_qc};
use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::commands::common;

pub use args::{CallCellsArgs, CallCellsConfig};

/// Execute the `call-cells` command end-to-end.
pub fn run_call_cells(args: CallCellsArgs) -> Result<()> {
    let config: CallCellsConfig = args.into();
    config.validate()?;

    info!("Counting fragments per barcode in {:?}", config.fragments);
    let counts = get_barcode_count(FragmentReader::from_path(&config.fragments)?)?;
    info!("Found {} barcodes", counts.len());

    if let Some(path) = &config.counts {
        common::write_lines(path, counts.iter().map(|(b, n)| format!("{}\t{}", b, n)))?;
        info!("Barcode counts -> {:?}", path);
    }

    let mut cells = call_cells(&counts, &config.calling);

    if let Some(qc_path) = &config.qc {
        let qc = read_qc(qc_path)
            .with_context(|| format!("Failed to read QC table {}", qc_path.display()))?;
        let passing = filter_cells(&qc, &config.filter)?;
        let passing: FxHashSet<&str> = passing.iter().map(|s| s.as_str()).collect();
        let before = cells.len();
        cells.retain(|b| passing.contains(b.as_str()));
        info!(
            "{} of {} called cells pass the QC filters",
            cells.len(),
            before
        );
    } else if config.has_qc_filter() {
        warn!("QC bounds given without --qc; they are ignored");
    }

    if cells.is_empty() {
        warn!("No barcode passed cell calling");
    }
    let n = common::write_lines(&config.output, &cells)?;
    info!("Called {} cells -> {:?}", n, config.output);
    Ok(())
}
