//! Cell calling from barcode fragment counts and QC-based cell filtering.

use crate::core::error::{FragError, Result};
use crate::pipeline::preprocess::qc::QualityControl;
use log::info;

/// Settings for [`call_cells`].
#[derive(Debug, Clone, Copy)]
pub struct CallCellsOptions {
    /// Expected number of cells; switches to the order-of-magnitude rule.
    pub expected_cells: Option<usize>,
    /// Hard lower bound on the fragment count of a called cell.
    pub min_counts: u64,
}

impl Default for CallCellsOptions {
    fn default() -> Self {
        CallCellsOptions {
            expected_cells: None,
            min_counts: 1_000,
        }
    }
}

/// Knee of the log-log barcode rank curve: the point farthest from the line
/// joining the first and last points. `counts` must be sorted descending.
pub fn knee_point(counts: &[u64]) -> Option<usize> {
    let points: Vec<(f64, f64)> = counts
        .iter()
        .take_while(|&&c| c > 0)
        .enumerate()
        .map(|(i, &c)| (((i + 1) as f64).log10(), (c as f64).log10()))
        .collect();
    if points.len() < 3 {
        return None;
    }
    let (x0, y0) = points[0];
    let (x1, y1) = points[points.len() - 1];
    let (dx, dy) = (x1 - x0, y1 - y0);
    let norm = (dx * dx + dy * dy).sqrt();
    if norm == 0.0 {
        return None;
    }
    points
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| (i, ((dy * x - dx * y + x1 * y0 - y1 * x0) / norm).abs()))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Count threshold separating cells from background barcodes.
pub fn cell_threshold(counts: &[u64], options: &CallCellsOptions) -> u64 {
    let rule = match options.expected_cells {
        Some(n) if n > 0 && !counts.is_empty() => {
            let idx = (n - 1).min(counts.len() - 1);
            (counts[idx] as f64 * 0.1).round() as u64
        }
        _ => knee_point(counts).map_or(0, |i| counts[i]),
    };
    rule.max(options.min_counts)
}

/// Select cell barcodes from `(barcode, count)` pairs. The result is sorted by
/// descending count.
pub fn call_cells(counts: &[(String, u64)], options: &CallCellsOptions) -> Vec<String> {
    let mut ranked: Vec<&(String, u64)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let values: Vec<u64> = ranked.iter().map(|(_, c)| *c).collect();
    let threshold = cell_threshold(&values, options);
    let cells: Vec<String> = ranked
        .into_iter()
        .take_while(|(_, c)| *c >= threshold)
        .map(|(b, _)| b.clone())
        .collect();
    info!(
        "Called {} cells with fragment count >= {}",
        cells.len(),
        threshold
    );
    cells
}

/// QC bounds for [`filter_cells`]. `None` disables a bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellFilter {
    pub min_counts: Option<u64>,
    pub max_counts: Option<u64>,
    pub min_tsse: Option<f64>,
    pub max_tsse: Option<f64>,
}

impl CellFilter {
    pub fn passes(&self, qc: &QualityControl) -> bool {
        self.min_counts.map_or(true, |m| qc.n_fragment >= m)
            && self.max_counts.map_or(true, |m| qc.n_fragment <= m)
            && self.min_tsse.map_or(true, |m| qc.tsse >= m)
            && self.max_tsse.map_or(true, |m| qc.tsse <= m)
    }
}

/// Barcodes whose QC passes every bound, in input order.
pub fn filter_cells(qc: &[(String, QualityControl)], filter: &CellFilter) -> Result<Vec<String>> {
    if let (Some(lo), Some(hi)) = (filter.min_counts, filter.max_counts) {
        if lo > hi {
            return Err(FragError::InvalidInput(format!(
                "min_counts ({}) exceeds max_counts ({})",
                lo, hi
            )));
        }
    }
    let kept: Vec<String> = qc
        .iter()
        .filter(|(_, q)| filter.passes(q))
        .map(|(b, _)| b.clone())
        .collect();
    info!("{} of {} cells passed QC filters", kept.len(), qc.len());
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> Vec<(String, u64)> {
        let mut counts = Vec::new();
        for i in 0..50 {
            counts.push((format!("cell{:02}", i), 10_000 - i * 20));
        }
        for i in 0..500 {
            counts.push((format!("bg{:03}", i), 30 - (i as u64 % 25)));
        }
        counts
    }

    #[test]
    fn knee_separates_cells() {
        let cells = call_cells(
            &curve(),
            &CallCellsOptions {
                expected_cells: None,
                min_counts: 0,
            },
        );
        assert_eq!(cells.len(), 50);
        assert!(cells.iter().all(|b| b.starts_with("cell")));
    }

    #[test]
    fn expected_cells_rule() {
        let values: Vec<u64> = (0..100).map(|i| 1_000 - i).collect();
        let opts = CallCellsOptions {
            expected_cells: Some(10),
            min_counts: 0,
        };
        assert_eq!(cell_threshold(&values, &opts), 99);
    }

    #[test]
    fn min_counts_floor() {
        let opts = CallCellsOptions {
            expected_cells: None,
            min_counts: 20_000,
        };
        assert!(call_cells(&curve(), &opts).is_empty());
        assert_eq!(knee_point(&[5, 4]), None);
    }

    #[test]
    fn qc_filter_bounds() {
        let qc = vec![
            ("a".to_string(), QualityControl { n_fragment: 500, tsse: 8.0, ..Default::default() }),
            ("b".to_string(), QualityControl { n_fragment: 50, tsse: 9.0, ..Default::default() }),
            ("c".to_string(), QualityControl { n_fragment: 900, tsse: 2.0, ..Default::default() }),
        ];
        let filter = CellFilter {
            min_counts: Some(100),
            min_tsse: Some(5.0),
            ..Default::default()
        };
        assert_eq!(filter_cells(&qc, &filter).unwrap(), vec!["a".to_string()]);

        let bad = CellFilter {
            min_counts: Some(10),
            max_counts: Some(5),
            ..Default::default()
        };
        assert!(filter_cells(&qc, &bad).is_err());
    }
}
