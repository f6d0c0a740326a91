//! Feature selection by accessibility.

use crate::core::error::{FragError, Result};
use crate::core::sparse::SparseOps;
use crate::genome::{GenomicRange, RegionIndex};
use crate::pipeline::matrix::CountMatrix;
use log::{debug, info};

/// Settings for [`select_features`].
#[derive(Debug, Clone)]
pub struct FeatureSelection {
    pub n_features: usize,
    pub filter_lower_quantile: f64,
    pub filter_upper_quantile: f64,
}

impl Default for FeatureSelection {
    fn default() -> Self {
        FeatureSelection {
            n_features: 500_000,
            filter_lower_quantile: 0.005,
            filter_upper_quantile: 0.005,
        }
    }
}

/// Pick the most accessible features. Features with zero counts, features
/// overlapping the blacklist, and the given quantile tails of the non-zero
/// count distribution are removed first. Indices are returned in column order.
pub fn select_features(
    matrix: &CountMatrix,
    options: &FeatureSelection,
    blacklist: Option<&RegionIndex<()>>,
) -> Result<Vec<usize>> {
    for (name, q) in [
        ("filter_lower_quantile", options.filter_lower_quantile),
        ("filter_upper_quantile", options.filter_upper_quantile),
    ] {
        if !(0.0..0.5).contains(&q) {
            return Err(FragError::ThresholdValidation {
                field: name.to_string(),
                min: 0.0,
                max: 0.5,
                value: q,
            });
        }
    }

    let totals = SparseOps::compute_col_sums(&matrix.data);
    let mut candidates: Vec<usize> = (0..matrix.n_vars())
        .filter(|&i| totals[i] > 0)
        .filter(|&i| match blacklist {
            Some(bl) => match matrix.var_names[i].parse::<GenomicRange>() {
                Ok(r) => !bl.is_overlapped(&r.chrom, r.start, r.end),
                Err(_) => true,
            },
            None => true,
        })
        .collect();
    debug!("{} non-zero features after blacklist", candidates.len());

    // Trim the quantile tails by rank of total count.
    candidates.sort_by(|&a, &b| totals[a].cmp(&totals[b]).then(a.cmp(&b)));
    let n = candidates.len();
    let lo = (n as f64 * options.filter_lower_quantile).floor() as usize;
    let hi = n - (n as f64 * options.filter_upper_quantile).floor() as usize;
    let trimmed = &candidates[lo..hi.max(lo)];

    let mut selected: Vec<usize> = trimmed
        .iter()
        .rev()
        .take(options.n_features)
        .copied()
        .collect();
    selected.sort_unstable();
    info!("Selected {} features", selected.len());
    Ok(selected)
}
