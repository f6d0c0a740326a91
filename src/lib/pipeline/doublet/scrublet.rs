//! Scrublet-style doublet scoring on count matrices.

use crate::core::error::{FragError, Result};
use crate::core::sparse::{SparseMatrixExt, SparseOps};
use crate::engine::knn::knn_rows;
use crate::engine::linalg::{pca, tfidf, to_rows};
use crate::pipeline::matrix::CountMatrix;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Histogram resolution for the automatic threshold.
const OTSU_BINS: usize = 256;

#[derive(Debug, Clone)]
pub struct ScrubletOptions {
    pub n_comps: usize,
    pub sim_doublet_ratio: f64,
    pub expected_doublet_rate: f64,
    /// `None` picks `round(0.5 * sqrt(n_obs))`.
    pub n_neighbors: Option<usize>,
    /// Fixed score threshold; `None` uses Otsu's method on simulated scores.
    pub threshold: Option<f64>,
    pub random_state: u64,
}

impl Default for ScrubletOptions {
    fn default() -> Self {
        Self {
            n_comps: 15,
            sim_doublet_ratio: 2.0,
            expected_doublet_rate: 0.1,
            n_neighbors: None,
            threshold: None,
            random_state: 0,
        }
    }
}

/// Per-cell doublet scores together with the scores of the simulated doublets.
#[derive(Debug, Clone, Serialize)]
pub struct DoubletScores {
    pub obs_names: Vec<String>,
    pub obs_scores: Vec<f64>,
    pub sim_scores: Vec<f64>,
    pub threshold: f64,
    pub is_doublet: Vec<bool>,
}

impl DoubletScores {
    pub fn doublet_rate(&self) -> f64 {
        if self.is_doublet.is_empty() {
            return 0.0;
        }
        self.is_doublet.iter().filter(|&&d| d).count() as f64 / self.is_doublet.len() as f64
    }
}

/// Pick `n_sim` pairs of distinct cells.
fn sample_parents(n_obs: usize, n_sim: usize, rng: &mut ChaCha8Rng) -> Vec<(usize, usize)> {
    (0..n_sim)
        .map(|_| {
            let a = rng.gen_range(0..n_obs);
            let mut b = rng.gen_range(0..n_obs - 1);
            if b >= a {
                b += 1;
            }
            (a, b)
        })
        .collect()
}

/// Likelihood of being a doublet given the simulated fraction among neighbours.
fn doublet_likelihood(n_sim_neighbors: usize, k_adj: usize, rho: f64, r: f64) -> f64 {
    let q = (n_sim_neighbors as f64 + 1.0) / (k_adj as f64 + 2.0);
    q * rho / r / (1.0 - rho - q * (1.0 - rho - rho / r))
}

/// Otsu's threshold over a histogram of `values`. Returns the centre of the
/// bin that maximises between-class variance.
pub fn otsu_threshold(values: &[f64]) -> Result<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(FragError::EmptyData("no finite scores to threshold".to_string()));
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return Ok(min);
    }

    let width = (max - min) / OTSU_BINS as f64;
    let mut hist = [0f64; OTSU_BINS];
    for v in &finite {
        let bin = (((v - min) / width) as usize).min(OTSU_BINS - 1);
        hist[bin] += 1.0;
    }
    let centres: Vec<f64> = (0..OTSU_BINS).map(|i| min + width * (i as f64 + 0.5)).collect();

    let total: f64 = hist.iter().sum();
    let total_mass: f64 = hist.iter().zip(&centres).map(|(h, c)| h * c).sum();
    let (mut w0, mut mass0) = (0.0, 0.0);
    let (mut best, mut best_var) = (0, f64::NEG_INFINITY);
    for i in 0..OTSU_BINS - 1 {
        w0 += hist[i];
        mass0 += hist[i] * centres[i];
        let w1 = total - w0;
        if w0 == 0.0 || w1 == 0.0 {
            continue;
        }
        let mu0 = mass0 / w0;
        let mu1 = (total_mass - mass0) / w1;
        let between = w0 * w1 * (mu0 - mu1).powi(2);
        if between > best_var {
            best_var = between;
            best = i;
        }
    }
    Ok(centres[best])
}

/// Score every cell of `matrix` for being a doublet.
///
/// `features` restricts the computation to a subset of columns, usually the
/// output of [`select_features`](crate::pipeline::matrix::select_features).
pub fn scrublet(
    matrix: &CountMatrix,
    features: Option<&[usize]>,
    options: &ScrubletOptions,
) -> Result<DoubletScores> {
    let n_obs = matrix.n_obs();
    if n_obs < 2 {
        return Err(FragError::EmptyData(format!(
            "doublet detection needs at least 2 cells, got {}",
            n_obs
        )));
    }
    let rho = options.expected_doublet_rate;
    if !(rho > 0.0 && rho < 1.0) {
        return Err(FragError::ThresholdValidation {
            field: "expected_doublet_rate".to_string(),
            min: 0.0,
            max: 1.0,
            value: rho,
        });
    }
    if options.sim_doublet_ratio <= 0.0 {
        return Err(FragError::InvalidInput(
            "sim_doublet_ratio must be positive".to_string(),
        ));
    }

    let counts = match features {
        Some(idx) => SparseOps::filter_columns_u32(&matrix.data, idx)?,
        None => matrix.data.clone(),
    };

    let n_sim = ((n_obs as f64 * options.sim_doublet_ratio).round() as usize).max(1);
    info!("Simulating {} doublets from {} cells", n_sim, n_obs);
    let mut rng = ChaCha8Rng::seed_from_u64(options.random_state);
    let parents = sample_parents(n_obs, n_sim, &mut rng);

    let mut rows: Vec<Vec<(usize, u32)>> = counts
        .row_iter()
        .map(|r| r.col_indices().iter().copied().zip(r.values().iter().copied()).collect())
        .collect();
    rows.extend(parents.iter().map(|&(a, b)| counts.sum_rows(a, b)));
    let merged = SparseOps::from_rows(counts.ncols(), rows)?;

    let normalized = tfidf(&merged)?;
    let embedding = pca(&normalized, options.n_comps, options.random_state)?;
    debug!("Embedding shape: {:?}", embedding.shape());

    let r = n_sim as f64 / n_obs as f64;
    let k = options
        .n_neighbors
        .unwrap_or_else(|| (0.5 * (n_obs as f64).sqrt()).round() as usize)
        .max(1);
    let n_total = n_obs + n_sim;
    let k_adj = ((k as f64 * (1.0 + r)).round() as usize).clamp(1, n_total - 1);
    info!("Scoring doublets with k_adj = {}", k_adj);

    let points = to_rows(&embedding);
    let neighbors = knn_rows(&points, &points, k_adj, true);
    let scores: Vec<f64> = neighbors
        .iter()
        .map(|nn| {
            let n_sim_nb = nn.iter().filter(|(i, _)| *i >= n_obs).count();
            doublet_likelihood(n_sim_nb, k_adj, rho, r)
        })
        .collect();
    let (obs_scores, sim_scores) = {
        let mut s = scores;
        let sim = s.split_off(n_obs);
        (s, sim)
    };

    let threshold = match options.threshold {
        Some(t) => t,
        None => otsu_threshold(&sim_scores)?,
    };
    let is_doublet = obs_scores.iter().map(|&s| s > threshold).collect();

    Ok(DoubletScores {
        obs_names: matrix.obs_names.clone(),
        obs_scores,
        sim_scores,
        threshold,
        is_doublet,
    })
}

/// Barcodes whose score does not exceed `threshold` (or the stored threshold).
pub fn filter_doublets(scores: &DoubletScores, threshold: Option<f64>) -> Vec<String> {
    let threshold = threshold.unwrap_or(scores.threshold);
    let singlets: Vec<String> = scores
        .obs_names
        .iter()
        .zip(&scores.obs_scores)
        .filter(|(_, &s)| s <= threshold)
        .map(|(b, _)| b.clone())
        .collect();
    let n = scores.obs_names.len().max(1);
    info!(
        "Detected doublet rate = {:.3}% ({} of {} cells removed)",
        100.0 * (scores.obs_names.len() - singlets.len()) as f64 / n as f64,
        scores.obs_names.len() - singlets.len(),
        scores.obs_names.len()
    );
    singlets
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two cell types with disjoint feature sets; cells of the last few rows
    /// carry both profiles.
    fn mixture(n_a: usize, n_b: usize, n_mixed: usize) -> CountMatrix {
        let mut triplets = Vec::new();
        let n = n_a + n_b + n_mixed;
        for i in 0..n {
            let a = i < n_a || i >= n_a + n_b;
            let b = i >= n_a;
            for f in 0..10 {
                if a {
                    triplets.push((i, f, 3 + ((i + f) % 3) as u32));
                }
                if b {
                    triplets.push((i, 10 + f, 3 + ((i * f) % 3) as u32));
                }
            }
        }
        let data = SparseOps::from_triplets_u32(n, 20, triplets).unwrap();
        let obs = (0..n).map(|i| format!("cell{}", i)).collect();
        let var = (0..20).map(|f| format!("chr1:{}-{}", f * 500, (f + 1) * 500)).collect();
        CountMatrix::new(obs, var, data).unwrap()
    }

    #[test]
    fn parents_are_distinct_and_reproducible() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let a = sample_parents(5, 100, &mut rng);
        assert!(a.iter().all(|(x, y)| x != y && *x < 5 && *y < 5));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(a, sample_parents(5, 100, &mut rng));
    }

    #[test]
    fn likelihood_increases_with_simulated_neighbors() {
        let low = doublet_likelihood(0, 10, 0.1, 2.0);
        let high = doublet_likelihood(10, 10, 0.1, 2.0);
        assert!(low < high);
        assert!(low > 0.0);
    }

    #[test]
    fn otsu_splits_two_modes() {
        let mut v = vec![0.1; 50];
        v.extend(vec![0.9; 50]);
        let t = otsu_threshold(&v).unwrap();
        assert!(t > 0.1 && t < 0.9);
        assert_eq!(otsu_threshold(&[0.5, 0.5]).unwrap(), 0.5);
        assert!(otsu_threshold(&[]).is_err());
    }

    #[test]
    fn mixed_cells_score_higher() {
        let m = mixture(30, 30, 4);
        let opts = ScrubletOptions {
            n_comps: 5,
            ..Default::default()
        };
        let scores = scrublet(&m, None, &opts).unwrap();
        assert_eq!(scores.obs_scores.len(), 64);
        assert_eq!(scores.sim_scores.len(), 128);
        let pure: f64 = scores.obs_scores[..60].iter().sum::<f64>() / 60.0;
        let mixed: f64 = scores.obs_scores[60..].iter().sum::<f64>() / 4.0;
        assert!(mixed > pure);

        let again = scrublet(&m, None, &opts).unwrap();
        assert_eq!(scores.obs_scores, again.obs_scores);
    }

    #[test]
    fn filter_uses_threshold() {
        let scores = DoubletScores {
            obs_names: vec!["a".into(), "b".into(), "c".into()],
            obs_scores: vec![0.1, 0.8, 0.3],
            sim_scores: vec![],
            threshold: 0.5,
            is_doublet: vec![false, true, false],
        };
        assert_eq!(filter_doublets(&scores, None), vec!["a", "c"]);
        assert_eq!(filter_doublets(&scores, Some(0.2)), vec!["a"]);
        assert!((scores.doublet_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_cells() {
        let data = SparseOps::from_triplets_u32(1, 2, vec![(0, 0, 1)]).unwrap();
        let m = CountMatrix::new(vec!["a".into()], vec!["x".into(), "y".into()], data).unwrap();
        assert!(matches!(
            scrublet(&m, None, &ScrubletOptions::default()),
            Err(FragError::EmptyData(_))
        ));
    }
}
