//! Harmony: soft k-means with a batch-diversity penalty followed by a
//! per-cluster ridge regression that removes batch offsets.

use super::kmeans::kmeans;
use super::BatchLayout;
use crate::core::error::{FragError, Result};
use crate::engine::linalg::{l2_normalize_rows, to_rows};
use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct HarmonyOptions {
    /// `None` picks `min(100, n_cells / 30)`, at least 2.
    pub n_clusters: Option<usize>,
    pub sigma: f64,
    pub theta: f64,
    /// Ridge penalty on batch coefficients.
    pub lambda: f64,
    pub max_iter: usize,
    pub max_iter_cluster: usize,
    pub tol: f64,
}

impl Default for HarmonyOptions {
    fn default() -> Self {
        Self {
            n_clusters: None,
            sigma: 0.1,
            theta: 2.0,
            lambda: 1.0,
            max_iter: 10,
            max_iter_cluster: 20,
            tol: 1e-4,
        }
    }
}

struct State<'a> {
    layout: &'a BatchLayout,
    sigma: f64,
    theta: f64,
    /// Cells x clusters responsibilities.
    r: DMatrix<f64>,
    centroids: DMatrix<f64>,
}

impl<'a> State<'a> {
    /// Cosine distance `2 (1 - y·z)` between every cell and centroid.
    fn distances(&self, z_cos: &DMatrix<f64>) -> DMatrix<f64> {
        (z_cos * self.centroids.transpose()).map(|s| 2.0 * (1.0 - s))
    }

    /// Observed (O) and expected (E) cluster-by-batch mass.
    fn batch_mass(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        let k = self.r.ncols();
        let n_batches = self.layout.n_batches();
        let mut observed = DMatrix::<f64>::zeros(k, n_batches);
        for (i, &b) in self.layout.codes.iter().enumerate() {
            for c in 0..k {
                observed[(c, b)] += self.r[(i, c)];
            }
        }
        let mut expected = DMatrix::<f64>::zeros(k, n_batches);
        for c in 0..k {
            let size: f64 = self.r.column(c).sum();
            for b in 0..n_batches {
                expected[(c, b)] = size * self.layout.proportions[b];
            }
        }
        (observed, expected)
    }

    fn update_responsibilities(&mut self, dist: &DMatrix<f64>) {
        let (observed, expected) = self.batch_mass();
        let k = self.r.ncols();
        for (i, &b) in self.layout.codes.iter().enumerate() {
            let mut row: Vec<f64> = (0..k)
                .map(|c| {
                    let penalty = (expected[(c, b)] / (observed[(c, b)] + 1.0)).powf(self.theta);
                    (-dist[(i, c)] / self.sigma).exp() * penalty
                })
                .collect();
            let total: f64 = row.iter().sum();
            if total > 0.0 && total.is_finite() {
                row.iter_mut().for_each(|v| *v /= total);
            } else {
                let best = (0..k)
                    .min_by(|&a, &c| {
                        dist[(i, a)]
                            .partial_cmp(&dist[(i, c)])
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .unwrap_or(0);
                row.iter_mut().enumerate().for_each(|(c, v)| *v = if c == best { 1.0 } else { 0.0 });
            }
            for (c, v) in row.into_iter().enumerate() {
                self.r[(i, c)] = v;
            }
        }
    }

    fn update_centroids(&mut self, z_cos: &DMatrix<f64>) {
        self.centroids = self.r.transpose() * z_cos;
        l2_normalize_rows(&mut self.centroids);
    }

    fn objective(&self, dist: &DMatrix<f64>) -> f64 {
        let (observed, expected) = self.batch_mass();
        let kmeans_error: f64 = self.r.component_mul(dist).sum();
        let entropy: f64 = self
            .r
            .iter()
            .filter(|&&v| v > 0.0)
            .map(|&v| v * v.ln())
            .sum::<f64>();
        let diversity: f64 = observed
            .iter()
            .zip(expected.iter())
            .map(|(&o, &e)| o * ((o + 1.0) / (e + 1.0)).ln())
            .sum();
        kmeans_error + self.sigma * entropy + self.sigma * self.theta * diversity
    }
}

/// Ridge mixture-of-experts correction: per cluster, regress the embedding on
/// `[1, batch one-hot]` weighted by responsibilities and subtract the batch
/// terms.
fn correct(z: &DMatrix<f64>, r: &DMatrix<f64>, layout: &BatchLayout, lambda: f64) -> Result<DMatrix<f64>> {
    let (n, d) = z.shape();
    let n_batches = layout.n_batches();
    let offsets: Vec<DMatrix<f64>> = (0..r.ncols())
        .into_par_iter()
        .map(|c| {
            let mut gram = DMatrix::<f64>::zeros(n_batches + 1, n_batches + 1);
            let mut rhs = DMatrix::<f64>::zeros(n_batches + 1, d);
            for i in 0..n {
                let w = r[(i, c)];
                if w == 0.0 {
                    continue;
                }
                let b = layout.codes[i] + 1;
                gram[(0, 0)] += w;
                gram[(0, b)] += w;
                gram[(b, 0)] += w;
                gram[(b, b)] += w;
                for j in 0..d {
                    let v = w * z[(i, j)];
                    rhs[(0, j)] += v;
                    rhs[(b, j)] += v;
                }
            }
            for b in 1..=n_batches {
                gram[(b, b)] += lambda;
            }
            gram.lu().solve(&rhs).ok_or_else(|| {
                FragError::DataProcessing(format!("singular design matrix in cluster {}", c))
            })
        })
        .collect::<Result<_>>()?;

    let mut corrected = z.clone();
    for i in 0..n {
        let b = layout.codes[i] + 1;
        for (c, beta) in offsets.iter().enumerate() {
            let w = r[(i, c)];
            if w == 0.0 {
                continue;
            }
            for j in 0..d {
                corrected[(i, j)] -= w * beta[(b, j)];
            }
        }
    }
    Ok(corrected)
}

/// Remove batch effects from an embedding with Harmony.
pub fn harmony(embedding: &DMatrix<f64>, batches: &[String], options: &HarmonyOptions) -> Result<DMatrix<f64>> {
    let layout = BatchLayout::new(batches, embedding.nrows())?;
    if layout.n_batches() < 2 {
        warn!("Only one batch present; embedding returned unchanged");
        return Ok(embedding.clone());
    }
    if options.sigma <= 0.0 {
        return Err(FragError::InvalidInput("sigma must be positive".to_string()));
    }
    let n = embedding.nrows();
    let k = options
        .n_clusters
        .unwrap_or_else(|| (n / 30).min(100))
        .max(2)
        .min(n);
    info!(
        "Running Harmony on {} cells, {} batches, {} clusters",
        n,
        layout.n_batches(),
        k
    );

    let mut z_cos = embedding.clone();
    l2_normalize_rows(&mut z_cos);
    let init = kmeans(&to_rows(&z_cos), k, options.max_iter_cluster);
    let mut centroids = DMatrix::from_fn(init.centroids.len(), embedding.ncols(), |i, j| init.centroids[i][j]);
    l2_normalize_rows(&mut centroids);

    let mut state = State {
        layout: &layout,
        sigma: options.sigma,
        theta: options.theta,
        r: DMatrix::<f64>::from_element(n, centroids.nrows(), 1.0 / centroids.nrows() as f64),
        centroids,
    };

    let mut corrected = embedding.clone();
    let mut prev_obj: Option<f64> = None;
    for iter in 0..options.max_iter {
        for _ in 0..options.max_iter_cluster {
            let dist = state.distances(&z_cos);
            state.update_responsibilities(&dist);
            state.update_centroids(&z_cos);
        }
        let obj = state.objective(&state.distances(&z_cos));
        corrected = correct(embedding, &state.r, &layout, options.lambda)?;
        z_cos = corrected.clone();
        l2_normalize_rows(&mut z_cos);

        debug!("Harmony iteration {}: objective {:.6}", iter + 1, obj);
        if let Some(prev) = prev_obj {
            if ((prev - obj) / prev.abs().max(f64::EPSILON)).abs() < options.tol {
                info!("Harmony converged after {} iterations", iter + 1);
                break;
            }
        }
        prev_obj = Some(obj);
    }
    Ok(corrected)
}
