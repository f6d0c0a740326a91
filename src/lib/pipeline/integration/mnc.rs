//! Batch correction by mutual nearest centroids.

use super::kmeans::{kmeans, nearest};
use super::BatchLayout;
use crate::core::error::Result;
use crate::engine::linalg::{squared_distance, to_rows};
use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct MncOptions {
    pub n_clusters: usize,
    pub n_neighbors: usize,
    pub n_iter: usize,
    pub max_iter_kmeans: usize,
}

impl Default for MncOptions {
    fn default() -> Self {
        Self {
            n_clusters: 40,
            n_neighbors: 5,
            n_iter: 1,
            max_iter_kmeans: 20,
        }
    }
}

/// A query centroid paired with its mutual nearest reference centroid.
struct Pair {
    query: Vec<f64>,
    shift: Vec<f64>,
}

fn mutual_pairs(reference: &[Vec<f64>], query: &[Vec<f64>]) -> Vec<Pair> {
    query
        .iter()
        .enumerate()
        .filter_map(|(qi, qc)| {
            let (ri, _) = nearest(qc, reference);
            let (back, _) = nearest(&reference[ri], query);
            (back == qi).then(|| Pair {
                query: qc.clone(),
                shift: reference[ri].iter().zip(qc).map(|(r, q)| r - q).collect(),
            })
        })
        .collect()
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Move each query cell by the Gaussian-weighted mean shift of its nearest
/// paired centroids.
fn shift_cells(cells: &mut [Vec<f64>], pairs: &[Pair], n_neighbors: usize) {
    let bandwidth = median(
        pairs
            .iter()
            .map(|p| p.shift.iter().map(|x| x * x).sum::<f64>().sqrt())
            .collect(),
    );
    let bandwidth = if bandwidth > 0.0 { bandwidth } else { 1.0 };
    let k = n_neighbors.max(1).min(pairs.len());

    cells.par_iter_mut().for_each(|cell| {
        let mut dists: Vec<(usize, f64)> = pairs
            .iter()
            .enumerate()
            .map(|(i, p)| (i, squared_distance(cell, &p.query)))
            .collect();
        dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        dists.truncate(k);

        let weights: Vec<f64> = dists
            .iter()
            .map(|&(_, d2)| (-d2 / (2.0 * bandwidth * bandwidth)).exp())
            .collect();
        let total: f64 = weights.iter().sum();
        let (weights, total) = if total > 0.0 {
            (weights, total)
        } else {
            // All weights underflowed: fall back to the nearest pair.
            let mut w = vec![0.0; dists.len()];
            w[0] = 1.0;
            (w, 1.0)
        };
        for ((i, _), w) in dists.iter().zip(&weights) {
            for (x, s) in cell.iter_mut().zip(&pairs[*i].shift) {
                *x += w / total * s;
            }
        }
    });
}

/// Align every batch onto the largest one using mutual nearest centroids.
///
/// Batches are corrected from largest to smallest; each corrected batch is
/// added to the reference before the next batch is processed.
pub fn mnc_correct(embedding: &DMatrix<f64>, batches: &[String], options: &MncOptions) -> Result<DMatrix<f64>> {
    let layout = BatchLayout::new(batches, embedding.nrows())?;
    if layout.n_batches() < 2 {
        warn!("Only one batch present; embedding returned unchanged");
        return Ok(embedding.clone());
    }

    let mut order: Vec<usize> = (0..layout.n_batches()).collect();
    order.sort_by(|&a, &b| layout.sizes[b].cmp(&layout.sizes[a]).then(a.cmp(&b)));
    info!(
        "Correcting {} batches against reference batch '{}'",
        layout.n_batches() - 1,
        layout.names[order[0]]
    );

    let mut rows = to_rows(embedding);
    for round in 0..options.n_iter {
        let mut reference: Vec<usize> = layout.members(order[0]);
        for &b in &order[1..] {
            let members = layout.members(b);
            let ref_points: Vec<Vec<f64>> = reference.iter().map(|&i| rows[i].clone()).collect();
            let mut query: Vec<Vec<f64>> = members.iter().map(|&i| rows[i].clone()).collect();

            let ref_clusters = kmeans(&ref_points, options.n_clusters, options.max_iter_kmeans);
            let query_clusters = kmeans(&query, options.n_clusters, options.max_iter_kmeans);
            let pairs = mutual_pairs(&ref_clusters.centroids, &query_clusters.centroids);
            if pairs.is_empty() {
                warn!("No mutual nearest centroids for batch '{}'; left uncorrected", layout.names[b]);
            } else {
                debug!(
                    "Round {}: batch '{}' has {} centroid pairs",
                    round + 1,
                    layout.names[b],
                    pairs.len()
                );
                shift_cells(&mut query, &pairs, options.n_neighbors);
                for (&i, row) in members.iter().zip(query) {
                    rows[i] = row;
                }
            }
            reference.extend(members);
        }
    }

    Ok(DMatrix::from_fn(embedding.nrows(), embedding.ncols(), |i, j| rows[i][j]))
}
