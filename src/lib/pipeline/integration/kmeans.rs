use crate::engine::linalg::squared_distance;
use rayon::prelude::*;

/// Centroids and per-point cluster assignments.
#[derive(Debug, Clone)]
pub(crate) struct Clustering {
    pub centroids: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

fn mean_of<'a, I: Iterator<Item = &'a Vec<f64>>>(points: I, dim: usize) -> Vec<f64> {
    let mut acc = vec![0.0; dim];
    let mut n = 0usize;
    for p in points {
        acc.iter_mut().zip(p).for_each(|(a, x)| *a += x);
        n += 1;
    }
    if n > 0 {
        acc.iter_mut().for_each(|a| *a /= n as f64);
    }
    acc
}

pub(crate) fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// Farthest-point seeding: the first seed is the point farthest from the
/// mean, each further seed the point farthest from all chosen seeds.
fn farthest_point_seeds(points: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let dim = points[0].len();
    let mean = mean_of(points.iter(), dim);
    let mut min_dist: Vec<f64> = points.iter().map(|p| squared_distance(p, &mean)).collect();
    let mut seeds = Vec::with_capacity(k);
    for _ in 0..k {
        let (idx, _) = min_dist
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &d)| if d > best.1 { (i, d) } else { best });
        let seed = points[idx].clone();
        if seeds.is_empty() {
            min_dist.iter_mut().for_each(|d| *d = f64::INFINITY);
        }
        min_dist
            .iter_mut()
            .zip(points)
            .for_each(|(d, p)| *d = d.min(squared_distance(p, &seed)));
        seeds.push(seed);
    }
    seeds
}

/// Lloyd's k-means with deterministic seeding. `k` is capped by the number
/// of points; empty clusters keep their previous centroid.
pub(crate) fn kmeans(points: &[Vec<f64>], k: usize, max_iter: usize) -> Clustering {
    if points.is_empty() || k == 0 {
        return Clustering {
            centroids: Vec::new(),
            labels: vec![0; points.len()],
        };
    }
    let k = k.min(points.len());
    let dim = points[0].len();
    let mut centroids = farthest_point_seeds(points, k);
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..max_iter {
        let new_labels: Vec<usize> = points.par_iter().map(|p| nearest(p, &centroids).0).collect();
        if new_labels == labels {
            break;
        }
        labels = new_labels;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members = points.iter().zip(&labels).filter(|(_, &l)| l == c).map(|(p, _)| p);
            let mean = mean_of(members, dim);
            if labels.iter().any(|&l| l == c) {
                *centroid = mean;
            }
        }
    }
    if labels.iter().any(|&l| l == usize::MAX) {
        labels = points.par_iter().map(|p| nearest(p, &centroids).0).collect();
    }
    Clustering { centroids, labels }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_blobs() {
        let mut points = Vec::new();
        for i in 0..10 {
            points.push(vec![i as f64 * 0.01, 0.0]);
            points.push(vec![10.0 + i as f64 * 0.01, 10.0]);
        }
        let c = kmeans(&points, 2, 20);
        assert_eq!(c.centroids.len(), 2);
        assert!(c.labels.chunks(2).all(|pair| pair[0] != pair[1]));
        let first = c.labels[0];
        assert!(c.labels.iter().step_by(2).all(|&l| l == first));
    }

    #[test]
    fn caps_k_by_points() {
        let points = vec![vec![0.0], vec![1.0]];
        let c = kmeans(&points, 5, 10);
        assert_eq!(c.centroids.len(), 2);
        assert_ne!(c.labels[0], c.labels[1]);
    }
}
