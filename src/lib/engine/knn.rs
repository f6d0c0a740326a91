//! Exact k-nearest-neighbour search.

use super::linalg::{squared_distance, to_rows};
use crate::core::error::{FragError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Neighbours of one query row as `(index, distance)`, nearest first.
pub type Neighbors = Vec<(usize, f64)>;

/// Brute-force Euclidean kNN.
///
/// With `query = None` the rows of `data` are queried against themselves and
/// each row is excluded from its own neighbour list. Ties are broken by index.
pub fn knn(data: &DMatrix<f64>, query: Option<&DMatrix<f64>>, k: usize) -> Result<Vec<Neighbors>> {
    if let Some(q) = query {
        if q.ncols() != data.ncols() {
            return Err(FragError::DimensionMismatch {
                expected: format!("{} columns", data.ncols()),
                actual: format!("{} columns", q.ncols()),
            });
        }
    }
    let reference = to_rows(data);
    let queries = match query {
        Some(q) => to_rows(q),
        None => reference.clone(),
    };
    let exclude_self = query.is_none();
    Ok(knn_rows(&reference, &queries, k, exclude_self))
}

pub(crate) fn knn_rows(
    reference: &[Vec<f64>],
    queries: &[Vec<f64>],
    k: usize,
    exclude_self: bool,
) -> Vec<Neighbors> {
    queries
        .par_iter()
        .enumerate()
        .map(|(qi, q)| {
            let mut dists: Vec<(usize, f64)> = reference
                .iter()
                .enumerate()
                .filter(|(ri, _)| !(exclude_self && *ri == qi))
                .map(|(ri, r)| (ri, squared_distance(q, r)))
                .collect();
            let k = k.min(dists.len());
            if k == 0 {
                return Vec::new();
            }
            let by_distance = |a: &(usize, f64), b: &(usize, f64)| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            };
            if k < dists.len() {
                dists.select_nth_unstable_by(k - 1, by_distance);
                dists.truncate(k);
            }
            dists.sort_by(by_distance);
            dists.into_iter().map(|(i, d)| (i, d.sqrt())).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn excludes_self_and_sorts() {
        let data = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 3.0, 7.0]);
        let nn = knn(&data, None, 2).unwrap();
        assert_eq!(nn[0], vec![(1, 1.0), (2, 3.0)]);
        assert_eq!(nn[3], vec![(2, 4.0), (1, 6.0)]);
    }

    #[test]
    fn queries_other_matrix() {
        let data = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 1.0, 5.0, 5.0]);
        let query = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        let nn = knn(&data, Some(&query), 5).unwrap();
        assert_eq!(nn[0].len(), 3);
        assert_eq!(nn[0][0], (0, 0.0));

        let bad = DMatrix::from_row_slice(1, 1, &[0.0]);
        assert!(knn(&data, Some(&bad), 1).is_err());
    }

    proptest! {
        #[test]
        fn matches_full_sort(points in prop::collection::vec(-100.0f64..100.0, 2..40), k in 1usize..10) {
            let n = points.len();
            let data = DMatrix::from_column_slice(n, 1, &points);
            let nn = knn(&data, None, k).unwrap();
            for (i, row) in nn.iter().enumerate() {
                let mut all: Vec<f64> = (0..n).filter(|&j| j != i).map(|j| (points[i] - points[j]).abs()).collect();
                all.sort_by(|a, b| a.partial_cmp(b).unwrap());
                prop_assert_eq!(row.len(), k.min(n - 1));
                for (got, want) in row.iter().zip(all.iter()) {
                    prop_assert!((got.1 - want).abs() < 1e-9);
                }
            }
        }
    }
}
