//! Normalisation and dimension reduction on cell-by-feature matrices.

use crate::core::error::{FragError, Result};
use crate::core::sparse::SparseOps;
use log::{debug, warn};
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Extra random directions sampled beyond the requested rank.
pub const PCA_OVERSAMPLES: usize = 10;
/// Subspace iterations applied to the random sample.
pub const PCA_POWER_ITERS: usize = 2;

/// TF-IDF transform of a count matrix, keeping the sparsity pattern.
///
/// TF is the count divided by the row total and IDF is
/// `ln(1 + n_cells / (1 + df))` where `df` is the number of cells with a
/// non-zero count for the feature. Empty rows stay zero.
pub fn tfidf(matrix: &CsrMatrix<u32>) -> Result<CsrMatrix<f64>> {
    let n = matrix.nrows();
    let df = SparseOps::compute_col_nnz(matrix);
    let idf: Vec<f64> = df
        .iter()
        .map(|&d| (1.0 + n as f64 / (1.0 + d as f64)).ln())
        .collect();

    let (offsets, indices, values) = matrix.csr_data();
    let mut out = Vec::with_capacity(values.len());
    for i in 0..n {
        let range = offsets[i]..offsets[i + 1];
        let total: u64 = values[range.clone()].iter().map(|&v| v as u64).sum();
        if total == 0 {
            out.extend(std::iter::repeat(0.0).take(range.len()));
            continue;
        }
        out.extend(
            indices[range.clone()]
                .iter()
                .zip(&values[range])
                .map(|(&j, &v)| v as f64 / total as f64 * idf[j]),
        );
    }
    Ok(CsrMatrix::try_from_csr_data(
        n,
        matrix.ncols(),
        offsets.to_vec(),
        indices.to_vec(),
        out,
    )?)
}

/// `log1p(count / row_total * target)` per entry, keeping the sparsity pattern.
pub fn log_normalize(matrix: &CsrMatrix<u32>, target: f64) -> Result<CsrMatrix<f64>> {
    if target <= 0.0 {
        return Err(FragError::InvalidInput(format!(
            "normalisation target must be positive, got {}",
            target
        )));
    }
    let (offsets, indices, values) = matrix.csr_data();
    let mut out = Vec::with_capacity(values.len());
    for i in 0..matrix.nrows() {
        let row = &values[offsets[i]..offsets[i + 1]];
        let total: u64 = row.iter().map(|&v| v as u64).sum();
        if total == 0 {
            out.extend(std::iter::repeat(0.0).take(row.len()));
        } else {
            out.extend(
                row.iter()
                    .map(|&v| (v as f64 / total as f64 * target).ln_1p()),
            );
        }
    }
    Ok(CsrMatrix::try_from_csr_data(
        matrix.nrows(),
        matrix.ncols(),
        offsets.to_vec(),
        indices.to_vec(),
        out,
    )?)
}

/// `(A - 1·μᵀ) · M` for sparse `A`, column means `μ` and dense `M`.
fn centred_mul(a: &CsrMatrix<f64>, mean: &[f64], m: &DMatrix<f64>) -> DMatrix<f64> {
    let l = m.ncols();
    let shift: Vec<f64> = (0..l)
        .map(|c| mean.iter().zip(m.column(c).iter()).map(|(u, x)| u * x).sum())
        .collect();
    let rows: Vec<Vec<f64>> = (0..a.nrows())
        .into_par_iter()
        .map(|i| {
            let row = a.row(i);
            let mut out: Vec<f64> = shift.iter().map(|s| -s).collect();
            for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                for (c, o) in out.iter_mut().enumerate() {
                    *o += v * m[(j, c)];
                }
            }
            out
        })
        .collect();
    DMatrix::from_fn(a.nrows(), l, |i, c| rows[i][c])
}

/// `(A - 1·μᵀ)ᵀ · Q` for sparse `A`, column means `μ` and dense `Q`.
fn centred_tr_mul(a: &CsrMatrix<f64>, mean: &[f64], q: &DMatrix<f64>) -> DMatrix<f64> {
    let l = q.ncols();
    let mut out = DMatrix::<f64>::zeros(a.ncols(), l);
    for (i, row) in a.row_iter().enumerate() {
        for (&j, &v) in row.col_indices().iter().zip(row.values()) {
            for c in 0..l {
                out[(j, c)] += v * q[(i, c)];
            }
        }
    }
    let col_sums: Vec<f64> = (0..l).map(|c| q.column(c).sum()).collect();
    for (j, &mu) in mean.iter().enumerate() {
        if mu != 0.0 {
            for (c, s) in col_sums.iter().enumerate() {
                out[(j, c)] -= mu * s;
            }
        }
    }
    out
}

fn orthonormal_basis(y: DMatrix<f64>) -> DMatrix<f64> {
    y.qr().q()
}

/// Principal components of a sparse matrix (rows are observations).
///
/// Columns are centred implicitly so the sparsity is never lost. The top
/// components come from a randomized range finder with
/// [`PCA_OVERSAMPLES`] extra directions and [`PCA_POWER_ITERS`] subspace
/// iterations, followed by a thin SVD of the projected matrix. When the
/// sample covers the full rank the result is exact. Returns `U·Σ` for the
/// first `n_comps` components ordered by singular value, each with its
/// largest absolute loading positive.
pub fn pca(data: &CsrMatrix<f64>, n_comps: usize, seed: u64) -> Result<DMatrix<f64>> {
    let (n, p) = (data.nrows(), data.ncols());
    if n < 2 {
        return Err(FragError::EmptyData(format!(
            "PCA needs at least 2 observations, got {}",
            n
        )));
    }
    if n_comps == 0 {
        return Err(FragError::InvalidInput(
            "number of components must be positive".to_string(),
        ));
    }
    let rank = n.min(p);
    let k = if n_comps > rank {
        warn!(
            "Requested {} components but the data has rank at most {}; using {}",
            n_comps, rank, rank
        );
        rank
    } else {
        n_comps
    };
    let l = (k + PCA_OVERSAMPLES).min(rank);

    let mut mean = vec![0.0; p];
    for row in data.row_iter() {
        for (&j, &v) in row.col_indices().iter().zip(row.values()) {
            mean[j] += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n as f64);

    debug!("Randomized SVD of a {}x{} matrix, sample size {}", n, p, l);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let omega = DMatrix::<f64>::from_fn(p, l, |_, _| rng.gen_range(-1.0..1.0));
    let mut q = orthonormal_basis(centred_mul(data, &mean, &omega));
    for _ in 0..PCA_POWER_ITERS {
        let z = orthonormal_basis(centred_tr_mul(data, &mean, &q));
        q = orthonormal_basis(centred_mul(data, &mean, &z));
    }

    // B = Qᵀ·A_c, an l x p matrix.
    let b = centred_tr_mul(data, &mean, &q).transpose();
    let svd = b.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| FragError::DataProcessing("SVD did not produce U".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| FragError::DataProcessing("SVD did not produce V^T".to_string()))?;
    let u = q * u;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = DMatrix::<f64>::zeros(n, k);
    for (dst, &src) in order.iter().take(k).enumerate() {
        let loadings = v_t.row(src);
        let pivot = loadings
            .iter()
            .copied()
            .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(0.0);
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        let sigma = svd.singular_values[src];
        out.set_column(dst, &(u.column(src) * (sigma * sign)));
    }
    Ok(out)
}

/// Copy the rows of a dense matrix into contiguous vectors.
pub(crate) fn to_rows(data: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..data.nrows())
        .into_par_iter()
        .map(|i| data.row(i).iter().copied().collect())
        .collect()
}

/// Scale each row to unit Euclidean norm; zero rows are left unchanged.
pub fn l2_normalize_rows(data: &mut DMatrix<f64>) {
    for i in 0..data.nrows() {
        let norm = data.row(i).norm();
        if norm > 0.0 {
            data.row_mut(i).unscale_mut(norm);
        }
    }
}

#[inline]
pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> CsrMatrix<u32> {
        SparseOps::from_triplets_u32(
            3,
            3,
            vec![(0, 0, 2), (0, 1, 2), (1, 1, 1), (1, 2, 0)],
        )
        .unwrap()
    }

    fn sparse(rows: usize, cols: usize, values: &[f64]) -> CsrMatrix<f64> {
        CsrMatrix::from(&DMatrix::from_row_slice(rows, cols, values))
    }

    #[test]
    fn tfidf_matches_formula() {
        let m = tfidf(&counts()).unwrap();
        let idf0 = (1.0f64 + 3.0 / 2.0).ln();
        let idf1 = (1.0f64 + 3.0 / 3.0).ln();
        let row0 = m.row(0);
        assert_eq!(row0.col_indices(), &[0, 1]);
        assert!((row0.values()[0] - 0.5 * idf0).abs() < 1e-12);
        assert!((row0.values()[1] - 0.5 * idf1).abs() < 1e-12);
        assert!((m.row(1).values()[0] - idf1).abs() < 1e-12);
        assert_eq!(m.row(2).values().iter().sum::<f64>(), 0.0);
        assert_eq!(m.nnz(), counts().nnz());
    }

    #[test]
    fn log_normalize_scales_rows() {
        let m = log_normalize(&counts(), 10.0).unwrap();
        let row: Vec<f64> = m.row(0).values().to_vec();
        assert!((row[0] - 6.0f64.ln()).abs() < 1e-12);
        assert!(log_normalize(&counts(), 0.0).is_err());
    }

    #[test]
    fn pca_recovers_dominant_axis() {
        let data = sparse(4, 2, &[-3.0, 0.1, -1.0, -0.1, 1.0, 0.1, 3.0, -0.1]);
        let pcs = pca(&data, 1, 0).unwrap();
        assert_eq!(pcs.shape(), (4, 1));
        // First axis follows column 0, with a positive dominant loading.
        assert!(pcs[(0, 0)] < 0.0 && pcs[(3, 0)] > 0.0);
        assert!((pcs[(3, 0)] - 3.0).abs() < 0.05);
    }

    #[test]
    fn pca_caps_components_and_rejects_tiny_input() {
        let data = sparse(3, 2, &[1.0, 2.0, 3.0, 1.0, 0.0, 5.0]);
        assert_eq!(pca(&data, 10, 0).unwrap().ncols(), 2);
        let single = sparse(1, 2, &[1.0, 2.0]);
        assert!(matches!(pca(&single, 1, 0), Err(FragError::EmptyData(_))));
    }

    #[test]
    fn randomized_pca_on_wide_sparse_input() {
        // 40 cells over 2,000 features: two blocks of 20 cells with disjoint
        // feature sets, so the first component separates them.
        let n_features = 2_000;
        let triplets: Vec<(usize, usize, u32)> = (0..40)
            .flat_map(|i| {
                let offset = if i < 20 { 0 } else { n_features / 2 };
                (0..25).map(move |f| (i, offset + f * 40, 1 + ((i + f) % 3) as u32))
            })
            .collect();
        let counts = SparseOps::from_triplets_u32(40, n_features, triplets).unwrap();
        let normalized = tfidf(&counts).unwrap();
        let pcs = pca(&normalized, 3, 1).unwrap();
        assert_eq!(pcs.shape(), (40, 3));

        let mean = |rows: std::ops::Range<usize>| rows.clone().map(|i| pcs[(i, 0)]).sum::<f64>() / rows.len() as f64;
        let (a, b) = (mean(0..20), mean(20..40));
        assert!(a.signum() != b.signum());
        assert!((a - b).abs() > 0.1);
        // Deterministic for a fixed seed.
        assert_eq!(pcs, pca(&normalized, 3, 1).unwrap());
    }

    #[test]
    fn rows_are_unit_length() {
        let mut data = DMatrix::from_row_slice(2, 2, &[3.0, 4.0, 0.0, 0.0]);
        l2_normalize_rows(&mut data);
        assert!((data[(0, 0)] - 0.6).abs() < 1e-12);
        assert_eq!(data[(1, 1)], 0.0);
    }
}
