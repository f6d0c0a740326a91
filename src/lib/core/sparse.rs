//! Sparse count-matrix utilities shared across fragtk

use crate::core::error::{FragError, Result};
use itertools::Itertools;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

pub struct SparseOps;

impl SparseOps {
    /// Create a CSR matrix from triplets. Duplicate entries are summed.
    pub fn from_triplets_u32(
        nrows: usize,
        ncols: usize,
        triplets: Vec<(usize, usize, u32)>,
    ) -> Result<CsrMatrix<u32>> {
        if nrows == 0 || ncols == 0 || triplets.is_empty() {
            return Ok(CsrMatrix::zeros(nrows, ncols));
        }

        for &(row, col, _) in &triplets {
            if row >= nrows || col >= ncols {
                return Err(FragError::InvalidInput(format!(
                    "Index ({}, {}) exceeds matrix dimensions ({}, {})",
                    row, col, nrows, ncols
                )));
            }
        }

        let (row_indices, col_indices, values): (Vec<_>, Vec<_>, Vec<_>) =
            triplets.into_iter().multiunzip();

        let coo = CooMatrix::try_from_triplets(nrows, ncols, row_indices, col_indices, values)
            .map_err(|e| FragError::SparseMatrix(format!("COO creation failed: {:?}", e)))?;

        Ok(CsrMatrix::from(&coo))
    }

    /// Assemble a CSR matrix from per-row `(column, value)` lists. Columns
    /// within a row may repeat and need not be sorted.
    pub fn from_rows(ncols: usize, rows: Vec<Vec<(usize, u32)>>) -> Result<CsrMatrix<u32>> {
        let nrows = rows.len();
        let mut offsets = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        offsets.push(0);

        for mut row in rows {
            row.sort_unstable_by_key(|&(c, _)| c);
            for (col, group) in &row.into_iter().group_by(|&(c, _)| c) {
                if col >= ncols {
                    return Err(FragError::InvalidInput(format!(
                        "Column {} exceeds matrix width {}",
                        col, ncols
                    )));
                }
                let total = group.fold(0u32, |acc, (_, v)| acc.saturating_add(v));
                if total > 0 {
                    col_indices.push(col);
                    values.push(total);
                }
            }
            offsets.push(col_indices.len());
        }

        Ok(CsrMatrix::try_from_csr_data(
            nrows,
            ncols,
            offsets,
            col_indices,
            values,
        )?)
    }

    /// Keep only the listed columns, in the listed order.
    pub fn filter_columns_u32(
        matrix: &CsrMatrix<u32>,
        keep_indices: &[usize],
    ) -> Result<CsrMatrix<u32>> {
        let nrows = matrix.nrows();
        let new_ncols = keep_indices.len();

        if new_ncols == 0 {
            return Ok(CsrMatrix::zeros(nrows, 0));
        }

        let col_map: FxHashMap<usize, usize> = keep_indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let rows = (0..nrows)
            .map(|row_idx| {
                let row = matrix.row(row_idx);
                row.col_indices()
                    .iter()
                    .zip(row.values())
                    .filter_map(|(old_col, &val)| col_map.get(old_col).map(|&c| (c, val)))
                    .collect()
            })
            .collect();
        Self::from_rows(new_ncols, rows)
    }

    /// Keep only the listed rows, in the listed order.
    pub fn select_rows_u32(matrix: &CsrMatrix<u32>, rows: &[usize]) -> Result<CsrMatrix<u32>> {
        let picked = rows
            .iter()
            .map(|&r| {
                if r >= matrix.nrows() {
                    return Err(FragError::InvalidInput(format!(
                        "Row {} exceeds matrix height {}",
                        r,
                        matrix.nrows()
                    )));
                }
                let row = matrix.row(r);
                Ok(row
                    .col_indices()
                    .iter()
                    .copied()
                    .zip(row.values().iter().copied())
                    .collect())
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(matrix.ncols(), picked)
    }

    /// Row sums computed in parallel, saturating at `u64::MAX`.
    pub fn compute_row_sums(matrix: &CsrMatrix<u32>) -> Vec<u64> {
        (0..matrix.nrows())
            .into_par_iter()
            .map(|row_idx| {
                matrix
                    .row(row_idx)
                    .values()
                    .iter()
                    .fold(0u64, |acc, &val| acc.saturating_add(val as u64))
            })
            .collect()
    }

    /// Column sums using a chunked parallel reduction over rows.
    pub fn compute_col_sums(matrix: &CsrMatrix<u32>) -> Vec<u64> {
        let ncols = matrix.ncols();
        let chunk_size = std::cmp::max(1, matrix.nrows() / rayon::current_num_threads().max(1));

        (0..matrix.nrows())
            .into_par_iter()
            .chunks(chunk_size)
            .map(|chunk| {
                let mut local_sums = vec![0u64; ncols];
                for row_idx in chunk {
                    let row = matrix.row(row_idx);
                    for (&col_idx, &val) in row.col_indices().iter().zip(row.values()) {
                        local_sums[col_idx] = local_sums[col_idx].saturating_add(val as u64);
                    }
                }
                local_sums
            })
            .reduce(
                || vec![0u64; ncols],
                |mut acc, local| {
                    for (i, val) in local.into_iter().enumerate() {
                        acc[i] = acc[i].saturating_add(val);
                    }
                    acc
                },
            )
    }

    /// Number of rows in which each column is non-zero.
    pub fn compute_col_nnz(matrix: &CsrMatrix<u32>) -> Vec<u64> {
        let mut counts = vec![0u64; matrix.ncols()];
        for &col in matrix.col_indices() {
            counts[col] += 1;
        }
        counts
    }

    /// Fraction of stored entries over all cells, with the raw counts.
    pub fn get_density_stats(matrix: &CsrMatrix<u32>) -> (f64, usize, usize) {
        let total_elements = matrix.nrows() * matrix.ncols();
        let nnz = matrix.nnz();
        let density = if total_elements > 0 {
            nnz as f64 / total_elements as f64
        } else {
            0.0
        };
        (density, nnz, total_elements)
    }
}

/// Extra operations on CSR count matrices.
pub trait SparseMatrixExt {
    /// Element-wise sum of two rows as a sorted `(column, value)` list.
    fn sum_rows(&self, a: usize, b: usize) -> Vec<(usize, u32)>;
}

impl SparseMatrixExt for CsrMatrix<u32> {
    fn sum_rows(&self, a: usize, b: usize) -> Vec<(usize, u32)> {
        let ra = self.row(a);
        let rb = self.row(b);
        let (ac, av) = (ra.col_indices(), ra.values());
        let (bc, bv) = (rb.col_indices(), rb.values());
        let mut out = Vec::with_capacity(ac.len() + bc.len());
        let (mut i, mut j) = (0, 0);

        // CSR keeps column indices sorted, so a two-pointer merge suffices.
        while i < ac.len() && j < bc.len() {
            match ac[i].cmp(&bc[j]) {
                std::cmp::Ordering::Equal => {
                    out.push((ac[i], av[i].saturating_add(bv[j])));
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    out.push((ac[i], av[i]));
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push((bc[j], bv[j]));
                    j += 1;
                }
            }
        }
        out.extend(ac[i..].iter().copied().zip(av[i..].iter().copied()));
        out.extend(bc[j..].iter().copied().zip(bv[j..].iter().copied()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsrMatrix<u32> {
        SparseOps::from_triplets_u32(
            3,
            4,
            vec![(0, 0, 1), (0, 3, 2), (1, 1, 5), (2, 0, 4), (2, 3, 1), (2, 3, 1)],
        )
        .unwrap()
    }

    #[test]
    fn triplets_sum_duplicates() {
        let m = sample();
        assert_eq!(m.nnz(), 5);
        let (density, nnz, total) = SparseOps::get_density_stats(&m);
        assert_eq!((nnz, total), (5, 12));
        assert!((density - 5.0 / 12.0).abs() < 1e-12);
        assert_eq!(SparseOps::compute_row_sums(&m), vec![3, 5, 6]);
        assert_eq!(SparseOps::compute_col_sums(&m), vec![5, 5, 0, 4]);
        assert_eq!(SparseOps::compute_col_nnz(&m), vec![2, 1, 0, 2]);
    }

    #[test]
    fn out_of_bounds_triplet_rejected() {
        assert!(SparseOps::from_triplets_u32(2, 2, vec![(2, 0, 1)]).is_err());
    }

    #[test]
    fn filter_and_select() {
        let m = sample();
        let f = SparseOps::filter_columns_u32(&m, &[3, 0]).unwrap();
        assert_eq!(f.ncols(), 2);
        assert_eq!(SparseOps::compute_col_sums(&f), vec![4, 5]);

        let r = SparseOps::select_rows_u32(&m, &[2, 0]).unwrap();
        assert_eq!(SparseOps::compute_row_sums(&r), vec![6, 3]);
        assert!(SparseOps::select_rows_u32(&m, &[5]).is_err());
    }

    #[test]
    fn rows_merge() {
        let m = sample();
        assert_eq!(m.sum_rows(0, 2), vec![(0, 5), (3, 4)]);
        assert_eq!(m.sum_rows(0, 1), vec![(0, 1), (1, 5), (3, 2)]);
    }

    #[test]
    fn from_rows_drops_zero_and_sums() {
        let m = SparseOps::from_rows(3, vec![vec![(2, 1), (0, 0), (2, 3)], vec![]]).unwrap();
        assert_eq!(m.nnz(), 1);
        assert_eq!(m.row(0).col_indices(), &[2]);
        assert_eq!(m.row(0).values(), &[4]);
    }
}
