use crate::core::error::{FragError, Result};
use crate::core::sparse::SparseOps;
use crate::fragment::Fragment;
use crate::pipeline::preprocess::FragmentStore;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::str::FromStr;

/// How fragments contribute to feature counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountingStrategy {
    /// Every Tn5 insertion is counted.
    #[default]
    Insertion,
    /// Every feature the fragment overlaps is counted once.
    Fragment,
    /// Insertions are counted, but at most once per feature per fragment.
    PairedInsertion,
}

impl FromStr for CountingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "insertion" => Ok(CountingStrategy::Insertion),
            "fragment" => Ok(CountingStrategy::Fragment),
            "paired-insertion" => Ok(CountingStrategy::PairedInsertion),
            other => Err(format!("unknown counting strategy: {}", other)),
        }
    }
}

/// Cell-by-feature count matrix with its row and column names.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    pub obs_names: Vec<String>,
    pub var_names: Vec<String>,
    pub data: CsrMatrix<u32>,
}

impl CountMatrix {
    pub fn new(obs_names: Vec<String>, var_names: Vec<String>, data: CsrMatrix<u32>) -> Result<Self> {
        if data.nrows() != obs_names.len() || data.ncols() != var_names.len() {
            return Err(FragError::DimensionMismatch {
                expected: format!("{}×{}", obs_names.len(), var_names.len()),
                actual: format!("{}×{}", data.nrows(), data.ncols()),
            });
        }
        Ok(CountMatrix {
            obs_names,
            var_names,
            data,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_vars(&self) -> usize {
        self.data.ncols()
    }

    /// Restrict to the given feature columns, in the given order.
    pub fn select_vars(&self, indices: &[usize]) -> Result<CountMatrix> {
        let data = SparseOps::filter_columns_u32(&self.data, indices)?;
        let var_names = indices.iter().map(|&i| self.var_names[i].clone()).collect();
        CountMatrix::new(self.obs_names.clone(), var_names, data)
    }

    /// Restrict to the given cells, in the given order.
    pub fn select_obs(&self, indices: &[usize]) -> Result<CountMatrix> {
        let data = SparseOps::select_rows_u32(&self.data, indices)?;
        let obs_names = indices.iter().map(|&i| self.obs_names[i].clone()).collect();
        CountMatrix::new(obs_names, self.var_names.clone(), data)
    }
}

/// Count features for every cell of `store` in parallel. `emit` pushes the
/// `(feature, count)` contributions of one fragment; repeated features are
/// summed.
pub(crate) fn count_features<F>(
    store: &FragmentStore,
    n_features: usize,
    count_duplicates: bool,
    emit: F,
) -> Result<CsrMatrix<u32>>
where
    F: Fn(&Fragment, u32, &mut Vec<(usize, u32)>) + Sync,
{
    let rows: Vec<Vec<(usize, u32)>> = store
        .cells()
        .par_iter()
        .map(|cell| {
            let mut row = Vec::with_capacity(cell.fragments.len() * 2);
            for fragment in &cell.fragments {
                let weight = if count_duplicates { fragment.count } else { 1 };
                emit(fragment, weight, &mut row);
            }
            row
        })
        .collect();
    SparseOps::from_rows(n_features, rows)
}
