//! AnnData (H5AD) output for count matrices

use crate::core::error::{FragError, Result};
use crate::core::sparse::SparseOps;
use crate::pipeline::matrix::CountMatrix;
use crate::pipeline::preprocess::QualityControl;
use anndata::data::array::dataframe::DataFrameIndex;
use anndata::{AnnData, AnnDataOp};
use anndata_hdf5::H5;
use log::{info, warn};
use nalgebra_sparse::CsrMatrix;
use polars::prelude::*;
use rustc_hash::FxHashMap;
use std::path::Path;

fn to_f32(matrix: &CsrMatrix<u32>) -> Result<CsrMatrix<f32>> {
    let (offsets, indices, values) = matrix.csr_data();
    Ok(CsrMatrix::try_from_csr_data(
        matrix.nrows(),
        matrix.ncols(),
        offsets.to_vec(),
        indices.to_vec(),
        values.iter().map(|&v| v as f32).collect(),
    )?)
}

/// Observation table: per-cell QC when available, plus the total count of
/// each cell in `X`.
fn build_obs(matrix: &CountMatrix, qc: Option<&[(String, QualityControl)]>) -> Result<DataFrame> {
    let totals: Vec<u64> = SparseOps::compute_row_sums(&matrix.data);
    let mut columns: Vec<Column> = vec![Series::new("n_counts".into(), totals).into()];

    if let Some(qc) = qc {
        let lookup: FxHashMap<&str, &QualityControl> =
            qc.iter().map(|(b, q)| (b.as_str(), q)).collect();
        let missing = matrix
            .obs_names
            .iter()
            .filter(|b| !lookup.contains_key(b.as_str()))
            .count();
        if missing > 0 {
            warn!("{} cells have no QC record; filling with zeros", missing);
        }
        let get = |f: fn(&QualityControl) -> f64| -> Vec<f64> {
            matrix
                .obs_names
                .iter()
                .map(|b| lookup.get(b.as_str()).map_or(0.0, |q| f(q)))
                .collect()
        };
        let n_fragment: Vec<u64> = matrix
            .obs_names
            .iter()
            .map(|b| lookup.get(b.as_str()).map_or(0, |q| q.n_fragment))
            .collect();
        columns.push(Series::new("n_fragment".into(), n_fragment).into());
        columns.push(Series::new("frac_dup".into(), get(|q| q.frac_dup)).into());
        columns.push(Series::new("frac_mito".into(), get(|q| q.frac_mito)).into());
        columns.push(Series::new("tsse".into(), get(|q| q.tsse)).into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Write a count matrix to an `.h5ad` file with float32 `X`.
pub fn write_h5ad<P: AsRef<Path>>(
    matrix: &CountMatrix,
    qc: Option<&[(String, QualityControl)]>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    info!("Writing AnnData to: {}", path.display());
    if matrix.n_obs() == 0 {
        return Err(FragError::EmptyData("matrix has no cells".to_string()));
    }

    let h5_adata = AnnData::<H5>::new(path)?;

    let obs_index: DataFrameIndex = matrix.obs_names.iter().cloned().collect();
    let var_index: DataFrameIndex = matrix.var_names.iter().cloned().collect();
    h5_adata.set_obs_names(obs_index)?;
    h5_adata.set_var_names(var_index)?;

    h5_adata.set_x(to_f32(&matrix.data)?)?;
    info!(
        "  - Written X matrix: {}×{} with {} non-zeros",
        matrix.n_obs(),
        matrix.n_vars(),
        matrix.data.nnz()
    );

    let obs = build_obs(matrix, qc)?;
    info!(
        "  - Written obs annotations: {} rows, {} columns",
        obs.height(),
        obs.width()
    );
    h5_adata.set_obs(obs)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CountMatrix {
        let data = SparseOps::from_triplets_u32(2, 2, vec![(0, 0, 3), (1, 1, 2), (1, 0, 1)]).unwrap();
        CountMatrix::new(
            vec!["A".into(), "B".into()],
            vec!["chr1:0-500".into(), "chr1:500-1000".into()],
            data,
        )
        .unwrap()
    }

    #[test]
    fn obs_contains_qc() {
        let qc = vec![(
            "B".to_string(),
            QualityControl {
                n_fragment: 7,
                tsse: 4.5,
                ..Default::default()
            },
        )];
        let obs = build_obs(&matrix(), Some(&qc)).unwrap();
        assert_eq!(obs.height(), 2);
        assert_eq!(obs.width(), 5);
        let counts = obs.column("n_counts").unwrap().as_materialized_series().u64().unwrap();
        assert_eq!(counts.get(1), Some(3));
        let tsse = obs.column("tsse").unwrap().as_materialized_series().f64().unwrap();
        assert_eq!(tsse.get(0), Some(0.0));
        assert_eq!(tsse.get(1), Some(4.5));
    }

    #[test]
    fn float_conversion_keeps_pattern() {
        let m = to_f32(&matrix().data).unwrap();
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(1).values(), &[1.0, 2.0]);
    }

    #[test]
    fn writes_h5ad() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.h5ad");
        write_h5ad(&matrix(), None, &path).unwrap();
        assert!(path.exists());
    }
}
