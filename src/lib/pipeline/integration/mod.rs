//! Batch integration of low-dimensional embeddings.
//!
//! Embeddings are exchanged as headerless TSV: barcode followed by one
//! column per dimension.

pub mod harmony;
mod kmeans;
pub mod mnc;

pub use harmony::{harmony, HarmonyOptions};
pub use mnc::{mnc_correct, MncOptions};

use crate::core::error::{FragError, Result};
use crate::core::io::{get_tsv_reader, get_writer, Compression};
use nalgebra::DMatrix;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Batch labels encoded as integers in order of first appearance.
#[derive(Debug, Clone)]
pub struct BatchLayout {
    pub names: Vec<String>,
    pub codes: Vec<usize>,
    pub sizes: Vec<usize>,
    pub proportions: Vec<f64>,
}

impl BatchLayout {
    pub fn new(batches: &[String], n_cells: usize) -> Result<Self> {
        if batches.len() != n_cells {
            return Err(FragError::DimensionMismatch {
                expected: format!("{} batch labels", n_cells),
                actual: format!("{} batch labels", batches.len()),
            });
        }
        let mut lookup: FxHashMap<&str, usize> = FxHashMap::default();
        let mut names = Vec::new();
        let mut sizes = Vec::new();
        let codes = batches
            .iter()
            .map(|b| {
                let code = *lookup.entry(b.as_str()).or_insert_with(|| {
                    names.push(b.clone());
                    sizes.push(0);
                    names.len() - 1
                });
                sizes[code] += 1;
                code
            })
            .collect();
        let proportions = sizes.iter().map(|&s| s as f64 / n_cells.max(1) as f64).collect();
        Ok(Self {
            names,
            codes,
            sizes,
            proportions,
        })
    }

    pub fn n_batches(&self) -> usize {
        self.names.len()
    }

    pub fn members(&self, batch: usize) -> Vec<usize> {
        self.codes
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == batch)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Read an embedding TSV into cell names and a dense matrix.
pub fn read_embedding<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, DMatrix<f64>)> {
    let mut reader = get_tsv_reader(path.as_ref(), false)?;
    let mut names = Vec::new();
    let mut values = Vec::new();
    let mut width: Option<usize> = None;
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let name = record
            .get(0)
            .ok_or_else(|| FragError::parse(i + 1, "missing cell name"))?;
        let row = record
            .iter()
            .skip(1)
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|e| FragError::parse(i + 1, format!("invalid value '{}': {}", v, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                return Err(FragError::parse(
                    i + 1,
                    format!("expected {} dimensions, found {}", w, row.len()),
                ))
            }
            _ => {}
        }
        names.push(name.to_string());
        values.extend(row);
    }
    let width = width.unwrap_or(0);
    if names.is_empty() || width == 0 {
        return Err(FragError::EmptyData(format!(
            "no embedding rows in {}",
            path.as_ref().display()
        )));
    }
    let n_rows = names.len();
    Ok((names, DMatrix::from_row_slice(n_rows, width, &values)))
}

pub fn write_embedding<P: AsRef<Path>>(path: P, names: &[String], data: &DMatrix<f64>) -> Result<()> {
    if names.len() != data.nrows() {
        return Err(FragError::DimensionMismatch {
            expected: format!("{} names", data.nrows()),
            actual: format!("{} names", names.len()),
        });
    }
    let path = path.as_ref();
    let mut writer = get_writer(path, Compression::from_path(path), false)?;
    for (i, name) in names.iter().enumerate() {
        let mut record = Vec::with_capacity(data.ncols() + 1);
        record.push(name.clone());
        record.extend(data.row(i).iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a two-column `barcode<TAB>batch` table.
pub fn read_batches<P: AsRef<Path>>(path: P) -> Result<FxHashMap<String, String>> {
    let mut reader = get_tsv_reader(path.as_ref(), false)?;
    let mut map = FxHashMap::default();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        match (record.get(0), record.get(1)) {
            (Some(b), Some(g)) => {
                map.insert(b.to_string(), g.to_string());
            }
            _ => return Err(FragError::parse(i + 1, "expected barcode and group columns")),
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_codes_in_first_appearance_order() {
        let batches: Vec<String> = ["x", "y", "x", "z"].iter().map(|s| s.to_string()).collect();
        let layout = BatchLayout::new(&batches, 4).unwrap();
        assert_eq!(layout.names, vec!["x", "y", "z"]);
        assert_eq!(layout.codes, vec![0, 1, 0, 2]);
        assert_eq!(layout.sizes, vec![2, 1, 1]);
        assert_eq!(layout.members(0), vec![0, 2]);
        assert!((layout.proportions[0] - 0.5).abs() < 1e-12);
        assert!(BatchLayout::new(&batches, 3).is_err());
    }

    #[test]
    fn embedding_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emb.tsv");
        let names = vec!["a".to_string(), "b".to_string()];
        let data = DMatrix::from_row_slice(2, 3, &[1.0, 2.5, -3.0, 0.0, 1e-3, 4.0]);
        write_embedding(&path, &names, &data).unwrap();
        let (n, d) = read_embedding(&path).unwrap();
        assert_eq!(n, names);
        assert_eq!(d, data);
    }

    #[test]
    fn ragged_embedding_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        std::fs::write(&path, "a\t1\t2\nb\t3\n").unwrap();
        assert!(matches!(read_embedding(&path), Err(FragError::Parse { line: 2, .. })));

        let batches = dir.path().join("batches.tsv");
        std::fs::write(&batches, "a\tb1\nb\tb2\n").unwrap();
        assert_eq!(read_batches(&batches).unwrap()["b"], "b2");
    }
}
