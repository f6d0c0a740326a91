use crate::core::error::{FragError, Result};
use crate::core::io::get_tsv_reader;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Ordered chromosome lengths. Iteration follows insertion order, which for
/// files is the order of the rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromSizes {
    names: Vec<String>,
    lengths: Vec<u64>,
    index: FxHashMap<String, usize>,
}

impl ChromSizes {
    /// Read a two-column `chrom<TAB>length` file (gzip aware). Extra columns
    /// are ignored.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FragError::FileNotFound(path.display().to_string()));
        }
        let mut reader = get_tsv_reader(path, false)?;
        let mut sizes = ChromSizes::default();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let name = record
                .get(0)
                .ok_or_else(|| FragError::parse(i + 1, "missing chromosome name"))?;
            let len = record
                .get(1)
                .ok_or_else(|| FragError::parse(i + 1, "missing chromosome length"))?
                .trim()
                .parse::<u64>()
                .map_err(|e| FragError::parse(i + 1, format!("invalid length: {}", e)))?;
            sizes.insert(name, len);
        }
        if sizes.is_empty() {
            return Err(FragError::EmptyData(format!(
                "no chromosomes in {}",
                path.display()
            )));
        }
        Ok(sizes)
    }

    /// Add a chromosome, replacing the length when it already exists.
    pub fn insert(&mut self, name: &str, len: u64) {
        match self.index.get(name) {
            Some(&i) => self.lengths[i] = len,
            None => {
                self.index.insert(name.to_string(), self.names.len());
                self.names.push(name.to_string());
                self.lengths.push(len);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|&i| self.lengths[i])
    }

    /// Position of a chromosome in file order.
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn total_len(&self) -> u64 {
        self.lengths.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.names
            .iter()
            .map(|s| s.as_str())
            .zip(self.lengths.iter().copied())
    }

    /// Copy without the listed chromosomes.
    pub fn without(&self, exclude: &[String]) -> ChromSizes {
        self.iter()
            .filter(|(name, _)| !exclude.iter().any(|e| e == name))
            .collect()
    }
}

impl<'a> FromIterator<(&'a str, u64)> for ChromSizes {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        let mut sizes = ChromSizes::default();
        for (name, len) in iter {
            sizes.insert(name, len);
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hg.sizes");
        std::fs::write(&path, "chr2\t200\nchr1\t100\nchrM\t16\n").unwrap();
        let sizes = ChromSizes::from_file(&path).unwrap();
        let names: Vec<&str> = sizes.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["chr2", "chr1", "chrM"]);
        assert_eq!(sizes.get("chr1"), Some(100));
        assert_eq!(sizes.total_len(), 316);
        assert_eq!(sizes.id_of("chrM"), Some(2));
    }

    #[test]
    fn rejects_bad_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.sizes");
        std::fs::write(&path, "chr1\tabc\n").unwrap();
        assert!(matches!(
            ChromSizes::from_file(&path),
            Err(FragError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn exclusion() {
        let sizes: ChromSizes = [("chr1", 10), ("chrM", 5)].into_iter().collect();
        let nuclear = sizes.without(&["chrM".to_string()]);
        assert_eq!(nuclear.len(), 1);
        assert!(!nuclear.contains("chrM"));
    }
}
