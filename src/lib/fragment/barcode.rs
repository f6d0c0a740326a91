//! Cell barcode whitelists

use crate::core::error::{FragError, Result};
use crate::core::io::open_for_read;
use rustc_hash::FxHashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// Ordered set of accepted cell barcodes.
#[derive(Debug, Clone, Default)]
pub struct BarcodeWhitelist {
    ordered_barcodes: Arc<Vec<String>>,
    barcode_to_id: Arc<FxHashMap<String, u32>>,
}

impl BarcodeWhitelist {
    /// Load one barcode per line (first column), gzip aware. Duplicates keep
    /// their first position.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FragError::FileNotFound(path.display().to_string()));
        }
        let reader = open_for_read(path)?;
        let mut barcodes = Vec::with_capacity(1024);
        for line in reader.lines() {
            let line = line?;
            if let Some(barcode) = line.split('\t').next().map(str::trim) {
                if !barcode.is_empty() && !barcode.starts_with('#') {
                    barcodes.push(barcode.to_string());
                }
            }
        }
        Ok(Self::from_vec(barcodes))
    }

    /// Build from an explicit list, preserving order.
    pub fn from_vec(barcodes: Vec<String>) -> Self {
        let mut ordered = Vec::with_capacity(barcodes.len());
        let mut index = FxHashMap::with_capacity_and_hasher(barcodes.len(), Default::default());
        for barcode in barcodes {
            if !index.contains_key(&barcode) {
                index.insert(barcode.clone(), ordered.len() as u32);
                ordered.push(barcode);
            }
        }
        BarcodeWhitelist {
            ordered_barcodes: Arc::new(ordered),
            barcode_to_id: Arc::new(index),
        }
    }

    #[inline]
    pub fn is_valid(&self, barcode: &str) -> bool {
        self.barcode_to_id.contains_key(barcode)
    }

    #[inline]
    pub fn id_of(&self, barcode: &str) -> Option<u32> {
        self.barcode_to_id.get(barcode).copied()
    }

    #[inline]
    pub fn barcode_by_id(&self, id: u32) -> Option<&str> {
        self.ordered_barcodes.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.ordered_barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_barcodes.is_empty()
    }

    pub fn barcodes(&self) -> &[String] {
        self.ordered_barcodes.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_and_keeps_order() {
        let wl = BarcodeWhitelist::from_vec(vec![
            "C".to_string(),
            "A".to_string(),
            "C".to_string(),
        ]);
        assert_eq!(wl.barcodes(), &["C".to_string(), "A".to_string()]);
        assert_eq!(wl.id_of("A"), Some(1));
        assert_eq!(wl.barcode_by_id(0), Some("C"));
        assert!(!wl.is_valid("B"));
    }

    #[test]
    fn reads_first_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.tsv");
        std::fs::write(&path, "AAAC-1\t500\n\nTTTG-1\t20\n").unwrap();
        let wl = BarcodeWhitelist::from_file(&path).unwrap();
        assert_eq!(wl.len(), 2);
        assert!(wl.is_valid("TTTG-1"));
    }
}
