use anyhow::Result;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

/// Create parent directories for a path when missing.
pub fn make_parent_dirs<P: AsRef<Path>>(path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Detect whether a path uses a gzip/BGZF-compatible extension.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().unwrap_or_else(|| OsStr::new("")),
        ext if ext == "gz" || ext == "gzip" || ext == "bgz" || ext == "bgzf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_extensions() {
        assert!(is_gzipped("fragments.tsv.gz"));
        assert!(is_gzipped("fragments.bgz"));
        assert!(!is_gzipped("fragments.tsv"));
        assert!(!is_gzipped("fragments"));
    }

    #[test]
    fn creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("out.tsv");
        make_parent_dirs(&target).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }
}
