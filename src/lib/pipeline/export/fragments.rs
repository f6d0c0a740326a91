//! Per-group fragment files.

use crate::core::error::{FragError, Result};
use crate::core::io::{open_for_write, Compression};
use crate::fragment::Fragment;
use crate::pipeline::preprocess::{merge_by_position, CellFragments, FragmentStore};
use log::info;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ExportFragmentsOptions {
    /// Only export these groups.
    pub selections: Option<Vec<String>>,
    pub min_fragment_length: Option<u64>,
    pub max_fragment_length: Option<u64>,
    pub prefix: String,
    pub suffix: String,
    pub compression: Compression,
}

impl Default for ExportFragmentsOptions {
    fn default() -> Self {
        Self {
            selections: None,
            min_fragment_length: None,
            max_fragment_length: None,
            prefix: String::new(),
            suffix: ".tsv.gz".to_string(),
            compression: Compression::gzip(),
        }
    }
}

pub(crate) fn length_ok(f: &Fragment, min_len: Option<u64>, max_len: Option<u64>) -> bool {
    min_len.map_or(true, |m| f.len() >= m) && max_len.map_or(true, |m| f.len() <= m)
}

/// Distinct groups in first-appearance order, restricted to `selections`.
pub(crate) fn resolve_groups<'a>(
    store: &FragmentStore,
    group_by: &'a [String],
    selections: Option<&[String]>,
) -> Result<Vec<&'a str>> {
    if group_by.len() != store.n_obs() {
        return Err(FragError::DimensionMismatch {
            expected: format!("{} group labels", store.n_obs()),
            actual: format!("{} group labels", group_by.len()),
        });
    }
    let selected: Option<FxHashSet<&str>> =
        selections.map(|s| s.iter().map(|x| x.as_str()).collect());
    let mut seen = FxHashSet::default();
    Ok(group_by
        .iter()
        .map(|g| g.as_str())
        .filter(|g| seen.insert(*g))
        .filter(|g| selected.as_ref().map_or(true, |s| s.contains(g)))
        .collect())
}

/// Output file of every group, `prefix + name(group) + suffix` inside `dir`.
/// Names that are not safe as a single file name are rejected.
pub(crate) fn group_files<F>(
    groups: &[&str],
    dir: &Path,
    prefix: &str,
    suffix: &str,
    name: F,
) -> Result<BTreeMap<String, PathBuf>>
where
    F: Fn(&str) -> String,
{
    groups
        .iter()
        .map(|g| {
            let filename = format!("{}{}{}", prefix, name(g), suffix);
            if !sanitize_filename::is_sanitized(&filename) {
                return Err(FragError::InvalidInput(format!("invalid filename: {}", filename)));
            }
            Ok((g.to_string(), dir.join(filename)))
        })
        .collect()
}

/// Cells of `store` assigned to `group`, in store order.
pub(crate) fn cells_of<'a>(
    store: &'a FragmentStore,
    group_by: &'a [String],
    group: &'a str,
) -> impl Iterator<Item = &'a CellFragments> + 'a {
    store
        .cells()
        .iter()
        .zip(group_by)
        .filter(move |(_, g)| g.as_str() == group)
        .map(|(c, _)| c)
}

/// Write the fragments of each group of cells to its own file.
///
/// `group_by` assigns a group to every cell of `store`, in store order. Files
/// are named `prefix + group + suffix` inside `dir` and hold the group's
/// records sorted by genome position. Returns the file of each exported group.
pub fn export_fragments<P: AsRef<Path>>(
    store: &FragmentStore,
    group_by: &[String],
    dir: P,
    options: &ExportFragmentsOptions,
) -> Result<BTreeMap<String, PathBuf>> {
    let groups = resolve_groups(store, group_by, options.selections.as_deref())?;
    let dir = dir.as_ref();

    let files = group_files(&groups, dir, &options.prefix, &options.suffix, |g| g.to_string())?;
    std::fs::create_dir_all(dir)?;
    info!("Exporting fragments of {} groups to {}", files.len(), dir.display());

    files.par_iter().try_for_each(|(group, path)| -> Result<()> {
        let mut writer = open_for_write(path, options.compression)?;
        let mut n = 0u64;
        let records = merge_by_position(cells_of(store, group_by, group.as_str()), store.chrom_sizes());
        for (barcode, f) in records {
            if !length_ok(f, options.min_fragment_length, options.max_fragment_length) {
                continue;
            }
            writeln!(writer, "{}", f.in_cell(barcode))?;
            n += 1;
        }
        writer.flush()?;
        info!("  - {}: {} fragments", group, n);
        Ok(())
    })?;
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::open_for_read;
    use crate::genome::{ChromSizes, Strand};
    use std::io::BufRead;

    fn store() -> FragmentStore {
        let sizes: ChromSizes = [("chr1", 1_000u64)].into_iter().collect();
        let cell = |b: &str, frags: &[(u64, u64)]| CellFragments {
            barcode: b.to_string(),
            fragments: frags.iter().map(|&(s, e)| Fragment::new("chr1", s, e)).collect(),
        };
        FragmentStore::new(
            sizes,
            vec![
                cell("AAA", &[(10, 60), (100, 400)]),
                cell("CCC", &[(20, 50)]),
                cell("GGG", &[(5, 500)]),
            ],
        )
        .unwrap()
    }

    fn lines(path: &Path) -> Vec<String> {
        open_for_read(path).unwrap().lines().map(|l| l.unwrap()).collect()
    }

    #[test]
    fn writes_one_file_per_group() {
        let dir = tempfile::tempdir().unwrap();
        let groups: Vec<String> = ["t1", "t2", "t1"].iter().map(|s| s.to_string()).collect();
        let opts = ExportFragmentsOptions {
            suffix: ".tsv".into(),
            compression: Compression::None,
            max_fragment_length: Some(400),
            ..Default::default()
        };
        let files = export_fragments(&store(), &groups, dir.path().join("out"), &opts).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(lines(&files["t1"]), vec!["chr1\t10\t60\tAAA\t1", "chr1\t100\t400\tAAA\t1"]);
        assert_eq!(lines(&files["t2"]), vec!["chr1\t20\t50\tCCC\t1"]);
    }

    #[test]
    fn honours_selection_and_validates_names() {
        let dir = tempfile::tempdir().unwrap();
        let groups: Vec<String> = ["t1", "t2", "t1"].iter().map(|s| s.to_string()).collect();
        let opts = ExportFragmentsOptions {
            selections: Some(vec!["t2".into()]),
            ..Default::default()
        };
        let files = export_fragments(&store(), &groups, dir.path(), &opts).unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["t2"]);

        let bad: Vec<String> = ["a/b", "t2", "t1"].iter().map(|s| s.to_string()).collect();
        assert!(export_fragments(&store(), &bad, dir.path(), &ExportFragmentsOptions::default()).is_err());

        let short = vec!["t1".to_string()];
        assert!(matches!(
            export_fragments(&store(), &short, dir.path(), &opts),
            Err(FragError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn group_files_are_sorted_and_stranded() {
        let sizes: ChromSizes = [("chr1", 1_000u64)].into_iter().collect();
        let stranded = |s: u64, e: u64, strand| {
            let mut f = Fragment::new("chr1", s, e);
            f.strand = strand;
            f
        };
        let store = FragmentStore::new(
            sizes,
            vec![
                CellFragments {
                    barcode: "AAA".into(),
                    fragments: vec![stranded(10, 60, None), stranded(300, 400, Some(Strand::Reverse))],
                },
                CellFragments {
                    barcode: "CCC".into(),
                    fragments: vec![stranded(20, 50, Some(Strand::Forward))],
                },
            ],
        )
        .unwrap();
        let groups = vec!["g".to_string(), "g".to_string()];
        let dir = tempfile::tempdir().unwrap();
        let opts = ExportFragmentsOptions {
            suffix: ".tsv".into(),
            compression: Compression::None,
            ..Default::default()
        };
        let files = export_fragments(&store, &groups, dir.path(), &opts).unwrap();
        assert_eq!(
            lines(&files["g"]),
            vec![
                "chr1\t10\t60\tAAA\t1",
                "chr1\t20\t50\tCCC\t1\t+",
                "chr1\t300\t400\tAAA\t1\t-",
            ]
        );
    }
}
