use anyhow::{anyhow, Context, Result};
use fragtk_lib::genome::ChromSizes;
use fragtk_lib::pipeline::integration::read_batches;
use fragtk_lib::pipeline::preprocess::FragmentStore;
use fragtk_lib::utils;
use log::info;
use once_cell::sync::OnceCell;
use rayon::ThreadPoolBuilder;
use std::io::Write;
use std::path::{Path, PathBuf};

static GLOBAL_RAYON_THREADS: OnceCell<usize> = OnceCell::new();

/// Ensure an output path ends with a gzip-compatible extension.
///
/// If the provided path doesn't already end with `.gz` or `.gzip`, a `.gz`
/// suffix is appended to the filename while preserving the parent directory.
pub fn ensure_gz_path(path: &Path) -> PathBuf {
    if utils::is_gzipped(path) {
        return path.to_path_buf();
    }

    let mut adjusted = path.to_path_buf();
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        adjusted.set_file_name(format!("{}.gz", name));
    } else {
        adjusted.set_extension("gz");
    }
    adjusted
}

/// Configure the global Rayon thread pool exactly once, returning the active
/// worker count. Subsequent calls reuse the first configured pool and emit a
/// warning when the requested thread count differs from the established size.
pub fn configure_global_thread_pool(threads: usize) -> Result<usize> {
    let requested = utils::determine_allowed_cpus(threads)?;

    if let Some(active) = GLOBAL_RAYON_THREADS.get() {
        if *active != requested {
            log::warn!(
                "Rayon global thread pool already initialised with {} threads; ignoring request for {}",
                active,
                requested
            );
        }
        return Ok(*active);
    }

    match ThreadPoolBuilder::new()
        .num_threads(requested)
        .stack_size(2 * 1024 * 1024)
        .build_global()
    {
        Ok(_) => {
            GLOBAL_RAYON_THREADS
                .set(requested)
                .map_err(|_| anyhow!("Failed to record global Rayon thread count"))?;
            Ok(requested)
        }
        Err(err) => {
            // Another caller built the pool first.
            log::debug!("Global Rayon thread pool initialisation skipped: {}", err);
            let fallback = rayon::current_num_threads();
            if fallback != requested {
                log::warn!(
                    "Using existing Rayon pool with {} threads instead of requested {}",
                    fallback,
                    requested
                );
            }
            GLOBAL_RAYON_THREADS.set(fallback).ok();
            Ok(fallback)
        }
    }
}

pub fn load_chrom_sizes(path: &Path) -> Result<ChromSizes> {
    ChromSizes::from_file(path)
        .with_context(|| format!("Failed to read chromosome sizes from {}", path.display()))
}

/// Load an imported fragment file against the given genome.
pub fn load_store(fragments: &Path, chrom_sizes: &Path) -> Result<FragmentStore> {
    let genome = load_chrom_sizes(chrom_sizes)?;
    FragmentStore::load(fragments, genome)
        .with_context(|| format!("Failed to load fragments from {}", fragments.display()))
}

/// One barcode per line, first column of a TSV (gzip aware).
pub fn read_barcode_list(path: &Path) -> Result<Vec<String>> {
    let whitelist = fragtk_lib::fragment::BarcodeWhitelist::from_file(path)
        .with_context(|| format!("Failed to read barcodes from {}", path.display()))?;
    Ok(whitelist.barcodes().to_vec())
}

/// Write one item per line, gzip compressed when the path asks for it.
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    utils::make_parent_dirs(path)?;
    let mut writer = utils::open_for_write(path, utils::Compression::from_path(path))?;
    let mut n = 0;
    for line in lines {
        writeln!(writer, "{}", line.as_ref())?;
        n += 1;
    }
    writer.flush()?;
    Ok(n)
}

/// Restrict `store` to the barcodes listed in a `barcode<TAB>group` table and
/// return the group of every remaining cell, in store order.
pub fn group_cells(store: &mut FragmentStore, groups: &Path) -> Result<Vec<String>> {
    let table = read_batches(groups)
        .with_context(|| format!("Failed to read groups from {}", groups.display()))?;
    let keep: Vec<String> = store
        .barcodes()
        .into_iter()
        .filter(|b| table.contains_key(b))
        .collect();
    if keep.is_empty() {
        return Err(anyhow!(
            "none of the {} cells appear in {}",
            store.n_obs(),
            groups.display()
        ));
    }
    info!(
        "{} of {} cells have a group assignment",
        keep.len(),
        store.n_obs()
    );
    store.retain_barcodes(&keep);
    Ok(store
        .barcodes()
        .iter()
        .filter_map(|b| table.get(b).cloned())
        .collect())
}
