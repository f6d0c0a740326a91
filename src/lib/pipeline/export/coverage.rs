//! Binned coverage tracks (bedGraph or BigWig) per group of cells.

use super::fragments::{cells_of, group_files, length_ok, resolve_groups};
use crate::core::error::{FragError, Result};
use crate::core::io::{open_for_write, Compression};
use crate::engine::par_granges::{ParGranges, RegionProcessor, CHUNKSIZE};
use crate::fragment::Fragment;
use crate::genome::{ChromSizes, RegionIndex};
use crate::pipeline::matrix::CountingStrategy;
use crate::pipeline::preprocess::FragmentStore;
use bed_utils::bed::{merge_sorted_bedgraph, BEDLike, GenomicRange};
use bigtools::BigWigWrite;
use log::{debug, info, warn};
use rayon::prelude::*;
use rust_lapper::{Interval, Lapper};
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use bed_utils::bed::BedGraph;

/// File format of coverage tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageOutputFormat {
    BedGraph,
    BigWig,
}

impl CoverageOutputFormat {
    /// File name suffix used when none is given.
    pub fn default_suffix(&self) -> &'static str {
        match self {
            CoverageOutputFormat::BedGraph => ".bedgraph.gz",
            CoverageOutputFormat::BigWig => ".bw",
        }
    }
}

impl FromStr for CoverageOutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BEDGRAPH" => Ok(CoverageOutputFormat::BedGraph),
            "BIGWIG" | "BW" => Ok(CoverageOutputFormat::BigWig),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Scaling applied to raw bin counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Reads per kilobase per million: count / (N * bin / 1e9).
    RPKM,
    /// Counts per million: count / (N / 1e6).
    CPM,
    /// Bins per million: count / (sum of all bin counts / 1e6).
    BPM,
    /// Reads per genomic content: count / (N * mean length / effective genome size).
    RPGC,
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RPKM" => Ok(Normalization::RPKM),
            "CPM" => Ok(Normalization::CPM),
            "BPM" => Ok(Normalization::BPM),
            "RPGC" => Ok(Normalization::RPGC),
            _ => Err(format!("unknown normalization method: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverageOptions {
    pub selections: Option<Vec<String>>,
    /// Bin size in bp.
    pub resolution: u64,
    pub blacklist: Option<RegionIndex<()>>,
    pub normalization: Option<Normalization>,
    /// Only records overlapping these regions count towards N.
    pub include_for_norm: Option<RegionIndex<()>>,
    /// Records overlapping these regions never count towards N.
    pub exclude_for_norm: Option<RegionIndex<()>>,
    /// Used by RPGC; defaults to the total genome length.
    pub effective_genome_size: Option<u64>,
    pub min_fragment_length: Option<u64>,
    pub max_fragment_length: Option<u64>,
    pub counting_strategy: CountingStrategy,
    /// Box smoothing window in bp.
    pub smooth_length: Option<u64>,
    pub prefix: String,
    pub suffix: String,
    pub format: CoverageOutputFormat,
    /// bedGraph only; BigWig files carry their own compression.
    pub compression: Compression,
    pub threads: Option<usize>,
    /// Base pairs per parallel work unit, rounded up to whole bins.
    pub chunksize: u64,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            selections: None,
            resolution: 1,
            blacklist: None,
            normalization: Some(Normalization::RPKM),
            include_for_norm: None,
            exclude_for_norm: None,
            effective_genome_size: None,
            min_fragment_length: None,
            max_fragment_length: Some(2000),
            counting_strategy: CountingStrategy::Fragment,
            smooth_length: None,
            prefix: String::new(),
            suffix: CoverageOutputFormat::BedGraph.default_suffix().to_string(),
            format: CoverageOutputFormat::BedGraph,
            compression: Compression::gzip(),
            threads: None,
            chunksize: CHUNKSIZE,
        }
    }
}

/// Bin-aligned run produced by the coverage processor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct BinRun {
    tid: u32,
    start: u64,
    end: u64,
    value: f64,
}

/// Expand a range to the bin grid: start floored, end ceiled.
fn fit_to_bin(start: u64, end: u64, bin_size: u64) -> (u64, u64) {
    if bin_size <= 1 {
        return (start, end);
    }
    let s = start - start % bin_size;
    let e = if end % bin_size == 0 { end } else { end + bin_size - end % bin_size };
    (s, e)
}

/// For a run of bins `[start, end)`, every output bin whose window reaches the
/// run together with the number of run bins inside that window. `ext_left` and
/// `ext_right` are how far the run's influence extends on each side.
fn extend(start: u64, end: u64, ext_left: u64, ext_right: u64) -> impl Iterator<Item = (u64, u64)> {
    let max = (end - start).min(ext_left + ext_right + 1);
    let s = start as i64 - ext_left as i64;
    let e = (end + ext_right) as i64;
    (s..e).filter(|&i| i >= 0).map(move |i| {
        let n = ((i - s + 1) as u64).min((e - i) as u64).min(max);
        (i as u64, n)
    })
}

/// Binned records of one group, ready to be turned into coverage.
struct BinnedRecords {
    per_chrom: Vec<Lapper<u64, ()>>,
    /// Records counted for normalisation.
    n_norm: u64,
    /// Sum of raw bin values over the genome.
    total_bin_value: u64,
    total_len: u64,
    n_records: u64,
}

impl BinnedRecords {
    fn build<'a, I>(cells: I, chrom_sizes: &ChromSizes, options: &CoverageOptions) -> Self
    where
        I: Iterator<Item = &'a [Fragment]>,
    {
        let res = options.resolution.max(1);
        let mut per_chrom: Vec<Vec<Interval<u64, ()>>> = vec![Vec::new(); chrom_sizes.len()];
        let (mut n_norm, mut total_bin_value, mut total_len, mut n_records) = (0, 0, 0, 0);

        for frags in cells {
            for f in frags {
                if !length_ok(f, options.min_fragment_length, options.max_fragment_length) {
                    continue;
                }
                let (tid, chrom_len) = match (chrom_sizes.id_of(&f.chrom), chrom_sizes.get(&f.chrom)) {
                    (Some(t), Some(l)) => (t, l),
                    _ => continue,
                };
                let records: SmallVec<[(u64, u64); 2]> = match options.counting_strategy {
                    CountingStrategy::Fragment => smallvec::smallvec![(f.start, f.end)],
                    CountingStrategy::Insertion | CountingStrategy::PairedInsertion => {
                        f.insertion_sites().iter().map(|&p| (p, p + 1)).collect()
                    }
                };
                let mut fitted: SmallVec<[(u64, u64); 2]> = SmallVec::new();
                for (start, end) in records {
                    if options
                        .blacklist
                        .as_ref()
                        .map_or(false, |bl| bl.is_overlapped(&f.chrom, start, end))
                    {
                        continue;
                    }
                    if options
                        .include_for_norm
                        .as_ref()
                        .map_or(true, |x| x.is_overlapped(&f.chrom, start, end))
                        && !options
                            .exclude_for_norm
                            .as_ref()
                            .map_or(false, |x| x.is_overlapped(&f.chrom, start, end))
                    {
                        n_norm += 1;
                    }
                    total_len += end - start;
                    n_records += 1;

                    let (s, e) = fit_to_bin(start, end, res);
                    if s >= chrom_len {
                        continue;
                    }
                    let e = e.min(chrom_len);
                    if options.counting_strategy == CountingStrategy::PairedInsertion
                        && fitted.iter().any(|&(fs, _)| fs == s)
                    {
                        continue;
                    }
                    fitted.push((s, e));
                }
                for (s, e) in fitted {
                    total_bin_value += (e - s + res - 1) / res;
                    per_chrom[tid].push(Interval { start: s, stop: e, val: () });
                }
            }
        }

        BinnedRecords {
            per_chrom: per_chrom.into_iter().map(Lapper::new).collect(),
            n_norm,
            total_bin_value,
            total_len,
            n_records,
        }
    }

    /// Divisor turning raw bin counts into normalised values, or `None` when
    /// no record counts towards the normalisation.
    fn norm_factor(&self, options: &CoverageOptions, chrom_sizes: &ChromSizes) -> Option<f64> {
        let n = self.n_norm as f64;
        let factor = match options.normalization {
            None => return Some(1.0),
            Some(Normalization::RPKM) => n * options.resolution.max(1) as f64 / 1e9,
            Some(Normalization::CPM) => n / 1e6,
            Some(Normalization::BPM) => self.total_bin_value as f64 / 1e6,
            Some(Normalization::RPGC) => {
                let mean_len = if self.n_records > 0 {
                    self.total_len as f64 / self.n_records as f64
                } else {
                    0.0
                };
                let genome = options
                    .effective_genome_size
                    .unwrap_or_else(|| chrom_sizes.total_len()) as f64;
                n * mean_len / genome
            }
        };
        Some(factor).filter(|f| *f > 0.0 && f.is_finite())
    }
}

/// Window of `left` bins before and `right` bins after each output bin.
fn smoothing_window(smooth_length: Option<u64>, resolution: u64) -> Option<(u64, u64)> {
    let bins = smooth_length? / resolution.max(1);
    let bins = if bins % 2 == 0 { bins + 1 } else { bins };
    if bins <= 1 {
        return None;
    }
    let left = (bins - 1) / 2;
    Some((left, bins - 1 - left))
}

/// Computes normalised, optionally smoothed bin values for one region of one
/// group. Regions must start on the bin grid.
struct CoverageProcessor {
    records: Vec<Lapper<u64, ()>>,
    chrom_lens: Vec<u64>,
    resolution: u64,
    scale: f64,
    window: Option<(u64, u64)>,
}

impl CoverageProcessor {
    fn raw_bins(&self, tid: usize, w0: u64, w1: u64) -> Vec<f64> {
        let res = self.resolution;
        let mut diff = vec![0i64; (w1 - w0 + 1) as usize];
        for iv in self.records[tid].find(w0 * res, w1 * res) {
            let b0 = (iv.start / res).max(w0);
            let b1 = ((iv.stop + res - 1) / res).min(w1);
            if b0 < b1 {
                diff[(b0 - w0) as usize] += 1;
                diff[(b1 - w0) as usize] -= 1;
            }
        }
        let mut acc = 0i64;
        diff[..(w1 - w0) as usize]
            .iter()
            .map(|d| {
                acc += d;
                acc as f64
            })
            .collect()
    }
}

impl RegionProcessor for CoverageProcessor {
    type P = BinRun;

    fn process_region(&self, tid: u32, start: u64, stop: u64) -> Vec<BinRun> {
        let res = self.resolution;
        let chrom_len = self.chrom_lens[tid as usize];
        let n_bins = (chrom_len + res - 1) / res;
        let b0 = start / res;
        let b1 = ((stop + res - 1) / res).min(n_bins);
        if b0 >= b1 {
            return Vec::new();
        }

        let values: Vec<f64> = match self.window {
            None => self.raw_bins(tid as usize, b0, b1),
            Some((left, right)) => {
                let w0 = b0.saturating_sub(left);
                let w1 = (b1 + right).min(n_bins);
                let raw = self.raw_bins(tid as usize, w0, w1);
                let mut acc = vec![0.0; (b1 - b0) as usize];
                let mut i = 0;
                while i < raw.len() {
                    let mut j = i + 1;
                    while j < raw.len() && raw[j] == raw[i] {
                        j += 1;
                    }
                    if raw[i] != 0.0 {
                        let (rs, re) = (w0 + i as u64, w0 + j as u64);
                        for (bin, n) in extend(rs, re, right, left) {
                            if bin >= b0 && bin < b1 {
                                acc[(bin - b0) as usize] += raw[i] * n as f64;
                            }
                        }
                    }
                    i = j;
                }
                acc.iter()
                    .enumerate()
                    .map(|(k, v)| {
                        let bin = b0 + k as u64;
                        let lo = bin.saturating_sub(left);
                        let hi = (bin + right + 1).min(n_bins);
                        v / (hi - lo) as f64
                    })
                    .collect()
            }
        };

        let mut runs: Vec<BinRun> = Vec::new();
        for (k, v) in values.into_iter().enumerate() {
            if v == 0.0 {
                continue;
            }
            let value = v / self.scale;
            let bin = b0 + k as u64;
            let (s, e) = (bin * res, ((bin + 1) * res).min(chrom_len));
            match runs.last_mut() {
                Some(last) if last.end == s && last.value == value => last.end = e,
                _ => runs.push(BinRun { tid, start: s, end: e, value }),
            }
        }
        runs
    }
}

/// Runs in genome order as bedGraph records, touching runs of equal value merged.
fn to_bedgraph(mut runs: Vec<BinRun>, chrom_sizes: &ChromSizes) -> Vec<BedGraph<f64>> {
    runs.sort_by(|a, b| a.tid.cmp(&b.tid).then(a.start.cmp(&b.start)));
    let records = runs.into_iter().filter_map(|r| {
        chrom_sizes
            .name_of(r.tid as usize)
            .map(|chrom| BedGraph::from_bed(&GenomicRange::new(chrom, r.start, r.end), r.value))
    });
    merge_sorted_bedgraph(records).collect()
}

/// Build the per-group processor. `None` means nothing in the group counts
/// towards the requested normalisation.
fn build_processor<'a, I>(
    cells: I,
    chrom_sizes: &ChromSizes,
    options: &CoverageOptions,
) -> Result<Option<CoverageProcessor>>
where
    I: Iterator<Item = &'a [Fragment]>,
{
    if options.resolution == 0 {
        return Err(FragError::InvalidInput("resolution must be positive".to_string()));
    }
    let binned = BinnedRecords::build(cells, chrom_sizes, options);
    let scale = match binned.norm_factor(options, chrom_sizes) {
        Some(scale) => scale,
        None => return Ok(None),
    };
    debug!(
        "{} records, {} counted for normalization, scale {}",
        binned.n_records, binned.n_norm, scale
    );
    Ok(Some(CoverageProcessor {
        records: binned.per_chrom,
        chrom_lens: chrom_sizes.iter().map(|(_, l)| l).collect(),
        resolution: options.resolution,
        scale,
        window: smoothing_window(options.smooth_length, options.resolution),
    }))
}

/// Coverage of a set of fragments, computed chromosome by chromosome on the
/// calling thread. Empty when no record counts towards the normalisation.
pub fn create_bedgraph(
    fragments: &[Fragment],
    chrom_sizes: &ChromSizes,
    options: &CoverageOptions,
) -> Result<Vec<BedGraph<f64>>> {
    let processor = match build_processor(std::iter::once(fragments), chrom_sizes, options)? {
        Some(p) => p,
        None => {
            warn!("No records available for normalization; coverage is empty");
            return Ok(Vec::new());
        }
    };
    let runs = chrom_sizes
        .iter()
        .enumerate()
        .flat_map(|(tid, (_, len))| processor.process_region(tid as u32, 0, len))
        .collect();
    Ok(to_bedgraph(runs, chrom_sizes))
}

/// Write bedGraph records as a BigWig file over the chromosomes of `chrom_sizes`.
pub fn write_bigwig<P: AsRef<Path>>(
    bedgraph: Vec<BedGraph<f64>>,
    chrom_sizes: &ChromSizes,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let chroms: HashMap<String, u32> = chrom_sizes
        .iter()
        .map(|(name, len)| (name.to_string(), len as u32))
        .collect();
    let values = bedgraph.into_iter().map(|x| {
        let value = bigtools::Value {
            start: x.start() as u32,
            end: x.end() as u32,
            value: x.value as f32,
        };
        Ok::<_, bigtools::bed::bedparser::BedValueError>((x.chrom().to_string(), value))
    });
    let runtime = tokio::runtime::Runtime::new()?;
    BigWigWrite::create_file(path.to_string_lossy().to_string(), chroms)
        .map_err(|e| FragError::DataProcessing(format!("cannot create {}: {:?}", path.display(), e)))?
        .write(
            bigtools::beddata::BedParserStreamingIterator::wrap_iter(values, true),
            runtime,
        )
        .map_err(|e| FragError::DataProcessing(format!("cannot write {}: {:?}", path.display(), e)))?;
    Ok(())
}

fn write_track(
    bedgraph: Vec<BedGraph<f64>>,
    chrom_sizes: &ChromSizes,
    path: &Path,
    options: &CoverageOptions,
) -> Result<()> {
    match options.format {
        CoverageOutputFormat::BedGraph => {
            let mut writer = open_for_write(path, options.compression)?;
            for record in &bedgraph {
                writeln!(writer, "{}", record)?;
            }
            writer.flush()?;
            Ok(())
        }
        CoverageOutputFormat::BigWig => write_bigwig(bedgraph, chrom_sizes, path),
    }
}

/// Write a coverage track for each group of cells.
///
/// Output files are named `prefix + group + suffix` with `/` in group names
/// replaced by `+`. A group with nothing to normalise by gets an empty track.
/// Returns the file of each exported group.
pub fn export_coverage<P: AsRef<Path>>(
    store: &FragmentStore,
    group_by: &[String],
    dir: P,
    options: &CoverageOptions,
) -> Result<BTreeMap<String, PathBuf>> {
    let groups = resolve_groups(store, group_by, options.selections.as_deref())?;
    let dir = dir.as_ref();
    let files = group_files(&groups, dir, &options.prefix, &options.suffix, |g| g.replace('/', "+"))?;
    std::fs::create_dir_all(dir)?;

    let chrom_sizes = store.chrom_sizes();
    let res = options.resolution.max(1);
    let chunksize = (options.chunksize.max(1) + res - 1) / res * res;
    let total_threads = options.threads.unwrap_or_else(num_cpus::get).max(1);
    let threads_per_group = (total_threads / files.len().max(1)).max(1);
    info!(
        "Creating coverage tracks for {} groups at {} bp resolution",
        files.len(),
        res
    );

    files.par_iter().try_for_each(|(group, path)| -> Result<()> {
        let cells = cells_of(store, group_by, group.as_str()).map(|c| c.fragments.as_slice());
        let processor = match build_processor(cells, chrom_sizes, options)? {
            Some(p) => p,
            None => {
                warn!("  - {}: no records available for normalization, writing an empty track", group);
                return write_track(Vec::new(), chrom_sizes, path, options);
            }
        };
        let runner = ParGranges::new(
            chrom_sizes.clone(),
            None,
            false,
            Some(threads_per_group),
            Some(chunksize),
            None,
            processor,
        )?;
        let runs: Vec<BinRun> = runner.process()?.into_iter().collect();
        let bedgraph = to_bedgraph(runs, chrom_sizes);
        info!("  - {}: {} bedGraph records", group, bedgraph.len());
        write_track(bedgraph, chrom_sizes, path, options)
    })?;
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::open_for_read;
    use crate::genome::GenomicRange;
    use crate::pipeline::preprocess::CellFragments;
    use std::io::BufRead;

    fn fragments() -> Vec<Fragment> {
        [(0, 10), (3, 13), (5, 41), (8, 18), (15, 25), (22, 24), (23, 33), (29, 40)]
            .iter()
            .map(|&(s, e)| Fragment::new("chr1", s, e))
            .collect()
    }

    fn raw(resolution: u64) -> CoverageOptions {
        CoverageOptions {
            resolution,
            normalization: None,
            max_fragment_length: None,
            ..Default::default()
        }
    }

    fn values(bg: &[BedGraph<f64>]) -> Vec<f64> {
        bg.iter().map(|x| x.value).collect()
    }

    #[test]
    fn binned_coverage() {
        let genome: ChromSizes = [("chr1", 50u64)].into_iter().collect();
        let out = create_bedgraph(&fragments(), &genome, &raw(3)).unwrap();
        assert_eq!(values(&out), vec![1.0, 3.0, 4.0, 3.0, 2.0, 4.0, 3.0, 2.0]);
        assert_eq!((out[0].start(), out[0].end()), (0, 3));
        assert_eq!(out.last().unwrap().end(), 42);

        let out = create_bedgraph(&fragments(), &genome, &raw(5)).unwrap();
        assert_eq!(values(&out), vec![2.0, 4.0, 3.0, 4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn clips_to_chromosome_end() {
        let genome: ChromSizes = [("chr1", 40u64)].into_iter().collect();
        let out = create_bedgraph(&fragments(), &genome, &raw(5)).unwrap();
        assert_eq!(out.last().unwrap().end(), 40);
        assert_eq!(out.last().unwrap().value, 2.0);
    }

    #[test]
    fn blacklist_and_normalization() {
        let genome: ChromSizes = [("chr1", 50u64)].into_iter().collect();
        let mut opts = raw(1);
        opts.blacklist = Some(RegionIndex::from_ranges(
            vec![(GenomicRange::new("chr1", 0, 4), ())],
            true,
        ));
        opts.normalization = Some(Normalization::CPM);
        let out = create_bedgraph(&fragments(), &genome, &opts).unwrap();
        // Two fragments overlap the blacklist; six remain.
        assert_eq!(out[0].start(), 5);
        assert!((out[0].value - 1e6 / 6.0).abs() < 1e-6);

        opts.exclude_for_norm = Some(RegionIndex::from_ranges(
            vec![(GenomicRange::new("chr1", 20, 50), ())],
            true,
        ));
        // Only chr1:8-18 stays clear of the excluded region.
        let out = create_bedgraph(&fragments(), &genome, &opts).unwrap();
        assert!((out[0].value - 1e6).abs() < 1e-6);
    }

    #[test]
    fn bpm_and_rpgc_scale() {
        let genome: ChromSizes = [("chr1", 100u64)].into_iter().collect();
        let frags = vec![Fragment::new("chr1", 0, 10), Fragment::new("chr1", 20, 30)];
        let mut opts = raw(10);
        opts.normalization = Some(Normalization::BPM);
        let out = create_bedgraph(&frags, &genome, &opts).unwrap();
        assert!((out[0].value - 1e6 / 2.0).abs() < 1e-6);

        opts.normalization = Some(Normalization::RPGC);
        opts.effective_genome_size = Some(40);
        let out = create_bedgraph(&frags, &genome, &opts).unwrap();
        // N = 2, mean length 10: 20 bp over a 40 bp genome.
        assert!((out[0].value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn extend_counts() {
        assert_eq!(
            extend(15, 17, 2, 2).collect::<Vec<_>>(),
            vec![(13, 1), (14, 2), (15, 2), (16, 2), (17, 2), (18, 1)]
        );
        assert_eq!(
            extend(10, 20, 2, 4).collect::<Vec<_>>(),
            vec![
                (8, 1), (9, 2), (10, 3), (11, 4), (12, 5), (13, 6), (14, 7),
                (15, 7), (16, 7), (17, 7), (18, 6), (19, 5), (20, 4), (21, 3), (22, 2), (23, 1)
            ]
        );
        assert_eq!(extend(0, 1, 2, 0).collect::<Vec<_>>(), vec![(0, 1)]);
    }

    #[test]
    fn smoothing_averages_neighbours() {
        let genome: ChromSizes = [("chr1", 10u64)].into_iter().collect();
        let mut opts = raw(1);
        opts.smooth_length = Some(3);
        let out = create_bedgraph(&[Fragment::new("chr1", 4, 5)], &genome, &opts).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start(), out[0].end()), (3, 6));
        assert!((out[0].value - 1.0 / 3.0).abs() < 1e-12);

        let out = create_bedgraph(&[Fragment::new("chr1", 0, 1)], &genome, &opts).unwrap();
        assert_eq!(values(&out), vec![0.5, 1.0 / 3.0]);
    }

    #[test]
    fn insertion_strategies() {
        let genome: ChromSizes = [("chr1", 100u64)].into_iter().collect();
        let frags = vec![Fragment::new("chr1", 2, 8)];
        let mut opts = raw(10);
        opts.counting_strategy = CountingStrategy::Insertion;
        let out = create_bedgraph(&frags, &genome, &opts).unwrap();
        assert_eq!(values(&out), vec![2.0]);
        opts.counting_strategy = CountingStrategy::PairedInsertion;
        let out = create_bedgraph(&frags, &genome, &opts).unwrap();
        assert_eq!(values(&out), vec![1.0]);
    }

    #[test]
    fn parallel_export_matches_serial() {
        let genome: ChromSizes = [("chr1", 3_000_000u64), ("chr2", 50)].into_iter().collect();
        let mut frags = fragments();
        frags.push(Fragment::new("chr1", 999_990, 1_000_020));
        frags.push(Fragment::new("chr2", 10, 20));
        let store = FragmentStore::new(
            genome.clone(),
            vec![
                CellFragments { barcode: "A".into(), fragments: frags.clone() },
                CellFragments { barcode: "B".into(), fragments: vec![Fragment::new("chr1", 0, 5)] },
            ],
        )
        .unwrap();
        let groups = vec!["x/y".to_string(), "z".to_string()];
        let dir = tempfile::tempdir().unwrap();
        let opts = CoverageOptions {
            resolution: 7,
            suffix: ".bdg".into(),
            compression: Compression::None,
            threads: Some(2),
            chunksize: 1_000,
            ..raw(7)
        };
        let files = export_coverage(&store, &groups, dir.path(), &opts).unwrap();
        assert!(files["x/y"].ends_with("x+y.bdg"));

        let expected: Vec<String> = create_bedgraph(&frags, &genome, &opts)
            .unwrap()
            .iter()
            .map(|r| r.to_string())
            .collect();
        let written: Vec<String> = open_for_read(&files["x/y"]).unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(written, expected);
    }

    #[test]
    fn group_without_normalizable_records_gets_empty_track() {
        let genome: ChromSizes = [("chr1", 10_000u64)].into_iter().collect();
        let store = FragmentStore::new(
            genome,
            vec![
                CellFragments { barcode: "A".into(), fragments: vec![Fragment::new("chr1", 100, 300)] },
                CellFragments { barcode: "B".into(), fragments: vec![Fragment::new("chr1", 0, 5_000)] },
            ],
        )
        .unwrap();
        let groups = vec!["kept".to_string(), "too_long".to_string()];
        let dir = tempfile::tempdir().unwrap();
        let opts = CoverageOptions {
            resolution: 100,
            normalization: Some(Normalization::CPM),
            suffix: ".bdg".into(),
            compression: Compression::None,
            ..Default::default()
        };
        let files = export_coverage(&store, &groups, dir.path(), &opts).unwrap();
        assert_eq!(std::fs::read_to_string(&files["too_long"]).unwrap(), "");
        let kept: Vec<String> = open_for_read(&files["kept"]).unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(kept.len(), 1);
        let fields: Vec<&str> = kept[0].split('\t').collect();
        assert_eq!(&fields[..3], &["chr1", "100", "300"]);
        assert!((fields[3].parse::<f64>().unwrap() - 1e6).abs() < 1e-6);
    }

    #[test]
    fn stranded_reads_count_one_insertion() {
        let genome: ChromSizes = [("chr1", 100u64)].into_iter().collect();
        let mut rev = Fragment::new("chr1", 10, 40);
        rev.strand = Some(crate::genome::Strand::Reverse);
        let mut fwd = Fragment::new("chr1", 50, 80);
        fwd.strand = Some(crate::genome::Strand::Forward);
        let mut opts = raw(1);
        opts.counting_strategy = CountingStrategy::Insertion;
        let out = create_bedgraph(&[rev, fwd], &genome, &opts).unwrap();
        let sites: Vec<(u64, u64)> = out.iter().map(|x| (x.start(), x.end())).collect();
        assert_eq!(sites, vec![(39, 40), (50, 51)]);
        assert_eq!(values(&out), vec![1.0, 1.0]);
    }

    #[test]
    fn bigwig_tracks() {
        let genome: ChromSizes = [("chr1", 1_000u64), ("chr2", 500)].into_iter().collect();
        let store = FragmentStore::new(
            genome,
            vec![CellFragments {
                barcode: "A".into(),
                fragments: vec![Fragment::new("chr1", 0, 100), Fragment::new("chr2", 10, 20)],
            }],
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let opts = CoverageOptions {
            resolution: 10,
            format: CoverageOutputFormat::BigWig,
            suffix: CoverageOutputFormat::BigWig.default_suffix().into(),
            ..raw(10)
        };
        let files = export_coverage(&store, &["g".to_string()], dir.path(), &opts).unwrap();
        assert!(files["g"].ends_with("g.bw"));
        let bytes = std::fs::read(&files["g"]).unwrap();
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(magic, 0x888F_FC26);
    }

    #[test]
    fn normalization_names() {
        assert_eq!("rpkm".parse::<Normalization>().unwrap(), Normalization::RPKM);
        assert!("tpm".parse::<Normalization>().is_err());
        assert_eq!("bigwig".parse::<CoverageOutputFormat>().unwrap(), CoverageOutputFormat::BigWig);
        assert_eq!("bedGraph".parse::<CoverageOutputFormat>().unwrap(), CoverageOutputFormat::BedGraph);
        assert!("wig".parse::<CoverageOutputFormat>().is_err());
    }
}
