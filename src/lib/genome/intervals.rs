//! Per-chromosome interval indexes backed by `rust_lapper`.

use crate::core::error::{FragError, Result};
use crate::core::io::open_for_read;
use crate::genome::GenomicRange;
use bio::io::bed;
use rust_lapper::{Interval, Lapper};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Overlap index over a set of genomic regions, each carrying a value.
#[derive(Debug, Clone)]
pub struct RegionIndex<T: Eq + Clone + Send + Sync> {
    chroms: FxHashMap<String, Lapper<u64, T>>,
    len: usize,
}

impl<T: Eq + Clone + Send + Sync> RegionIndex<T> {
    pub fn from_ranges<I>(ranges: I, merge: bool) -> Self
    where
        I: IntoIterator<Item = (GenomicRange, T)>,
    {
        let mut intervals: FxHashMap<String, Vec<Interval<u64, T>>> = FxHashMap::default();
        for (range, val) in ranges {
            intervals.entry(range.chrom).or_default().push(Interval {
                start: range.start,
                stop: range.end,
                val,
            });
        }

        let mut len = 0;
        let chroms = intervals
            .into_iter()
            .map(|(chrom, ivs)| {
                let mut lapper = Lapper::new(ivs);
                if merge {
                    lapper.merge_overlaps();
                }
                len += lapper.len();
                (chrom, lapper)
            })
            .collect();
        RegionIndex { chroms, len }
    }

    pub fn is_overlapped(&self, chrom: &str, start: u64, end: u64) -> bool {
        self.chroms
            .get(chrom)
            .map_or(false, |lapper| lapper.find(start, end).next().is_some())
    }

    /// Values of all regions overlapping `[start, end)`.
    pub fn find<'a>(
        &'a self,
        chrom: &str,
        start: u64,
        end: u64,
    ) -> impl Iterator<Item = &'a Interval<u64, T>> + 'a {
        self.chroms
            .get(chrom)
            .into_iter()
            .flat_map(move |lapper| lapper.find(start, end))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Read BED regions in file order (gzip aware).
pub fn read_bed_regions<P: AsRef<Path>>(path: P) -> Result<Vec<GenomicRange>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FragError::FileNotFound(path.display().to_string()));
    }
    let mut reader = bed::Reader::new(open_for_read(path)?);
    let mut regions = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FragError::parse(i + 1, e.to_string()))?;
        if record.end() < record.start() {
            return Err(FragError::parse(i + 1, "BED record has end < start"));
        }
        regions.push(GenomicRange::new(record.chrom(), record.start(), record.end()));
    }
    Ok(regions)
}

impl RegionIndex<()> {
    /// Build a merged presence index, e.g. for blacklists.
    pub fn from_bed<P: AsRef<Path>>(path: P) -> Result<Self> {
        let regions = read_bed_regions(path)?;
        Ok(RegionIndex::from_ranges(
            regions.into_iter().map(|r| (r, ())),
            true,
        ))
    }
}

impl RegionIndex<usize> {
    /// Index regions by their position in `regions`.
    pub fn enumerated(regions: &[GenomicRange]) -> Self {
        RegionIndex::from_ranges(
            regions.iter().cloned().enumerate().map(|(i, r)| (r, i)),
            false,
        )
    }
}
