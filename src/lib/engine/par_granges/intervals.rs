use crate::genome::{ChromSizes, GenomicRange};
use anyhow::{anyhow, Result};
use rust_lapper::{Interval, Lapper};

/// Tile every chromosome into chunks of at most `chunksize` bp.
pub(crate) fn chrom_sizes_to_intervals(
    chrom_sizes: &ChromSizes,
    chunksize: u64,
) -> Vec<Lapper<u64, ()>> {
    chrom_sizes
        .iter()
        .map(|(_, len)| {
            let ivs = (0..len)
                .step_by(chunksize as usize)
                .map(|start| Interval {
                    start,
                    stop: std::cmp::min(start + chunksize, len),
                    val: (),
                })
                .collect();
            Lapper::new(ivs)
        })
        .collect()
}

/// Group restricting regions by chromosome index, clipped to chromosome length.
pub(crate) fn regions_to_intervals(
    chrom_sizes: &ChromSizes,
    regions: &[GenomicRange],
    merge: bool,
) -> Result<Vec<Lapper<u64, ()>>> {
    let mut intervals = vec![vec![]; chrom_sizes.len()];
    for (i, region) in regions.iter().enumerate() {
        let tid = chrom_sizes.id_of(&region.chrom).ok_or_else(|| {
            anyhow!(
                "Chromosome '{}' of region {} not found in chromosome sizes",
                region.chrom,
                i
            )
        })?;
        if region.end < region.start {
            return Err(anyhow!("Region {} is invalid: stop < start", i));
        }
        let len = chrom_sizes.get(&region.chrom).unwrap_or(0);
        let stop = region.end.min(len);
        if region.start >= stop {
            continue;
        }
        intervals[tid].push(Interval {
            start: region.start,
            stop,
            val: (),
        });
    }

    Ok(intervals
        .into_iter()
        .map(|ivs| {
            let mut lapper = Lapper::new(ivs);
            if merge {
                lapper.merge_overlaps();
            }
            lapper
        })
        .collect())
}
