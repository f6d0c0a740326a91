use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Receiver};
use log::*;
use rayon::prelude::*;
use rust_lapper::Lapper;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use super::intervals;
use super::types::{RegionProcessor, BYTES_IN_A_GIGABYTE, CHANNEL_SIZE_MODIFIER, CHUNKSIZE};
use crate::core::concurrency::build_local_pool;
use crate::genome::{ChromSizes, GenomicRange};

/// Parallel genome region executor driven by [`RegionProcessor`] implementations.
///
/// Work is laid out over the chromosomes of a [`ChromSizes`], optionally
/// restricted to a set of regions, and split into chunks of `chunksize` bp.
/// Chunk boundaries are multiples of `chunksize` from the chromosome start.
#[derive(Debug)]
pub struct ParGranges<R: 'static + RegionProcessor + Send + Sync> {
    chrom_sizes: ChromSizes,
    regions: Option<Vec<GenomicRange>>,
    merge_regions: bool,
    threads: usize,
    chunksize: u64,
    channel_size_modifier: f64,
    pool: rayon::ThreadPool,
    processor: R,
}

impl<R: RegionProcessor + Send + Sync> ParGranges<R> {
    /// Create a new [`ParGranges`] executor.
    pub fn new(
        chrom_sizes: ChromSizes,
        regions: Option<Vec<GenomicRange>>,
        merge_regions: bool,
        threads: Option<usize>,
        chunksize: Option<u64>,
        channel_size_modifier: Option<f64>,
        processor: R,
    ) -> Result<Self> {
        let requested_threads = threads.unwrap_or_else(num_cpus::get);
        let threads = std::cmp::max(requested_threads, 1);
        debug!("Using {} worker threads.", threads);

        let pool = build_local_pool(Some(threads)).context("Failed to build Rayon thread pool")?;

        Ok(Self {
            chrom_sizes,
            regions,
            merge_regions,
            threads,
            chunksize: chunksize.unwrap_or(CHUNKSIZE).max(1),
            channel_size_modifier: channel_size_modifier.unwrap_or(CHANNEL_SIZE_MODIFIER),
            pool,
            processor,
        })
    }

    /// Launch parallel processing for all configured regions. Results arrive
    /// on the returned channel in no particular order; the channel closes once
    /// every region is done.
    pub fn process(self) -> Result<Receiver<R::P>> {
        let ParGranges {
            chrom_sizes,
            regions,
            merge_regions,
            threads,
            chunksize,
            channel_size_modifier,
            pool,
            processor,
        } = self;

        let intervals = match &regions {
            Some(regions) => intervals::regions_to_intervals(&chrom_sizes, regions, merge_regions)?,
            None => intervals::chrom_sizes_to_intervals(&chrom_sizes, chunksize),
        };

        let item_size = std::mem::size_of::<R::P>().max(1);
        let channel_size: usize =
            ((BYTES_IN_A_GIGABYTE as f64 * channel_size_modifier).floor() as usize / item_size)
                .saturating_mul(threads);
        debug!(
            "Creating channel of length {} (* {} bytes per item)",
            channel_size, item_size
        );

        let engine = Engine {
            chrom_sizes,
            intervals,
            threads,
            chunksize,
            processor,
        };

        let (sender, receiver) = bounded::<R::P>(channel_size.max(1));
        thread::spawn(move || {
            pool.install(move || engine.run(sender));
        });
        Ok(receiver)
    }
}

struct Engine<R: RegionProcessor + Send + Sync> {
    chrom_sizes: ChromSizes,
    intervals: Vec<Lapper<u64, ()>>,
    threads: usize,
    chunksize: u64,
    processor: R,
}

impl<R: RegionProcessor + Send + Sync> Engine<R> {
    fn run(self, sender: crossbeam::channel::Sender<R::P>) {
        let serial_step_size = self.chunksize.saturating_mul(self.threads as u64);
        trace!("Using serial step size: {}", serial_step_size);

        let total_chunks: usize = self
            .chrom_sizes
            .iter()
            .filter(|(_, len)| *len > 0)
            .map(|(_, len)| ((len - 1) / serial_step_size + 1) as usize)
            .sum();
        let processed_chunks = AtomicUsize::new(0);
        let log_step = std::cmp::max(1, total_chunks / 10);

        self.intervals
            .par_iter()
            .enumerate()
            .for_each(|(tid_idx, contig_intervals)| {
                let tid = tid_idx as u32;
                let (tid_name, tid_end) = match self.chrom_sizes.iter().nth(tid_idx) {
                    Some(info) => info,
                    None => {
                        error!("Missing chromosome info for index {}", tid);
                        return;
                    }
                };

                for chunk_start in (0..tid_end).step_by(serial_step_size as usize) {
                    let chunk_end = std::cmp::min(chunk_start + serial_step_size, tid_end);
                    trace!("Batch processing {}:{}-{}", tid_name, chunk_start, chunk_end);

                    let region_intervals: Vec<_> = contig_intervals
                        .find(chunk_start, chunk_end)
                        .map(|iv| {
                            (
                                std::cmp::max(iv.start, chunk_start),
                                std::cmp::min(iv.stop, chunk_end),
                            )
                        })
                        .collect();

                    let completed = processed_chunks.fetch_add(1, Ordering::Relaxed) + 1;
                    if completed == total_chunks || completed % log_step == 0 {
                        let percent = (completed as f64 / total_chunks as f64) * 100.0;
                        info!(
                            "Processed {:.1}% ({} / {} chunks)",
                            percent, completed, total_chunks
                        );
                    }

                    region_intervals.into_par_iter().for_each_with(
                        sender.clone(),
                        |snd, (start, stop)| {
                            trace!("Processing {}:{}-{}", tid_name, start, stop);
                            for item in self.processor.process_region(tid, start, stop) {
                                if snd.send(item).is_err() {
                                    warn!("Channel closed; terminating region processing early");
                                    return;
                                }
                            }
                        },
                    );
                }
            });
    }
}
