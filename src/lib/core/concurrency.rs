use anyhow::{Error, Result};
use log::{error, warn};

/// Validate and normalize a requested CPU count.
pub fn determine_allowed_cpus(desired: usize) -> Result<usize> {
    if desired == 0 {
        error!("Must select > 0 threads");
        Err(Error::msg("Too few threads selected. Min 1"))
    } else if desired > num_cpus::get() {
        warn!(
            "Requested {} threads but only {} CPUs are available",
            desired,
            num_cpus::get()
        );
        Ok(desired)
    } else {
        Ok(desired)
    }
}

/// Build a dedicated pool for a single stage, falling back to the CPU count.
pub fn build_local_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    let threads = match threads {
        Some(n) => determine_allowed_cpus(n)?,
        None => num_cpus::get(),
    };
    Ok(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?)
}
