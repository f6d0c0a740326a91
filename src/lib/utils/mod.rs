//! Convenience re-exports of the shared helpers in `crate::core`.

pub use crate::core::concurrency::{build_local_pool, determine_allowed_cpus};
pub use crate::core::errors::is_broken_pipe;
pub use crate::core::fs::{is_gzipped, make_parent_dirs};
pub use crate::core::io::{
    get_tsv_reader, get_writer, open_for_read, open_for_write, Compression, DEFAULT_GZIP_LEVEL,
    MAX_GZIP_LEVEL,
};
