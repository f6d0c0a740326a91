pub mod concurrency;
pub mod error;
pub mod errors;
pub mod fs;
pub mod io;
pub mod sparse;

pub mod prelude {
    pub use super::concurrency::{build_local_pool, determine_allowed_cpus};
    pub use super::error::{FragError, Result};
    pub use super::errors::is_broken_pipe;
    pub use super::fs::{is_gzipped, make_parent_dirs};
    pub use super::io::{get_tsv_reader, get_writer, open_for_read, open_for_write, Compression};
    pub use super::sparse::{SparseMatrixExt, SparseOps};
}
