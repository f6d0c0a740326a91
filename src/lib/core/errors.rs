use anyhow::Error;
use std::io;

use super::error::FragError;

/// Returns `true` if the error originated from a broken pipe, either as a bare
/// IO error or wrapped in [`FragError::Io`].
#[inline]
pub fn is_broken_pipe(err: &Error) -> bool {
    let root = err.root_cause();
    if let Some(io_err) = root.downcast_ref::<io::Error>() {
        return io_err.kind() == io::ErrorKind::BrokenPipe;
    }
    matches!(
        root.downcast_ref::<FragError>(),
        Some(FragError::Io(io_err)) if io_err.kind() == io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_broken_pipe() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "closed").into();
        assert!(is_broken_pipe(&err));
    }

    #[test]
    fn ignores_other_errors() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(!is_broken_pipe(&err));
        assert!(!is_broken_pipe(&anyhow::anyhow!("plain")));
    }
}
