use crate::core::error::{FragError, Result};
use crate::core::io::open_for_read;
use crate::fragment::Fragment;
use std::io::BufRead;
use std::path::Path;

/// Streaming reader over a fragment file. Comment (`#`) and blank lines are
/// skipped; every other line must parse.
pub struct FragmentReader {
    inner: Box<dyn BufRead + Send>,
    buf: String,
    line_no: usize,
}

impl FragmentReader {
    /// Open a plain or gzip-compressed fragment file, or stdin for `-`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.to_str() != Some("-") && !path.exists() {
            return Err(FragError::FileNotFound(path.display().to_string()));
        }
        Ok(Self::new(open_for_read(path)?))
    }

    pub fn new(inner: Box<dyn BufRead + Send>) -> Self {
        FragmentReader {
            inner,
            buf: String::with_capacity(128),
            line_no: 0,
        }
    }
}

impl Iterator for FragmentReader {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let line = self.buf.trim_end_matches(['\n', '\r']);
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    return Some(Fragment::parse_line(line, self.line_no));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
