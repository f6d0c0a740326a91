use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use grep_cli::stdout;
use gzp::{deflate::Gzip, Compression as GzLevel, ZBuilder};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use termcolor::ColorChoice;

use super::fs::is_gzipped;

const READ_BUFFER: usize = 256 * 1024;

/// Gzip level used when none is requested.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;
/// Highest level accepted by the gzip encoder.
pub const MAX_GZIP_LEVEL: u32 = 9;

/// Output compression for text files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip { level: u32, threads: usize },
}

impl Compression {
    /// Gzip when the path carries a gzip extension, plain text otherwise.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        if is_gzipped(path) {
            Compression::gzip()
        } else {
            Compression::None
        }
    }

    /// Single-threaded gzip at the default level.
    pub fn gzip() -> Self {
        Compression::Gzip {
            level: DEFAULT_GZIP_LEVEL,
            threads: 1,
        }
    }

    /// Same codec at another level; plain text is unaffected.
    pub fn with_level(self, level: u32) -> Self {
        match self {
            Compression::Gzip { threads, .. } => Compression::Gzip { level, threads },
            Compression::None => Compression::None,
        }
    }

    pub fn with_threads(self, threads: usize) -> Self {
        match self {
            Compression::Gzip { level, .. } => Compression::Gzip {
                level,
                threads: threads.max(1),
            },
            Compression::None => Compression::None,
        }
    }

    pub fn level(&self) -> Option<u32> {
        match self {
            Compression::Gzip { level, .. } => Some(*level),
            Compression::None => None,
        }
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::gzip()),
            other => Err(format!("unknown compression: {}", other)),
        }
    }
}

/// Open a text source, transparently decompressing gzip/BGZF. `-` reads stdin.
pub fn open_for_read<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(READ_BUFFER, io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, file)))
    }
}

/// Open a text sink with optional gzip compression. `-` writes stdout.
pub fn open_for_write<P: AsRef<Path>>(
    path: P,
    compression: Compression,
) -> Result<Box<dyn Write>> {
    let path = path.as_ref();
    if path.to_str() == Some("-") {
        let writer = stdout(ColorChoice::Never);
        return Ok(wrap_compressed(writer, compression));
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(wrap_compressed(BufWriter::new(file), compression))
}

fn wrap_compressed<W: Write + Send + 'static>(writer: W, compression: Compression) -> Box<dyn Write> {
    match compression {
        Compression::None => Box::new(writer),
        Compression::Gzip { level, threads } => Box::new(
            ZBuilder::<Gzip, _>::new()
                .num_threads(threads)
                .compression_level(GzLevel::new(level))
                .from_writer(writer),
        ),
    }
}

/// Build a tab-delimited reader over a file or stdin.
pub fn get_tsv_reader<P: AsRef<Path>>(
    path: P,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn BufRead + Send>>> {
    let reader = open_for_read(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader))
}

/// Build a tab-delimited writer targeting a file or stdout.
pub fn get_writer<P: AsRef<Path>>(
    path: P,
    compression: Compression,
    write_headers: bool,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let raw_writer = open_for_write(path, compression)?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(write_headers)
        .from_writer(raw_writer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn gzip_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt.gz");
        {
            let mut writer = open_for_write(&path, Compression::from_path(&path)).unwrap();
            writeln!(writer, "chr1\t10\t20").unwrap();
            writeln!(writer, "chr2\t30\t40").unwrap();
            writer.flush().unwrap();
        }
        let mut raw = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let lines: Vec<String> = open_for_read(&path)
            .unwrap()
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec!["chr1\t10\t20", "chr2\t30\t40"]);
    }

    #[test]
    fn tsv_reader_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sizes.tsv");
        std::fs::write(&path, "# header\nchr1\t100\nchr2\t50\n").unwrap();
        let mut reader = get_tsv_reader(&path, false).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "chr2");
    }

    #[test]
    fn compression_parsing() {
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert!(matches!(
            "GZIP".parse::<Compression>().unwrap(),
            Compression::Gzip { .. }
        ));
        assert!("zstd".parse::<Compression>().is_err());
    }

    #[test]
    fn level_and_threads_only_touch_gzip() {
        let gz = Compression::gzip().with_level(1).with_threads(4);
        assert_eq!(gz, Compression::Gzip { level: 1, threads: 4 });
        assert_eq!(gz.level(), Some(1));
        assert_eq!(Compression::None.with_level(9), Compression::None);
        assert_eq!(Compression::None.level(), None);
    }

    #[test]
    fn higher_level_writes_smaller_files() {
        let dir = tempfile::tempdir().unwrap();
        let text: String = (0..2_000)
            .map(|i| format!("chr1\t{}\t{}\tAAACGGTT-1\t1\n", i * 10, i * 10 + 150))
            .collect();
        let size = |level: u32| {
            let path = dir.path().join(format!("l{}.tsv.gz", level));
            let mut w = open_for_write(&path, Compression::gzip().with_level(level)).unwrap();
            w.write_all(text.as_bytes()).unwrap();
            w.flush().unwrap();
            drop(w);
            std::fs::metadata(&path).unwrap().len()
        };
        assert!(size(9) < size(0));
    }
}
