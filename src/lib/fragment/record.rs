use crate::core::error::{FragError, Result};
use crate::genome::{GenomicRange, Strand};
use std::fmt;

/// One sequenced fragment (or single-end read) from a fragment file.
///
/// Coordinates are 0-based and half-open. `count` is the number of duplicate
/// reads collapsed into this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub barcode: Option<String>,
    pub count: u32,
    pub strand: Option<Strand>,
}

impl Fragment {
    pub fn new<S: Into<String>>(chrom: S, start: u64, end: u64) -> Self {
        Fragment {
            chrom: chrom.into(),
            start,
            end,
            barcode: None,
            count: 1,
            strand: None,
        }
    }

    pub fn with_barcode<S: Into<String>>(mut self, barcode: S) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Paired-end fragments have no strand; single-end reads do.
    pub fn is_paired(&self) -> bool {
        self.strand.is_none()
    }

    /// Tn5 insertion sites as 1-bp ranges.
    pub fn to_insertions(&self) -> Vec<GenomicRange> {
        let left = || GenomicRange::new(self.chrom.clone(), self.start, self.start + 1);
        let right = || GenomicRange::new(self.chrom.clone(), self.end - 1, self.end);
        match self.strand {
            None => vec![left(), right()],
            Some(Strand::Forward) => vec![left()],
            Some(Strand::Reverse) => vec![right()],
        }
    }

    /// Start positions of the insertion sites, without allocating ranges.
    pub fn insertion_sites(&self) -> smallvec::SmallVec<[u64; 2]> {
        match self.strand {
            None => smallvec::smallvec![self.start, self.end - 1],
            Some(Strand::Forward) => smallvec::smallvec![self.start],
            Some(Strand::Reverse) => smallvec::smallvec![self.end - 1],
        }
    }

    /// Parse one tab-separated fragment line. `line_no` is 1-based and only
    /// used for error messages.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Fragment> {
        let mut fields = line.trim_end_matches(['\n', '\r']).split('\t');
        let chrom = fields
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FragError::parse(line_no, "missing chromosome"))?;
        let start = parse_coord(fields.next(), "start", line_no)?;
        let end = parse_coord(fields.next(), "end", line_no)?;
        if end <= start {
            return Err(FragError::parse(
                line_no,
                format!("fragment end ({}) must exceed start ({})", end, start),
            ));
        }
        let barcode = fields.next().filter(|s| !s.is_empty()).map(|s| s.to_string());
        let count = match fields.next() {
            Some(s) if !s.is_empty() => s
                .parse::<u32>()
                .map_err(|_| FragError::parse(line_no, format!("invalid count: {}", s)))?,
            _ => 1,
        };
        let strand = match fields.next() {
            Some("+") => Some(Strand::Forward),
            Some("-") => Some(Strand::Reverse),
            Some("") | Some(".") | None => None,
            Some(other) => {
                return Err(FragError::parse(line_no, format!("invalid strand: {}", other)))
            }
        };

        Ok(Fragment {
            chrom: chrom.to_string(),
            start,
            end,
            barcode,
            count,
            strand,
        })
    }
}

fn parse_coord(field: Option<&str>, what: &str, line_no: usize) -> Result<u64> {
    let field = field.ok_or_else(|| FragError::parse(line_no, format!("missing {}", what)))?;
    field
        .trim()
        .parse::<u64>()
        .map_err(|_| FragError::parse(line_no, format!("invalid {}: {}", what, field)))
}

/// Borrowed view that prints a fragment under its owning cell's barcode.
#[derive(Debug, Clone, Copy)]
pub struct CellRecord<'a> {
    fragment: &'a Fragment,
    barcode: &'a str,
}

impl Fragment {
    /// Display this record with `barcode` in the barcode column, whatever the
    /// record itself carries.
    pub fn in_cell<'a>(&'a self, barcode: &'a str) -> CellRecord<'a> {
        CellRecord {
            fragment: self,
            barcode,
        }
    }
}

fn write_record(f: &mut fmt::Formatter<'_>, record: &Fragment, barcode: Option<&str>) -> fmt::Result {
    write!(f, "{}\t{}\t{}", record.chrom, record.start, record.end)?;
    if let Some(barcode) = barcode {
        write!(f, "\t{}\t{}", barcode, record.count)?;
        if let Some(strand) = record.strand {
            write!(f, "\t{}", strand)?;
        }
    }
    Ok(())
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_record(f, self, self.barcode.as_deref())
    }
}

impl fmt::Display for CellRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_record(f, self.fragment, Some(self.barcode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let f = Fragment::parse_line("chr1\t100\t250\tAAAC-1\t3", 1).unwrap();
        assert_eq!(f.chrom, "chr1");
        assert_eq!((f.start, f.end), (100, 250));
        assert_eq!(f.barcode.as_deref(), Some("AAAC-1"));
        assert_eq!(f.count, 3);
        assert!(f.is_paired());
        assert_eq!(f.to_string(), "chr1\t100\t250\tAAAC-1\t3");
    }

    #[test]
    fn defaults_and_strand() {
        let f = Fragment::parse_line("chr2\t5\t80\tBC", 1).unwrap();
        assert_eq!(f.count, 1);
        let s = Fragment::parse_line("chr2\t5\t80\tBC\t1\t-", 1).unwrap();
        assert_eq!(s.strand, Some(Strand::Reverse));
        assert_eq!(s.insertion_sites().as_slice(), &[79]);
    }

    #[test]
    fn rejects_malformed() {
        assert!(Fragment::parse_line("chr1\t10", 4).is_err());
        assert!(Fragment::parse_line("chr1\t10\t5\tBC", 4).is_err());
        assert!(Fragment::parse_line("chr1\tx\t5\tBC", 4).is_err());
        assert!(Fragment::parse_line("chr1\t1\t5\tBC\t1\t*", 4).is_err());
        match Fragment::parse_line("chr1\t10\t10", 9) {
            Err(FragError::Parse { line, .. }) => assert_eq!(line, 9),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn insertions() {
        let f = Fragment::new("chr1", 10, 20);
        assert_eq!(
            f.to_insertions(),
            vec![
                GenomicRange::new("chr1", 10, 11),
                GenomicRange::new("chr1", 19, 20)
            ]
        );
        let mut fwd = f.clone();
        fwd.strand = Some(Strand::Forward);
        assert_eq!(fwd.to_insertions(), vec![GenomicRange::new("chr1", 10, 11)]);
    }

    #[test]
    fn cell_record_keeps_strand() {
        let mut f = Fragment::new("chr1", 10, 60);
        f.strand = Some(Strand::Reverse);
        f.count = 2;
        let line = f.in_cell("ACGT").to_string();
        assert_eq!(line, "chr1\t10\t60\tACGT\t2\t-");
        let back = Fragment::parse_line(&line, 1).unwrap();
        assert_eq!(back.insertion_sites().as_slice(), &[59]);
        assert_eq!(Fragment::new("chr1", 1, 5).in_cell("A").to_string(), "chr1\t1\t5\tA\t1");
    }
}
