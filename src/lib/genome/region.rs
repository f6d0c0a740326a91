use crate::core::error::{FragError, Result};
use std::fmt;
use std::str::FromStr;

/// Strand of a read or feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl FromStr for Strand {
    type Err = FragError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(FragError::InvalidInput(format!("invalid strand: {}", other))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// A 0-based, half-open interval on one chromosome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenomicRange {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl GenomicRange {
    pub fn new<S: Into<String>>(chrom: S, start: u64, end: u64) -> Self {
        GenomicRange {
            chrom: chrom.into(),
            start,
            end,
        }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &GenomicRange) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for GenomicRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

impl FromStr for GenomicRange {
    type Err = FragError;

    /// Parse `chrom:start-end`. Commas in numbers are accepted.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || FragError::InvalidInput(format!("invalid genomic range: {}", s));
        let (chrom, coords) = s.rsplit_once(':').ok_or_else(invalid)?;
        let (start, end) = coords.split_once('-').ok_or_else(invalid)?;
        let start: u64 = start.replace(',', "").parse().map_err(|_| invalid())?;
        let end: u64 = end.replace(',', "").parse().map_err(|_| invalid())?;
        if chrom.is_empty() || end < start {
            return Err(invalid());
        }
        Ok(GenomicRange::new(chrom, start, end))
    }
}
