//! Error types for the fragtk library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FragError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("AnnData error: {0}")]
    AnnData(#[from] anyhow::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Sparse matrix error: {0}")]
    SparseMatrix(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unknown chromosome: {0}")]
    UnknownChromosome(String),

    #[error("Data processing error: {0}")]
    DataProcessing(String),

    #[error("Threshold validation error: {field} must be between {min} and {max}, got {value}")]
    ThresholdValidation {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Empty data: {0}")]
    EmptyData(String),
}

pub type Result<T> = std::result::Result<T, FragError>;

impl FragError {
    /// Shorthand for a parse failure on a 1-based input line.
    pub fn parse<S: Into<String>>(line: usize, message: S) -> Self {
        FragError::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<nalgebra_sparse::SparseFormatError> for FragError {
    fn from(err: nalgebra_sparse::SparseFormatError) -> Self {
        FragError::SparseMatrix(format!("Sparse format error: {:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_line() {
        let err = FragError::parse(12, "missing end column");
        assert_eq!(
            err.to_string(),
            "Parse error at line 12: missing end column"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FragError = io.into();
        assert!(matches!(err, FragError::Io(_)));
    }
}
