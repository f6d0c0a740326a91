//! Input validation utilities
//!
//! Shared checks run by the command-line front end before any data is read:
//! numeric parameters, input files, output paths and matrix shapes.

use crate::core::error::{FragError, Result};
use std::path::Path;

/// Numeric parameters shared by several commands.
///
/// # Fields
///
/// * `filter_lower_quantile` - Fraction of low-count features removed (0.0 to 0.5)
/// * `filter_upper_quantile` - Fraction of high-count features removed (0.0 to 0.5)
/// * `expected_doublet_rate` - Expected doublet fraction (0.0 to 1.0)
/// * `bin_size` - Tile or coverage resolution in bp
/// * `chunk_size` - Records handled per parallel batch
/// * `num_threads` - Number of worker threads
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub filter_lower_quantile: f64,
    pub filter_upper_quantile: f64,
    pub expected_doublet_rate: f64,
    pub bin_size: u64,
    pub chunk_size: usize,
    pub num_threads: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            filter_lower_quantile: 0.005,
            filter_upper_quantile: 0.005,
            expected_doublet_rate: 0.1,
            bin_size: 500,
            chunk_size: 10_000,
            num_threads: num_cpus::get(),
        }
    }
}

impl ValidationConfig {
    /// Validate all configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A quantile is outside `[0, 0.5)`
    /// - The doublet rate is outside `(0, 1)`
    /// - `bin_size`, `chunk_size` or `num_threads` is 0
    ///
    /// # Example
    ///
    /// ```rust
    /// use fragtk_lib::pipeline::validation::ValidationConfig;
    ///
    /// let config = ValidationConfig {
    ///     bin_size: 5000,
    ///     num_threads: 4,
    ///     ..Default::default()
    /// };
    /// config.validate().unwrap();
    /// ```
    pub fn validate(&self) -> Result<()> {
        validate_threshold("filter_lower_quantile", self.filter_lower_quantile, 0.0, 0.5)?;
        validate_threshold("filter_upper_quantile", self.filter_upper_quantile, 0.0, 0.5)?;
        if self.filter_lower_quantile >= 0.5 || self.filter_upper_quantile >= 0.5 {
            return Err(FragError::InvalidInput(
                "feature quantiles must be below 0.5".to_string(),
            ));
        }
        validate_threshold("expected_doublet_rate", self.expected_doublet_rate, 0.0, 1.0)?;
        if self.expected_doublet_rate <= 0.0 || self.expected_doublet_rate >= 1.0 {
            return Err(FragError::InvalidInput(
                "expected_doublet_rate must be strictly between 0 and 1".to_string(),
            ));
        }

        if self.bin_size == 0 {
            return Err(FragError::InvalidInput(
                "bin_size must be greater than 0".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(FragError::InvalidInput(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.num_threads == 0 {
            return Err(FragError::InvalidInput(
                "num_threads must be greater than 0".to_string(),
            ));
        }

        let max_threads = num_cpus::get() * 2;
        if self.num_threads > max_threads {
            log::warn!(
                "num_threads ({}) exceeds recommended maximum ({})",
                self.num_threads,
                max_threads
            );
        }

        Ok(())
    }
}

/// Check that a parameter is finite and within `[min, max]`.
pub fn validate_threshold(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(FragError::InvalidInput(format!(
            "{} must be a finite number",
            name
        )));
    }

    if value < min || value > max {
        return Err(FragError::ThresholdValidation {
            field: name.to_string(),
            min,
            max,
            value,
        });
    }

    Ok(())
}

/// Every path must exist; `-` (stdin) is accepted as is.
pub fn validate_input_files<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if path.as_os_str() == "-" {
            continue;
        }
        if !path.exists() {
            return Err(FragError::FileNotFound(format!(
                "Input file not found: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Check the output extension and remove a stale output file.
pub fn validate_output_path<P: AsRef<Path>>(output: P, extension: &str) -> Result<()> {
    let path = output.as_ref();
    if !path.to_string_lossy().ends_with(extension) {
        return Err(FragError::InvalidInput(format!(
            "Output file must have {} extension",
            extension
        )));
    }

    if path.exists() {
        std::fs::remove_file(path).map_err(|e| {
            FragError::InvalidInput(format!(
                "Failed to remove existing output file '{}': {}",
                path.display(),
                e
            ))
        })?;
    }

    Ok(())
}

pub fn validate_matrix_dimensions(actual_shape: (usize, usize), expected_shape: (usize, usize)) -> Result<()> {
    if actual_shape != expected_shape {
        return Err(FragError::DimensionMismatch {
            expected: format!("{} × {}", expected_shape.0, expected_shape.1),
            actual: format!("{} × {}", actual_shape.0, actual_shape.1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ValidationConfig {
            num_threads: 1,
            ..Default::default()
        }
        .validate()
        .unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let bad_quantile = ValidationConfig {
            filter_upper_quantile: 0.5,
            ..Default::default()
        };
        assert!(bad_quantile.validate().is_err());

        let bad_rate = ValidationConfig {
            expected_doublet_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_rate.validate(),
            Err(FragError::ThresholdValidation { .. })
        ));

        let zero_bin = ValidationConfig {
            bin_size: 0,
            ..Default::default()
        };
        assert!(zero_bin.validate().is_err());
        assert!(validate_threshold("x", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn files_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frags.tsv");
        std::fs::write(&input, "chr1\t0\t10\n").unwrap();
        validate_input_files(&[input.as_path(), Path::new("-")]).unwrap();
        assert!(matches!(
            validate_input_files(&[dir.path().join("missing.tsv")]),
            Err(FragError::FileNotFound(_))
        ));

        let out = dir.path().join("out.h5ad");
        std::fs::write(&out, "old").unwrap();
        validate_output_path(&out, ".h5ad").unwrap();
        assert!(!out.exists());
        assert!(validate_output_path(dir.path().join("out.txt"), ".h5ad").is_err());
    }

    #[test]
    fn matrix_dimensions() {
        assert!(validate_matrix_dimensions((3, 4), (3, 4)).is_ok());
        assert!(validate_matrix_dimensions((3, 4), (4, 3)).is_err());
    }
}
