use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the loader, aligner and statistics engine.
///
/// None of these are retried. `InsufficientData` and `ConstantInput` only
/// skip the analysis they belong to; callers running several analyses keep
/// going with the rest.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(
        "data unavailable: {} ({reason}). Re-run the data download step to regenerate it",
        path.display()
    )]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("schema mismatch in {}: required column '{column}' is missing", path.display())]
    SchemaMismatch { path: PathBuf, column: String },

    #[error("insufficient data for {test}: need at least {required} {unit}, got {found}")]
    InsufficientData {
        test: &'static str,
        unit: &'static str,
        required: usize,
        found: usize,
    },

    #[error("constant input for {test}: {detail}")]
    ConstantInput { test: &'static str, detail: String },

    #[error("unknown indicator '{0}' in the macro dataset")]
    UnknownIndicator(String),

    #[error("{test} needs paired columns of equal length, got {left} and {right}")]
    LengthMismatch {
        test: &'static str,
        left: usize,
        right: usize,
    },

    #[error("{test} cannot run on {input} input")]
    UnsupportedInput {
        test: &'static str,
        input: &'static str,
    },
}

impl AnalysisError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AnalysisError::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn insufficient(
        test: &'static str,
        unit: &'static str,
        required: usize,
        found: usize,
    ) -> Self {
        AnalysisError::InsufficientData {
            test,
            unit,
            required,
            found,
        }
    }

    pub(crate) fn constant(test: &'static str, detail: impl Into<String>) -> Self {
        AnalysisError::ConstantInput {
            test,
            detail: detail.into(),
        }
    }

    /// Whether this error only skips one analysis (as opposed to a dataset
    /// that could not be read at all).
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData { .. } | AnalysisError::ConstantInput { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_data_shortfalls_are_skippable() {
        assert!(AnalysisError::insufficient("pearson", "pairs", 3, 2).is_skippable());
        assert!(AnalysisError::constant("t-test", "zero variance").is_skippable());
        assert!(!AnalysisError::unavailable("missing.parquet", "not found").is_skippable());
        assert!(!AnalysisError::LengthMismatch {
            test: "pearson",
            left: 5,
            right: 3,
        }
        .is_skippable());
    }
}
