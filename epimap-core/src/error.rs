//! Error types shared across the epimap pipeline

use thiserror::Error;

use crate::msa::AlignError;
use crate::predict::PredictError;

/// Result type for pipeline operations
pub type EpimapResult<T> = Result<T, EpimapError>;

/// Errors surfaced to the caller of a prediction or consensus request
#[derive(Debug, Error)]
pub enum EpimapError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Multi-sequence alignment failed for {sequences} sequences ({backend}): {source}")]
    Alignment {
        sequences: usize,
        backend: String,
        #[source]
        source: AlignError,
    },

    #[error(transparent)]
    Prediction(#[from] PredictError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EpimapError {
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input(message.into())
    }

    pub fn is_alignment(&self) -> bool {
        matches!(self, Self::Alignment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_message() {
        let err = EpimapError::input("No valid sequences in FASTA");
        assert_eq!(err.to_string(), "Invalid input: No valid sequences in FASTA");
        assert!(!err.is_alignment());
    }

    #[test]
    fn test_alignment_error_carries_diagnostic() {
        let err = EpimapError::Alignment {
            sequences: 3,
            backend: "clustalo".to_string(),
            source: AlignError::RowCount { expected: 3, actual: 2 },
        };
        let message = err.to_string();
        assert!(err.is_alignment());
        assert!(message.contains("3 sequences"));
        assert!(message.contains("Expected 3 rows, got 2"));
    }
}
