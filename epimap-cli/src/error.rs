//! Error handling for the epimap CLI

use std::path::PathBuf;

use epimap_core::predict::PredictError;
use epimap_core::{AlignError, EpimapError};
use thiserror::Error;

/// Main error type for epimap CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Alignment error: {backend} - {message}")]
    Alignment { backend: String, message: String },

    #[error("Prediction error: {message}")]
    Prediction { message: String },

    #[error("External tool error: {tool} - {message}")]
    ExternalTool { tool: String, message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        Self::InvalidFormat { message: message.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    fn from_align_error(backend: String, err: &AlignError, message: String) -> Self {
        match err {
            AlignError::Unavailable(_) | AlignError::Spawn { .. } => Self::ExternalTool { tool: backend, message },
            _ => Self::Alignment { backend, message },
        }
    }
}

impl From<EpimapError> for CliError {
    fn from(err: EpimapError) -> Self {
        let message = err.to_string();
        match err {
            EpimapError::Input(detail) if detail.contains("FASTA") => Self::InvalidFormat { message: detail },
            EpimapError::Input(detail) => Self::Validation { message: detail },
            EpimapError::Alignment { backend, source, .. } => Self::from_align_error(backend, &source, message),
            EpimapError::Prediction(_) => Self::Prediction { message },
            EpimapError::Io(_) => Self::Io { message },
            EpimapError::Json(_) => Self::InvalidFormat { message },
        }
    }
}

impl From<AlignError> for CliError {
    fn from(err: AlignError) -> Self {
        let backend = match &err {
            AlignError::Unavailable(tool) => tool.clone(),
            AlignError::Spawn { program, .. }
            | AlignError::Timeout { program, .. }
            | AlignError::ExitStatus { program, .. } => program.clone(),
            _ => "alignment".to_string(),
        };
        let message = err.to_string();
        Self::from_align_error(backend, &err, message)
    }
}

impl From<PredictError> for CliError {
    fn from(err: PredictError) -> Self {
        Self::Prediction { message: err.to_string() }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_format(format!("JSON error: {}", err))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file\n\
                 • Compressed FASTA must use the .gz extension",
                path.display()
            ));
        }

        CliError::InvalidFormat { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Input must be protein FASTA: '>' header lines followed by sequence lines\n\
                 • Try 'epimap predict --sample' to check your setup with known-good data\n\
                 • Ensure the file is not an HTML error page or a JSON document",
            );
        }

        CliError::ExternalTool { tool, .. } => match tool.as_str() {
            "clustalo" => {
                message.push_str(
                    "\n\nSuggestions:\n\
                     • Install Clustal Omega: apt install clustalo (or conda install -c bioconda clustalo)\n\
                     • Ensure clustalo is in your PATH, or set [msa] clustalo_binary in epimap.toml\n\
                     • Single-sequence input does not need an aligner",
                );
            }
            _ => {
                message.push_str(&format!(
                    "\n\nSuggestions:\n\
                     • Install {}\n\
                     • Ensure {} is in your PATH\n\
                     • Check the [msa] command entry in epimap.toml",
                    tool, tool
                ));
            }
        },

        CliError::Alignment { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Re-run with -v to see the aligner's diagnostics\n\
                 • Raise [msa] timeout_secs for large inputs\n\
                 • Check that the input sequences are homologous",
            );
        }

        CliError::Prediction { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your network connection to the prediction service\n\
                 • Raise [prediction] retries or timeout_secs in epimap.toml\n\
                 • Use --skip-prediction to inspect the consensus without binding calls",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your epimap.toml configuration file\n\
                 • Use 'epimap config --example' to generate a sample configuration\n\
                 • Verify that all configuration values are valid",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}
