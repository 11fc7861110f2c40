//! Command implementations for the epimap CLI

pub mod align_json;
pub mod consensus;
pub mod predict;
pub mod sample;

use std::io::Read;
use std::path::{Path, PathBuf};

use epimap_core::fasta::read_fasta_text;
use epimap_core::{Aligner, ClustalOmega, CommandAligner};

use crate::config::{Config, MsaBackend, MsaConfig};
use crate::error::{CliError, CliResult};

/// Build the alignment backend selected in the configuration.
///
/// A missing Clustal Omega is not an error here; single-sequence requests
/// never touch the aligner, and multi-sequence ones fail with a clear
/// message when they do.
pub fn build_aligner(msa: &MsaConfig) -> CliResult<Box<dyn Aligner>> {
    match msa.backend {
        MsaBackend::Clustalo => {
            let backend = if msa.clustalo_binary.trim().is_empty() {
                ClustalOmega::locate().unwrap_or_default()
            } else {
                ClustalOmega::with_binary_path(msa.clustalo_binary.trim())
            };
            log::debug!("Using Clustal Omega at {}", backend.binary_path().display());
            Ok(Box::new(backend.with_timeout(msa.timeout())))
        }
        MsaBackend::Command => {
            let backend = CommandAligner::from_argv(&msa.command)
                .map_err(|_| CliError::config("[msa] backend = \"command\" requires a non-empty command list"))?;
            log::debug!("Using alignment command {} {:?}", backend.program(), backend.args());
            Ok(Box::new(backend.with_timeout(msa.timeout())))
        }
    }
}

/// Read FASTA text from a file (`.gz` aware) or from stdin when the path is `-`
pub fn read_fasta_input(path: &Path) -> CliResult<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }
    read_fasta_text(path).map_err(|e| CliError::io(format!("{:#}", e)))
}

/// FASTA text from an explicit input or the configured sample file
pub fn resolve_fasta(config: &Config, input: Option<PathBuf>, use_sample: bool) -> CliResult<String> {
    match (input, use_sample) {
        (Some(_), true) => Err(CliError::validation("Pass either a FASTA file or --sample, not both")),
        (Some(path), false) => read_fasta_input(&path),
        (None, true) => sample::read_sample(config),
        (None, false) => Err(CliError::validation("FASTA content or file required (or use --sample)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_command_backend_requires_argv() {
        let msa = MsaConfig {
            backend: MsaBackend::Command,
            ..MsaConfig::default()
        };
        assert!(matches!(build_aligner(&msa), Err(CliError::Config { .. })));
    }

    #[test]
    fn test_command_backend_named_after_program() -> CliResult<()> {
        let msa = MsaConfig {
            backend: MsaBackend::Command,
            command: vec!["mafft-json".to_string()],
            ..MsaConfig::default()
        };
        assert_eq!(build_aligner(&msa)?.name(), "mafft-json");
        Ok(())
    }

    #[test]
    fn test_missing_input_file() {
        let err = read_fasta_input(Path::new("/nonexistent/proteins.fa")).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound { .. }));
    }

    #[test]
    fn test_resolve_fasta_from_file() -> CliResult<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, ">p1\nMKTAYIAKQRQISFVKSHFSRQ")?;
        let text = resolve_fasta(&Config::default(), Some(file.path().to_path_buf()), false)?;
        assert!(text.starts_with(">p1"));
        Ok(())
    }

    #[test]
    fn test_resolve_fasta_requires_one_source() {
        let config = Config::default();
        assert!(matches!(resolve_fasta(&config, None, false), Err(CliError::Validation { .. })));
        assert!(matches!(
            resolve_fasta(&config, Some(PathBuf::from("a.fa")), true),
            Err(CliError::Validation { .. })
        ));
    }
}
