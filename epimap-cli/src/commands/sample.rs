//! Sample command implementation - print the bundled sample FASTA

use std::io::Write;

use crate::config::Config;
use crate::error::{CliError, CliResult};

pub fn read_sample(config: &Config) -> CliResult<String> {
    let path = &config.data.sample_fasta;
    if !path.is_file() {
        return Err(CliError::file_not_found(path.clone()));
    }
    log::debug!("Reading sample FASTA from {}", path.display());
    Ok(std::fs::read_to_string(path)?)
}

pub fn execute(config: &Config) -> CliResult<()> {
    let content = read_sample(config)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_sample_reported_as_file_not_found() {
        let mut config = Config::default();
        config.data.sample_fasta = PathBuf::from("/nonexistent/sample.fasta");
        assert!(matches!(read_sample(&config), Err(CliError::FileNotFound { .. })));
    }

    #[test]
    fn test_reads_configured_sample() -> CliResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.fasta");
        std::fs::write(&path, ">s1\nMKTAYIAKQRQISFVKSHFSRQ\n")?;

        let mut config = Config::default();
        config.data.sample_fasta = path;
        assert_eq!(read_sample(&config)?, ">s1\nMKTAYIAKQRQISFVKSHFSRQ\n");
        Ok(())
    }
}
