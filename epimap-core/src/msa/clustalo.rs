//! Clustal Omega backend
//!
//! Runs `clustalo` directly on temporary files and reads its aligned FASTA
//! output, keeping rows in input order.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use super::command::DEFAULT_ALIGN_TIMEOUT;
use super::process::run_with_deadline;
use super::{AlignError, AlignResult, Aligner, AlignmentResponse};
use crate::fasta::{parse_fasta, to_fasta_payload};
use crate::types::SequenceRecord;

pub const CLUSTALO_BINARY: &str = "clustalo";

/// Clustal Omega alignment engine
pub struct ClustalOmega {
    binary_path: PathBuf,
    timeout: Duration,
}

impl ClustalOmega {
    pub fn new() -> Self {
        Self::with_binary_path(CLUSTALO_BINARY)
    }

    /// Create backend with custom binary path
    pub fn with_binary_path<P: Into<PathBuf>>(binary_path: P) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: DEFAULT_ALIGN_TIMEOUT,
        }
    }

    /// Resolve the binary on `PATH`, failing early when it is missing
    pub fn locate() -> AlignResult<Self> {
        which::which(CLUSTALO_BINARY)
            .map(Self::with_binary_path)
            .map_err(|_| AlignError::Unavailable(CLUSTALO_BINARY.to_string()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    fn build_command_args(input: &str, output: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.to_string(),
            "-o".to_string(),
            output.to_string(),
            "--outfmt=fa".to_string(),
            "--force".to_string(),
            "--output-order=input-order".to_string(),
        ]
    }
}

impl Default for ClustalOmega {
    fn default() -> Self {
        Self::new()
    }
}

impl Aligner for ClustalOmega {
    fn run(&self, records: &[SequenceRecord]) -> AlignResult<AlignmentResponse> {
        if !self.is_available() {
            return Err(AlignError::Unavailable(self.binary_path.display().to_string()));
        }

        let workdir = TempDir::new()?;
        let input = workdir.path().join("in.fasta");
        let output = workdir.path().join("out.fasta");
        std::fs::write(&input, to_fasta_payload(records))?;

        let args = Self::build_command_args(&input.to_string_lossy(), &output.to_string_lossy());
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&args);

        log::info!("Aligning {} sequences with Clustal Omega", records.len());
        let result = run_with_deadline(&mut cmd, None, self.timeout)?;
        result.check_success(CLUSTALO_BINARY)?;

        if !output.is_file() {
            return Err(AlignError::MalformedOutput(
                "clustalo produced no output file".to_string(),
            ));
        }
        let aligned = parse_fasta(&std::fs::read_to_string(&output)?);
        if aligned.is_empty() {
            return Err(AlignError::MalformedOutput("No sequences in alignment".to_string()));
        }
        Ok(AlignmentResponse::from_records(aligned))
    }

    fn name(&self) -> &str {
        CLUSTALO_BINARY
    }

    fn is_available(&self) -> bool {
        self.binary_path.is_file() || which::which(&self.binary_path).is_ok()
    }
}
