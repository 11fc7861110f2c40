//! Generic stdin-FASTA / stdout-JSON alignment backend

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::process::run_with_deadline;
use super::{AlignError, AlignResult, Aligner, AlignmentResponse};
use crate::fasta::to_fasta_payload;
use crate::types::SequenceRecord;

/// Default deadline for one alignment run
pub const DEFAULT_ALIGN_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs any program that reads FASTA on stdin and prints
/// `{ "rows": [{ "id", "sequence" }] }` on stdout
pub struct CommandAligner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAligner {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_ALIGN_TIMEOUT,
        }
    }

    /// Build from an argv-style list, program first
    pub fn from_argv(argv: &[String]) -> AlignResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| AlignError::Unavailable("alignment command (empty)".to_string()))?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Aligner for CommandAligner {
    fn run(&self, records: &[SequenceRecord]) -> AlignResult<AlignmentResponse> {
        if !self.is_available() {
            return Err(AlignError::Unavailable(self.program.clone()));
        }

        let payload = to_fasta_payload(records);
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        log::info!("Aligning {} sequences with {}", records.len(), self.program);
        let output = run_with_deadline(&mut cmd, Some(payload.as_bytes()), self.timeout)?;
        output.check_success(&self.program)?;

        AlignmentResponse::from_json(&output.stdout_text())
    }

    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        Path::new(&self.program).is_file() || which::which(&self.program).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_argv() {
        let argv = vec!["python3".to_string(), "run_clustal.py".to_string()];
        let aligner = CommandAligner::from_argv(&argv).unwrap();
        assert_eq!(aligner.program(), "python3");
        assert_eq!(aligner.args(), &["run_clustal.py".to_string()]);
        assert_eq!(aligner.name(), "python3");
    }

    #[test]
    fn test_from_empty_argv() {
        assert!(matches!(
            CommandAligner::from_argv(&[]),
            Err(AlignError::Unavailable(_))
        ));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let aligner = CommandAligner::new("/nonexistent/msa-tool", vec![]);
        let records = vec![SequenceRecord::new("a", "MKV"), SequenceRecord::new("b", "MKV")];
        assert!(matches!(aligner.run(&records), Err(AlignError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_json_contract_over_stdio() {
        let script = r#"cat >/dev/null; printf '{"rows":[{"id":"a","sequence":"MK-V"},{"id":"b","sequence":"MKLV"}]}'"#;
        let aligner = CommandAligner::new("sh", vec!["-c".to_string(), script.to_string()]);
        let records = vec![SequenceRecord::new("a", "MKV"), SequenceRecord::new("b", "MKLV")];
        let matrix = aligner.align(&records).unwrap();
        assert_eq!(matrix.len(), 4);
        assert_eq!(matrix.rows()[0], b"MK-V".to_vec());
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_failure_surfaces_stderr() {
        let script = "cat >/dev/null; echo 'biopython required' >&2; exit 1";
        let aligner = CommandAligner::new("sh", vec!["-c".to_string(), script.to_string()]);
        let records = vec![SequenceRecord::new("a", "MKV"), SequenceRecord::new("b", "MKLV")];
        let err = aligner.align(&records).unwrap_err();
        assert!(err.to_string().contains("biopython required"));
    }
}
