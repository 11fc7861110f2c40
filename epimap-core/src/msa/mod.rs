//! Multiple-sequence alignment backends
//!
//! The alignment itself is delegated to an external tool. Every backend
//! returns the same raw response shape, `{ "rows": [{ "id", "sequence" }] }`,
//! and [`Aligner::align`] validates it before anything downstream may trust
//! it. There is no fallback: a response that fails validation is an error,
//! never an unaligned consensus.

use serde::{Deserialize, Serialize};

use crate::consensus::build_consensus;
use crate::types::{AlignedMatrix, MatrixError, SequenceRecord, GAP};

pub mod clustalo;
pub mod command;
pub mod process;

pub use clustalo::ClustalOmega;
pub use command::CommandAligner;

/// Upper bound of the ungapped-consensus sanity floor
pub const CONSENSUS_FLOOR_CAP: usize = 50;

/// Result type for alignment operations
pub type AlignResult<T> = Result<T, AlignError>;

/// Errors that can occur while producing or validating an alignment
#[derive(Debug, thiserror::Error)]
pub enum AlignError {
    #[error("At least two sequences are required for alignment, got {0}")]
    TooFewSequences(usize),

    #[error("{0} not found; install Clustal Omega (e.g. apt install clustalo) or configure the alignment command")]
    Unavailable(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {seconds}s and was terminated")]
    Timeout { program: String, seconds: u64 },

    #[error("{program} failed (exit={code:?}): {stderr}")]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Malformed alignment output: {0}")]
    MalformedOutput(String),

    #[error("Expected {expected} rows, got {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("Alignment validation failed (residues): row {row} has '{residue}' at column {column}")]
    InvalidResidue { row: usize, column: usize, residue: char },

    #[error("Alignment validation failed (row lengths): {0}")]
    RaggedRows(#[from] MatrixError),

    #[error("Alignment validation failed (consensus): ungapped consensus has {ungapped} residues, expected at least {floor}")]
    DegenerateConsensus { ungapped: usize, floor: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One aligned row as emitted by an alignment tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentRow {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sequence: String,
}

/// Raw alignment tool response, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentResponse {
    #[serde(default)]
    pub rows: Vec<AlignmentRow>,
}

impl AlignmentResponse {
    pub fn from_records(records: Vec<SequenceRecord>) -> Self {
        Self {
            rows: records
                .into_iter()
                .map(|r| AlignmentRow { id: r.id, sequence: r.sequence })
                .collect(),
        }
    }

    pub fn from_json(stdout: &str) -> AlignResult<Self> {
        serde_json::from_str(stdout.trim())
            .map_err(|e| AlignError::MalformedOutput(format!("Failed to parse alignment JSON: {}", e)))
    }
}

/// Trait for alignment backends
pub trait Aligner {
    /// Run the external tool and return its unvalidated rows
    fn run(&self, records: &[SequenceRecord]) -> AlignResult<AlignmentResponse>;

    /// Get the name of this backend
    fn name(&self) -> &str;

    /// Check if the backend is usable (e.g., external tools installed)
    fn is_available(&self) -> bool {
        true
    }

    /// Align the records and validate the result into a matrix
    fn align(&self, records: &[SequenceRecord]) -> AlignResult<AlignedMatrix> {
        if records.len() < 2 {
            return Err(AlignError::TooFewSequences(records.len()));
        }
        let response = self.run(records)?;
        validate_alignment(records, response)
    }
}

/// Minimum acceptable ungapped consensus length for a set of inputs
pub fn consensus_floor(records: &[SequenceRecord]) -> usize {
    let shortest = records.iter().map(SequenceRecord::ungapped_len).min().unwrap_or(0);
    CONSENSUS_FLOOR_CAP.min(shortest / 2)
}

/// Check a raw response against the inputs it was produced from
pub fn validate_alignment(
    records: &[SequenceRecord],
    response: AlignmentResponse,
) -> AlignResult<AlignedMatrix> {
    if response.rows.len() != records.len() {
        return Err(AlignError::RowCount {
            expected: records.len(),
            actual: response.rows.len(),
        });
    }

    let mut rows = Vec::with_capacity(response.rows.len());
    for (row, aligned) in response.rows.into_iter().enumerate() {
        let residues = aligned.sequence.to_ascii_uppercase();
        if let Some((col, residue)) = residues
            .chars()
            .enumerate()
            .find(|&(_, c)| !(c.is_ascii_uppercase() || c == GAP as char))
        {
            return Err(AlignError::InvalidResidue {
                row,
                column: col + 1,
                residue,
            });
        }
        rows.push(residues.into_bytes());
    }
    let matrix = AlignedMatrix::new(rows)?;

    let floor = consensus_floor(records);
    let ungapped = build_consensus(&matrix).iter().filter(|&&c| c != GAP).count();
    if ungapped < floor {
        return Err(AlignError::DegenerateConsensus { ungapped, floor });
    }

    log::debug!(
        "Validated alignment: {} rows x {} columns (consensus {} residues, floor {})",
        matrix.row_count(),
        matrix.len(),
        ungapped,
        floor
    );
    Ok(matrix)
}
