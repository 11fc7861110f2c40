//! Request-scoped data model for the consensus engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::CoordinateMap;

/// Gap symbol used in aligned sequences
pub const GAP: u8 = b'-';

/// One parsed input sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new<I: Into<String>, S: Into<String>>(id: I, sequence: S) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }

    /// Number of non-gap residues
    pub fn ungapped_len(&self) -> usize {
        self.sequence.bytes().filter(|&b| b != GAP).count()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("Alignment has no rows")]
    Empty,

    #[error("Alignment row {row} has length {actual}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Rows of equal length, one per input sequence.
///
/// Construction fails when rows differ in length, so every column index below
/// `len()` is valid for every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedMatrix {
    rows: Vec<Vec<u8>>,
    width: usize,
}

impl AlignedMatrix {
    pub fn new(rows: Vec<Vec<u8>>) -> Result<Self, MatrixError> {
        let width = rows.first().map(Vec::len).ok_or(MatrixError::Empty)?;
        for (row, residues) in rows.iter().enumerate() {
            if residues.len() != width {
                return Err(MatrixError::RaggedRow {
                    row,
                    expected: width,
                    actual: residues.len(),
                });
            }
        }
        Ok(Self { rows, width })
    }

    pub fn from_strings<S: AsRef<str>>(rows: &[S]) -> Result<Self, MatrixError> {
        Self::new(
            rows.iter()
                .map(|row| row.as_ref().to_ascii_uppercase().into_bytes())
                .collect(),
        )
    }

    /// Alignment length (number of columns)
    pub fn len(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Iterate the residues of one column, top to bottom
    pub fn column(&self, col: usize) -> impl Iterator<Item = u8> + '_ {
        self.rows.iter().map(move |row| row[col])
    }
}

/// One fully conserved stretch of alignment columns (1-based, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservedRegion {
    pub aln_start: usize,
    pub aln_length: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aln_end: Option<usize>,
}

impl ConservedRegion {
    pub fn new(aln_start: usize, aln_length: usize) -> Self {
        Self {
            aln_start,
            aln_length,
            aln_end: None,
        }
    }

    pub fn end(&self) -> usize {
        self.aln_start + self.aln_length - 1
    }

    /// Copy with the derived end column filled in
    pub fn with_end(self) -> Self {
        Self {
            aln_end: Some(self.end()),
            ..self
        }
    }
}

/// Everything the consensus engine hands to downstream collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub consensus_vec: Vec<char>,
    pub consensus_ungapped: String,
    pub map_ungap_to_aln: CoordinateMap,
    pub consensus_aln_len: usize,
    pub conserved_aln: Vec<ConservedRegion>,
    pub alignment_applied: bool,
}
