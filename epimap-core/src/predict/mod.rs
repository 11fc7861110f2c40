//! MHC-I binding prediction service interface
//!
//! The scoring model lives behind an external service. This module defines
//! the narrow contract the pipeline relies on ("peptide predictions for an
//! allele, a peptide length and a sequence"), the tabular response parser, and
//! the fixed-backoff retry wrapper around each call.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod iedb;

pub use iedb::IedbClient;

/// Affinity (nM) at or below which a binder is `Strong`
pub const STRONG_AFFINITY_NM: f64 = 50.0;
/// Affinity (nM) at or below which a binder is `Intermediate`
pub const INTERMEDIATE_AFFINITY_NM: f64 = 500.0;
/// Percentile rank below which a peptide is reported as a binder
pub const BINDER_RANK_CUTOFF: f64 = 2.0;

const MISSING_RANK: f64 = 999.0;
const MISSING_AFFINITY: f64 = 99999.0;

/// Errors from the prediction service
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IEDB HTTP {status} (allele={allele} length={length} seqLen={seq_len}) seqPreview=[{seq_preview}] Response: {body_preview}")]
    Status {
        status: u16,
        allele: String,
        length: usize,
        seq_len: usize,
        seq_preview: String,
        body_preview: String,
    },

    #[error("IEDB request failed (allele={allele} length={length} seqLen={seq_len}) after {attempts} attempts: {message}")]
    Exhausted {
        allele: String,
        length: usize,
        seq_len: usize,
        attempts: u32,
        message: String,
    },
}

/// Binding strength bucket derived from predicted affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffinityClass {
    Strong,
    Intermediate,
    Weak,
}

impl AffinityClass {
    pub fn from_affinity(affinity_nm: f64) -> Self {
        if affinity_nm <= STRONG_AFFINITY_NM {
            Self::Strong
        } else if affinity_nm <= INTERMEDIATE_AFFINITY_NM {
            Self::Intermediate
        } else {
            // Also catches NaN
            Self::Weak
        }
    }
}

/// One row of a prediction service response
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub peptide: String,
    pub allele: String,
    pub rank: f64,
    pub affinity: f64,
    /// Start as reported by the service; recomputed against the consensus
    pub start: usize,
}

/// A predicted binder placed on the ungapped consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PredictedEpitope {
    pub peptide: String,
    pub allele: String,
    pub rank: f64,
    pub affinity: f64,
    pub affinity_class: AffinityClass,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    #[serde(rename = "RowID", skip_serializing_if = "Option::is_none", default)]
    pub row_id: Option<usize>,
    #[serde(default)]
    pub ambiguous: bool,
}

impl PredictedEpitope {
    pub fn is_binder(&self) -> bool {
        self.rank < BINDER_RANK_CUTOFF
    }
}

/// Contract of an external MHC-I prediction service
pub trait PredictionService {
    /// Predict all peptides of `length` in `sequence` against `allele`
    fn predict(&self, allele: &str, length: usize, sequence: &str) -> Result<Vec<RawPrediction>, PredictError>;

    /// Get the name of this service
    fn name(&self) -> &str;
}

/// Fixed-backoff retry policy for prediction calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }
}

/// Call the service, retrying failed attempts with a fixed delay
pub fn predict_with_retry(
    service: &dyn PredictionService,
    policy: &RetryPolicy,
    allele: &str,
    length: usize,
    sequence: &str,
) -> Result<Vec<RawPrediction>, PredictError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match service.predict(allele, length, sequence) {
            Ok(rows) => return Ok(rows),
            Err(e) if attempt < policy.attempts() => {
                log::warn!(
                    "{} request failed (attempt {}/{}, allele={} length={}): {}",
                    service.name(),
                    attempt,
                    policy.attempts(),
                    allele,
                    length,
                    e
                );
                thread::sleep(policy.backoff);
            }
            Err(e) => {
                return Err(PredictError::Exhausted {
                    allele: allele.to_string(),
                    length,
                    seq_len: sequence.len(),
                    attempts: attempt,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Parse the tab-separated table returned by the MHC-I tools API.
///
/// Rows before the `allele\t...` header line are preamble and skipped; an
/// absent header yields no predictions.
pub fn parse_mhci_tsv(text: &str) -> Vec<RawPrediction> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let Some(header_idx) = lines
        .iter()
        .position(|l| l.to_ascii_lowercase().starts_with("allele\t"))
    else {
        return Vec::new();
    };

    let header: Vec<String> = lines[header_idx]
        .to_ascii_lowercase()
        .split('\t')
        .map(|h| h.trim().to_string())
        .collect();
    let column = |name: &str| header.iter().position(|h| h == name);
    let peptide_col = column("peptide");
    let allele_col = column("allele");
    let rank_col = column("percentile_rank");
    let ic50_col = column("ic50").or_else(|| column("ic50(nm)"));
    let start_col = column("start").or_else(|| column("pos"));

    lines[header_idx + 1..]
        .iter()
        .map(|row| {
            let cells: Vec<&str> = row.split('\t').collect();
            let cell = |col: Option<usize>| col.and_then(|i| cells.get(i)).map(|c| c.trim());
            RawPrediction {
                peptide: cell(peptide_col).unwrap_or_default().to_string(),
                allele: cell(allele_col).unwrap_or_default().to_string(),
                rank: cell(rank_col).and_then(|c| c.parse().ok()).unwrap_or(MISSING_RANK),
                affinity: cell(ic50_col).and_then(|c| c.parse().ok()).unwrap_or(MISSING_AFFINITY),
                start: cell(start_col).and_then(|c| c.parse().ok()).unwrap_or(0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const SAMPLE_TSV: &str = "\
allele\tseq_num\tstart\tend\tlength\tpeptide\tcore\ticore\tscore\tpercentile_rank\tic50
HLA-A*02:01\t1\t3\t11\t9\tTAYIAKQRQ\tTAYIAKQRQ\tTAYIAKQRQ\t0.8\t0.12\t21.5
HLA-A*02:01\t1\t1\t9\t9\tMKTAYIAKQ\tMKTAYIAKQ\tMKTAYIAKQ\t0.1\t7.5\t4200
";

    #[test]
    fn test_affinity_classes() {
        assert_eq!(AffinityClass::from_affinity(12.0), AffinityClass::Strong);
        assert_eq!(AffinityClass::from_affinity(50.0), AffinityClass::Strong);
        assert_eq!(AffinityClass::from_affinity(50.1), AffinityClass::Intermediate);
        assert_eq!(AffinityClass::from_affinity(500.0), AffinityClass::Intermediate);
        assert_eq!(AffinityClass::from_affinity(501.0), AffinityClass::Weak);
        assert_eq!(AffinityClass::from_affinity(f64::NAN), AffinityClass::Weak);
    }

    #[test]
    fn test_parse_tsv() {
        let rows = parse_mhci_tsv(SAMPLE_TSV);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].peptide, "TAYIAKQRQ");
        assert_eq!(rows[0].allele, "HLA-A*02:01");
        assert_eq!(rows[0].rank, 0.12);
        assert_eq!(rows[0].affinity, 21.5);
        assert_eq!(rows[0].start, 3);
    }

    #[test]
    fn test_parse_tsv_with_preamble_and_nm_column() {
        let text = "# netmhcpan 4.1\n\nAllele\tpos\tpeptide\tic50(nM)\nHLA-B*07:02\t5\tAPRTVALTA\t310\n";
        let rows = parse_mhci_tsv(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].affinity, 310.0);
        assert_eq!(rows[0].start, 5);
        // No percentile column: rank defaults high so it is never a binder
        assert_eq!(rows[0].rank, 999.0);
    }

    #[test]
    fn test_parse_tsv_without_header() {
        assert!(parse_mhci_tsv("Invalid allele name\n").is_empty());
        assert!(parse_mhci_tsv("").is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let epitope = PredictedEpitope {
            peptide: "SIINFEKL".to_string(),
            allele: "HLA-A*02:01".to_string(),
            rank: 0.5,
            affinity: 30.0,
            affinity_class: AffinityClass::Strong,
            start: 4,
            end: 11,
            length: 8,
            row_id: Some(1),
            ambiguous: false,
        };
        let json = serde_json::to_value(&epitope).unwrap();
        assert_eq!(json["Peptide"], "SIINFEKL");
        assert_eq!(json["AffinityClass"], "Strong");
        assert_eq!(json["RowID"], 1);
        assert!(epitope.is_binder());
    }

    struct FlakyService {
        failures: u32,
        calls: Cell<u32>,
    }

    impl PredictionService for FlakyService {
        fn predict(&self, allele: &str, _length: usize, _sequence: &str) -> Result<Vec<RawPrediction>, PredictError> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() <= self.failures {
                return Err(PredictError::Http("connection reset".to_string()));
            }
            Ok(vec![RawPrediction {
                peptide: "MKV".to_string(),
                allele: allele.to_string(),
                rank: 1.0,
                affinity: 40.0,
                start: 1,
            }])
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn no_delay() -> RetryPolicy {
        RetryPolicy { retries: 2, backoff: Duration::ZERO }
    }

    #[test]
    fn test_retry_recovers() {
        let service = FlakyService { failures: 2, calls: Cell::new(0) };
        let rows = predict_with_retry(&service, &no_delay(), "HLA-A*02:01", 9, "MKVLA").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(service.calls.get(), 3);
    }

    #[test]
    fn test_retry_exhausted() {
        let service = FlakyService { failures: 5, calls: Cell::new(0) };
        let err = predict_with_retry(&service, &no_delay(), "HLA-A*02:01", 9, "MKVLA").unwrap_err();
        assert_eq!(service.calls.get(), 3);
        let message = err.to_string();
        assert!(message.contains("allele=HLA-A*02:01"));
        assert!(message.contains("length=9"));
        assert!(message.contains("seqLen=5"));
        assert!(message.contains("connection reset"));
    }
}
