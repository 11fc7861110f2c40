//! Request orchestration
//!
//! One request flows parse → consensus → published lookup → prediction calls
//! → result assembly, strictly sequentially. Every entity is created for the
//! request and dropped with it.

use std::cmp::Ordering;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::coords::{ungap, CoordinateMap};
use crate::consensus::{build_consensus, conserved_columns};
use crate::conserved::{find_conserved_runs, whole_sequence_region};
use crate::error::{EpimapError, EpimapResult};
use crate::fasta::{looks_like_fasta, parse_fasta};
use crate::locate::locate_peptide;
use crate::msa::Aligner;
use crate::predict::{
    predict_with_retry, AffinityClass, PredictedEpitope, PredictionService, RetryPolicy,
};
use crate::progress::{
    NoProgress, ProgressObserver, ProgressUpdate, Step, ALIGNMENT_ETA_SECS, PREDICTION_CALL_ETA_SECS,
};
use crate::published::{PublishedDb, PublishedEpitope};
use crate::types::{AlignedMatrix, ConsensusResult, ConservedRegion, SequenceRecord};

pub const DEFAULT_PEPTIDE_LENGTHS: (usize, usize) = (9, 10);
pub const DEFAULT_MIN_CONSERVED_LENGTH: usize = 10;
pub const MIN_CONSERVED_LENGTH_RANGE: RangeInclusive<usize> = 5..=100;

const FASTA_PREVIEW_CHARS: usize = 100;
const CONSENSUS_PREVIEW_CHARS: usize = 80;

/// Identity path: one sequence is its own consensus
pub fn consensus_single(record: &SequenceRecord, min_conserved_length: usize) -> ConsensusResult {
    let residues = record.sequence.as_bytes();
    let (consensus_ungapped, map_ungap_to_aln) = ungap(residues);
    ConsensusResult {
        consensus_vec: record.sequence.chars().collect(),
        consensus_ungapped,
        map_ungap_to_aln,
        consensus_aln_len: residues.len(),
        conserved_aln: whole_sequence_region(residues.len(), min_conserved_length),
        alignment_applied: false,
    }
}

/// Consensus, coordinate map and conserved runs of a validated alignment
pub fn consensus_from_matrix(matrix: &AlignedMatrix, min_conserved_length: usize) -> ConsensusResult {
    let consensus = build_consensus(matrix);
    let (consensus_ungapped, map_ungap_to_aln) = ungap(&consensus);
    let conserved_aln = find_conserved_runs(&conserved_columns(matrix), min_conserved_length);
    ConsensusResult {
        consensus_vec: consensus.iter().map(|&c| c as char).collect(),
        consensus_ungapped,
        map_ungap_to_aln,
        consensus_aln_len: consensus.len(),
        conserved_aln,
        alignment_applied: true,
    }
}

/// Dispatch on input cardinality.
///
/// Alignment failures fail the request; there is no unaligned fallback.
pub fn build_consensus_result(
    records: &[SequenceRecord],
    min_conserved_length: usize,
    aligner: &dyn Aligner,
) -> EpimapResult<ConsensusResult> {
    match records {
        [] => Err(EpimapError::input("No sequences to build a consensus from")),
        [single] => {
            log::info!("Single sequence '{}' ({} aa), no alignment needed", single.id, single.ungapped_len());
            Ok(consensus_single(single, min_conserved_length))
        }
        _ => {
            log::info!("Aligning {} sequences with {}", records.len(), aligner.name());
            let matrix = aligner.align(records).map_err(|source| EpimapError::Alignment {
                sequences: records.len(),
                backend: aligner.name().to_string(),
                source,
            })?;
            let result = consensus_from_matrix(&matrix, min_conserved_length);
            log::info!(
                "Consensus: {} columns, {} residues, {} conserved regions",
                result.consensus_aln_len,
                result.consensus_ungapped.len(),
                result.conserved_aln.len()
            );
            Ok(result)
        }
    }
}

/// Parse FASTA text and build its consensus in one step
pub fn consensus_from_fasta(
    fasta: &str,
    min_conserved_length: usize,
    aligner: &dyn Aligner,
) -> EpimapResult<ConsensusResult> {
    let records = parse_checked(fasta)?;
    build_consensus_result(&records, min_conserved_length, aligner)
}

fn parse_checked(fasta: &str) -> EpimapResult<Vec<SequenceRecord>> {
    if fasta.trim().is_empty() {
        return Err(EpimapError::input("FASTA content or file required"));
    }
    if !looks_like_fasta(fasta) {
        let preview: String = fasta.chars().take(FASTA_PREVIEW_CHARS).collect();
        return Err(EpimapError::input(format!(
            "Invalid FASTA: input does not look like sequence data. First {} chars: {}",
            FASTA_PREVIEW_CHARS,
            preview.replace('\n', " ")
        )));
    }
    let records = parse_fasta(fasta);
    if records.is_empty() {
        return Err(EpimapError::input("No valid sequences in FASTA"));
    }
    Ok(records)
}

/// User-selected options for one prediction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionParams {
    pub alleles: Vec<String>,
    pub peptide_lengths: (usize, usize),
    pub min_conserved_length: usize,
    pub accession: Option<String>,
    pub skip_prediction: bool,
}

impl Default for PredictionParams {
    fn default() -> Self {
        Self {
            alleles: Vec::new(),
            peptide_lengths: DEFAULT_PEPTIDE_LENGTHS,
            min_conserved_length: DEFAULT_MIN_CONSERVED_LENGTH,
            accession: None,
            skip_prediction: false,
        }
    }
}

impl PredictionParams {
    pub fn validate(&self) -> EpimapResult<()> {
        if self.alleles.is_empty() {
            return Err(EpimapError::input("Select at least one HLA allele"));
        }
        if let Some(i) = self.alleles.iter().position(|a| a.trim().is_empty()) {
            return Err(EpimapError::input(format!("Allele #{} is blank", i + 1)));
        }
        let (min, max) = self.peptide_lengths;
        if min == 0 || min > max {
            return Err(EpimapError::input(format!(
                "Invalid peptide length range {}-{}",
                min, max
            )));
        }
        Ok(())
    }

    /// Requested minimum conserved length, clamped to the supported range
    pub fn effective_min_conserved_length(&self) -> usize {
        self.min_conserved_length
            .clamp(*MIN_CONSERVED_LENGTH_RANGE.start(), *MIN_CONSERVED_LENGTH_RANGE.end())
    }

    pub fn peptide_length_list(&self) -> Vec<usize> {
        (self.peptide_lengths.0..=self.peptide_lengths.1).collect()
    }

    fn accession(&self) -> Option<&str> {
        self.accession.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Final response of a prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted: Vec<PredictedEpitope>,
    pub published: Vec<PublishedEpitope>,
    pub conserved_aln: Vec<ConservedRegion>,
    pub consensus_vec: Vec<char>,
    pub consensus_ungapped: String,
    pub map_ungap_to_aln: CoordinateMap,
    pub consensus_aln_len: usize,
    pub alignment_applied: bool,
}

impl PredictionResult {
    fn assemble(
        consensus: ConsensusResult,
        predicted: Vec<PredictedEpitope>,
        published: Vec<PublishedEpitope>,
    ) -> Self {
        Self {
            predicted,
            published,
            conserved_aln: consensus.conserved_aln.into_iter().map(ConservedRegion::with_end).collect(),
            consensus_vec: consensus.consensus_vec,
            consensus_ungapped: consensus.consensus_ungapped,
            map_ungap_to_aln: consensus.map_ungap_to_aln,
            consensus_aln_len: consensus.consensus_aln_len,
            alignment_applied: consensus.alignment_applied,
        }
    }
}

/// Collaborators needed to serve prediction requests
pub struct Pipeline<'a> {
    aligner: &'a dyn Aligner,
    service: &'a dyn PredictionService,
    published: &'a PublishedDb,
    retry: RetryPolicy,
    observer: &'a dyn ProgressObserver,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        aligner: &'a dyn Aligner,
        service: &'a dyn PredictionService,
        published: &'a PublishedDb,
    ) -> Self {
        Self {
            aligner,
            service,
            published,
            retry: RetryPolicy::default(),
            observer: &NoProgress,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    fn progress(&self, update: ProgressUpdate) {
        self.observer.on_progress(&update);
    }

    /// Serve one prediction request end to end
    pub fn run(&self, fasta: &str, params: &PredictionParams) -> EpimapResult<PredictionResult> {
        params.validate()?;
        let min_conserved = params.effective_min_conserved_length();
        let lengths = params.peptide_length_list();
        let total_calls = if params.skip_prediction { 0 } else { params.alleles.len() * lengths.len() };
        let prediction_eta = total_calls as u64 * PREDICTION_CALL_ETA_SECS;
        let total_eta = prediction_eta + if total_calls > 0 { ALIGNMENT_ETA_SECS } else { 0 };

        self.progress(ProgressUpdate::new(Step::Parse, "Parsing FASTA…", 5).with_eta(total_eta));
        let records = parse_checked(fasta)?;
        log::info!("Parsed {} sequences", records.len());

        let consensus = if records.len() == 1 {
            self.progress(
                ProgressUpdate::new(Step::Consensus, "Single sequence (no alignment needed)", 15)
                    .with_eta(prediction_eta),
            );
            build_consensus_result(&records, min_conserved, self.aligner)?
        } else {
            self.progress(
                ProgressUpdate::new(
                    Step::Consensus,
                    format!("Running multi-sequence alignment ({})…", self.aligner.name()),
                    10,
                )
                .with_eta(total_eta),
            );
            let result = build_consensus_result(&records, min_conserved, self.aligner)?;
            self.progress(ProgressUpdate::new(Step::Consensus, "Alignment complete", 25).with_eta(prediction_eta));
            result
        };

        let shortest_peptide = params.peptide_lengths.0;
        if consensus.consensus_ungapped.len() < shortest_peptide {
            let preview: String = consensus.consensus_ungapped.chars().take(CONSENSUS_PREVIEW_CHARS).collect();
            return Err(EpimapError::input(format!(
                "Consensus sequence too short ({} aa, shortest peptide length {}). Check FASTA input. First {} chars: {}",
                consensus.consensus_ungapped.len(),
                shortest_peptide,
                CONSENSUS_PREVIEW_CHARS,
                preview
            )));
        }

        self.progress(ProgressUpdate::new(Step::Published, "Looking up published epitopes…", 30).with_eta(prediction_eta));
        let published = match params.accession() {
            Some(accession) => {
                let found = self.published.find(&consensus.consensus_ungapped, accession);
                log::info!("Found {} published epitopes for {}", found.len(), accession);
                found
            }
            None => Vec::new(),
        };

        let predicted = if params.skip_prediction {
            log::info!("Skipping binding prediction");
            Vec::new()
        } else {
            self.predict_binders(&consensus.consensus_ungapped, &params.alleles, &lengths)?
        };

        self.progress(ProgressUpdate::new(Step::Finish, "Processing results…", 98));
        Ok(PredictionResult::assemble(consensus, predicted, published))
    }

    fn predict_binders(
        &self,
        consensus: &str,
        alleles: &[String],
        lengths: &[usize],
    ) -> EpimapResult<Vec<PredictedEpitope>> {
        let total = alleles.len() * lengths.len();
        let mut done = 0;
        let mut hits = Vec::new();

        for allele in alleles {
            for &length in lengths {
                let label = format!("{} {}mer", allele, length);
                self.progress(
                    ProgressUpdate::new(
                        Step::Prediction,
                        format!("Querying {}: {} ({}mer)…", self.service.name(), allele, length),
                        (30 + done * 65 / total) as u8,
                    )
                    .with_eta((total - done) as u64 * PREDICTION_CALL_ETA_SECS)
                    .with_current(label),
                );

                let rows = predict_with_retry(self.service, &self.retry, allele, length, consensus)?;
                log::debug!("{} rows for {} {}mer", rows.len(), allele, length);

                for row in rows {
                    let Some(location) = locate_peptide(consensus, &row.peptide) else {
                        continue;
                    };
                    if location.ambiguous {
                        log::warn!(
                            "Peptide {} occurs more than once in the consensus; using first match at {}",
                            row.peptide,
                            location.start
                        );
                    }
                    hits.push(PredictedEpitope {
                        affinity_class: AffinityClass::from_affinity(row.affinity),
                        peptide: row.peptide,
                        allele: allele.clone(),
                        rank: row.rank,
                        affinity: row.affinity,
                        start: location.start,
                        end: location.end,
                        length,
                        row_id: None,
                        ambiguous: location.ambiguous,
                    });
                }
                done += 1;
            }
        }

        let mut binders: Vec<PredictedEpitope> = hits.into_iter().filter(PredictedEpitope::is_binder).collect();
        for (i, binder) in binders.iter_mut().enumerate() {
            binder.row_id = Some(i + 1);
        }
        binders.sort_by(|a, b| a.rank.partial_cmp(&b.rank).unwrap_or(Ordering::Equal));
        log::info!("{} predicted binders across {} calls", binders.len(), total);
        Ok(binders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msa::{AlignResult, AlignmentResponse};
    use crate::predict::{PredictError, RawPrediction};
    use std::time::Duration;

    struct EchoAligner;

    impl Aligner for EchoAligner {
        fn run(&self, records: &[SequenceRecord]) -> AlignResult<AlignmentResponse> {
            Ok(AlignmentResponse::from_records(records.to_vec()))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct TableService(Vec<RawPrediction>);

    impl PredictionService for TableService {
        fn predict(&self, _allele: &str, length: usize, _sequence: &str) -> Result<Vec<RawPrediction>, PredictError> {
            Ok(self.0.iter().filter(|r| r.peptide.len() == length).cloned().collect())
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    fn raw(peptide: &str, rank: f64, affinity: f64) -> RawPrediction {
        RawPrediction {
            peptide: peptide.to_string(),
            allele: "ignored".to_string(),
            rank,
            affinity,
            start: 0,
        }
    }

    fn params() -> PredictionParams {
        PredictionParams {
            alleles: vec!["HLA-A*02:01".to_string()],
            ..PredictionParams::default()
        }
    }

    const SEQ: &str = "MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQ";

    #[test]
    fn test_single_sequence_region() {
        let record = SequenceRecord::new("p", "A".repeat(120));
        let result = consensus_single(&record, 100);
        assert!(!result.alignment_applied);
        assert_eq!(result.conserved_aln, vec![ConservedRegion::new(1, 120)]);
        assert!(consensus_single(&record, 150).conserved_aln.is_empty());
    }

    #[test]
    fn test_single_gapped_sequence_keeps_aligned_coordinates() {
        let result = consensus_single(&SequenceRecord::new("p", "MK-V"), 5);
        assert_eq!(result.consensus_ungapped, "MKV");
        assert_eq!(result.map_ungap_to_aln.as_slice(), &[1, 2, 4]);
        assert_eq!(result.consensus_aln_len, 4);
        assert_eq!(result.consensus_vec, vec!['M', 'K', '-', 'V']);
    }

    #[test]
    fn test_matrix_path() {
        let matrix = AlignedMatrix::from_strings(&["MKVL-A", "MKIL-A", "MKIL-A"]).unwrap();
        let result = consensus_from_matrix(&matrix, 2);
        assert!(result.alignment_applied);
        assert_eq!(result.consensus_ungapped, "MKILA");
        assert_eq!(result.map_ungap_to_aln.as_slice(), &[1, 2, 3, 4, 6]);
        assert_eq!(result.conserved_aln, vec![ConservedRegion::new(1, 2)]);
    }

    #[test]
    fn test_zero_records_rejected() {
        let err = build_consensus_result(&[], 10, &EchoAligner).unwrap_err();
        assert!(matches!(err, EpimapError::Input(_)));
    }

    #[test]
    fn test_min_conserved_clamped() {
        let mut p = params();
        p.min_conserved_length = 1;
        assert_eq!(p.effective_min_conserved_length(), 5);
        p.min_conserved_length = 500;
        assert_eq!(p.effective_min_conserved_length(), 100);
    }

    #[test]
    fn test_params_validation() {
        assert!(PredictionParams::default().validate().is_err());
        let mut p = params();
        p.peptide_lengths = (10, 9);
        assert!(p.validate().is_err());
        assert!(params().validate().is_ok());
        assert_eq!(params().peptide_length_list(), vec![9, 10]);
    }

    #[test]
    fn test_blank_allele_rejected() {
        let mut p = params();
        p.alleles.push(String::new());
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("Allele #2 is blank"));

        p.alleles = vec!["  ".to_string()];
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_binders_filtered_numbered_and_sorted() {
        let service = TableService(vec![
            raw("TAYIAKQRQ", 1.5, 300.0),
            raw("AYIAKQRQI", 0.2, 20.0),
            raw("YIAKQRQIS", 4.0, 900.0),
            raw("WWWWWWWWW", 0.1, 5.0),
            raw("KTAYIAKQRQ", 0.9, 45.0),
        ]);
        let db = PublishedDb::empty();
        let pipeline = Pipeline::new(&EchoAligner, &service, &db)
            .with_retry(RetryPolicy { retries: 0, backoff: Duration::ZERO });

        let result = pipeline.run(&format!(">p\n{}\n", SEQ), &params()).unwrap();
        let summary: Vec<_> = result
            .predicted
            .iter()
            .map(|e| (e.peptide.as_str(), e.row_id, e.start, e.length, e.affinity_class))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("AYIAKQRQI", Some(2), 4, 9, AffinityClass::Strong),
                ("KTAYIAKQRQ", Some(3), 2, 10, AffinityClass::Strong),
                ("TAYIAKQRQ", Some(1), 3, 9, AffinityClass::Intermediate),
            ]
        );
        assert!(result.predicted.iter().all(|e| e.allele == "HLA-A*02:01"));
    }

    #[test]
    fn test_skip_prediction_never_calls_service() {
        struct Unreachable;
        impl PredictionService for Unreachable {
            fn predict(&self, _: &str, _: usize, _: &str) -> Result<Vec<RawPrediction>, PredictError> {
                panic!("prediction service must not be called");
            }
            fn name(&self) -> &str {
                "unreachable"
            }
        }

        let db = PublishedDb::empty();
        let mut p = params();
        p.skip_prediction = true;
        let result = Pipeline::new(&EchoAligner, &Unreachable, &db)
            .run(&format!(">p\n{}\n", SEQ), &p)
            .unwrap();
        assert!(result.predicted.is_empty());
        assert!(!result.alignment_applied);
    }

    #[test]
    fn test_consensus_shorter_than_peptide_rejected() {
        let db = PublishedDb::empty();
        let service = TableService(Vec::new());
        let err = Pipeline::new(&EchoAligner, &service, &db)
            .run(">shortfragment01\nMKTAYIA\n", &params())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Consensus sequence too short (7 aa"));
        assert!(message.contains("MKTAYIA"));
    }

    #[test]
    fn test_non_fasta_rejected() {
        let db = PublishedDb::empty();
        let service = TableService(Vec::new());
        let pipeline = Pipeline::new(&EchoAligner, &service, &db);
        let err = pipeline.run("<html><body>Not Found</body></html>", &params()).unwrap_err();
        assert!(err.to_string().contains("Invalid FASTA"));
        let err = pipeline.run("   ", &params()).unwrap_err();
        assert!(err.to_string().contains("FASTA content or file required"));
    }

    #[test]
    fn test_conserved_regions_carry_end() {
        let db = PublishedDb::empty();
        let service = TableService(Vec::new());
        let mut p = params();
        p.skip_prediction = true;
        p.min_conserved_length = 5;
        let fasta = format!(">a\n{}\n>b\n{}\n", SEQ, SEQ);
        let result = Pipeline::new(&EchoAligner, &service, &db).run(&fasta, &p).unwrap();
        assert!(result.alignment_applied);
        assert_eq!(result.conserved_aln.len(), 1);
        assert_eq!(result.conserved_aln[0].aln_end, Some(SEQ.len()));
    }

    #[test]
    fn test_result_json_shape() {
        let db = PublishedDb::empty();
        let service = TableService(Vec::new());
        let mut p = params();
        p.skip_prediction = true;
        let result = Pipeline::new(&EchoAligner, &service, &db)
            .run(&format!(">p\n{}\n", SEQ), &p)
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        for key in [
            "predicted",
            "published",
            "conserved_aln",
            "consensus_vec",
            "consensus_ungapped",
            "map_ungap_to_aln",
            "consensus_aln_len",
            "alignment_applied",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["consensus_vec"][0], "M");
        assert_eq!(json["map_ungap_to_aln"][2], 3);
    }
}
