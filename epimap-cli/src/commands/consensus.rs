//! Consensus command implementation - consensus, coordinate map and conserved runs as JSON

use std::path::PathBuf;

use epimap_core::pipeline::consensus_from_fasta;
use epimap_core::PredictionParams;

use super::{build_aligner, resolve_fasta};
use crate::config::Config;
use crate::error::CliResult;

pub fn execute(
    config: &Config,
    input: Option<PathBuf>,
    sample: bool,
    min_conserved: Option<usize>,
    output: Option<PathBuf>,
) -> CliResult<()> {
    let fasta = resolve_fasta(config, input, sample)?;
    let params = PredictionParams {
        min_conserved_length: min_conserved.unwrap_or(config.defaults.min_conserved_length),
        ..PredictionParams::default()
    };
    let aligner = build_aligner(&config.msa)?;

    let result = consensus_from_fasta(&fasta, params.effective_min_conserved_length(), aligner.as_ref())?;
    log::info!(
        "Consensus of {} residues over {} columns ({} conserved regions)",
        result.consensus_ungapped.len(),
        result.consensus_aln_len,
        result.conserved_aln.len()
    );

    let json = serde_json::to_string_pretty(&result)?;
    super::predict::write_output(output.as_deref(), &json)
}
