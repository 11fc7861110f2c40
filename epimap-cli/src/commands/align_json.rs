//! Align-json command implementation
//!
//! Reads FASTA on stdin and writes `{"rows":[{"id","sequence"}]}` on stdout.
//! This is the same contract the `command` alignment backend reads.

use std::io::{Read, Write};

use epimap_core::fasta::parse_fasta;
use epimap_core::{Aligner, ClustalOmega};

use crate::config::Config;
use crate::error::{CliError, CliResult};

pub fn execute(config: &Config) -> CliResult<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let response = align_fasta(config, &input)?;
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

fn align_fasta(config: &Config, input: &str) -> CliResult<epimap_core::msa::AlignmentResponse> {
    let records = parse_fasta(input);
    if records.len() < 2 {
        return Err(CliError::validation(format!(
            "Need at least 2 sequences in FASTA (got {})",
            records.len()
        )));
    }

    let backend = if config.msa.clustalo_binary.trim().is_empty() {
        ClustalOmega::locate()?
    } else {
        ClustalOmega::with_binary_path(config.msa.clustalo_binary.trim())
    }
    .with_timeout(config.msa.timeout());

    log::info!("Aligning {} sequences for JSON output", records.len());
    Ok(backend.run(&records)?)
}
