//! FASTA parsing for protein sequence sets
//!
//! Records are cleaned at parse time: residues are uppercased, stop-codon
//! markers (`*`) and anything outside `A-Z` and the gap symbol are dropped.
//! The parser never fails; input without header lines yields no records and
//! it is up to the caller to reject that.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

use crate::types::{SequenceRecord, GAP};

const UNKNOWN_ID: &str = "unknown";

/// Parse FASTA text into records, in input order
pub fn parse_fasta(content: &str) -> Vec<SequenceRecord> {
    let mut records = Vec::new();
    let mut current_id: Option<String> = None;
    let mut raw = String::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('>') {
            if let Some(id) = current_id.take() {
                records.push(SequenceRecord::new(id, clean_residues(&raw)));
            }
            let id = header.split_whitespace().next().unwrap_or_default();
            current_id = Some(if id.is_empty() { UNKNOWN_ID.to_string() } else { id.to_string() });
            raw.clear();
        } else if current_id.is_some() {
            raw.extend(trimmed.chars().filter(|c| !c.is_whitespace()));
        }
    }

    if let Some(id) = current_id {
        records.push(SequenceRecord::new(id, clean_residues(&raw)));
    }

    records
}

fn clean_residues(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|&c| c.is_ascii_uppercase() || c == GAP as char)
        .collect()
}

/// Cheap sniffing for uploads that are obviously not FASTA.
///
/// Catches the common mistakes of pasting an HTML error page, an XML record
/// or a JSON document instead of sequence text.
pub fn looks_like_fasta(text: &str) -> bool {
    let t = text.trim();
    if t.chars().count() < 20 {
        return false;
    }
    let lower = t.to_ascii_lowercase();
    if lower.contains("<?xml") || lower.contains("<!doctype") || lower.contains("<html") {
        return false;
    }
    if let Some(rest) = t.strip_prefix('{') {
        if rest.trim_start().starts_with('"') {
            return false;
        }
    }
    t.contains('>') && has_letter_run(t, 10)
}

fn has_letter_run(text: &str, min_run: usize) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Serialize records as `>id` / sequence blocks for an external aligner
pub fn to_fasta_payload(records: &[SequenceRecord]) -> String {
    records
        .iter()
        .map(|r| format!(">{}\n{}", r.id, r.sequence))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read a FASTA file into memory, transparently decompressing `.gz`
pub fn read_fasta_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open FASTA file: {}", path.display()))?;

    let mut content = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        BufReader::new(GzDecoder::new(file))
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to decompress FASTA file: {}", path.display()))?;
    } else {
        BufReader::new(file)
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to read FASTA file: {}", path.display()))?;
    }
    Ok(content)
}
