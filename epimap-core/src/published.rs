//! Literature-reported epitopes from a local table
//!
//! The table is loaded once by the caller and passed in explicitly; lookups
//! never touch the filesystem. A missing or unreadable table behaves like an
//! empty one.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::locate::locate_peptide;

const NEGATIVE_ASSAY_PATTERN: &str = r"(?i)negative|no\s*binding|not\s*detected|non.?binding|no\s*activity";

/// One row of the published epitope export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedDbRow {
    #[serde(rename = "MoleculeParentIRI")]
    pub molecule_parent_iri: String,
    #[serde(rename = "SourceFile")]
    pub source_file: String,
    #[serde(rename = "Assay")]
    pub assay: String,
    #[serde(rename = "Peptide")]
    pub peptide: String,
    #[serde(rename = "Allele")]
    pub allele: String,
    #[serde(rename = "EpitopeID")]
    pub epitope_id: String,
}

/// Published epitope aggregated over assays, placed on the consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedEpitope {
    #[serde(rename = "Main_Epitope_ID")]
    pub main_epitope_id: String,
    #[serde(rename = "Peptide")]
    pub peptide: String,
    #[serde(rename = "Allele")]
    pub allele: String,
    #[serde(rename = "#_Assays")]
    pub assay_count: usize,
    #[serde(rename = "SourceFiles")]
    pub source_files: String,
    #[serde(rename = "Start")]
    pub start: usize,
    #[serde(rename = "End")]
    pub end: usize,
    #[serde(rename = "Assays")]
    pub assays: String,
    #[serde(rename = "Ambiguous", default)]
    pub ambiguous: bool,
}

/// Immutable, in-memory published epitope table
#[derive(Debug, Clone)]
pub struct PublishedDb {
    rows: Vec<PublishedDbRow>,
    negative: Regex,
}

impl PublishedDb {
    pub fn from_rows(rows: Vec<PublishedDbRow>) -> Self {
        Self {
            rows,
            // Constant pattern, exercised by the unit tests
            negative: Regex::new(NEGATIVE_ASSAY_PATTERN).expect("valid negative assay pattern"),
        }
    }

    pub fn empty() -> Self {
        Self::from_rows(Vec::new())
    }

    /// Load a JSON array of rows; anything other than an array is an error
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let rows: Vec<PublishedDbRow> = serde_json::from_str(&raw)?;
        log::info!("Loaded {} published epitope rows from {}", rows.len(), path.display());
        Ok(Self::from_rows(rows))
    }

    /// Load the table, treating a missing or malformed file as empty
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(db) => db,
            Err(e) => {
                log::warn!("Published epitope table unavailable ({}): {}", path.display(), e);
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn keep(&self, row: &PublishedDbRow) -> bool {
        match row.source_file.to_ascii_lowercase().as_str() {
            "tcell" => row.assay.to_ascii_lowercase().contains("positive"),
            "mhc" => !self.negative.is_match(&row.assay),
            _ => false,
        }
    }

    /// Positive published epitopes for `accession` that occur in `consensus`.
    ///
    /// Rows are grouped by (peptide, allele) in first-seen order.
    pub fn find(&self, consensus: &str, accession: &str) -> Vec<PublishedEpitope> {
        let accession = accession.trim().to_ascii_uppercase();
        if accession.is_empty() || self.rows.is_empty() {
            return Vec::new();
        }

        let mut groups: Vec<Vec<&PublishedDbRow>> = Vec::new();
        let mut index: HashMap<(&str, &str), usize> = HashMap::new();
        let mut locations = Vec::new();

        for row in &self.rows {
            if !row.molecule_parent_iri.to_ascii_uppercase().contains(&accession) || !self.keep(row) {
                continue;
            }
            let Some(location) = locate_peptide(consensus, &row.peptide) else {
                continue;
            };
            let key = (row.peptide.as_str(), row.allele.as_str());
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                locations.push(location);
                groups.len() - 1
            });
            groups[slot].push(row);
        }

        groups
            .into_iter()
            .zip(locations)
            .map(|(rows, location)| {
                let first = rows[0];
                if location.ambiguous {
                    log::warn!(
                        "Published peptide {} occurs more than once in the consensus; using first match at {}",
                        first.peptide,
                        location.start
                    );
                }
                PublishedEpitope {
                    main_epitope_id: distinct(rows.iter().map(|r| r.epitope_id.as_str()))
                        .into_iter()
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    peptide: first.peptide.clone(),
                    allele: first.allele.clone(),
                    assay_count: rows.len(),
                    source_files: distinct(rows.iter().map(|r| r.source_file.as_str())).join("+"),
                    start: location.start,
                    end: location.end,
                    assays: distinct(rows.iter().map(|r| r.assay.as_str())).join(" | "),
                    ambiguous: location.ambiguous,
                }
            })
            .collect()
    }
}

/// Non-empty values in first-seen order, duplicates dropped
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for value in values {
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
