//! IEDB MHC-I tools API client

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use super::{parse_mhci_tsv, PredictError, PredictionService, RawPrediction};

pub const IEDB_API_URL: &str = "https://tools-cluster-interface.iedb.org/tools_api/mhci/";
pub const DEFAULT_METHOD: &str = "netmhcpan";
pub const DEFAULT_SPECIES: &str = "human";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

const SEQ_PREVIEW_CHARS: usize = 80;
const BODY_PREVIEW_CHARS: usize = 800;

/// Blocking client for the IEDB MHC-I prediction endpoint
pub struct IedbClient {
    client: Client,
    url: String,
    method: String,
    species: String,
}

impl IedbClient {
    pub fn new(timeout: Duration) -> Result<Self, PredictError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictError::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: IEDB_API_URL.to_string(),
            method: DEFAULT_METHOD.to_string(),
            species: DEFAULT_SPECIES.to_string(),
        })
    }

    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_species<S: Into<String>>(mut self, species: S) -> Self {
        self.species = species.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PredictionService for IedbClient {
    fn predict(&self, allele: &str, length: usize, sequence: &str) -> Result<Vec<RawPrediction>, PredictError> {
        if sequence.len() < length {
            return Ok(Vec::new());
        }

        let length_text = length.to_string();
        let form = [
            ("method", self.method.as_str()),
            ("sequence_text", sequence),
            ("allele", allele),
            ("length", length_text.as_str()),
            ("species", self.species.as_str()),
        ];

        log::debug!("POST {} allele={} length={} seqLen={}", self.url, allele, length, sequence.len());
        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .map_err(|e| PredictError::Http(e.to_string()))?;

        let status = response.status();
        let body = response.text().map_err(|e| PredictError::Http(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(PredictError::Status {
                status: status.as_u16(),
                allele: allele.to_string(),
                length,
                seq_len: sequence.len(),
                seq_preview: preview(sequence, SEQ_PREVIEW_CHARS),
                body_preview: body_preview(&body),
            });
        }

        Ok(parse_mhci_tsv(&body))
    }

    fn name(&self) -> &str {
        "IEDB"
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

fn body_preview(body: &str) -> String {
    let flattened: String = body.chars().take(BODY_PREVIEW_CHARS).collect::<String>().replace('\n', " ");
    if flattened.trim().is_empty() {
        "(empty)".to_string()
    } else {
        flattened
    }
}
