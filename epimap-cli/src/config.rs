//! Configuration handling for the epimap CLI
//!
//! Supports loading configuration from epimap.toml files with CLI argument overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use epimap_core::pipeline::{DEFAULT_MIN_CONSERVED_LENGTH, DEFAULT_PEPTIDE_LENGTHS};
use epimap_core::predict::iedb::{DEFAULT_METHOD, DEFAULT_SPECIES, IEDB_API_URL};
use epimap_core::RetryPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub msa: MsaConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Which alignment backend serves multi-sequence requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsaBackend {
    Clustalo,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsaConfig {
    /// Alignment backend
    #[serde(default = "default_backend")]
    pub backend: MsaBackend,

    /// Clustal Omega binary; looked up on PATH when empty
    #[serde(default)]
    pub clustalo_binary: String,

    /// Program and arguments of a JSON-emitting aligner (backend = "command")
    #[serde(default)]
    pub command: Vec<String>,

    /// Seconds before a running aligner is killed
    #[serde(default = "default_msa_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Prediction method sent to the service
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default = "default_species")]
    pub species: String,

    /// Per-call HTTP timeout in seconds
    #[serde(default = "default_prediction_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed call
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Published epitope table (JSON array)
    #[serde(default = "default_published")]
    pub published_epitopes: PathBuf,

    #[serde(default = "default_sample")]
    pub sample_fasta: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_alleles")]
    pub alleles: Vec<String>,

    #[serde(default = "default_peptide_min")]
    pub peptide_min: usize,

    #[serde(default = "default_peptide_max")]
    pub peptide_max: usize,

    #[serde(default = "default_min_conserved")]
    pub min_conserved_length: usize,
}

// Default value functions
fn default_backend() -> MsaBackend { MsaBackend::Clustalo }
fn default_msa_timeout() -> u64 { 300 }
fn default_url() -> String { IEDB_API_URL.to_string() }
fn default_method() -> String { DEFAULT_METHOD.to_string() }
fn default_species() -> String { DEFAULT_SPECIES.to_string() }
fn default_prediction_timeout() -> u64 { 180 }
fn default_retries() -> u32 { 2 }
fn default_backoff_ms() -> u64 { 2000 }
fn default_published() -> PathBuf { PathBuf::from("data/published_epitopes.json") }
fn default_sample() -> PathBuf { PathBuf::from("data/sample.fasta") }
fn default_alleles() -> Vec<String> { vec!["HLA-A*02:01".to_string()] }
fn default_peptide_min() -> usize { DEFAULT_PEPTIDE_LENGTHS.0 }
fn default_peptide_max() -> usize { DEFAULT_PEPTIDE_LENGTHS.1 }
fn default_min_conserved() -> usize { DEFAULT_MIN_CONSERVED_LENGTH }

impl Default for MsaConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            clustalo_binary: String::new(),
            command: Vec::new(),
            timeout_secs: default_msa_timeout(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            method: default_method(),
            species: default_species(),
            timeout_secs: default_prediction_timeout(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            published_epitopes: default_published(),
            sample_fasta: default_sample(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            alleles: default_alleles(),
            peptide_min: default_peptide_min(),
            peptide_max: default_peptide_max(),
            min_conserved_length: default_min_conserved(),
        }
    }
}

impl MsaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PredictionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("epimap.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: epimap.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }
}
