//! epimap core library
//!
//! Consensus building, aligned/ungapped coordinate mapping, conservation
//! runs, alignment backends, and the prediction request pipeline.

pub mod types;
pub mod error;
pub mod fasta;
pub mod coords;
pub mod consensus;
pub mod conserved;
pub mod locate;
pub mod msa;
pub mod predict;
pub mod published;
pub mod progress;
pub mod pipeline;

// Re-export commonly used types and functions
pub use types::{AlignedMatrix, ConsensusResult, ConservedRegion, SequenceRecord, GAP};
pub use error::{EpimapError, EpimapResult};
pub use coords::CoordinateMap;
pub use msa::{AlignError, Aligner, ClustalOmega, CommandAligner};
pub use predict::{IedbClient, PredictionService, RetryPolicy};
pub use published::PublishedDb;
pub use progress::{NdjsonProgress, ProgressObserver};
pub use pipeline::{Pipeline, PredictionParams, PredictionResult};

/// Version information for the epimap core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
