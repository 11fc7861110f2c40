//! Progress reporting for long-running prediction requests
//!
//! The pipeline calls a [`ProgressObserver`] at fixed checkpoints. How the
//! events reach a user (NDJSON on a stream, a progress bar, nothing at all)
//! is the observer's business.

use std::cell::RefCell;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::pipeline::PredictionResult;

/// Estimated wall time of one alignment run
pub const ALIGNMENT_ETA_SECS: u64 = 5;
/// Estimated wall time of one prediction call
pub const PREDICTION_CALL_ETA_SECS: u64 = 2;

/// Pipeline stage a progress update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Parse,
    Consensus,
    Published,
    Prediction,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub step: Step,
    pub message: String,
    pub percent: u8,
    #[serde(rename = "etaSec", skip_serializing_if = "Option::is_none")]
    pub eta_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

impl ProgressUpdate {
    pub fn new<S: Into<String>>(step: Step, message: S, percent: u8) -> Self {
        Self {
            step,
            message: message.into(),
            percent,
            eta_sec: None,
            current: None,
        }
    }

    pub fn with_eta(mut self, eta_sec: u64) -> Self {
        self.eta_sec = Some(eta_sec);
        self
    }

    pub fn with_current<S: Into<String>>(mut self, current: S) -> Self {
        self.current = Some(current.into());
        self
    }
}

/// One line of the streamed response
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent<'a> {
    Progress(&'a ProgressUpdate),
    Result { data: &'a PredictionResult },
    Error { message: String },
}

/// Receives checkpoints from the pipeline
pub trait ProgressObserver {
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Observer that discards every update
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Observer that logs each update at debug level
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        log::debug!("[{:>3}%] {:?}: {}", update.percent, update.step, update.message);
    }
}

/// Writes progress, result and error events as newline-delimited JSON
pub struct NdjsonProgress<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> NdjsonProgress<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }

    pub fn write_event(&self, event: &ProgressEvent<'_>) -> std::io::Result<()> {
        let mut writer = self.writer.borrow_mut();
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn write_result(&self, result: &PredictionResult) -> std::io::Result<()> {
        self.write_event(&ProgressEvent::Result { data: result })
    }

    pub fn write_error(&self, message: &str) -> std::io::Result<()> {
        self.write_event(&ProgressEvent::Error { message: message.to_string() })
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> ProgressObserver for NdjsonProgress<W> {
    fn on_progress(&self, update: &ProgressUpdate) {
        // Progress is advisory; a closed stream must not fail the request
        if let Err(e) = self.write_event(&ProgressEvent::Progress(update)) {
            log::debug!("Dropping progress event: {}", e);
        }
    }
}
