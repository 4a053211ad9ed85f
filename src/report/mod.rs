//! # Report Module
//!
//! Human-readable diagnostics for a run plus structured JSONL artifacts.

pub mod jsonl;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::job::JobReport;

pub use jsonl::JsonlSink;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("report error: {0}")]
    Other(String),
}

/// Ordered diagnostic lines collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DiagnosticReport {
    lines: Vec<String>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn extend(&mut self, other: DiagnosticReport) {
        self.lines.extend(other.lines);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Counters and diagnostics for a finished batch or single-file run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub files_total: usize,
    /// Files whose channels were all extracted
    pub files_processed: usize,
    /// Files with at least one failed channel or probe error
    pub files_failed: usize,
    pub channels_ok: usize,
    pub channels_failed: usize,
    /// Successful channels whose metadata was not fully preserved
    pub metadata_warnings: usize,
    pub cancelled: bool,
    pub outputs: Vec<PathBuf>,
    pub report: DiagnosticReport,
}

impl BatchSummary {
    pub fn new(run_id: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: run_id.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// True when every file and channel was extracted and the run was not
    /// cancelled. Metadata warnings do not count as failures.
    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.files_failed == 0 && self.channels_failed == 0
    }

    /// Closing text shown to the user.
    pub fn summary_text(&self) -> String {
        let mut text = format!(
            "Processed {} out of {} files.",
            self.files_processed, self.files_total
        );
        if self.files_failed > 0 {
            text.push_str(&format!(
                "\nEncountered errors in {} file(s).",
                self.files_failed
            ));
        }
        if self.metadata_warnings > 0 {
            text.push_str(&format!(
                "\nMetadata not fully preserved in {} channel(s).",
                self.metadata_warnings
            ));
        }
        if self.cancelled {
            text.push_str("\nRun was cancelled.");
        }
        text.push_str(&format!("\nOutput Directory: {}", self.output_dir.display()));
        text
    }

    /// One-line completion notice: `SUCCESS!` or a description of what failed.
    pub fn notification(&self) -> String {
        if self.succeeded() {
            return "SUCCESS!".to_string();
        }
        if self.cancelled {
            return format!(
                "CANCELLED after {} of {} file(s)",
                self.files_processed, self.files_total
            );
        }
        format!(
            "ERROR: {} channel(s) failed across {} file(s)",
            self.channels_failed, self.files_failed
        )
    }
}

/// Destination for per-job and per-run diagnostic records.
pub trait DiagnosticsSink: Send + Sync {
    fn record_job(&self, report: &JobReport) -> Result<(), ReportError>;
    fn record_summary(&self, summary: &BatchSummary) -> Result<(), ReportError>;
    fn flush(&self) -> Result<(), ReportError>;
}
