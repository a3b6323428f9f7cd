//! Error types for shard conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems detected before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("dataset version is required (set --data-version or DATA_VERSION)")]
    MissingVersion,

    #[error("invalid batch range {0:?}: expected \"<start>-<end>\" with 1 <= start <= end")]
    InvalidBatchRange(String),

    #[error("input directory {} does not exist", .0.display())]
    MissingInputRoot(PathBuf),
}

/// A line that is not valid JSON. Only raised in strict parse mode.
#[derive(Debug, Error)]
#[error("invalid JSON on line {line} of {}: {source}", .path.display())]
pub struct RecordParseError {
    pub path: PathBuf,
    pub line: u64,
    #[source]
    pub source: serde_json::Error,
}

/// Failures that abort a single file task.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] RecordParseError),

    #[error("could not commit {} to {}: {source}", .partial.display(), .target.display())]
    Commit {
        partial: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One unit that failed during a batch.
#[derive(Debug)]
pub struct UnitFailure {
    pub label: String,
    pub error: anyhow::Error,
}

/// Aggregate failure reported once every admitted unit has resolved.
#[derive(Debug, Error)]
#[error("{}", summarize(.admitted, .failures))]
pub struct BatchError {
    pub admitted: usize,
    /// Never empty.
    pub failures: Vec<UnitFailure>,
}

fn summarize(admitted: &usize, failures: &[UnitFailure]) -> String {
    match failures.first() {
        Some(first) => format!(
            "{} of {admitted} admitted unit(s) failed; first failure in {}: {:#}",
            failures.len(),
            first.label,
            first.error
        ),
        None => format!("batch of {admitted} unit(s) failed"),
    }
}
