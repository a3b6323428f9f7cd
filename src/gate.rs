//! Resumability: skip finished shards, commit new ones atomically.
//!
//! A shard counts as done when its final output path exists. Output is first
//! written to a sibling `*.partial` file and renamed into place only after the
//! encoder has been finished and flushed, so an interrupted run never leaves a
//! truncated file under the final name. A leftover `*.partial` is simply
//! overwritten on the next run.

use crate::error::PipelineError;
use crate::task::FileTask;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::warn;

const PARTIAL_SUFFIX: &str = ".partial";

/// Outcome of checking a task against existing output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Run,
    Skip,
}

/// Decides whether a task needs to run and commits its output.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResumabilityGate;

impl ResumabilityGate {
    #[must_use]
    pub fn check(&self, task: &FileTask) -> GateDecision {
        if task.output.exists() {
            GateDecision::Skip
        } else {
            GateDecision::Run
        }
    }

    /// Where in-progress output for `task` is written.
    #[must_use]
    pub fn partial_path(&self, task: &FileTask) -> PathBuf {
        let mut name: OsString = task.output.as_os_str().to_owned();
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }

    /// Flush a fully written partial file to disk and move it to its final
    /// name. The final name never points at data still in the page cache.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Commit`] if the sync or the rename fails.
    pub fn commit(&self, partial: &Path, target: &Path) -> Result<(), PipelineError> {
        let commit_err = |source| PipelineError::Commit {
            partial: partial.to_path_buf(),
            target: target.to_path_buf(),
            source,
        };
        File::open(partial)
            .and_then(|file| file.sync_all())
            .map_err(commit_err)?;
        fs::rename(partial, target).map_err(commit_err)
    }

    /// Best-effort removal of a partial file after a failure.
    pub fn discard(&self, partial: &Path) {
        if let Err(e) = fs::remove_file(partial)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %partial.display(), error = %e, "could not remove partial output");
        }
    }
}
