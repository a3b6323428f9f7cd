//! Batch orchestration: discovery, scheduling and final accounting.

use crate::config::ConvertConfig;
use crate::gate::ResumabilityGate;
use crate::io::discovery::{Discovery, discover};
use crate::io::ndjson::convert_file;
use crate::normalize::Normalizer;
use crate::progress::ProgressTracker;
use crate::scheduler::{RunReport, Scheduler};
use crate::task::{FileTask, TaskUnit, into_units};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Convert every selected shard under `config`'s dataset directory.
///
/// Counters are reported into `progress`, which the caller keeps so it can
/// print a summary even when the batch fails. When `summary_json` is set the
/// counters are written there on both outcomes.
///
/// # Errors
///
/// Configuration problems found during discovery (such as a missing input
/// directory) are returned before any unit runs. Unit failures are returned
/// as a [`BatchError`](crate::error::BatchError) after every admitted unit has
/// resolved.
pub fn run_batch(config: &ConvertConfig, progress: &ProgressTracker) -> Result<RunReport> {
    let input_dir = config.dataset_input_dir();
    let output_dir = config.dataset_output_dir();
    let discovery = discover(&input_dir, &output_dir, config.batch_range)?;

    if let Some(range) = config.batch_range {
        info!(
            "Batch mode: folders {}-{} of {} ({} selected)",
            range.start,
            range.end,
            discovery.folders_available,
            discovery.folders.len()
        );
    }
    progress.set_totals(discovery.folders.len() as u64, discovery.tasks.len() as u64);
    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        "Processing {} folders ({} files) with concurrency {}",
        discovery.folders.len(),
        discovery.tasks.len(),
        config.concurrency
    );

    let folders = FolderLedger::new(&discovery, progress);
    let units = into_units(discovery.tasks, config.granularity);
    let normalizer = Normalizer::for_dataset(config.dataset, &config.normalize);
    let gate = ResumabilityGate;
    let scheduler = Scheduler::new(config.concurrency).with_policy(config.failure_policy);

    let result = scheduler.run(units, TaskUnit::label, |unit| {
        let label = unit.label();
        progress.unit_started(&label);
        let outcome = match unit {
            TaskUnit::File(task) => {
                run_file(&task, &normalizer, config, &gate, progress, &folders)
            }
            TaskUnit::Folder { tasks, .. } => tasks
                .iter()
                .try_for_each(|task| run_file(task, &normalizer, config, &gate, progress, &folders)),
        };
        progress.unit_finished(&label);
        outcome
    });

    if let Some(path) = &config.summary_json
        && let Err(e) = progress.save_to_file(path)
    {
        warn!(path = %path.display(), error = %format!("{e:#}"), "could not write summary JSON");
    }
    result
}

fn run_file(
    task: &FileTask,
    normalizer: &Normalizer,
    config: &ConvertConfig,
    gate: &ResumabilityGate,
    progress: &ProgressTracker,
    folders: &FolderLedger,
) -> Result<()> {
    // Converted and skipped files both count towards their folder.
    convert_file(task, normalizer, &config.pipeline, gate, progress)?;
    folders.file_done(&task.folder, progress);
    Ok(())
}

/// Remaining-file counts per folder. A folder is complete once every one of
/// its files was converted or skipped; a failed file keeps it open.
struct FolderLedger {
    remaining: HashMap<String, AtomicUsize>,
}

impl FolderLedger {
    fn new(discovery: &Discovery, progress: &ProgressTracker) -> Self {
        let mut remaining: HashMap<String, AtomicUsize> = discovery
            .folders
            .iter()
            .map(|f| (f.clone(), AtomicUsize::new(0)))
            .collect();
        for task in &discovery.tasks {
            if let Some(count) = remaining.get_mut(&task.folder) {
                *count.get_mut() += 1;
            }
        }
        // Nothing to convert in an empty partition.
        for count in remaining.values_mut() {
            if *count.get_mut() == 0 {
                progress.folder_completed();
            }
        }
        Self { remaining }
    }

    fn file_done(&self, folder: &str, progress: &ProgressTracker) {
        if let Some(count) = self.remaining.get(folder)
            && count.fetch_sub(1, Ordering::AcqRel) == 1
        {
            progress.folder_completed();
        }
    }
}
