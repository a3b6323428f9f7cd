//! Streaming NDJSON shard conversion.
//!
//! [`convert_file`] runs one shard through
//! decompress → split lines → parse → normalize → serialize → compress → write.
//! Every stage is a pull on a blocking reader or a push into a blocking
//! writer, so at most one line buffer and one record are held in memory and a
//! slow disk throttles the whole chain.
//!
//! # Notes
//! - Blank and whitespace-only lines are skipped.
//! - Record order is preserved.
//! - In [`ParseMode::Lenient`] invalid lines are dropped and counted; in
//!   [`ParseMode::Strict`] the first invalid line aborts the shard.

use crate::error::{PipelineError, RecordParseError};
use crate::gate::{GateDecision, ResumabilityGate};
use crate::io::compression::{auto_detect_reader, writer_with_default};
use crate::normalize::Normalizer;
use crate::progress::{ProgressTracker, group_thousands};
use crate::task::FileTask;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::Value;
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, info};

/// Codec for outputs whose name does not pick one.
pub const OUTPUT_CODEC: &str = "gzip";

/// Default number of records between progress lines.
pub const DEFAULT_PROGRESS_EVERY: u64 = 100_000;

/// What to do with a line that is not valid JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ParseMode {
    /// Drop the line and keep going.
    #[default]
    Lenient,
    /// Abort the shard.
    Strict,
}

/// Per-shard pipeline settings.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    pub parse_mode: ParseMode,
    /// Emit a progress line every this many records; 0 disables.
    pub progress_every: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::Lenient,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

/// Counts for one stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub records: u64,
    pub dropped: u64,
}

/// Result of one [`convert_file`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    Converted(StreamStats),
    Skipped,
}

/// Normalize every record from `reader` into `writer`.
///
/// `source` only labels errors. `on_record` is called with the running record
/// count after each record is written.
///
/// # Errors
///
/// Read, decompression and write failures become [`PipelineError::Io`];
/// invalid JSON becomes [`PipelineError::Parse`] in strict mode.
pub fn transform_stream<R: BufRead, W: Write + ?Sized>(
    mut reader: R,
    writer: &mut W,
    normalizer: &Normalizer,
    parse_mode: ParseMode,
    source: &Path,
    mut on_record: impl FnMut(u64),
) -> Result<StreamStats, PipelineError> {
    let io_err = |e: std::io::Error| PipelineError::Io {
        path: source.to_path_buf(),
        source: e,
    };

    let mut stats = StreamStats::default();
    let mut line = Vec::with_capacity(8 * 1024);
    let mut line_no: u64 = 0;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).map_err(io_err)? == 0 {
            break;
        }
        line_no += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let value: Value = match serde_json::from_slice(&line) {
            Ok(v) => v,
            Err(e) if parse_mode == ParseMode::Lenient => {
                debug!(path = %source.display(), line = line_no, error = %e, "dropping invalid line");
                stats.dropped += 1;
                continue;
            }
            Err(e) => {
                return Err(RecordParseError {
                    path: source.to_path_buf(),
                    line: line_no,
                    source: e,
                }
                .into());
            }
        };

        let value = normalizer.normalize_value(value);
        serde_json::to_writer(&mut *writer, &value).map_err(|e| io_err(e.into()))?;
        writer.write_all(b"\n").map_err(io_err)?;
        stats.records += 1;
        on_record(stats.records);
    }
    Ok(stats)
}

/// Convert one shard, honoring the resumability gate.
///
/// Output goes to the gate's partial path and is committed only after the
/// encoder finished cleanly. On failure the partial file is removed and the
/// failure counter is bumped; on success the completed-file and record
/// counters are.
///
/// # Errors
///
/// Returns an error naming the shard if any stage fails.
pub fn convert_file(
    task: &FileTask,
    normalizer: &Normalizer,
    options: &PipelineOptions,
    gate: &ResumabilityGate,
    progress: &ProgressTracker,
) -> Result<FileOutcome> {
    if gate.check(task) == GateDecision::Skip {
        debug!(output = %task.output.display(), "output exists, skipping");
        progress.file_skipped();
        return Ok(FileOutcome::Skipped);
    }

    let partial = gate.partial_path(task);
    let result = write_partial(task, &partial, normalizer, options, progress)
        .and_then(|stats| {
            gate.commit(&partial, &task.output)?;
            Ok(stats)
        });

    match result {
        Ok(stats) => {
            progress.file_completed(stats.records, stats.dropped);
            info!(
                "  ✓ {}: {} records{}",
                task.label(),
                group_thousands(stats.records),
                if stats.dropped > 0 {
                    format!(" ({} dropped)", stats.dropped)
                } else {
                    String::new()
                }
            );
            Ok(FileOutcome::Converted(stats))
        }
        Err(e) => {
            gate.discard(&partial);
            progress.file_failed();
            Err(e).with_context(|| format!("convert {}", task.input.display()))
        }
    }
}

fn write_partial(
    task: &FileTask,
    partial: &Path,
    normalizer: &Normalizer,
    options: &PipelineOptions,
    progress: &ProgressTracker,
) -> Result<StreamStats> {
    if let Some(parent) = task.output.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }

    let input = File::open(&task.input).with_context(|| format!("open {}", task.input.display()))?;
    let reader = auto_detect_reader(input, &task.input)
        .with_context(|| format!("setup decompression for {}", task.input.display()))?;
    let reader = BufReader::new(reader);

    let output = File::create(partial).with_context(|| format!("create {}", partial.display()))?;
    // Codec follows the final name, not the `.partial` suffix; gzip unless
    // that name asks for another registered codec.
    let mut writer = writer_with_default(output, &task.output, OUTPUT_CODEC)
        .with_context(|| format!("setup compression for {}", task.output.display()))?;

    let label = task.label();
    let every = options.progress_every;
    let stats = transform_stream(
        reader,
        &mut writer,
        normalizer,
        options.parse_mode,
        &task.input,
        |count| {
            if every > 0 && count % every == 0 {
                info!(
                    "{}",
                    progress.status_line(Some(&format!("{label}: {}", group_thousands(count))))
                );
            }
        },
    )?;

    writer.finish().map_err(|source| PipelineError::Io {
        path: partial.to_path_buf(),
        source,
    })?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{DatasetKind, NormalizeOptions};
    use std::io::Cursor;

    fn concepts() -> Normalizer {
        Normalizer::for_dataset(DatasetKind::Concepts, &NormalizeOptions::default())
    }

    #[test]
    fn lenient_mode_drops_bad_lines_and_keeps_order() {
        let input = "{\"a-b\":1}\nnot json\n\n{\"id\":2}\n{\"id\":3}";
        let mut out = Vec::<u8>::new();
        let stats = transform_stream(
            Cursor::new(input),
            &mut out,
            &concepts(),
            ParseMode::Lenient,
            Path::new("mem"),
            |_| {},
        )
        .unwrap();
        assert_eq!(stats, StreamStats { records: 3, dropped: 1 });
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"a_b\":1}\n{\"id\":2}\n{\"id\":3}\n"
        );
    }

    #[test]
    fn strict_mode_reports_line_number() {
        let input = "{}\n{\"x\":\n";
        let mut out = Vec::<u8>::new();
        let err = transform_stream(
            Cursor::new(input),
            &mut out,
            &concepts(),
            ParseMode::Strict,
            Path::new("mem"),
            |_| {},
        )
        .unwrap_err();
        match err {
            PipelineError::Parse(e) => assert_eq!(e.line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn progress_callback_sees_running_count() {
        let input = "{}\n{}\n{}\n";
        let mut seen = Vec::new();
        transform_stream(
            Cursor::new(input),
            &mut Vec::<u8>::new(),
            &concepts(),
            ParseMode::Lenient,
            Path::new("mem"),
            |n| seen.push(n),
        )
        .unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
