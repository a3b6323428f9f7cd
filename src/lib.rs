//! # shardfix
//!
//! Batch normalizer for gzip-compressed NDJSON bibliographic shards.
//!
//! A dataset is a tree of partition folders full of compressed shards, one
//! JSON record per line. `shardfix` streams every shard through
//! decompress → parse → normalize → serialize → compress and writes the
//! result to a mirrored output tree, so downstream loaders see one consistent
//! schema: empty nested lists get typed placeholder entries, known-empty
//! fields become `[]`, hyphenated keys become underscores and the abstract
//! index is re-encoded.
//!
//! ## Pieces
//!
//! - [`normalize`]: the per-dataset rule sets ([`Normalizer`]).
//! - [`io::ndjson`]: the per-shard streaming pipeline ([`convert_file`]).
//! - [`gate`]: skip finished shards, commit new output atomically.
//! - [`scheduler`]: run units on a fixed-size worker pool.
//! - [`progress`]: shared counters, status lines and the final summary.
//! - [`runner`]: ties the above together for one batch ([`run_batch`]).
//!
//! ## Quick start
//!
//! ```no_run
//! use shardfix::{ConvertConfig, DatasetKind, ProgressTracker, run_batch};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ConvertConfig::new("2024-05-01", DatasetKind::Works, "data/raw", "data/converted");
//! let progress = ProgressTracker::new();
//! run_batch(&config, &progress)?;
//! println!("{}", progress.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Resuming
//!
//! A shard whose output already exists is skipped without being opened.
//! Output is written to `<name>.partial` and renamed once the encoder is
//! finished, so rerunning the same command after an interruption picks up
//! where the last run stopped.

pub mod config;
pub mod error;
pub mod gate;
pub mod io;
pub mod logging;
pub mod normalize;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod task;
pub mod testing;

pub use config::{CliArgs, ConvertConfig};
pub use error::{BatchError, ConfigError, PipelineError, RecordParseError};
pub use gate::{GateDecision, ResumabilityGate};
pub use io::discovery::{BatchRange, Discovery, discover};
pub use io::ndjson::{FileOutcome, ParseMode, PipelineOptions, StreamStats, convert_file};
pub use normalize::{AbstractEncoding, DatasetKind, NormalizeOptions, Normalizer};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use runner::run_batch;
pub use scheduler::{FailurePolicy, RunReport, Scheduler};
pub use task::{FileTask, Granularity, TaskUnit};
