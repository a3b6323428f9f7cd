//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it. [`CliArgs::into_config`] validates the raw arguments into
//! a [`ConvertConfig`]; a missing version or malformed batch range is a
//! [`ConfigError`] raised before any file is touched.

use crate::error::ConfigError;
use crate::io::discovery::BatchRange;
use crate::io::ndjson::{DEFAULT_PROGRESS_EVERY, ParseMode, PipelineOptions};
use crate::normalize::{AbstractEncoding, DatasetKind, NormalizeOptions};
use crate::scheduler::FailurePolicy;
use crate::task::Granularity;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Normalize compressed NDJSON bibliographic shards")]
pub struct CliArgs {
    /// Dataset version to convert (required)
    #[arg(long = "data-version", env = "DATA_VERSION")]
    pub data_version: Option<String>,

    /// Dataset type, selects the rule set
    #[arg(long, env = "DATASET", value_enum, default_value_t = DatasetKind::Works)]
    pub dataset: DatasetKind,

    /// Root of the raw input tree
    #[arg(long, env = "INPUT_ROOT", default_value = "./data/raw")]
    pub input_root: PathBuf,

    /// Root of the converted output tree
    #[arg(long, env = "OUTPUT_ROOT", default_value = "./data/converted")]
    pub output_root: PathBuf,

    /// Maximum number of units converted at once (default: CPU count)
    #[arg(short = 'j', long, env = "CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// 1-based inclusive slice of the sorted partition folders, e.g. "1-50"
    #[arg(long, env = "BATCH_RANGE")]
    pub batch_range: Option<String>,

    /// Schedule individual shards or whole partition folders
    #[arg(long, env = "GRANULARITY", value_enum, default_value_t = Granularity::File)]
    pub granularity: Granularity,

    /// What to do with lines that are not valid JSON
    #[arg(long, env = "PARSE_MODE", value_enum, default_value_t = ParseMode::Lenient)]
    pub parse_mode: ParseMode,

    /// How to re-encode the abstract inverted index
    #[arg(long = "abstract", env = "ABSTRACT_ENCODING", value_enum, default_value_t = AbstractEncoding::JsonString)]
    pub abstract_encoding: AbstractEncoding,

    /// Delete legacy work fields once their replacements are populated
    #[arg(long, env = "DROP_LEGACY")]
    pub drop_legacy: bool,

    /// Keep converting after a shard fails
    #[arg(long, env = "KEEP_GOING")]
    pub keep_going: bool,

    /// Records between progress lines (0 disables)
    #[arg(long, env = "PROGRESS_EVERY", default_value_t = DEFAULT_PROGRESS_EVERY)]
    pub progress_every: u64,

    /// Write the final counters as JSON to this path
    #[arg(long, env = "SUMMARY_JSON")]
    pub summary_json: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Validated settings for one batch run.
#[derive(Clone, Debug)]
pub struct ConvertConfig {
    pub version: String,
    pub dataset: DatasetKind,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub concurrency: usize,
    pub batch_range: Option<BatchRange>,
    pub granularity: Granularity,
    pub pipeline: PipelineOptions,
    pub normalize: NormalizeOptions,
    pub failure_policy: FailurePolicy,
    pub summary_json: Option<PathBuf>,
}

impl ConvertConfig {
    /// Defaults for `version`/`dataset` under the given roots.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        dataset: DatasetKind,
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            version: version.into(),
            dataset,
            input_root: input_root.into(),
            output_root: output_root.into(),
            concurrency: num_cpus::get().max(1),
            batch_range: None,
            granularity: Granularity::default(),
            pipeline: PipelineOptions::default(),
            normalize: NormalizeOptions::default(),
            failure_policy: FailurePolicy::default(),
            summary_json: None,
        }
    }

    /// `<input_root>/<version>/<dataset>`
    #[must_use]
    pub fn dataset_input_dir(&self) -> PathBuf {
        self.input_root
            .join(&self.version)
            .join(self.dataset.dir_name())
    }

    /// `<output_root>/<version>/<dataset>`
    #[must_use]
    pub fn dataset_output_dir(&self) -> PathBuf {
        self.output_root
            .join(&self.version)
            .join(self.dataset.dir_name())
    }
}

impl CliArgs {
    /// Validate into a [`ConvertConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVersion`] when no version is given and
    /// [`ConfigError::InvalidBatchRange`] for a malformed range.
    pub fn into_config(self) -> Result<ConvertConfig, ConfigError> {
        let version = self
            .data_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingVersion)?;

        let batch_range = self
            .batch_range
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<BatchRange>)
            .transpose()?;

        let mut config = ConvertConfig::new(version, self.dataset, self.input_root, self.output_root);
        if let Some(n) = self.concurrency.filter(|n| *n > 0) {
            config.concurrency = n;
        }
        config.batch_range = batch_range;
        config.granularity = self.granularity;
        config.pipeline = PipelineOptions {
            parse_mode: self.parse_mode,
            progress_every: self.progress_every,
        };
        config.normalize = NormalizeOptions {
            abstract_encoding: self.abstract_encoding,
            drop_legacy: self.drop_legacy,
        };
        config.failure_policy = if self.keep_going {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        };
        config.summary_json = self.summary_json;
        Ok(config)
    }
}
