//! Record normalization.
//!
//! A [`Normalizer`] applies a [`DatasetProfile`] to parsed records. It never
//! fails: missing or malformed fields are treated as the empty case and
//! filled, unknown fields pass through untouched. Applying it twice yields the
//! same record as applying it once.
//!
//! ```
//! use shardfix::normalize::{DatasetKind, NormalizeOptions, Normalizer};
//! use serde_json::json;
//!
//! let n = Normalizer::for_dataset(DatasetKind::Works, &NormalizeOptions::default());
//! let out = n.normalize_value(json!({"id": "W1"}));
//! assert_eq!(out["host_venue"].as_array().map(Vec::len), Some(1));
//! ```

pub mod abstracts;
pub mod profiles;
pub mod rules;

pub use profiles::{DatasetKind, DatasetProfile};
pub use rules::{Record, Rule};

use clap::ValueEnum;
use serde_json::Value;

/// How the abstract inverted index is re-encoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AbstractEncoding {
    /// Replace the index object with its compact JSON text.
    #[default]
    JsonString,
    /// Rebuild the abstract as plain text.
    PlainText,
    /// Leave the field as it is.
    Keep,
}

/// Knobs that shape a built-in profile.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizeOptions {
    pub abstract_encoding: AbstractEncoding,
    /// Delete legacy fields once their replacements are populated.
    pub drop_legacy: bool,
}

/// Applies one dataset profile to records.
#[derive(Clone, Debug)]
pub struct Normalizer {
    profile: DatasetProfile,
}

impl Normalizer {
    #[must_use]
    pub fn new(profile: DatasetProfile) -> Self {
        Self { profile }
    }

    /// Normalizer for a built-in dataset profile.
    #[must_use]
    pub fn for_dataset(kind: DatasetKind, options: &NormalizeOptions) -> Self {
        Self::new(DatasetProfile::builtin(kind, options))
    }

    #[must_use]
    pub fn profile(&self) -> &DatasetProfile {
        &self.profile
    }

    /// Apply every rule of the profile, in order.
    #[must_use]
    pub fn normalize(&self, mut record: Record) -> Record {
        for rule in &self.profile.rules {
            rule.apply(&mut record);
        }
        record
    }

    /// Normalize a parsed line. Non-object values are returned unchanged.
    #[must_use]
    pub fn normalize_value(&self, value: Value) -> Value {
        match value {
            Value::Object(record) => Value::Object(self.normalize(record)),
            other => other,
        }
    }
}
