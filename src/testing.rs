//! Test helpers for building shard trees and reading converted output.
//!
//! These are used by the crate's own tests and are public so downstream
//! tooling can build fixtures the same way.
//!
//! # Example
//!
//! ```
//! use shardfix::testing::{ShardTreeBuilder, read_gz_lines};
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let files = ShardTreeBuilder::new(dir.path())
//!     .shard("updated_date=2024-01-01", "part_000.gz", &["{\"id\":1}"])
//!     .build()
//!     .unwrap();
//! assert_eq!(read_gz_lines(&files[0]).unwrap(), vec!["{\"id\":1}"]);
//! ```

use crate::io::compression::{auto_detect_reader, auto_detect_writer};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Write `lines` to `path`, compressed according to its extension.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_gz_lines(path: &Path, lines: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = auto_detect_writer(file, path)?;
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.finish()?;
    Ok(())
}

/// Read every line of a (possibly compressed) file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn read_gz_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(auto_detect_reader(file, path)?);
    reader
        .lines()
        .map(|l| l.with_context(|| format!("read {}", path.display())))
        .collect()
}

/// Read and parse every line of a converted file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not JSON.
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    read_gz_lines(path)?
        .iter()
        .map(|l| serde_json::from_str(l).with_context(|| format!("parse line of {}", path.display())))
        .collect()
}

/// Fluent builder for a `<dataset_root>/<partition>/<shard>` tree.
pub struct ShardTreeBuilder {
    root: PathBuf,
    shards: Vec<(String, String, Vec<String>)>,
}

impl ShardTreeBuilder {
    #[must_use]
    pub fn new(dataset_root: impl Into<PathBuf>) -> Self {
        Self {
            root: dataset_root.into(),
            shards: Vec::new(),
        }
    }

    /// Add one shard holding `lines`.
    #[must_use]
    pub fn shard(mut self, folder: &str, file: &str, lines: &[&str]) -> Self {
        self.shards.push((
            folder.to_string(),
            file.to_string(),
            lines.iter().map(ToString::to_string).collect(),
        ));
        self
    }

    /// Write every shard and return their paths in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if any shard cannot be written.
    pub fn build(self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.shards.len());
        for (folder, file, lines) in &self.shards {
            let path = self.root.join(folder).join(file);
            let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
            write_gz_lines(&path, &lines)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// A handful of work records covering the shapes normalization has to fix:
/// absent fields, explicit nulls, empty lists, single objects where lists
/// are expected, null `issn` on nested sources and an inverted abstract.
#[must_use]
pub fn sample_works() -> Vec<Value> {
    vec![
        json!({ "id": "https://openalex.org/W1" }),
        json!({
            "id": "https://openalex.org/W2",
            "title": "A fox study",
            "host_venue": null,
            "apc_list": { "value": 100, "currency": "USD", "value_usd": 100, "provenance": "doaj" },
            "authorships": [
                {
                    "author": { "id": "A1", "display_name": "Ada" },
                    "institutions": [],
                    "countries": null,
                    "affiliations": [{ "raw_affiliation_string": "Lab", "institution_ids": null }]
                },
                {
                    "author": { "id": "A2" },
                    "institutions": [{ "id": "I1", "display_name": "Uni", "lineage": null }]
                }
            ],
            "primary_location": {
                "is_oa": true,
                "source": { "id": "S1", "issn": null, "issn_l": null }
            },
            "locations": [
                { "is_oa": true, "source": { "id": "S1", "issn": null } },
                { "is_oa": false, "source": null }
            ],
            "best_oa_location": null,
            "abstract_inverted_index": {
                "IndexLength": 5,
                "InvertedIndex": { "the": [0, 2], "fox": [1] }
            },
            "referenced_works": null,
            "related_works": ["W9"]
        }),
        json!({
            "id": "https://openalex.org/W3",
            "host_venue": { "id": "V1", "display_name": "Journal" },
            "counts_by_year": [],
            "mesh": [],
            "concepts": [],
            "alternate_host_venues": [],
            "apc_list": null,
            "locations": [],
            "authorships": null,
            "abstract_inverted_index": null,
            "corresponding_author_ids": null,
            "indexed_in": []
        }),
        json!({
            "id": "https://openalex.org/W4",
            "apc_list": [{ "value": 5, "currency": "EUR" }],
            "abstract_inverted_index": "{\"already\":[0]}",
            "custom_field": { "nested": [1, 2, 3] }
        }),
    ]
}
