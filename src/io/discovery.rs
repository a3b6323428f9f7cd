//! Input tree enumeration.
//!
//! A dataset root holds one folder per partition, each holding shard files:
//!
//! ```text
//! <input_root>/<version>/<dataset>/<partition>/<shard>
//! ```
//!
//! Discovery lists partitions in sorted order, optionally narrows them to a
//! [`BatchRange`], and produces one [`FileTask`] per shard whose output path
//! mirrors the input path under the output root. Each shard appears exactly
//! once, so no two tasks share a destination.

use crate::error::ConfigError;
use crate::task::FileTask;
use anyhow::{Context, Result};
use glob::{Pattern, glob};
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A 1-based, inclusive slice of the sorted partition folders, written
/// `"<start>-<end>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchRange {
    pub start: usize,
    pub end: usize,
}

impl FromStr for BatchRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidBatchRange(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start: usize = start.trim().parse().map_err(|_| invalid())?;
        let end: usize = end.trim().parse().map_err(|_| invalid())?;
        if start == 0 || end < start {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

impl BatchRange {
    /// Select this range from `folders`. Bounds past the end are clamped.
    #[must_use]
    pub fn apply<T: Clone>(&self, folders: &[T]) -> Vec<T> {
        let from = (self.start - 1).min(folders.len());
        let to = self.end.min(folders.len());
        folders[from..to].to_vec()
    }
}

/// Expand a glob pattern into a sorted list of regular files.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or an entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Sorted names of the partition folders directly under `dataset_root`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_partitions(dataset_root: &Path) -> Result<Vec<String>> {
    let mut folders = Vec::new();
    for entry in read_dir(dataset_root).with_context(|| format!("read {}", dataset_root.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dataset_root.display()))?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    folders.sort();
    Ok(folders)
}

/// Shard files directly inside `folder`, sorted. Leftover `.partial` files
/// are ignored.
///
/// # Errors
///
/// Returns an error if the folder cannot be listed.
pub fn list_shards(folder: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", Pattern::escape(&folder.to_string_lossy()));
    Ok(expand_glob(&pattern)?
        .into_iter()
        .filter(|p| p.extension().is_none_or(|ext| ext != "partial"))
        .collect())
}

/// Result of walking a dataset root.
#[derive(Clone, Debug, Default)]
pub struct Discovery {
    /// Partitions selected for this run, in order.
    pub folders: Vec<String>,
    /// Number of partitions before the batch range was applied.
    pub folders_available: usize,
    /// One task per shard, grouped by folder.
    pub tasks: Vec<FileTask>,
}

/// Enumerate every shard under `input_root`, mirroring paths to `output_root`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingInputRoot`] if `input_root` is not a
/// directory, or an I/O error while listing.
pub fn discover(
    input_root: &Path,
    output_root: &Path,
    range: Option<BatchRange>,
) -> Result<Discovery> {
    if !input_root.is_dir() {
        return Err(ConfigError::MissingInputRoot(input_root.to_path_buf()).into());
    }

    let all = list_partitions(input_root)?;
    let folders = match range {
        Some(r) => r.apply(&all),
        None => all.clone(),
    };

    let mut tasks = Vec::new();
    for folder in &folders {
        for input in list_shards(&input_root.join(folder))? {
            let Some(file_name) = input.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            tasks.push(FileTask {
                output: output_root.join(folder).join(&file_name),
                input,
                file_name,
                folder: folder.clone(),
            });
        }
    }

    Ok(Discovery {
        folders,
        folders_available: all.len(),
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_range_parses_and_validates() {
        assert_eq!(
            "1-50".parse::<BatchRange>().unwrap(),
            BatchRange { start: 1, end: 50 }
        );
        assert_eq!(
            " 3 - 4 ".parse::<BatchRange>().unwrap(),
            BatchRange { start: 3, end: 4 }
        );
        for bad in ["", "5", "0-3", "4-2", "a-b", "1-"] {
            assert!(bad.parse::<BatchRange>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn batch_range_slices_inclusive_and_clamps() {
        let folders: Vec<String> = ["a", "b", "c", "d"].map(String::from).to_vec();
        let r = BatchRange { start: 2, end: 3 };
        assert_eq!(r.apply(&folders), vec!["b", "c"]);
        let r = BatchRange { start: 3, end: 10 };
        assert_eq!(r.apply(&folders), vec!["c", "d"]);
        let r = BatchRange { start: 9, end: 10 };
        assert!(r.apply(&folders).is_empty());
    }
}
