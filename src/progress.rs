//! Progress accounting for a batch run.
//!
//! [`ProgressTracker`] is a cheaply cloneable handle over shared counters.
//! Every worker holds a clone and reports into it; counters are atomics and
//! the set of in-flight labels sits behind a mutex, so updates from
//! concurrently running tasks never race.
//!
//! # Example
//!
//! ```
//! use shardfix::progress::ProgressTracker;
//!
//! let progress = ProgressTracker::new();
//! progress.set_totals(1, 2);
//! progress.file_skipped();
//! progress.file_completed(1_500, 0);
//! assert_eq!(progress.snapshot().records_total, 1_500);
//! println!("{}", progress.status_line(None));
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Shared, thread-safe progress counters for one batch run.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<ProgressInner>,
}

struct ProgressInner {
    start: Instant,
    folders_total: AtomicU64,
    folders_completed: AtomicU64,
    files_total: AtomicU64,
    files_completed: AtomicU64,
    files_skipped: AtomicU64,
    files_failed: AtomicU64,
    records_total: AtomicU64,
    lines_dropped: AtomicU64,
    in_flight: Mutex<BTreeSet<String>>,
    max_in_flight: AtomicUsize,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub elapsed_secs: f64,
    pub folders_total: u64,
    pub folders_completed: u64,
    pub files_total: u64,
    pub files_completed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub records_total: u64,
    pub lines_dropped: u64,
    pub records_per_sec: f64,
    pub in_flight: Vec<String>,
    pub max_in_flight: usize,
}

impl ProgressTracker {
    /// Start the clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                start: Instant::now(),
                folders_total: AtomicU64::new(0),
                folders_completed: AtomicU64::new(0),
                files_total: AtomicU64::new(0),
                files_completed: AtomicU64::new(0),
                files_skipped: AtomicU64::new(0),
                files_failed: AtomicU64::new(0),
                records_total: AtomicU64::new(0),
                lines_dropped: AtomicU64::new(0),
                in_flight: Mutex::new(BTreeSet::new()),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub fn set_totals(&self, folders: u64, files: u64) {
        self.inner.folders_total.store(folders, Ordering::Relaxed);
        self.inner.files_total.store(files, Ordering::Relaxed);
    }

    fn in_flight(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a unit as running. Also tracks the high-water mark of concurrently
    /// running units.
    pub fn unit_started(&self, label: &str) {
        let mut set = self.in_flight();
        set.insert(label.to_string());
        self.inner.max_in_flight.fetch_max(set.len(), Ordering::Relaxed);
    }

    pub fn unit_finished(&self, label: &str) {
        self.in_flight().remove(label);
    }

    /// Record a successfully converted file.
    pub fn file_completed(&self, records: u64, dropped: u64) {
        self.inner.files_completed.fetch_add(1, Ordering::Relaxed);
        self.inner.records_total.fetch_add(records, Ordering::Relaxed);
        self.inner.lines_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn file_skipped(&self) {
        self.inner.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_failed(&self) {
        self.inner.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn folder_completed(&self) {
        self.inner.folders_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.start.elapsed()
    }

    /// Records per second since start, or `None` during the first second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> Option<f64> {
        let secs = self.elapsed().as_secs_f64();
        if secs < 1.0 {
            return None;
        }
        Some(self.inner.records_total.load(Ordering::Relaxed) as f64 / secs)
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let i = &self.inner;
        ProgressSnapshot {
            elapsed_secs: self.elapsed().as_secs_f64(),
            folders_total: load(&i.folders_total),
            folders_completed: load(&i.folders_completed),
            files_total: load(&i.files_total),
            files_completed: load(&i.files_completed),
            files_skipped: load(&i.files_skipped),
            files_failed: load(&i.files_failed),
            records_total: load(&i.records_total),
            lines_dropped: load(&i.lines_dropped),
            records_per_sec: self.rate().unwrap_or(0.0),
            in_flight: self.in_flight().iter().cloned().collect(),
            max_in_flight: self.max_in_flight(),
        }
    }

    /// One-line status, e.g.
    /// `[1m 5s] | Folders: 1/3 | Files: 4/10 (2 skipped) | Records: 12,345 | 1.2k rec/s`.
    #[must_use]
    pub fn status_line(&self, extra: Option<&str>) -> String {
        let s = self.snapshot();
        let mut files = format!("Files: {}/{}", s.files_completed, s.files_total);
        if s.files_skipped > 0 {
            files.push_str(&format!(" ({} skipped)", s.files_skipped));
        }
        let mut parts = vec![
            format!("[{}]", format_elapsed(self.elapsed())),
            format!("Folders: {}/{}", s.folders_completed, s.folders_total),
            files,
            format!("Records: {}", group_thousands(s.records_total)),
            format_rate(self.rate()),
        ];
        if let Some(extra) = extra {
            parts.push(extra.to_string());
        }
        parts.join(" | ")
    }

    /// Final multi-line summary printed at the end of a run.
    #[must_use]
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        let rule = "=".repeat(60);
        let mut out = format!(
            "{rule}\n  All done in {}\n  {} records across {} files ({} skipped",
            format_elapsed(self.elapsed()),
            group_thousands(s.records_total),
            s.files_completed,
            s.files_skipped,
        );
        if s.files_failed > 0 {
            out.push_str(&format!(", {} failed", s.files_failed));
        }
        out.push(')');
        if s.lines_dropped > 0 {
            out.push_str(&format!(
                "\n  {} unparseable line(s) dropped",
                group_thousands(s.lines_dropped)
            ));
        }
        out.push_str(&format!("\n{rule}"));
        out
    }

    /// Counters as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    /// Write the JSON counters to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// `42s`, `3m 7s`, `2h 15m`.
#[must_use]
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// `850 rec/s`, `12.4k rec/s`; `-` while no rate is available.
#[must_use]
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        None => "-".to_string(),
        Some(r) if r >= 1000.0 => format!("{:.1}k rec/s", r / 1000.0),
        Some(r) => format!("{r:.0} rec/s"),
    }
}

/// `1234567` → `1,234,567`.
#[must_use]
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
