//! Units of work handed to the scheduler.

use clap::ValueEnum;
use std::path::PathBuf;

/// One shard conversion: read `input`, write `output`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTask {
    pub input: PathBuf,
    pub output: PathBuf,
    pub file_name: String,
    /// Partition folder the shard lives in.
    pub folder: String,
}

impl FileTask {
    /// Short label used in progress lines, e.g. `updated_date=2024-01-01/part_000.gz`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.folder, self.file_name)
    }
}

/// Scheduling granularity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Granularity {
    /// Every shard is its own unit.
    #[default]
    File,
    /// Every partition folder is one unit; its shards run one after another.
    Folder,
}

/// What a worker picks up from the queue.
#[derive(Clone, Debug)]
pub enum TaskUnit {
    File(FileTask),
    Folder { name: String, tasks: Vec<FileTask> },
}

impl TaskUnit {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::File(task) => task.label(),
            Self::Folder { name, .. } => name.clone(),
        }
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        match self {
            Self::File(_) => 1,
            Self::Folder { tasks, .. } => tasks.len(),
        }
    }
}

/// Group tasks into units. Tasks of one folder must be contiguous, which
/// discovery guarantees.
#[must_use]
pub fn into_units(tasks: Vec<FileTask>, granularity: Granularity) -> Vec<TaskUnit> {
    match granularity {
        Granularity::File => tasks.into_iter().map(TaskUnit::File).collect(),
        Granularity::Folder => {
            let mut units: Vec<TaskUnit> = Vec::new();
            for task in tasks {
                match units.last_mut() {
                    Some(TaskUnit::Folder { name, tasks: group }) if *name == task.folder => {
                        group.push(task);
                    }
                    _ => units.push(TaskUnit::Folder {
                        name: task.folder.clone(),
                        tasks: vec![task],
                    }),
                }
            }
            units
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(folder: &str, file: &str) -> FileTask {
        FileTask {
            input: PathBuf::from(format!("in/{folder}/{file}")),
            output: PathBuf::from(format!("out/{folder}/{file}")),
            file_name: file.to_string(),
            folder: folder.to_string(),
        }
    }

    #[test]
    fn folder_granularity_groups_contiguous_tasks() {
        let tasks = vec![task("a", "1.gz"), task("a", "2.gz"), task("b", "1.gz")];
        let units = into_units(tasks, Granularity::Folder);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].file_count(), 2);
        assert_eq!(units[1].label(), "b");
    }

    #[test]
    fn file_granularity_keeps_one_unit_per_shard() {
        let tasks = vec![task("a", "1.gz"), task("b", "1.gz")];
        let units = into_units(tasks, Granularity::File);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].label(), "a/1.gz");
    }
}
