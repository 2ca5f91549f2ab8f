use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::task::{sample_tasks, Task};

/// File-backed task collection used when the backend is unreachable or
/// disabled. One JSON document per line; writes go through a temp file and
/// rename so a crash never leaves a half-written store.
#[derive(Debug)]
pub struct LocalStore {
    pub tasks_path: PathBuf,
}

impl LocalStore {
    /// Opens the store, creating and seeding `tasks.data` with the sample
    /// collection on first use.
    #[tracing::instrument(skip(data_dir, now))]
    pub fn open(data_dir: &Path, now: DateTime<Utc>) -> Result<Self> {
        fs::create_dir_all(data_dir).map_err(|err| {
            Error::persistence(format!("failed to create {}: {err}", data_dir.display()))
        })?;

        let tasks_path = data_dir.join("tasks.data");
        let store = Self { tasks_path };

        if !store.tasks_path.exists() {
            let seeded = sample_tasks(now);
            store.save(&seeded)?;
            info!(
                file = %store.tasks_path.display(),
                count = seeded.len(),
                "seeded local store with sample tasks"
            );
        }

        Ok(store)
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Result<Vec<Task>> {
        debug!(file = %self.tasks_path.display(), "loading jsonl");
        let file = fs::File::open(&self.tasks_path).map_err(|err| {
            Error::persistence(format!(
                "failed opening {}: {err}",
                self.tasks_path.display()
            ))
        })?;
        let reader = BufReader::new(file);

        let mut out = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(Error::persistence)?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let task: Task = serde_json::from_str(trimmed).map_err(|err| {
                Error::persistence(format!(
                    "failed parsing {} line {}: {err}",
                    self.tasks_path.display(),
                    idx + 1
                ))
            })?;
            out.push(task);
        }

        debug!(count = out.len(), "loaded tasks from jsonl");
        Ok(out)
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save(&self, tasks: &[Task]) -> Result<()> {
        debug!(
            file = %self.tasks_path.display(),
            count = tasks.len(),
            "saving jsonl atomically"
        );

        let dir = self.tasks_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(Error::persistence)?;
        for task in tasks {
            let serialized = serde_json::to_string(task).map_err(Error::persistence)?;
            writeln!(temp, "{serialized}").map_err(Error::persistence)?;
        }
        temp.flush().map_err(Error::persistence)?;

        temp.persist(&self.tasks_path).map_err(|err| {
            Error::persistence(format!(
                "failed to persist {}: {err}",
                self.tasks_path.display()
            ))
        })?;

        Ok(())
    }
}
