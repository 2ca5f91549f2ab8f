use std::path::Path;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::TaskFilter;
use crate::remote::RemoteClient;
use crate::store::LocalStore;
use crate::task::{Task, TaskDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Remote,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Remote => "remote",
        }
    }
}

#[derive(Debug)]
enum Backend {
    Local(LocalStore),
    Remote(RemoteClient),
}

/// Owns the authoritative task collection for the process lifetime. The
/// backend is chosen once at open by probing the configured API; the mode is
/// never re-evaluated afterwards, so a short-lived invocation sticks with
/// its first answer.
#[derive(Debug)]
pub struct TaskRepository {
    backend: Backend,
    tasks: Vec<Task>,
}

impl TaskRepository {
    #[tracing::instrument(skip(cfg, data_dir))]
    pub fn open(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let api_enabled = cfg.get_bool("api.enabled").unwrap_or(true);
        let api_url = cfg
            .get("api.url")
            .unwrap_or_else(|| "http://localhost:8080/api".to_string());

        if api_enabled {
            let client = RemoteClient::new(&api_url)?;
            match client.list_tasks() {
                Ok(tasks) => {
                    info!(
                        count = tasks.len(),
                        url = %api_url,
                        "backend reachable, using remote mode"
                    );
                    return Ok(Self {
                        backend: Backend::Remote(client),
                        tasks,
                    });
                }
                Err(err) => {
                    info!(
                        error = %err,
                        url = %api_url,
                        "backend unreachable, falling back to local mode"
                    );
                }
            }
        } else {
            info!("api disabled by configuration, using local mode");
        }

        let store = LocalStore::open(data_dir, Utc::now())?;
        let tasks = store.load()?;
        Ok(Self {
            backend: Backend::Local(store),
            tasks,
        })
    }

    pub fn mode(&self) -> Mode {
        match &self.backend {
            Backend::Local(_) => Mode::Local,
            Backend::Remote(_) => Mode::Remote,
        }
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filter(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    /// Creates a task from the draft. Remote mode sends the draft first and
    /// adopts the server-assigned identity; local mode synthesizes one. The
    /// new task is prepended, so `list()` shows it first.
    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn add(&mut self, draft: TaskDraft) -> Result<Task> {
        if draft.title.trim().is_empty() {
            return Err(Error::Validation { field: "title" });
        }

        let created = match &self.backend {
            Backend::Remote(client) => client.create_task(&draft).map_err(Error::persistence)?,
            Backend::Local(_) => Task::from_draft(draft, Utc::now()),
        };

        let mut next = Vec::with_capacity(self.tasks.len() + 1);
        next.push(created.clone());
        next.extend(self.tasks.iter().cloned());
        self.commit(next)?;

        info!(id = %created.id, "added task");
        Ok(created)
    }

    /// Full replacement by id. Unknown ids are ignored here; the view layer
    /// resolves ids before calling and reports unknown ones itself.
    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    pub fn update(&mut self, task: Task) -> Result<()> {
        if task.title.trim().is_empty() {
            return Err(Error::Validation { field: "title" });
        }

        if !self.tasks.iter().any(|t| t.id == task.id) {
            debug!(id = %task.id, "update for unknown id ignored");
            return Ok(());
        }

        if let Backend::Remote(client) = &self.backend {
            client.update_task(&task).map_err(Error::persistence)?;
        }

        let next: Vec<Task> = self
            .tasks
            .iter()
            .map(|t| if t.id == task.id { task.clone() } else { t.clone() })
            .collect();
        self.commit(next)?;

        info!(id = %task.id, "updated task");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if !self.tasks.iter().any(|t| t.id == id) {
            debug!(id = %id, "delete for unknown id ignored");
            return Ok(());
        }

        if let Backend::Remote(client) = &self.backend {
            client.delete_task(id).map_err(Error::persistence)?;
        }

        let next: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.id != id)
            .cloned()
            .collect();
        self.commit(next)?;

        info!(id = %id, "deleted task");
        Ok(())
    }

    /// Remote mode re-fetches the whole collection; on failure the previous
    /// collection stays in place. Local mode has nothing to refresh.
    #[tracing::instrument(skip(self))]
    pub fn refresh(&mut self) -> Result<()> {
        match &self.backend {
            Backend::Remote(client) => {
                let tasks = client.list_tasks().map_err(Error::persistence)?;
                info!(count = tasks.len(), "refreshed collection from backend");
                self.tasks = tasks;
                Ok(())
            }
            Backend::Local(_) => {
                debug!("refresh is a no-op in local mode");
                Ok(())
            }
        }
    }

    /// Makes `next` durable before it becomes visible: local mode saves to
    /// disk first and swaps only on success; remote mode swaps directly, the
    /// server already holds the authoritative copy.
    fn commit(&mut self, next: Vec<Task>) -> Result<()> {
        if let Backend::Local(store) = &self.backend {
            store.save(&next)?;
        }
        self.tasks = next;
        Ok(())
    }
}
