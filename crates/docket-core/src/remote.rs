use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use tracing::debug;

use crate::datetime::iso_millis_serde;
use crate::error::{Error, Result};
use crate::task::{Category, Priority, Status, Task, TaskDraft};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP wrapper over the task resource. One request per call, no
/// retries; transport failures and non-2xx responses map to `Error::Remote`.
#[derive(Debug)]
pub struct RemoteClient {
    http: Client,
    base_url: String,
}

/// PUT body: the full field set plus the id, minus `createdAt`, which the
/// server treats as immutable.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    id: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    priority: Priority,
    status: Status,
    category: Category,
    #[serde(
        with = "iso_millis_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    due_date: Option<DateTime<Utc>>,
}

impl RemoteClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| Error::Remote {
                status: None,
                message: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let url = format!("{}/tasks", self.base_url);
        debug!(url = %url, "GET tasks");
        let response = self.http.get(&url).send().map_err(transport)?;
        parse_json(check(response)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn get_task(&self, id: &str) -> Result<Task> {
        let url = format!("{}/tasks/{id}", self.base_url);
        debug!(url = %url, "GET task");
        let response = self.http.get(&url).send().map_err(transport)?;
        parse_json(check(response)?)
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
        let url = format!("{}/tasks", self.base_url);
        debug!(url = %url, "POST task");
        let response = self.http.post(&url).json(draft).send().map_err(transport)?;
        parse_json(check(response)?)
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    pub fn update_task(&self, task: &Task) -> Result<Task> {
        let url = format!("{}/tasks/{}", self.base_url, task.id);
        let body = UpdateBody {
            id: &task.id,
            title: &task.title,
            description: task.description.as_deref(),
            priority: task.priority,
            status: task.status,
            category: task.category,
            due_date: task.due_date,
        };
        debug!(url = %url, "PUT task");
        let response = self.http.put(&url).json(&body).send().map_err(transport)?;
        parse_json(check(response)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&self, id: &str) -> Result<()> {
        let url = format!("{}/tasks/{id}", self.base_url);
        debug!(url = %url, "DELETE task");
        let response = self.http.delete(&url).send().map_err(transport)?;
        check(response)?;
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> Error {
    Error::Remote {
        status: None,
        message: format!("request failed: {err}"),
    }
}

/// Maps a non-2xx response into `Error::Remote`, preferring the server's own
/// `message` field when the body is JSON.
fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body: Option<serde_json::Value> = response.json().ok();
    let message = body
        .as_ref()
        .and_then(|b| b.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "API request failed".to_string());

    Err(Error::Remote {
        status: Some(code),
        message,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response.json().map_err(|err| Error::Remote {
        status: None,
        message: format!("invalid response body: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::UpdateBody;
    use crate::task::{Category, Priority, Status, TaskDraft};

    #[test]
    fn update_body_omits_created_at() {
        let due = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        let body = UpdateBody {
            id: "abc",
            title: "Retitle",
            description: None,
            priority: Priority::Low,
            status: Status::Done,
            category: Category::Other,
            due_date: Some(due),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["title"], "Retitle");
        assert_eq!(json["dueDate"], "2026-09-01T00:00:00.000Z");
        assert!(json.get("createdAt").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn create_body_has_no_identity_fields() {
        let draft = TaskDraft {
            title: "New".to_string(),
            description: None,
            priority: Priority::default(),
            status: Status::default(),
            category: Category::default(),
            due_date: None,
        };

        let json = serde_json::to_value(&draft).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("createdAt").is_none());
        assert_eq!(json["status"], "todo");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["category"], "work");
    }
}
