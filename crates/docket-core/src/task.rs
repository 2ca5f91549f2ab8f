use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::iso_millis_serde;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Work,
    Personal,
    Study,
    Other,
}

impl Status {
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "todo" => Some(Status::Todo),
            "inprogress" => Some(Status::InProgress),
            "done" => Some(Status::Done),
            _ => None,
        }
    }

    pub fn display_text(self) -> &'static str {
        match self {
            Status::Todo => "To Do",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }
}

impl Priority {
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn display_text(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl Category {
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "work" => Some(Category::Work),
            "personal" => Some(Category::Personal),
            "study" => Some(Category::Study),
            "other" => Some(Category::Other),
            _ => None,
        }
    }

    pub fn display_text(self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Study => "Study",
            Category::Other => "Other",
        }
    }
}

/// A task as the backend and the local store both represent it. Field names
/// are camelCase on the wire; timestamps carry millisecond precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub category: Category,

    #[serde(with = "iso_millis_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(
        default,
        with = "iso_millis_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
}

/// Everything a task carries except its server-assigned identity. This is the
/// create-request body; the repository turns it into a full `Task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub category: Category,

    #[serde(
        default,
        with = "iso_millis_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    pub fn from_draft(draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            status: draft.status,
            category: draft.category,
            created_at: now.trunc_subsecs(3),
            due_date: draft.due_date.map(|d| d.trunc_subsecs(3)),
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != Status::Done && self.due_date.map(|due| due < now).unwrap_or(false)
    }

    /// Mutable fields as a draft, for edit flows that rebuild the task.
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            status: self.status,
            category: self.category,
            due_date: self.due_date,
        }
    }

    /// Replaces every mutable field; id and created_at stay as they are.
    pub fn apply_draft(&mut self, draft: TaskDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.priority = draft.priority;
        self.status = draft.status;
        self.category = draft.category;
        self.due_date = draft.due_date.map(|d| d.trunc_subsecs(3));
    }
}

/// Seed collection written into a fresh local store on first open.
pub fn sample_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let now = now.trunc_subsecs(3);
    let entry = |title: &str,
                 description: &str,
                 priority: Priority,
                 status: Status,
                 category: Category,
                 created_at: DateTime<Utc>,
                 due_date: DateTime<Utc>| Task {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: Some(description.to_string()),
        priority,
        status,
        category,
        created_at,
        due_date: Some(due_date),
    };

    vec![
        entry(
            "Complete project proposal",
            "Draft the initial proposal for client review",
            Priority::High,
            Status::Todo,
            Category::Work,
            now,
            now + Duration::days(2),
        ),
        entry(
            "Update documentation",
            "Update the API documentation with new endpoints",
            Priority::Medium,
            Status::InProgress,
            Category::Work,
            now - Duration::days(1),
            now + Duration::days(1),
        ),
        entry(
            "Buy groceries",
            "Get milk, eggs, bread and vegetables",
            Priority::Low,
            Status::Todo,
            Category::Personal,
            now,
            now + Duration::hours(12),
        ),
        entry(
            "Finish onboarding course",
            "Complete sections 4-6 of the engineering onboarding course",
            Priority::Medium,
            Status::InProgress,
            Category::Study,
            now - Duration::days(2),
            now + Duration::days(3),
        ),
        entry(
            "Schedule dentist appointment",
            "Call Dr. Smith for annual checkup",
            Priority::Low,
            Status::Done,
            Category::Personal,
            now - Duration::days(5),
            now - Duration::days(1),
        ),
        entry(
            "Team weekly meeting",
            "Prepare slides for the weekly progress update",
            Priority::High,
            Status::Todo,
            Category::Work,
            now,
            now + Duration::days(1),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{sample_tasks, Category, Priority, Status, Task, TaskDraft};

    #[test]
    fn wire_shape_is_camel_case_with_millisecond_dates() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 9, 30, 0).unwrap();
        let task = Task::from_draft(
            TaskDraft {
                title: "Write report".to_string(),
                description: Some("quarterly numbers".to_string()),
                priority: Priority::High,
                status: Status::Todo,
                category: Category::Work,
                due_date: None,
            },
            now,
        );

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["title"], "Write report");
        assert_eq!(json["description"], "quarterly numbers");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["status"], "todo");
        assert_eq!(json["category"], "work");
        assert_eq!(json["createdAt"], "2026-08-25T09:30:00.000Z");
        assert!(json.get("dueDate").is_none());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn parses_wire_enums_and_offset_dates() {
        let raw = r#"{
            "id": "42",
            "title": "Review patch",
            "priority": "low",
            "status": "inprogress",
            "category": "study",
            "createdAt": "2026-08-25T11:30:00+02:00",
            "dueDate": null
        }"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert!(task.description.is_none());
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.category, Category::Study);
        assert_eq!(
            task.created_at,
            Utc.with_ymd_and_hms(2026, 8, 25, 9, 30, 0).unwrap()
        );
        assert!(task.due_date.is_none());
    }

    #[test]
    fn display_text_matches_parse() {
        assert_eq!(Status::parse("InProgress"), Some(Status::InProgress));
        assert_eq!(Status::InProgress.display_text(), "In Progress");
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Category::parse("bogus"), None);
    }

    #[test]
    fn seed_collection_has_unique_ids() {
        let now = Utc::now();
        let seeded = sample_tasks(now);
        assert_eq!(seeded.len(), 6);
        for (i, a) in seeded.iter().enumerate() {
            for b in &seeded[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn overdue_requires_unfinished_status() {
        let now = Utc::now();
        let seeded = sample_tasks(now);
        let dentist = &seeded[4];
        assert_eq!(dentist.status, Status::Done);
        assert!(!dentist.is_overdue(now));

        let mut copy = dentist.clone();
        copy.status = Status::Todo;
        assert!(copy.is_overdue(now));
    }
}
