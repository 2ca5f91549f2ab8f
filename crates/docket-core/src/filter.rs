use anyhow::anyhow;
use tracing::trace;

use crate::task::{
  Category,
  Priority,
  Status,
  Task
};

/// Conjunction of optional
/// predicates. An absent predicate
/// always matches.
#[derive(
  Debug, Clone, Default, PartialEq
)]
pub struct TaskFilter {
  pub status:   Option<Status>,
  pub priority: Option<Priority>,
  pub category: Option<Category>,
  pub search:   Option<String>
}

impl TaskFilter {
  #[tracing::instrument(skip(terms))]
  pub fn parse(
    terms: &[String]
  ) -> anyhow::Result<Self> {
    let mut filter = Self::default();
    let mut words: Vec<&str> = vec![];

    for term in terms {
      if let Some(value) =
        term.strip_prefix("status:")
      {
        filter.status = Some(
          Status::parse(value)
            .ok_or_else(|| {
              anyhow!(
                "unknown status: {value}"
              )
            })?
        );
        continue;
      }

      if let Some(value) =
        term.strip_prefix("priority:")
      {
        filter.priority = Some(
          Priority::parse(value)
            .ok_or_else(|| {
              anyhow!(
                "unknown priority: \
                 {value}"
              )
            })?
        );
        continue;
      }

      if let Some(value) =
        term.strip_prefix("category:")
      {
        filter.category = Some(
          Category::parse(value)
            .ok_or_else(|| {
              anyhow!(
                "unknown category: \
                 {value}"
              )
            })?
        );
        continue;
      }

      if let Some((key, _)) =
        term.split_once(':')
      {
        return Err(anyhow!(
          "unknown filter key: {key}"
        ));
      }

      words.push(term);
    }

    if !words.is_empty() {
      filter.search =
        Some(words.join(" "));
    }

    Ok(filter)
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let status_ok = self
      .status
      .map_or(true, |s| task.status == s);
    let priority_ok =
      self.priority.map_or(true, |p| {
        task.priority == p
      });
    let category_ok =
      self.category.map_or(true, |c| {
        task.category == c
      });
    let search_ok = match &self.search {
      | Some(needle) => {
        let needle =
          needle.to_ascii_lowercase();
        task
          .title
          .to_ascii_lowercase()
          .contains(&needle)
          || task
            .description
            .as_ref()
            .map_or(false, |d| {
              d.to_ascii_lowercase()
                .contains(&needle)
            })
      }
      | None => true
    };

    let ok = status_ok
      && priority_ok
      && category_ok
      && search_ok;
    trace!(id = %task.id, status_ok, priority_ok, category_ok, search_ok, "filter evaluation");
    ok
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::TaskFilter;
  use crate::task::{
    Category,
    Priority,
    Status,
    Task,
    TaskDraft
  };

  fn task(
    title: &str,
    description: Option<&str>,
    status: Status,
    priority: Priority,
    category: Category
  ) -> Task {
    Task::from_draft(
      TaskDraft {
        title: title.to_string(),
        description: description
          .map(str::to_string),
        priority,
        status,
        category,
        due_date: None
      },
      Utc::now()
    )
  }

  #[test]
  fn parses_keyed_terms_and_search_words()
   {
    let filter = TaskFilter::parse(&[
      "status:todo".to_string(),
      "priority:high".to_string(),
      "buy".to_string(),
      "milk".to_string(),
    ])
    .unwrap();

    assert_eq!(
      filter.status,
      Some(Status::Todo)
    );
    assert_eq!(
      filter.priority,
      Some(Priority::High)
    );
    assert_eq!(filter.category, None);
    assert_eq!(
      filter.search.as_deref(),
      Some("buy milk")
    );
  }

  #[test]
  fn rejects_unknown_keys_and_values()
  {
    assert!(
      TaskFilter::parse(&[
        "deadline:tomorrow".to_string()
      ])
      .is_err()
    );
    assert!(
      TaskFilter::parse(&[
        "status:paused".to_string()
      ])
      .is_err()
    );
  }

  #[test]
  fn empty_filter_matches_everything()
  {
    let filter =
      TaskFilter::parse(&[]).unwrap();
    let t = task(
      "anything",
      None,
      Status::Done,
      Priority::Low,
      Category::Other
    );
    assert!(filter.matches(&t));
  }

  #[test]
  fn conjunction_and_case_insensitive_search()
   {
    let groceries = task(
      "Buy groceries",
      Some("Get milk and eggs"),
      Status::Todo,
      Priority::Low,
      Category::Personal
    );
    let report = task(
      "Write report",
      None,
      Status::Todo,
      Priority::High,
      Category::Work
    );

    let filter = TaskFilter::parse(&[
      "status:todo".to_string(),
      "MILK".to_string(),
    ])
    .unwrap();
    assert!(
      filter.matches(&groceries)
    );
    assert!(!filter.matches(&report));

    let filter = TaskFilter::parse(&[
      "category:work".to_string()
    ])
    .unwrap();
    assert!(
      !filter.matches(&groceries)
    );
    assert!(filter.matches(&report));
  }
}
