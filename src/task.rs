//! Task model for taskflow.
//!
//! A task is created by the persistence backend (which assigns `id` and
//! `created_at`) and afterwards mutated only through partial updates and
//! completion toggles. `completed_at` is present exactly when the task is
//! completed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Backend-assigned task identifier.
pub type TaskId = i64;

const DUE_LABEL_FORMAT: &str = "%b %d";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let value = raw.trim();
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "invalid priority '{value}' (expected high|medium|low)"
                ))
            })
    }
}

/// Priority filter applied on top of the active/completed split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Only(priority) => task.priority == *priority,
        }
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityFilter::All => f.write_str("all"),
            PriorityFilter::Only(priority) => priority.fmt(f),
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let value = raw.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(PriorityFilter::All);
        }
        value.parse::<Priority>().map(PriorityFilter::Only).map_err(|_| {
            Error::InvalidArgument(format!(
                "invalid filter '{value}' (expected all|high|medium|low)"
            ))
        })
    }
}

impl Serialize for PriorityFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a stored record from a draft. Used by backends that assign ids
    /// themselves.
    pub fn from_draft(id: TaskId, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            completed: draft.completed,
            priority: draft.priority,
            due_date: draft.due_date,
            created_at: now,
            completed_at: draft.completed.then_some(now),
        }
    }

    /// Flip completion, keeping `completed_at` in step.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(now);
    }

    /// Merge the fields present in `patch`; absent fields stay untouched.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
    }

    pub fn due_status(&self, today: NaiveDate) -> Option<DueStatus> {
        self.due_date.map(|due| DueStatus::classify(due, today))
    }
}

/// Task submitted for creation; the backend assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    /// Draft with the defaults used for quick-add: open, medium, no due date.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            priority: Priority::Medium,
            due_date: None,
        }
    }
}

/// Partial update. Fields left as `None` are not sent and not touched.
///
/// `due_date` is doubly optional: `Some(None)` clears the due date.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.priority.is_none() && self.due_date.is_none()
    }
}

/// Trim a title, rejecting titles that are empty after trimming.
pub fn normalize_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a `YYYY-MM-DD` due date.
pub fn parse_due_date(raw: &str) -> Result<NaiveDate> {
    let value = raw.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| {
        Error::InvalidArgument(format!("invalid due date '{value}' (expected YYYY-MM-DD): {err}"))
    })
}

/// Day-level classification of a due date relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Today,
    Tomorrow,
    Overdue,
    Upcoming,
}

impl DueStatus {
    pub fn classify(due: NaiveDate, today: NaiveDate) -> Self {
        if due == today {
            DueStatus::Today
        } else if due == today + Duration::days(1) {
            DueStatus::Tomorrow
        } else if due < today {
            DueStatus::Overdue
        } else {
            DueStatus::Upcoming
        }
    }
}

/// Short badge label for a due date: "Today", "Tomorrow" or e.g. "Oct 03".
pub fn due_label(due: NaiveDate, today: NaiveDate) -> String {
    match DueStatus::classify(due, today) {
        DueStatus::Today => "Today".to_string(),
        DueStatus::Tomorrow => "Tomorrow".to_string(),
        DueStatus::Overdue | DueStatus::Upcoming => due.format(DUE_LABEL_FORMAT).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        parse_due_date(raw).expect("date")
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn filter_parses_all_and_priorities() {
        assert_eq!("all".parse::<PriorityFilter>().unwrap(), PriorityFilter::All);
        assert_eq!(
            "medium".parse::<PriorityFilter>().unwrap(),
            PriorityFilter::Only(Priority::Medium)
        );
        assert!("none".parse::<PriorityFilter>().is_err());
    }

    #[test]
    fn normalize_title_trims_and_rejects_blank() {
        assert_eq!(normalize_title("  Buy milk "), Some("Buy milk".to_string()));
        assert_eq!(normalize_title(""), None);
        assert_eq!(normalize_title("   "), None);
    }

    #[test]
    fn set_completed_keeps_completed_at_in_step() {
        let now = Utc::now();
        let mut task = Task::from_draft(1, TaskDraft::new("A"), now);
        assert!(task.completed_at.is_none());

        task.set_completed(true, now);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(now));

        task.set_completed(false, now);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn apply_patch_only_touches_present_fields() {
        let now = Utc::now();
        let mut task = Task::from_draft(1, TaskDraft::new("A"), now);
        task.due_date = Some(date("2026-10-20"));

        task.apply_patch(&TaskPatch::default().priority(Priority::High));
        assert_eq!(task.title, "A");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, Some(date("2026-10-20")));

        task.apply_patch(&TaskPatch::default().due_date(None));
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = TaskPatch::default().title("B");
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({ "title": "B" }));

        let cleared = TaskPatch::default().due_date(None);
        let value = serde_json::to_value(&cleared).unwrap();
        assert_eq!(value, serde_json::json!({ "due_date": null }));
    }

    #[test]
    fn due_status_classification() {
        let today = date("2026-10-15");
        assert_eq!(DueStatus::classify(date("2026-10-15"), today), DueStatus::Today);
        assert_eq!(DueStatus::classify(date("2026-10-16"), today), DueStatus::Tomorrow);
        assert_eq!(DueStatus::classify(date("2026-10-01"), today), DueStatus::Overdue);
        assert_eq!(DueStatus::classify(date("2026-11-01"), today), DueStatus::Upcoming);
    }

    #[test]
    fn due_labels() {
        let today = date("2026-10-15");
        assert_eq!(due_label(date("2026-10-15"), today), "Today");
        assert_eq!(due_label(date("2026-10-16"), today), "Tomorrow");
        assert_eq!(due_label(date("2026-10-03"), today), "Oct 03");
    }

    #[test]
    fn task_roundtrips_with_lowercase_priority() {
        let raw = r#"{"id":3,"title":"Plan","completed":false,"priority":"high",
            "due_date":"2026-10-20","created_at":"2026-10-01T09:00:00Z","completed_at":null}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, Some(date("2026-10-20")));
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["priority"], "high");
    }
}
