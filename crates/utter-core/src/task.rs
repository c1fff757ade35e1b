use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::local_naive_serde;

/// Closed set plus verbatim passthrough: values outside the known four
/// round-trip unchanged for display but behave like `Misc` in logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Work,
    Personal,
    Urgent,
    Misc,
    Other(String),
}

impl Category {
    pub fn is_misc_like(&self) -> bool {
        matches!(self, Category::Misc | Category::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Urgent => "urgent",
            Category::Misc => "misc",
            Category::Other(raw) => raw,
        }
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "work" => Category::Work,
            "personal" => Category::Personal,
            "urgent" => Category::Urgent,
            "misc" | "" => Category::Misc,
            _ => Category::Other(raw),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Unrecognized input collapses to `Medium` rather than being rejected.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// An unpersisted task proposal produced by the normalizer, prior to
/// id and creation-timestamp assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub summary: String,
    pub due: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,

    pub summary: String,

    #[serde(default, with = "local_naive_serde::option")]
    pub due: Option<NaiveDateTime>,

    #[serde(default)]
    pub description: Option<String>,

    pub category: Category,

    pub priority: Priority,

    #[serde(default)]
    pub completed: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub reminder_sent: bool,
}

impl Task {
    pub fn from_draft(draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            summary: draft.summary,
            due: draft.due,
            description: draft.description,
            category: draft.category,
            priority: draft.priority,
            completed: false,
            created_at: now,
            reminder_sent: false,
        }
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.due.map(|due| due < now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Category, Priority, Task, TaskDraft};

    fn draft(summary: &str) -> TaskDraft {
        TaskDraft {
            summary: summary.to_string(),
            due: None,
            description: None,
            category: Category::Misc,
            priority: Priority::Medium,
        }
    }

    #[test]
    fn unknown_category_round_trips_verbatim() {
        let category = Category::from("errands".to_string());
        assert_eq!(category, Category::Other("errands".to_string()));
        assert!(category.is_misc_like());
        assert_eq!(String::from(category), "errands");
    }

    #[test]
    fn known_category_parses_case_insensitively() {
        assert_eq!(Category::from("WORK".to_string()), Category::Work);
        assert!(!Category::Work.is_misc_like());
    }

    #[test]
    fn unknown_priority_defaults_to_medium() {
        assert_eq!(Priority::parse("asap"), Priority::Medium);
        assert_eq!(Priority::parse("High"), Priority::High);
    }

    #[test]
    fn from_draft_sets_creation_defaults() {
        let now = Utc::now();
        let task = Task::from_draft(draft("water plants"), now);
        assert_eq!(task.created_at, now);
        assert!(!task.completed);
        assert!(!task.reminder_sent);
        assert_eq!(task.summary, "water plants");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let now = Utc::now();
        let a = Task::from_draft(draft("a"), now);
        let b = Task::from_draft(draft("b"), now);
        assert_ne!(a.id, b.id);
    }
}
