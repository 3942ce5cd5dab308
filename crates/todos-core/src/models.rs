//! Data models for todos
//!
//! `Todo` mirrors a row of the hosted table. The store assigns `id` and
//! `created_at`; this crate only ever writes `body` (on insert) and
//! `finished` (on toggle).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier assigned by the store
pub type TodoId = i64;

/// A todo record as stored remotely
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    /// Unique identifier, monotonically assigned by the store
    pub id: TodoId,
    /// Free-text content
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    /// Completion flag
    #[serde(default, deserialize_with = "null_as_default")]
    pub finished: bool,
    /// When the store created this record
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// Display state derived from the completion flag
    pub fn state(&self) -> TodoState {
        if self.finished {
            TodoState::Done
        } else {
            TodoState::Pending
        }
    }
}

/// Insert payload; the store fills in everything else
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTodo {
    pub body: String,
}

impl NewTodo {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Update payload for the toggle action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoPatch {
    pub finished: bool,
}

impl TodoPatch {
    /// Patch that flips the record's current completion flag
    pub fn toggle(todo: &Todo) -> Self {
        Self {
            finished: !todo.finished,
        }
    }
}

/// Per-record display state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoState {
    /// Not finished: red "Mark done" control
    Pending,
    /// Finished: green "Mark not completed" control, body struck through
    Done,
}

impl TodoState {
    /// Label of the toggle control
    pub fn action_label(self) -> &'static str {
        match self {
            TodoState::Pending => "Mark done",
            TodoState::Done => "Mark not completed",
        }
    }

    /// Whether the body is rendered with strikethrough
    pub fn is_struck(self) -> bool {
        matches!(self, TodoState::Done)
    }

    /// Color name of the toggle control
    pub fn action_color(self) -> ActionColor {
        match self {
            TodoState::Pending => ActionColor::Red,
            TodoState::Done => ActionColor::Green,
        }
    }
}

/// Control colors used by the rendered view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionColor {
    Red,
    Green,
    Blue,
}

/// Render projection of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoRow {
    pub id: TodoId,
    /// Creation date as M/D/YYYY
    pub date: String,
    pub body: String,
    pub state: TodoState,
}

impl TodoRow {
    /// Project a record, formatting its date in the given timezone
    pub fn new<Tz: TimeZone>(todo: &Todo, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            id: todo.id,
            date: todo
                .created_at
                .with_timezone(tz)
                .format("%-m/%-d/%Y")
                .to_string(),
            body: todo.body.clone(),
            state: todo.state(),
        }
    }

    pub fn is_struck(&self) -> bool {
        self.state.is_struck()
    }

    pub fn action_label(&self) -> &'static str {
        self.state.action_label()
    }
}

/// Order records newest first (descending id)
pub fn sort_newest_first(todos: &mut [Todo]) {
    todos.sort_by(|a, b| b.id.cmp(&a.id));
}

/// Kind of change reported by the realtime channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Any other event type the service reports
    Other(String),
}

impl ChangeKind {
    /// Parse the service's event type (INSERT, UPDATE, DELETE, ...)
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => ChangeKind::Other(value.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for ChangeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(ChangeKind::parse(&value))
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
            ChangeKind::Other(other) => write!(f, "{}", other),
        }
    }
}

/// A change notification for some row in the store
///
/// Only used as a trigger for refetching; the record payloads are kept for
/// logging and for `todos watch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
}

impl Serialize for ChangeKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
