use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::project::TaskSource;

/// Remote archival state as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    #[default]
    Active,
    Archived,
}

impl RemoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteState::Active => "active",
            RemoteState::Archived => "archived",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(RemoteState::Active),
            "archived" => Some(RemoteState::Archived),
            _ => None,
        }
    }

    pub fn from_closed(closed: bool) -> Self {
        if closed {
            RemoteState::Archived
        } else {
            RemoteState::Active
        }
    }
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote linkage of a single task. At most one per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub task_id: String,
    pub source: TaskSource,
    pub remote_card_id: Option<String>,
    pub remote_state: RemoteState,
    pub remote_url: Option<String>,
    /// Free-form; carries at least `list_name` and `list_id` for pulled cards.
    pub extra: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskMeta {
    /// Linked iff remote-sourced with a card id.
    pub fn is_linked(&self) -> bool {
        self.source.is_remote() && self.remote_card_id.is_some()
    }

    pub fn list_id(&self) -> Option<&str> {
        self.extra.get("list_id").and_then(Value::as_str)
    }
}

/// Fields written by `upsert_meta`. `None` leaves a column untouched on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaFields {
    pub source: Option<TaskSource>,
    pub remote_card_id: Option<String>,
    pub remote_state: Option<RemoteState>,
    /// `Some(None)` clears the stored URL.
    pub remote_url: Option<Option<String>>,
    pub extra: Option<Value>,
}

impl MetaFields {
    /// Linkage for a card pulled from `list_id`/`list_name`.
    pub fn for_card(
        card_id: &str,
        closed: bool,
        url: Option<&str>,
        list_id: &str,
        list_name: &str,
    ) -> Self {
        Self {
            source: Some(TaskSource::Trello),
            remote_card_id: Some(card_id.to_string()),
            remote_state: Some(RemoteState::from_closed(closed)),
            remote_url: Some(url.map(String::from)),
            extra: Some(serde_json::json!({
                "list_name": list_name,
                "list_id": list_id,
            })),
        }
    }
}
