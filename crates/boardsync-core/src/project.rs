use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a project or task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    #[default]
    None,
    Trello,
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSource::None => "none",
            TaskSource::Trello => "trello",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(TaskSource::None),
            "trello" => Some(TaskSource::Trello),
            _ => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, TaskSource::None)
    }
}

impl fmt::Display for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub source: TaskSource,
    /// Board this project mirrors. Always set when `source` is remote.
    pub remote_board_id: Option<String>,
    /// List that newly pushed cards land in.
    pub remote_default_list_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Board and default list, if this project can receive pushed cards.
    pub fn remote_linkage(&self) -> Option<(&str, &str)> {
        if !self.source.is_remote() {
            return None;
        }
        match (&self.remote_board_id, &self.remote_default_list_id) {
            (Some(board), Some(list)) => Some((board.as_str(), list.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: TaskSource,
    #[serde(default)]
    pub remote_board_id: Option<String>,
    #[serde(default)]
    pub remote_default_list_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source: Option<TaskSource>,
    pub remote_board_id: Option<Option<String>>,
    pub remote_default_list_id: Option<Option<String>>,
}
