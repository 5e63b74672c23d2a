use serde::Serialize;

use crate::SyncError;

/// What happened to one card during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum CardAction {
    Created,
    Updated,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardOutcome {
    pub card_id: String,
    pub list_id: String,
    #[serde(flatten)]
    pub action: CardAction,
}

/// A list whose cards could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListFailure {
    pub list_id: String,
    pub reason: String,
}

/// Result of an import or sync walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Cards that produced a new local task.
    pub imported_count: usize,
    /// Cards that refreshed an existing local task.
    pub updated_count: usize,
    pub outcomes: Vec<CardOutcome>,
    /// Open lists not walked because the deadline passed.
    pub skipped_lists: Vec<String>,
    pub failed_lists: Vec<ListFailure>,
    pub message: Option<String>,
}

impl SyncReport {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, card_id: &str, list_id: &str, action: CardAction) {
        match action {
            CardAction::Created => self.imported_count += 1,
            CardAction::Updated => self.updated_count += 1,
            CardAction::Failed(_) => {}
        }
        self.outcomes.push(CardOutcome {
            card_id: card_id.to_string(),
            list_id: list_id.to_string(),
            action,
        });
    }

    pub fn processed_count(&self) -> usize {
        self.imported_count + self.updated_count
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.action, CardAction::Failed(_)))
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0 && self.failed_lists.is_empty() && self.skipped_lists.is_empty()
    }
}

/// Result of a push. Push failures never abort the caller's local work.
#[derive(Debug)]
pub enum PushOutcome {
    Succeeded,
    Failed(SyncError),
}

impl PushOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, PushOutcome::Succeeded)
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            PushOutcome::Succeeded => None,
            PushOutcome::Failed(e) => Some(e),
        }
    }
}
