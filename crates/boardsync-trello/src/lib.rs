//! Client for the remote card tracker.
//!
//! Every [`RemoteTracker`] call is exactly one HTTP round trip. Nothing is
//! retried or cached here; callers decide what to do with each error class.

mod http;
pub mod mock;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use boardsync_core::remote::{RemoteBoard, RemoteCard, RemoteCredential, RemoteLabel, RemoteList};
use boardsync_core::CoreError;

pub use http::TrelloClient;

pub const DEFAULT_BASE_URL: &str = "https://api.trello.com/1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// The closed set of calls the client can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchBoards,
    FetchLists,
    FetchCards,
    FetchLabels,
    CreateCard,
    UpdateCard,
    DeleteCard,
    CreateLabel,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FetchBoards => "fetch_boards",
            Operation::FetchLists => "fetch_lists",
            Operation::FetchCards => "fetch_cards",
            Operation::FetchLabels => "fetch_labels",
            Operation::CreateCard => "create_card",
            Operation::UpdateCard => "update_card",
            Operation::DeleteCard => "delete_card",
            Operation::CreateLabel => "create_label",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// No usable credential was supplied. Do not retry.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The tracker rejected the credential. Do not retry.
    #[error("{operation}: not authorized: {message}")]
    Auth {
        operation: Operation,
        message: String,
    },

    /// Required client configuration is absent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The tracker answered with a non-success status or an unreadable body.
    #[error("{operation}: remote returned {status}: {message}")]
    Remote {
        operation: Operation,
        status: u16,
        message: String,
    },

    /// Network failure or timeout. Safe to retry by caller policy.
    #[error("{operation}: transport failure: {message}")]
    Transport {
        operation: Operation,
        message: String,
    },
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ClientError::Auth { .. } | ClientError::MissingCredential(_)
        )
    }
}

/// Explicit configuration handed to the client at construction.
#[derive(Debug, Clone)]
pub struct TrelloConfig {
    pub base_url: String,
    /// Server-side API key. Combined with a user's token into a credential.
    pub api_key: Option<String>,
    /// Upper bound for a single round trip.
    pub timeout: Duration,
}

impl Default for TrelloConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TrelloConfig {
    /// Pair the configured API key with a user's token.
    pub fn credential(&self, token: Option<&str>) -> Result<RemoteCredential, ClientError> {
        RemoteCredential::from_parts(self.api_key.as_deref(), token).map_err(|e| match e {
            CoreError::MissingCredential(msg) => ClientError::MissingCredential(msg),
            other => ClientError::Config(other.to_string()),
        })
    }
}

/// Writable card fields. Unset fields are left out of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
    /// Comma-joined label ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_labels: Option<String>,
}

impl CardFields {
    pub fn with_labels(mut self, ids: &[String]) -> Self {
        self.id_labels = if ids.is_empty() {
            None
        } else {
            Some(ids.join(","))
        };
        self
    }

    pub fn label_ids(&self) -> Vec<&str> {
        self.id_labels
            .as_deref()
            .map(|s| s.split(',').filter(|id| !id.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait RemoteTracker: Send + Sync {
    async fn fetch_boards(&self, cred: &RemoteCredential) -> Result<Vec<RemoteBoard>, ClientError>;

    async fn fetch_lists(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
    ) -> Result<Vec<RemoteList>, ClientError>;

    async fn fetch_cards(
        &self,
        cred: &RemoteCredential,
        list_id: &str,
    ) -> Result<Vec<RemoteCard>, ClientError>;

    async fn fetch_labels(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
    ) -> Result<Vec<RemoteLabel>, ClientError>;

    async fn create_card(
        &self,
        cred: &RemoteCredential,
        list_id: &str,
        fields: &CardFields,
    ) -> Result<RemoteCard, ClientError>;

    async fn update_card(
        &self,
        cred: &RemoteCredential,
        card_id: &str,
        fields: &CardFields,
    ) -> Result<RemoteCard, ClientError>;

    async fn delete_card(&self, cred: &RemoteCredential, card_id: &str) -> Result<(), ClientError>;

    async fn create_label(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
        name: &str,
        color: &str,
    ) -> Result<RemoteLabel, ClientError>;
}

/// Reject an incomplete credential before any request is built.
pub(crate) fn require_credential(
    cred: &RemoteCredential,
    operation: Operation,
) -> Result<(), ClientError> {
    if cred.is_complete() {
        Ok(())
    } else {
        Err(ClientError::MissingCredential(format!(
            "{operation} needs both key and token"
        )))
    }
}
