use thiserror::Error;

use boardsync_db::DbError;
use boardsync_trello::ClientError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Credential missing or rejected by the tracker.
    #[error("auth error: {0}")]
    Auth(String),

    /// Server-side configuration is incomplete.
    #[error("config error: {0}")]
    Config(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// Caller input rejected before any remote call.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The caller does not own the target project.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store error: {0}")]
    Store(String),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

impl From<ClientError> for SyncError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::MissingCredential(_) | ClientError::Auth { .. } => {
                SyncError::Auth(e.to_string())
            }
            ClientError::Config(msg) => SyncError::Config(msg),
            ClientError::Remote { .. } => SyncError::Remote(e.to_string()),
            ClientError::Transport { .. } => SyncError::Transport(e.to_string()),
        }
    }
}

impl From<DbError> for SyncError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => SyncError::NotFound(msg),
            other => SyncError::Store(other.to_string()),
        }
    }
}
