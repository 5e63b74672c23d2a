use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
