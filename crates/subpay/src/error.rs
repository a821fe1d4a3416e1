use thiserror::Error;

/// Errors returned by subpay operations.
#[derive(Debug, Error)]
pub enum SubpayError {
    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("chain error: {0}")]
    ChainError(String),

    #[error("invalid delegation: {0}")]
    InvalidDelegation(String),

    /// A user-facing precondition did not hold (wrong chain, missing account, ...).
    #[error("{0}")]
    Precondition(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[cfg(feature = "full")]
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl SubpayError {
    /// Message suitable for showing to an end user. Precondition failures are
    /// shown verbatim; everything else is reported as a failed operation.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            SubpayError::Precondition(msg) => msg.clone(),
            SubpayError::NotFound(what) => format!("Failed to {action}: {what}"),
            other => format!("Failed to {action}: {other}"),
        }
    }
}
