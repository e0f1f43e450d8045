use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Fetch, commit or publish failure reported by the message bus client.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Liveness probe or query failure reported by the source store.
    #[error("Store error: {0}")]
    Store(String),

    /// A source row could not be converted into its domain value.
    #[error("Row decode error: {0}")]
    RowDecode(String),

    /// Inbound payload is not a valid JSON document for its key.
    #[error("Payload decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Shutdown requested")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        BridgeError::Transport(err.to_string())
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        BridgeError::Store(err.to_string())
    }

    pub fn row_decode(err: impl std::fmt::Display) -> Self {
        BridgeError::RowDecode(err.to_string())
    }

    /// Returns `true` if the error was caused by a shutdown request rather
    /// than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
