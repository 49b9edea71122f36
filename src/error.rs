//! SwarmKV Error Types

use thiserror::Error;

/// Result type alias for SwarmKV operations
pub type Result<T> = std::result::Result<T, Error>;

/// SwarmKV error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Protocol / input errors
    #[error("Key is not a proper UUID4")]
    InvalidKey,

    #[error("Malformed UUID: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("Unsupported command: {0}")]
    UnknownCommand(String),

    #[error("Wrong command arguments count")]
    WrongArgCount,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Swarm/replication errors
    #[error("Failed to write/read an entry")]
    QuorumShortfall,

    #[error("Not found")]
    NotFound,

    // I/O and (de)serialization
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal / fatal
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_) | Error::Network(_) | Error::Http(_)
        )
    }

    /// Check if this error indicates the peer simply never answered, as
    /// opposed to a protocol-level rejection. Callers must never treat
    /// this as a reason to remove the peer from membership themselves.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::ConnectionFailed { .. }
                | Error::ConnectionTimeout(_)
                | Error::Http(_)
        )
    }
}
