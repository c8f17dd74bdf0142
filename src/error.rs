//! Error types for the mining bot

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mining bot
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Input validation errors (malformed key/URL/selection)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Wallet already exists: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Vault errors
    #[error("Vault decryption failed (wrong password or corrupted file)")]
    WrongPassword,

    #[error("Vault error: {0}")]
    Vault(String),

    // Remote service errors
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote call {endpoint} failed with status {status}: {body}")]
    Remote {
        endpoint: String,
        status: u16,
        body: String,
    },

    // Chain errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Receipt not obtained within {0}s")]
    ReceiptTimeout(u64),

    #[error("Mining activation not reflected by the service")]
    ActivationVerify,

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error came from the remote service or chain
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Auth(_)
                | Error::Remote { .. }
                | Error::Rpc(_)
                | Error::Transaction(_)
                | Error::ReceiptTimeout(_)
                | Error::ActivationVerify
        )
    }

    /// Check if this error is recoverable by re-prompting the user
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Duplicate(_) | Error::NotFound(_)
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
