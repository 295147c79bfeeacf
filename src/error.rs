use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Server public key not found at {}. Start the server once or run 'secure-drop keygen'.", .0.display())]
    PublicKeyMissing(PathBuf),

    #[error("Key files already exist at {}. Use --force to replace them (clients will need the new public key).", .0.display())]
    KeysExist(PathBuf),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Decryption failed: data is corrupted or the key is wrong")]
    Decryption,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Connection to {0} refused. Make sure the server is running and reachable.")]
    ConnectionRefused(String),

    #[error("Could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Connection timed out after {0} s")]
    Timeout(u64),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading or writing a transfer frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream before a field was complete
    #[error("truncated {field}: expected {expected} bytes, received {received}")]
    Truncated {
        field: &'static str,
        expected: u64,
        received: u64,
    },

    /// A length prefix exceeds the configured limit for its field
    #[error("{field} length {len} exceeds limit of {max} bytes")]
    FieldTooLarge {
        field: &'static str,
        len: u64,
        max: u64,
    },

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
}
