//! Error types for Brook
//!
//! This module defines all error types used throughout the Brook codebase.
//! Uses `thiserror` for ergonomic error definitions.

use std::io;
use thiserror::Error;

/// Main error type for Brook operations
#[derive(Error, Debug)]
pub enum BrookError {
    /// The stream key does not exist
    #[error("no such stream: {0}")]
    NoSuchStream(String),

    /// The consumer group is not registered on the stream
    #[error("no such consumer group '{group}' for key '{key}'")]
    NoSuchGroup {
        /// Stream key
        key: String,
        /// Group name
        group: String,
    },

    /// A consumer group with the same name already exists on the stream
    #[error("consumer group '{0}' already exists")]
    GroupAlreadyExists(String),

    /// No id strictly greater than the stream top item can be produced
    #[error("cannot generate an id greater than {last}")]
    InvalidIdKind {
        /// The stream's last assigned id, formatted as `ms-seq`
        last: String,
    },

    /// An explicit id was not greater than the stream top item
    #[error("the id specified is equal or smaller than the target stream top item")]
    IdTooSmall,

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for Brook operations
pub type Result<T> = std::result::Result<T, BrookError>;

impl BrookError {
    /// Convert error to RESP error string
    #[cold]
    pub fn to_resp_error(&self) -> String {
        match self {
            BrookError::NoSuchStream(_) => {
                "ERR The XGROUP subcommand requires the key to exist".to_string()
            }
            BrookError::NoSuchGroup { key, group } => format!(
                "NOGROUP No such key '{key}' or consumer group '{group}' in XREADGROUP with GROUP option"
            ),
            BrookError::GroupAlreadyExists(_) => {
                "BUSYGROUP Consumer Group name already exists".to_string()
            }
            BrookError::InvalidIdKind { .. } => {
                "ERR The stream has exhausted the last possible ID, unable to add more items"
                    .to_string()
            }
            BrookError::IdTooSmall => {
                "ERR The ID specified in XADD is equal or smaller than the target stream top item"
                    .to_string()
            }
            _ => format!("ERR {self}"),
        }
    }
}
