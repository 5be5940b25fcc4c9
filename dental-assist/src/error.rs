use thiserror::Error;

use crate::lex::ErrorInfo;

/// Errors surfaced by the assistant controllers.
#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Validation failed: {0:?}")]
    Validation(Vec<FieldError>),

    #[error("Message rejected: {0}")]
    MessageRejected(String),

    #[error("Bot request failed: {}", .0.user_message)]
    Bot(ErrorInfo),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised by a [`crate::storage::KeyValueStore`] backend.
///
/// These never escape [`crate::storage::LocalStorage`]; they are logged and
/// turned into defaults there.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Quota exceeded writing {key}: {needed} bytes over a {quota} byte quota")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single field-level validation failure, shown inline next to the field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssistError>;
