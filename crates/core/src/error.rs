// Central Error Types for the Application

use crate::domain::{MessageId, MessageRef, QueueRef};
use crate::port::CatalogError;
use thiserror::Error;

/// Failure of a single message transfer
///
/// `Write` is a clean failure: nothing changed. `PartialMove` means the
/// message now exists in both queues and needs operator attention; it is
/// never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Cannot move message {message_id} onto its own queue {queue}")]
    SameQueue { queue: QueueRef, message_id: MessageId },

    #[error("Transfer to {target} failed, source untouched: {cause}")]
    Write {
        target: QueueRef,
        #[source]
        cause: CatalogError,
    },

    #[error(
        "Partial move: message {message_id} was written to {target} as {} but could not be removed from {source_queue}: {cause}",
        .written.id
    )]
    PartialMove {
        source_queue: QueueRef,
        target: QueueRef,
        message_id: MessageId,
        written: MessageRef,
        #[source]
        cause: CatalogError,
    },
}

impl TransferError {
    /// True if the message was duplicated rather than left untouched
    pub fn is_partial_move(&self) -> bool {
        matches!(self, TransferError::PartialMove { .. })
    }
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
