//! Transfer Engine - Move or copy messages between queues
//!
//! A transfer always writes to the target before touching the source. There
//! is no transaction spanning two queues, so a Move whose delete fails after
//! a successful write leaves a duplicate and reports `PartialMove`. The
//! engine never retries a Move on its own.

use crate::application::change_detector::RefreshOutcome;
use crate::domain::{Message, MessageId, MessageRef, QueueRef};
use crate::error::TransferError;
use crate::port::CatalogSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Whether the original message is removed from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferMode {
    Move,
    Copy,
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferMode::Move => write!(f, "MOVE"),
            TransferMode::Copy => write!(f, "COPY"),
        }
    }
}

/// Successful transfer of one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub mode: TransferMode,
    pub source: QueueRef,
    pub target: QueueRef,
    pub original_id: MessageId,
    /// The new message at the target (ids never survive a transfer)
    pub written: MessageRef,
    /// Nodes refreshed after the transfer, filled in by the browser session
    #[serde(default)]
    pub refreshed: Vec<RefreshOutcome>,
}

/// Result of a multi-message transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTransferReport {
    pub completed: Vec<TransferOutcome>,
    /// First failure; processing stopped there
    pub failure: Option<TransferError>,
    /// Messages not attempted because of the failure
    pub skipped: usize,
    pub refreshed: Vec<RefreshOutcome>,
}

impl BatchTransferReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct TransferEngine {
    catalog: Arc<dyn CatalogSource>,
}

impl TransferEngine {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    /// Transfer one message: write to `target`, then (Move only) delete from `source`
    ///
    /// # Errors
    /// - TransferError::SameQueue if a Move targets the message's own queue
    /// - TransferError::Write if the target write fails (source untouched)
    /// - TransferError::PartialMove if the write succeeded but the delete failed
    pub async fn transfer(
        &self,
        message: &Message,
        source: &QueueRef,
        target: &QueueRef,
        mode: TransferMode,
    ) -> Result<TransferOutcome, TransferError> {
        if mode == TransferMode::Move && source.same_queue(target) {
            return Err(TransferError::SameQueue {
                queue: source.clone(),
                message_id: message.id.clone(),
            });
        }

        let written = self
            .catalog
            .send_message(target, &message.to_payload())
            .await
            .map_err(|cause| {
                warn!(
                    source = %source,
                    target = %target,
                    message_id = %message.id,
                    error = %cause,
                    "Transfer write failed, source untouched"
                );
                TransferError::Write {
                    target: target.clone(),
                    cause,
                }
            })?;

        if mode == TransferMode::Move {
            if let Err(cause) = self.catalog.delete_message(source, &message.id).await {
                error!(
                    source = %source,
                    target = %target,
                    message_id = %message.id,
                    written_id = %written.id,
                    error = %cause,
                    "Partial move: message duplicated in source and target"
                );
                return Err(TransferError::PartialMove {
                    source_queue: source.clone(),
                    target: target.clone(),
                    message_id: message.id.clone(),
                    written,
                    cause,
                });
            }
        }

        info!(
            mode = %mode,
            source = %source,
            target = %target,
            message_id = %message.id,
            written_id = %written.id,
            "Message transferred"
        );

        Ok(TransferOutcome {
            mode,
            source: source.clone(),
            target: target.clone(),
            original_id: message.id.clone(),
            written,
            refreshed: Vec::new(),
        })
    }

    /// Transfer messages in order, stopping at the first failure
    pub async fn transfer_batch(
        &self,
        messages: &[Message],
        source: &QueueRef,
        target: &QueueRef,
        mode: TransferMode,
    ) -> BatchTransferReport {
        let mut report = BatchTransferReport::default();

        for (i, message) in messages.iter().enumerate() {
            match self.transfer(message, source, target, mode).await {
                Ok(outcome) => report.completed.push(outcome),
                Err(e) => {
                    report.skipped = messages.len() - i - 1;
                    report.failure = Some(e);
                    break;
                }
            }
        }

        if let Some(failure) = &report.failure {
            warn!(
                completed = report.completed.len(),
                skipped = report.skipped,
                error = %failure,
                "Batch transfer stopped at first failure"
            );
        }
        report
    }
}
