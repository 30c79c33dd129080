// Message Domain Model

use crate::domain::QueueRef;
use serde::{Deserialize, Serialize};

/// Backend-assigned message id, unique within its queue only
pub type MessageId = String;

/// Response queue attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseQueueInfo {
    pub name: String,
    pub created_at: Option<i64>, // epoch ms
}

/// Message as peeked from a queue
///
/// A move destroys this instance and creates a new one at the destination
/// with a new id; `id` never survives a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub label: Option<String>,
    pub body: Vec<u8>,
    pub extension: Vec<u8>,
    pub response_queue: Option<ResponseQueueInfo>,
    pub arrived_at: i64, // epoch ms
}

impl Message {
    /// Payload that recreates this message's content in another queue
    pub fn to_payload(&self) -> MessagePayload {
        MessagePayload {
            label: self.label.clone(),
            body: self.body.clone(),
            extension: self.extension.clone(),
            response_queue: self.response_queue.as_ref().map(|r| r.name.clone()),
        }
    }

    /// Size of the body in bytes
    pub fn body_size(&self) -> usize {
        self.body.len()
    }
}

/// Content sent to a queue; the backend assigns id and arrival time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub label: Option<String>,
    pub body: Vec<u8>,
    #[serde(default)]
    pub extension: Vec<u8>,
    pub response_queue: Option<String>,
}

impl MessagePayload {
    /// Plain text body with no metadata
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            body: content.into().into_bytes(),
            ..Default::default()
        }
    }
}

/// Location of a message that was just written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub queue: QueueRef,
    pub id: MessageId,
}
