//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use queueinator_core::application::{
    DisplayFields, MessageRow, RefreshOutcome, TransferMode, TransferOutcome,
};
use queueinator_core::domain::{MessageId, NodeKey, QueueRef, TreeNode};
use serde::{Deserialize, Serialize};

/// tree.build.v1 / tree.get.v1 - No parameters
#[derive(Debug, Default, Deserialize)]
pub struct TreeRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResponse {
    pub tree: TreeNode,
}

/// Any method that targets a single node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    pub node: NodeKey,
}

/// queue.messages.v1 - List a queue's messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub queue: QueueRef,
    pub messages: Vec<MessageRow>,
}

/// message.inspect.v1 - Show one message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectRequest {
    pub node: NodeKey,
    pub message_id: MessageId,
}

pub type InspectResponse = DisplayFields;

pub type RefreshResponse = RefreshOutcome;

/// message.transfer.v1 - Move or copy messages between queues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: NodeKey,
    pub target: NodeKey,
    pub message_ids: Vec<MessageId>,
    pub mode: TransferMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub completed: Vec<TransferOutcome>,
    pub refreshed: Vec<RefreshOutcome>,
}

/// message.insert.v1 - Send a text message to a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertRequest {
    pub node: NodeKey,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertResponse {
    pub queue: QueueRef,
    pub message_id: MessageId,
}

/// queue.create.v1 - Create a queue below a class or folder node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub parent: NodeKey,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    pub queue: QueueRef,
}

/// queue.delete.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteQueueResponse {
    pub deleted: bool,
}

/// queue.purge.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub removed: u64,
}
