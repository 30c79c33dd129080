// Domain Layer - Pure business logic and entities

pub mod error;
pub mod message;
pub mod queue;
pub mod queue_name;
pub mod tree;

// Re-exports
pub use error::DomainError;
pub use message::{Message, MessageId, MessagePayload, MessageRef, ResponseQueueInfo};
pub use queue::{AccessMode, QueueClass, QueueName, QueueRef};
pub use tree::{CountChange, Highlight, NodeKey, NodeKind, TreeNode};
