// Catalog Source Port
// Abstraction over the host's queue transport (enumerate, peek, send, delete)

use crate::domain::queue_name;
use crate::domain::{Message, MessagePayload, MessageRef, QueueClass, QueueRef};
use async_trait::async_trait;
use thiserror::Error;

/// Backend failures reported by a catalog source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Enumeration failed: {0}")]
    Enumeration(String),

    #[error("Write to {queue} failed: {reason}")]
    Write { queue: String, reason: String },

    #[error("Delete of message {id} from {queue} failed: {reason}")]
    Delete {
        queue: String,
        id: String,
        reason: String,
    },

    #[error("Invalid queue name: {0:?}")]
    InvalidName(String),

    #[error("Queue already exists: {0}")]
    AlreadyExists(String),

    #[error("Queue not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Catalog Source trait
///
/// Implementations:
/// - SqliteCatalog: queues and messages stored in a local SQLite database
/// - mocks::MockCatalog: in-memory catalog with injectable failures
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Name of the host this catalog enumerates
    fn host_name(&self) -> String;

    /// Enumerate the queues of one class
    ///
    /// # Errors
    /// - CatalogError::Enumeration if the class cannot be listed
    async fn list_queues(&self, class: QueueClass) -> Result<Vec<QueueRef>, CatalogError>;

    /// Non-destructive read of every message in a queue, oldest first
    async fn peek_messages(&self, queue: &QueueRef) -> Result<Vec<Message>, CatalogError>;

    /// Non-destructive read of a single message
    async fn peek_message(
        &self,
        queue: &QueueRef,
        id: &str,
    ) -> Result<Option<Message>, CatalogError> {
        Ok(self
            .peek_messages(queue)
            .await?
            .into_iter()
            .find(|m| m.id == id))
    }

    /// Number of messages currently in a queue
    async fn count_messages(&self, queue: &QueueRef) -> Result<u64, CatalogError> {
        Ok(self.peek_messages(queue).await?.len() as u64)
    }

    /// Re-resolve a queue by class and name (canonical form compared)
    async fn find_queue(
        &self,
        class: QueueClass,
        name: &str,
    ) -> Result<Option<QueueRef>, CatalogError> {
        let wanted = queue_name::canonical(name);
        Ok(self
            .list_queues(class)
            .await?
            .into_iter()
            .find(|q| queue_name::canonical(&q.logical_name) == wanted))
    }

    /// Send a new message; the backend assigns its id
    ///
    /// # Errors
    /// - CatalogError::Write if the message cannot be written
    async fn send_message(
        &self,
        queue: &QueueRef,
        payload: &MessagePayload,
    ) -> Result<MessageRef, CatalogError>;

    /// Remove one message by id
    ///
    /// # Errors
    /// - CatalogError::Delete if the message cannot be removed
    async fn delete_message(&self, queue: &QueueRef, id: &str) -> Result<(), CatalogError>;

    /// Remove every message of a queue, returning how many were removed
    async fn purge_queue(&self, queue: &QueueRef) -> Result<u64, CatalogError>;

    /// Create a queue
    ///
    /// # Errors
    /// - CatalogError::InvalidName unless the name is canonical (`a.b`, not `a..b`)
    /// - CatalogError::AlreadyExists if the name is taken within the class
    async fn create_queue(&self, class: QueueClass, name: &str)
        -> Result<QueueRef, CatalogError>;

    /// Delete a queue and its messages
    ///
    /// # Errors
    /// - CatalogError::NotFound if no such queue exists
    async fn delete_queue(&self, class: QueueClass, name: &str) -> Result<(), CatalogError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{AccessMode, ResponseQueueInfo};
    use std::collections::{BTreeMap, HashSet};
    use std::sync::{Arc, Mutex, MutexGuard};

    #[derive(Default)]
    struct MockQueue {
        access_mode: Option<AccessMode>,
        messages: Vec<Message>,
    }

    #[derive(Default)]
    struct MockState {
        queues: BTreeMap<(QueueClass, String), MockQueue>,
        next_id: u64,
        fail_list: HashSet<QueueClass>,
        fail_peek: HashSet<String>,
        fail_send: HashSet<String>,
        fail_delete: HashSet<String>,
        send_calls: usize,
        delete_calls: usize,
    }

    /// In-memory catalog for tests
    ///
    /// Failures are injected per queue name (`fail_sends_to`, `fail_deletes_on`,
    /// `fail_peeks_on`) or per class (`fail_listing`).
    #[derive(Clone, Default)]
    pub struct MockCatalog {
        state: Arc<Mutex<MockState>>,
    }

    impl MockCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(|e| e.into_inner())
        }

        /// Add a private queue holding `messages` text messages
        pub fn with_queue(self, name: &str, messages: usize) -> Self {
            self.with_class_queue(QueueClass::Private, name, messages)
        }

        pub fn with_class_queue(self, class: QueueClass, name: &str, messages: usize) -> Self {
            self.add_queue(class, name);
            for i in 0..messages {
                self.push_message(class, name, &format!("{}#{}", name, i));
            }
            self
        }

        pub fn add_queue(&self, class: QueueClass, name: &str) {
            self.state()
                .queues
                .entry((class, name.to_string()))
                .or_default();
        }

        pub fn set_access_mode(&self, class: QueueClass, name: &str, mode: AccessMode) {
            if let Some(q) = self.state().queues.get_mut(&(class, name.to_string())) {
                q.access_mode = Some(mode);
            }
        }

        /// Append a message directly, bypassing failure injection
        pub fn push_message(&self, class: QueueClass, name: &str, body: &str) -> String {
            let mut state = self.state();
            state.next_id += 1;
            let id = format!("msg-{}", state.next_id);
            let arrived_at = state.next_id as i64 * 1000;
            if let Some(q) = state.queues.get_mut(&(class, name.to_string())) {
                q.messages.push(Message {
                    id: id.clone(),
                    label: None,
                    body: body.as_bytes().to_vec(),
                    extension: Vec::new(),
                    response_queue: Some(ResponseQueueInfo {
                        name: "replies".to_string(),
                        created_at: Some(0),
                    }),
                    arrived_at,
                });
            }
            id
        }

        pub fn fail_listing(&self, class: QueueClass) {
            self.state().fail_list.insert(class);
        }

        pub fn fail_peeks_on(&self, name: &str) {
            self.state().fail_peek.insert(name.to_string());
        }

        pub fn fail_sends_to(&self, name: &str) {
            self.state().fail_send.insert(name.to_string());
        }

        pub fn fail_deletes_on(&self, name: &str) {
            self.state().fail_delete.insert(name.to_string());
        }

        pub fn clear_failures(&self) {
            let mut state = self.state();
            state.fail_list.clear();
            state.fail_peek.clear();
            state.fail_send.clear();
            state.fail_delete.clear();
        }

        /// Bodies currently in a private queue, as UTF-8
        pub fn bodies(&self, name: &str) -> Vec<String> {
            self.state()
                .queues
                .get(&(QueueClass::Private, name.to_string()))
                .map(|q| {
                    q.messages
                        .iter()
                        .map(|m| String::from_utf8_lossy(&m.body).into_owned())
                        .collect()
                })
                .unwrap_or_default()
        }

        pub fn send_calls(&self) -> usize {
            self.state().send_calls
        }

        pub fn delete_calls(&self) -> usize {
            self.state().delete_calls
        }

        fn default_mode(class: QueueClass) -> AccessMode {
            match class {
                QueueClass::System => AccessMode::PeekAndAdmin,
                _ => AccessMode::SendAndReceive,
            }
        }
    }

    #[async_trait]
    impl CatalogSource for MockCatalog {
        fn host_name(&self) -> String {
            "localhost".to_string()
        }

        async fn list_queues(&self, class: QueueClass) -> Result<Vec<QueueRef>, CatalogError> {
            let state = self.state();
            if state.fail_list.contains(&class) {
                return Err(CatalogError::Enumeration(format!("{} unavailable", class)));
            }
            Ok(state
                .queues
                .iter()
                .filter(|((c, _), _)| *c == class)
                .map(|((c, name), q)| {
                    QueueRef::new(
                        name.clone(),
                        *c,
                        q.access_mode.unwrap_or_else(|| Self::default_mode(*c)),
                    )
                })
                .collect())
        }

        async fn peek_messages(&self, queue: &QueueRef) -> Result<Vec<Message>, CatalogError> {
            let state = self.state();
            if state.fail_peek.contains(&queue.logical_name) {
                return Err(CatalogError::AccessDenied(queue.logical_name.clone()));
            }
            state
                .queues
                .get(&(queue.class, queue.logical_name.clone()))
                .map(|q| q.messages.clone())
                .ok_or_else(|| CatalogError::NotFound(queue.logical_name.clone()))
        }

        async fn send_message(
            &self,
            queue: &QueueRef,
            payload: &MessagePayload,
        ) -> Result<MessageRef, CatalogError> {
            let mut state = self.state();
            state.send_calls += 1;
            if state.fail_send.contains(&queue.logical_name) {
                return Err(CatalogError::Write {
                    queue: queue.logical_name.clone(),
                    reason: "injected send failure".to_string(),
                });
            }
            state.next_id += 1;
            let id = format!("msg-{}", state.next_id);
            let arrived_at = state.next_id as i64 * 1000;
            let q = state
                .queues
                .get_mut(&(queue.class, queue.logical_name.clone()))
                .ok_or_else(|| CatalogError::Write {
                    queue: queue.logical_name.clone(),
                    reason: "queue does not exist".to_string(),
                })?;
            q.messages.push(Message {
                id: id.clone(),
                label: payload.label.clone(),
                body: payload.body.clone(),
                extension: payload.extension.clone(),
                response_queue: payload.response_queue.clone().map(|name| ResponseQueueInfo {
                    name,
                    created_at: None,
                }),
                arrived_at,
            });
            Ok(MessageRef {
                queue: queue.clone(),
                id,
            })
        }

        async fn delete_message(&self, queue: &QueueRef, id: &str) -> Result<(), CatalogError> {
            let mut state = self.state();
            state.delete_calls += 1;
            let delete_error = |reason: &str| CatalogError::Delete {
                queue: queue.logical_name.clone(),
                id: id.to_string(),
                reason: reason.to_string(),
            };
            if state.fail_delete.contains(&queue.logical_name) {
                return Err(delete_error("injected delete failure"));
            }
            let q = state
                .queues
                .get_mut(&(queue.class, queue.logical_name.clone()))
                .ok_or_else(|| delete_error("queue does not exist"))?;
            let before = q.messages.len();
            q.messages.retain(|m| m.id != id);
            if q.messages.len() == before {
                return Err(delete_error("message not found"));
            }
            Ok(())
        }

        async fn purge_queue(&self, queue: &QueueRef) -> Result<u64, CatalogError> {
            let mut state = self.state();
            let q = state
                .queues
                .get_mut(&(queue.class, queue.logical_name.clone()))
                .ok_or_else(|| CatalogError::NotFound(queue.logical_name.clone()))?;
            let removed = q.messages.len() as u64;
            q.messages.clear();
            Ok(removed)
        }

        async fn create_queue(
            &self,
            class: QueueClass,
            name: &str,
        ) -> Result<QueueRef, CatalogError> {
            if !queue_name::is_canonical(name) {
                return Err(CatalogError::InvalidName(name.to_string()));
            }
            let mut state = self.state();
            let key = (class, name.to_string());
            if state.queues.contains_key(&key) {
                return Err(CatalogError::AlreadyExists(name.to_string()));
            }
            state.queues.insert(key, MockQueue::default());
            Ok(QueueRef::new(name, class, Self::default_mode(class)))
        }

        async fn delete_queue(&self, class: QueueClass, name: &str) -> Result<(), CatalogError> {
            self.state()
                .queues
                .remove(&(class, name.to_string()))
                .map(|_| ())
                .ok_or_else(|| CatalogError::NotFound(name.to_string()))
        }
    }
}
