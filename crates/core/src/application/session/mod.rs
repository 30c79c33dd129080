//! Browser Session - owns the navigation tree and serves every browsing use case
//!
//! Catalog I/O never happens under the tree lock. Each operation gathers
//! what it needs from the catalog first and then applies the result to the
//! tree in one synchronous step, so dropping an in-flight future leaves the
//! tree as it was.

pub mod config;
pub mod constants;
mod highlight;
mod locks;
mod shutdown;
mod stamps;

pub use config::BrowserConfig;
pub use highlight::HighlightScheduler;
pub use locks::KeyedLocks;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use stamps::CountStamps;

use crate::application::change_detector::{ChangeDetector, ChangeKind, RefreshOutcome};
use crate::application::hierarchy::HierarchyBuilder;
use crate::application::inspector::{self, DisplayFields, MessageRow};
use crate::application::transfer::{
    BatchTransferReport, TransferEngine, TransferMode, TransferOutcome,
};
use crate::domain::queue_name;
use crate::domain::{
    DomainError, Highlight, Message, MessagePayload, MessageRef, NodeKey, QueueClass, QueueRef,
    TreeNode,
};
use crate::error::{AppError, Result, TransferError};
use crate::port::{CatalogError, CatalogSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

type QueueKey = (QueueClass, String);

fn queue_key(queue: &QueueRef) -> QueueKey {
    (queue.class, queue_name::canonical(&queue.logical_name))
}

pub struct BrowserSession {
    catalog: Arc<dyn CatalogSource>,
    config: BrowserConfig,
    builder: HierarchyBuilder,
    engine: TransferEngine,
    detector: ChangeDetector,
    tree: Arc<RwLock<TreeNode>>,
    node_locks: KeyedLocks<NodeKey>,
    queue_locks: KeyedLocks<QueueKey>,
    highlights: HighlightScheduler,
    rebuild_lock: Mutex<()>,
    stamps: CountStamps,
}

impl BrowserSession {
    /// Create a session; the tree stays empty until `build_hierarchy`
    pub fn new(catalog: Arc<dyn CatalogSource>, config: BrowserConfig) -> Self {
        let host_label = config
            .host_label
            .clone()
            .unwrap_or_else(|| catalog.host_name());

        Self {
            builder: HierarchyBuilder::new(catalog.clone(), host_label.clone()),
            engine: TransferEngine::new(catalog.clone()),
            detector: ChangeDetector::new(config.highlight_duration),
            tree: Arc::new(RwLock::new(TreeNode::host(host_label, Vec::new()))),
            node_locks: KeyedLocks::new(),
            queue_locks: KeyedLocks::new(),
            highlights: HighlightScheduler::new(),
            rebuild_lock: Mutex::new(()),
            stamps: CountStamps::new(),
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Full rebuild from the catalog; replaces the current tree
    ///
    /// Counts refreshed while the rebuild was reading the catalog are newer
    /// than what the rebuild saw and are kept.
    pub async fn build_hierarchy(&self) -> TreeNode {
        let _rebuild = self.rebuild_lock.lock().await;
        let ticket = self.stamps.issue();
        let mut fresh = self.builder.build().await;

        let mut tree = self.tree.write().await;
        let newer: HashMap<NodeKey, u64> = self
            .stamps
            .rebase(ticket)
            .into_iter()
            .filter(|key| fresh.find(key).is_some_and(|n| n.children.is_empty()))
            .filter_map(|key| tree.find(&key).map(|n| (key, n.message_count)))
            .collect();
        if !newer.is_empty() {
            debug!(nodes = newer.len(), "Keeping counts refreshed during rebuild");
            fresh.apply_leaf_counts(&newer);
        }

        self.highlights.cancel_all();
        *tree = fresh.clone();
        fresh
    }

    /// Snapshot of the current tree
    pub async fn tree(&self) -> TreeNode {
        self.tree.read().await.clone()
    }

    /// Snapshot of one node
    pub async fn node(&self, key: &NodeKey) -> Result<TreeNode> {
        self.tree
            .read()
            .await
            .find(key)
            .cloned()
            .ok_or_else(|| DomainError::NodeNotFound(key.to_string()).into())
    }

    /// Targeted refresh of one node: re-read the live counts of every
    /// queue at or below it, fix up ancestors and highlight the change.
    ///
    /// # Errors
    /// - DomainError::NodeNotFound if the node is not in the current tree
    pub async fn refresh_node(&self, key: &NodeKey) -> Result<RefreshOutcome> {
        let leaves = self
            .tree
            .read()
            .await
            .find(key)
            .map(TreeNode::queue_leaves)
            .ok_or_else(|| DomainError::NodeNotFound(key.to_string()))?;

        // overlapping refreshes serialize on the leaves they share
        let _guards = self.node_locks.acquire_all(&leaves).await;
        let ticket = self.stamps.issue();

        let mut counts = HashMap::with_capacity(leaves.len());
        for leaf in leaves {
            let count = self.leaf_count(&leaf).await;
            counts.insert(leaf, count);
        }

        let mut tree = self.tree.write().await;
        let counts = self.stamps.accept(ticket, counts);
        let updated = tree.apply_leaf_counts(&counts);
        let node = tree
            .find_mut(key)
            .ok_or_else(|| DomainError::NodeNotFound(key.to_string()))?;

        let current = node.message_count;
        let previous = updated
            .iter()
            .find(|c| &c.key == key)
            .map(|c| c.previous)
            .unwrap_or(current);
        let change = self.detector.detect(previous, current);

        if change.kind != ChangeKind::Unchanged {
            node.highlight = change.kind.highlight();
            if let Some(after) = change.highlight_duration() {
                self.highlights
                    .schedule(key.clone(), after, revert_highlight(self.tree.clone(), key.clone()));
            }
        }

        debug!(node = %key, previous, current, change = ?change.kind, "Node refreshed");

        Ok(RefreshOutcome {
            key: key.clone(),
            message_count: current,
            previous_message_count: previous,
            change,
            updated,
        })
    }

    /// Live count of every queue whose name canonicalizes to the leaf path
    async fn leaf_count(&self, leaf: &NodeKey) -> u64 {
        let Some(class) = leaf.class else {
            return 0;
        };
        let queues = match self.catalog.list_queues(class).await {
            Ok(queues) => queues,
            Err(e) => {
                warn!(node = %leaf, error = %e, "Queue lookup failed, counting zero");
                return 0;
            }
        };

        let mut total = 0;
        let mut found = false;
        for queue in queues
            .iter()
            .filter(|q| queue_name::canonical(&q.logical_name) == leaf.path)
        {
            found = true;
            total += self.builder.live_count(queue).await;
        }
        if !found {
            warn!(node = %leaf, "Queue no longer exists, counting zero");
        }
        total
    }

    /// Refresh the count node of each queue (skipping queues not in the tree)
    pub async fn refresh_queues(&self, queues: &[&QueueRef]) -> Vec<RefreshOutcome> {
        let mut keys: Vec<NodeKey> = Vec::new();
        {
            let tree = self.tree.read().await;
            for queue in queues {
                let path = queue_name::canonical(&queue.logical_name);
                match tree.count_node_for_queue(queue.class, &path) {
                    Some(key) if !keys.contains(&key) => keys.push(key),
                    Some(_) => {}
                    None => debug!(queue = %queue, "Queue not in tree, skipping refresh"),
                }
            }
        }

        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            match self.refresh_node(&key).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => debug!(node = %key, error = %e, "Refresh skipped"),
            }
        }
        outcomes
    }

    /// Resolve the queue a node addresses
    ///
    /// # Errors
    /// - DomainError::NotAQueue for host, class and pure folder nodes
    /// - AppError::NotFound if the queue no longer exists
    pub async fn select(&self, key: &NodeKey) -> Result<QueueRef> {
        let class = key
            .class
            .filter(|_| !key.path.is_empty())
            .ok_or_else(|| DomainError::NotAQueue(key.to_string()))?;

        if let Some(node) = self.tree.read().await.find(key) {
            if !node.addresses_queue() {
                return Err(DomainError::NotAQueue(key.to_string()).into());
            }
        }

        self.catalog
            .find_queue(class, &key.path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queue {}", key)))
    }

    /// Every message of the node's queue, as list rows
    pub async fn list_messages(&self, key: &NodeKey) -> Result<Vec<MessageRow>> {
        Ok(self
            .peek_messages(key)
            .await?
            .iter()
            .map(inspector::summarize)
            .collect())
    }

    pub async fn peek_messages(&self, key: &NodeKey) -> Result<Vec<Message>> {
        let queue = self.select(key).await?;
        Ok(self.catalog.peek_messages(&queue).await?)
    }

    pub async fn message(&self, key: &NodeKey, id: &str) -> Result<Message> {
        let queue = self.select(key).await?;
        self.catalog
            .peek_message(&queue, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} in {}", id, queue)))
    }

    pub async fn message_details(&self, key: &NodeKey, id: &str) -> Result<DisplayFields> {
        Ok(self.inspect(&self.message(key, id).await?))
    }

    pub fn inspect(&self, message: &Message) -> DisplayFields {
        inspector::describe(message)
    }

    /// Transfer one message, then refresh the affected nodes
    ///
    /// Both queues are re-resolved first; a target that no longer exists is
    /// a clean `Write` failure.
    pub async fn transfer(
        &self,
        message: &Message,
        source: &QueueRef,
        target: &QueueRef,
        mode: TransferMode,
    ) -> std::result::Result<TransferOutcome, TransferError> {
        let (source, target) = self.resolve_pair(source, target).await?;

        let result = {
            let _guards = self
                .queue_locks
                .acquire_all(&[queue_key(&source), queue_key(&target)])
                .await;
            self.engine.transfer(message, &source, &target, mode).await
        };

        match result {
            Ok(mut outcome) => {
                outcome.refreshed = self.refresh_after_transfer(&source, &target).await;
                Ok(outcome)
            }
            Err(e) if e.is_partial_move() => {
                self.refresh_after_transfer(&source, &target).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Transfer several messages in order, stopping at the first failure;
    /// one refresh covers the whole batch
    pub async fn transfer_batch(
        &self,
        messages: &[Message],
        source: &QueueRef,
        target: &QueueRef,
        mode: TransferMode,
    ) -> BatchTransferReport {
        let (source, target) = match self.resolve_pair(source, target).await {
            Ok(pair) => pair,
            Err(e) => {
                return BatchTransferReport {
                    failure: Some(e),
                    skipped: messages.len().saturating_sub(1),
                    ..Default::default()
                }
            }
        };

        let mut report = {
            let _guards = self
                .queue_locks
                .acquire_all(&[queue_key(&source), queue_key(&target)])
                .await;
            self.engine
                .transfer_batch(messages, &source, &target, mode)
                .await
        };

        let partial = report
            .failure
            .as_ref()
            .is_some_and(TransferError::is_partial_move);
        if !report.completed.is_empty() || partial {
            report.refreshed = self.refresh_after_transfer(&source, &target).await;
        }
        report
    }

    async fn resolve_pair(
        &self,
        source: &QueueRef,
        target: &QueueRef,
    ) -> std::result::Result<(QueueRef, QueueRef), TransferError> {
        let target = match self.catalog.find_queue(target.class, &target.logical_name).await {
            Ok(Some(queue)) => queue,
            Ok(None) => {
                return Err(TransferError::Write {
                    target: target.clone(),
                    cause: CatalogError::NotFound(target.logical_name.clone()),
                })
            }
            Err(cause) => {
                return Err(TransferError::Write {
                    target: target.clone(),
                    cause,
                })
            }
        };

        let source = match self.catalog.find_queue(source.class, &source.logical_name).await {
            Ok(Some(queue)) => queue,
            Ok(None) | Err(_) => {
                debug!(source = %source, "Source not re-resolved, using given reference");
                source.clone()
            }
        };

        Ok((source, target))
    }

    /// Refresh the count nodes of both queues, whatever the mode
    async fn refresh_after_transfer(
        &self,
        source: &QueueRef,
        target: &QueueRef,
    ) -> Vec<RefreshOutcome> {
        self.refresh_queues(&[source, target]).await
    }

    /// Create a queue below `parent` and rebuild the tree
    ///
    /// # Errors
    /// - AppError::Validation for an empty name or a system class parent
    /// - CatalogError::AlreadyExists if the name is taken
    pub async fn create_queue(&self, parent: &NodeKey, name: &str) -> Result<QueueRef> {
        let class = parent
            .class
            .ok_or_else(|| AppError::Validation("Select a queue class first".to_string()))?;
        if !class.is_managed() {
            return Err(AppError::Validation(format!(
                "Queues cannot be created in {}",
                class.label()
            )));
        }
        if queue_name::parse(name).is_empty() {
            return Err(AppError::Validation("Queue name must not be empty".to_string()));
        }

        let full_name = queue_name::child_of(&parent.path, name);
        let queue = self.catalog.create_queue(class, &full_name).await?;
        info!(queue = %queue, "Queue created");

        self.build_hierarchy().await;
        Ok(queue)
    }

    /// Delete the node's queue and rebuild the tree
    pub async fn delete_queue(&self, key: &NodeKey) -> Result<()> {
        let queue = self.select(key).await?;
        if !queue.class.is_managed() {
            return Err(AppError::Validation(format!(
                "Queues cannot be deleted from {}",
                queue.class.label()
            )));
        }

        self.catalog
            .delete_queue(queue.class, &queue.logical_name)
            .await?;
        info!(queue = %queue, "Queue deleted");

        self.build_hierarchy().await;
        Ok(())
    }

    /// Remove every message of the node's queue; returns how many were removed
    pub async fn purge_queue(&self, key: &NodeKey) -> Result<u64> {
        let queue = self.select(key).await?;
        let removed = {
            let _guard = self.queue_locks.acquire(&queue_key(&queue)).await;
            self.catalog.purge_queue(&queue).await?
        };
        info!(queue = %queue, removed, "Queue purged");

        self.refresh_queues(&[&queue]).await;
        Ok(removed)
    }

    /// Send a text message to the node's queue
    pub async fn insert_message(&self, key: &NodeKey, content: &str) -> Result<MessageRef> {
        let queue = self.select(key).await?;
        let written = {
            let _guard = self.queue_locks.acquire(&queue_key(&queue)).await;
            self.catalog
                .send_message(&queue, &MessagePayload::text(content))
                .await?
        };
        info!(queue = %queue, message_id = %written.id, "Message inserted");

        self.refresh_queues(&[&queue]).await;
        Ok(written)
    }

    /// Stop pending background work (highlight reverts)
    pub fn shutdown(&self) {
        self.highlights.cancel_all();
    }
}

async fn revert_highlight(tree: Arc<RwLock<TreeNode>>, key: NodeKey) {
    if let Some(node) = tree.write().await.find_mut(&key) {
        node.highlight = Highlight::Neutral;
    }
}
