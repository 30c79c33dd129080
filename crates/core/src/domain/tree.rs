// Navigation Tree Model
//
// The tree is a plain value owned by the browser session. Presentation
// layers render snapshots of it and never mutate it.

use crate::domain::QueueClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies one node of the navigation tree.
///
/// `path` is the canonical dot-joined prefix below the class node. A folder
/// that is also a queue has a synthesized marker child with the same path;
/// `marker` tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub class: Option<QueueClass>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub marker: bool,
}

impl NodeKey {
    pub fn host() -> Self {
        Self {
            class: None,
            path: String::new(),
            marker: false,
        }
    }

    pub fn class_root(class: QueueClass) -> Self {
        Self {
            class: Some(class),
            path: String::new(),
            marker: false,
        }
    }

    pub fn node(class: QueueClass, path: impl Into<String>) -> Self {
        Self {
            class: Some(class),
            path: path.into(),
            marker: false,
        }
    }

    pub fn marker(class: QueueClass, path: impl Into<String>) -> Self {
        Self {
            class: Some(class),
            path: path.into(),
            marker: true,
        }
    }

    pub fn is_host(&self) -> bool {
        self.class.is_none()
    }

    pub fn is_class_root(&self) -> bool {
        self.class.is_some() && self.path.is_empty()
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.class {
            None => write!(f, "<host>"),
            Some(class) if self.path.is_empty() => write!(f, "{}", class),
            Some(class) if self.marker => write!(f, "{}:{}[queue]", class, self.path),
            Some(class) => write!(f, "{}:{}", class, self.path),
        }
    }
}

/// Role of a node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Host,
    Class,
    /// Shared name prefix with children (may itself be a queue)
    Folder,
    /// Addressable queue with no children
    Queue,
    /// Synthesized child standing for the queue of a folder that is also a queue
    QueueMarker,
}

/// Transient visual state after a count change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Highlight {
    #[default]
    Neutral,
    Increased,
    Decreased,
}

/// One node of the navigation hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub class: Option<QueueClass>,
    pub path_prefix: String,
    pub kind: NodeKind,
    pub display_label: String,
    pub is_leaf_queue: bool,
    pub message_count: u64,
    pub previous_message_count: u64,
    #[serde(default)]
    pub highlight: Highlight,
    pub children: Vec<TreeNode>,
}

/// Count update applied to a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountChange {
    pub key: NodeKey,
    pub previous: u64,
    pub current: u64,
}

impl TreeNode {
    pub fn host(label: impl Into<String>, children: Vec<TreeNode>) -> Self {
        let mut node = Self {
            class: None,
            path_prefix: String::new(),
            kind: NodeKind::Host,
            display_label: label.into(),
            is_leaf_queue: false,
            message_count: 0,
            previous_message_count: 0,
            highlight: Highlight::Neutral,
            children,
        };
        node.recompute_counts();
        node.previous_message_count = node.message_count;
        node
    }

    pub fn class_root(class: QueueClass, children: Vec<TreeNode>) -> Self {
        let mut node = Self {
            class: Some(class),
            path_prefix: String::new(),
            kind: NodeKind::Class,
            display_label: class.label().to_string(),
            is_leaf_queue: false,
            message_count: 0,
            previous_message_count: 0,
            highlight: Highlight::Neutral,
            children,
        };
        node.recompute_counts();
        node.previous_message_count = node.message_count;
        node
    }

    pub fn key(&self) -> NodeKey {
        NodeKey {
            class: self.class,
            path: self.path_prefix.clone(),
            marker: self.kind == NodeKind::QueueMarker,
        }
    }

    /// Label with count, as shown in the tree (`eu (3)`)
    pub fn caption(&self) -> String {
        format!("{} ({})", self.display_label, self.message_count)
    }

    /// True if selecting this node addresses a single queue
    pub fn addresses_queue(&self) -> bool {
        match self.kind {
            NodeKind::Queue | NodeKind::QueueMarker => true,
            NodeKind::Folder => self.is_leaf_queue,
            NodeKind::Host | NodeKind::Class => false,
        }
    }

    pub fn find(&self, key: &NodeKey) -> Option<&TreeNode> {
        if self.matches(key) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(key))
    }

    pub fn find_mut(&mut self, key: &NodeKey) -> Option<&mut TreeNode> {
        if self.matches(key) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(key))
    }

    fn matches(&self, key: &NodeKey) -> bool {
        self.class == key.class
            && self.path_prefix == key.path
            && (self.kind == NodeKind::QueueMarker) == key.marker
    }

    /// Key of the node that carries the live count of queue `path`.
    ///
    /// For a plain leaf this is the leaf itself; for a folder that is also
    /// a queue it is the synthesized marker child.
    pub fn count_node_for_queue(&self, class: QueueClass, path: &str) -> Option<NodeKey> {
        let node = self.find(&NodeKey::node(class, path))?;
        match node.kind {
            NodeKind::Queue => Some(node.key()),
            NodeKind::Folder if node.is_leaf_queue => node
                .children
                .iter()
                .find(|c| c.kind == NodeKind::QueueMarker)
                .map(TreeNode::key),
            _ => None,
        }
    }

    /// Keys of every count-bearing queue node at or below this node
    pub fn queue_leaves(&self) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        self.collect_queue_leaves(&mut keys);
        keys
    }

    fn collect_queue_leaves(&self, keys: &mut Vec<NodeKey>) {
        match self.kind {
            NodeKind::Queue | NodeKind::QueueMarker => keys.push(self.key()),
            _ => {
                for child in &self.children {
                    child.collect_queue_leaves(keys);
                }
            }
        }
    }

    /// Re-derive every aggregate from the leaves up; returns this node's count
    pub fn recompute_counts(&mut self) -> u64 {
        if !self.children.is_empty() {
            self.message_count = self
                .children
                .iter_mut()
                .map(TreeNode::recompute_counts)
                .sum();
        }
        self.message_count
    }

    /// Set live counts on leaf nodes and fix up every affected aggregate.
    ///
    /// Returns one `CountChange` per node whose count was touched, leaves
    /// first. Nodes named in `leaf_counts` are reported even when the count
    /// is unchanged.
    pub fn apply_leaf_counts(&mut self, leaf_counts: &HashMap<NodeKey, u64>) -> Vec<CountChange> {
        let mut changes = Vec::new();
        self.apply_counts_inner(leaf_counts, &mut changes);
        changes
    }

    fn apply_counts_inner(
        &mut self,
        leaf_counts: &HashMap<NodeKey, u64>,
        changes: &mut Vec<CountChange>,
    ) {
        let old = self.message_count;
        let key = self.key();

        if self.children.is_empty() {
            if let Some(&count) = leaf_counts.get(&key) {
                self.previous_message_count = old;
                self.message_count = count;
                changes.push(CountChange {
                    key,
                    previous: old,
                    current: count,
                });
            }
            return;
        }

        for child in &mut self.children {
            child.apply_counts_inner(leaf_counts, changes);
        }
        self.message_count = self.children.iter().map(|c| c.message_count).sum();
        if self.message_count != old || leaf_counts.contains_key(&key) {
            self.previous_message_count = old;
            changes.push(CountChange {
                key,
                previous: old,
                current: self.message_count,
            });
        }
    }

    /// Total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }
}
