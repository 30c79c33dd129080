//! Hierarchy Builder - Turns flat dot-delimited queue names into a tree
//!
//! Queues are grouped by their segment at increasing depth. Every node
//! carries the sum of the live counts of all queues beneath it. A name that
//! is both a queue and a prefix of other queues (`a` next to `a.b`) becomes a
//! folder with a synthesized marker child holding the queue's own count, so
//! the queue stays selectable without its count being folded into the
//! folder view twice.

use crate::domain::queue_name;
use crate::domain::{Highlight, NodeKind, QueueClass, QueueRef, TreeNode};
use crate::port::CatalogSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A queue name with its live message count (input of the grouping pass)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedQueue {
    pub name: String,
    pub count: u64,
}

impl CountedQueue {
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Builds the navigation tree from a catalog source
pub struct HierarchyBuilder {
    catalog: Arc<dyn CatalogSource>,
    host_label: String,
}

impl HierarchyBuilder {
    pub fn new(catalog: Arc<dyn CatalogSource>, host_label: impl Into<String>) -> Self {
        Self {
            catalog,
            host_label: host_label.into(),
        }
    }

    /// Full rebuild: host node with one subtree per queue class
    ///
    /// Never fails. A class that cannot be enumerated renders empty and a
    /// queue whose count cannot be read contributes zero.
    pub async fn build(&self) -> TreeNode {
        let mut classes = Vec::with_capacity(QueueClass::ALL.len());
        for class in QueueClass::ALL {
            classes.push(self.build_class(class).await);
        }

        let tree = TreeNode::host(self.host_label.clone(), classes);
        info!(
            host = %self.host_label,
            nodes = tree.node_count(),
            messages = tree.message_count,
            "Hierarchy built"
        );
        tree
    }

    /// Build the subtree of a single class
    pub async fn build_class(&self, class: QueueClass) -> TreeNode {
        let queues = match self.catalog.list_queues(class).await {
            Ok(queues) => queues,
            Err(e) => {
                warn!(class = %class, error = %e, "Queue enumeration failed, rendering class empty");
                Vec::new()
            }
        };

        let mut counted = Vec::with_capacity(queues.len());
        for queue in &queues {
            let count = self.live_count(queue).await;
            counted.push(CountedQueue::new(queue.logical_name.clone(), count));
        }

        TreeNode::class_root(class, build_subtree(class, &counted))
    }

    /// Live count of one queue, zero if it cannot be read
    pub async fn live_count(&self, queue: &QueueRef) -> u64 {
        match self.catalog.count_messages(queue).await {
            Ok(count) => count,
            Err(e) => {
                warn!(queue = %queue, error = %e, "Count unavailable, treating as zero");
                0
            }
        }
    }
}

struct ParsedQueue<'a> {
    segments: Vec<&'a str>,
    count: u64,
}

/// Group counted queues of one class into child nodes of the class root.
///
/// Pure and deterministic: sibling order is alphabetical by segment, with a
/// folder's marker child first.
pub fn build_subtree(class: QueueClass, queues: &[CountedQueue]) -> Vec<TreeNode> {
    let parsed: Vec<ParsedQueue<'_>> = queues
        .iter()
        .filter_map(|q| {
            let segments = queue_name::parse(&q.name);
            if segments.is_empty() {
                warn!(class = %class, name = %q.name, "Skipping queue with empty logical name");
                None
            } else {
                Some(ParsedQueue {
                    segments,
                    count: q.count,
                })
            }
        })
        .collect();

    let entries: Vec<&ParsedQueue<'_>> = parsed.iter().collect();
    group_level(class, &entries, 0)
}

fn group_level(class: QueueClass, entries: &[&ParsedQueue<'_>], depth: usize) -> Vec<TreeNode> {
    let mut groups: BTreeMap<&str, Vec<&ParsedQueue<'_>>> = BTreeMap::new();
    for entry in entries {
        if let Some(segment) = entry.segments.get(depth) {
            groups.entry(*segment).or_default().push(*entry);
        }
    }

    let mut nodes = Vec::with_capacity(groups.len());
    for (key, group) in groups {
        let path = queue_name::join(&group[0].segments[..=depth]);
        let total: u64 = group.iter().map(|e| e.count).sum();

        let (terminal, continuing): (Vec<&ParsedQueue<'_>>, Vec<&ParsedQueue<'_>>) = group
            .into_iter()
            .partition(|e| e.segments.len() == depth + 1);

        if continuing.is_empty() {
            nodes.push(node(class, &path, key, NodeKind::Queue, true, total, vec![]));
            continue;
        }

        let mut children = Vec::new();
        if !terminal.is_empty() {
            let own: u64 = terminal.iter().map(|e| e.count).sum();
            debug!(class = %class, path = %path, "Queue is also a folder, adding marker");
            children.push(node(class, &path, key, NodeKind::QueueMarker, true, own, vec![]));
        }
        children.extend(group_level(class, &continuing, depth + 1));

        nodes.push(node(
            class,
            &path,
            key,
            NodeKind::Folder,
            !terminal.is_empty(),
            total,
            children,
        ));
    }
    nodes
}

fn node(
    class: QueueClass,
    path: &str,
    label: &str,
    kind: NodeKind,
    is_leaf_queue: bool,
    count: u64,
    children: Vec<TreeNode>,
) -> TreeNode {
    TreeNode {
        class: Some(class),
        path_prefix: path.to_string(),
        kind,
        display_label: label.to_string(),
        is_leaf_queue,
        message_count: count,
        previous_message_count: count,
        highlight: Highlight::Neutral,
        children,
    }
}
