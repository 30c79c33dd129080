// Highlight Scheduler - deferred, cancellable highlight reverts per node

use crate::domain::NodeKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    next_generation: u64,
    pending: HashMap<NodeKey, Pending>,
}

/// Schedules the revert of a node's highlight.
///
/// Scheduling a node that already has a pending revert aborts the old one,
/// so only the latest change decides when the highlight ends.
#[derive(Clone, Default)]
pub struct HighlightScheduler {
    state: Arc<Mutex<State>>,
}

impl HighlightScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `revert` after `after` unless superseded or cancelled first
    pub fn schedule<F>(&self, key: NodeKey, after: Duration, revert: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state();
        state.next_generation += 1;
        let generation = state.next_generation;

        let scheduler = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            revert.await;
            scheduler.finish(&task_key, generation);
        });

        if let Some(previous) = state.pending.insert(key.clone(), Pending { generation, handle }) {
            debug!(node = %key, "Superseding pending highlight revert");
            previous.handle.abort();
        }
    }

    fn finish(&self, key: &NodeKey, generation: u64) {
        let mut state = self.state();
        if state
            .pending
            .get(key)
            .is_some_and(|p| p.generation == generation)
        {
            state.pending.remove(key);
        }
    }

    /// Abort every pending revert
    pub fn cancel_all(&self) {
        let mut state = self.state();
        for (_, pending) in state.pending.drain() {
            pending.handle.abort();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }
}
