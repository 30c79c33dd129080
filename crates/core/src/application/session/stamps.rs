// Count stamps - orders count reads across rebuilds and targeted refreshes
//
// Every rebuild and every targeted refresh takes a ticket before it reads
// the catalog. A count-bearing node remembers the ticket its current count
// was read under, and a count read under an older ticket is dropped.

use crate::domain::NodeKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    /// Ticket of the rebuild that produced the current tree
    base: u64,
    /// Nodes refreshed since that rebuild
    refreshed: HashMap<NodeKey, u64>,
}

#[derive(Default)]
pub(crate) struct CountStamps {
    next: AtomicU64,
    state: Mutex<State>,
}

impl CountStamps {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take a ticket before reading counts from the catalog
    pub fn issue(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Keep the counts read under a newer ticket than the node's current
    /// count and stamp them with `ticket`
    pub fn accept(&self, ticket: u64, counts: HashMap<NodeKey, u64>) -> HashMap<NodeKey, u64> {
        let mut state = self.state();
        let mut accepted = HashMap::with_capacity(counts.len());
        for (key, count) in counts {
            let current = state.refreshed.get(&key).copied().unwrap_or(state.base);
            if ticket > current {
                state.refreshed.insert(key.clone(), ticket);
                accepted.insert(key, count);
            }
        }
        accepted
    }

    /// Install a rebuild read under `ticket`; returns the nodes whose
    /// current counts were read after the rebuild started
    pub fn rebase(&self, ticket: u64) -> Vec<NodeKey> {
        let mut state = self.state();
        state.base = ticket;
        state.refreshed.retain(|_, stamp| *stamp > ticket);
        state.refreshed.keys().cloned().collect()
    }
}
