// Periodic Refresh Service
// Rebuilds the navigation tree on a fixed interval until shutdown

use crate::application::session::{BrowserSession, ShutdownToken};
use crate::domain::TreeNode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Refresh scheduler
///
/// Runs a full hierarchy rebuild every `interval` in the background
pub struct RefreshScheduler {
    session: Arc<BrowserSession>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(session: Arc<BrowserSession>, interval: Duration) -> Self {
        Self { session, interval }
    }

    /// Scheduler for the session's configured interval, `None` when disabled
    pub fn from_config(session: Arc<BrowserSession>) -> Option<Self> {
        let interval = session.config().refresh_interval?;
        Some(Self::new(session, interval))
    }

    /// Run refresh loop (background task)
    ///
    /// The first rebuild happens one interval after start. Should be
    /// spawned in tokio::spawn.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Refresh scheduler started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.run_now().await;
                }
                _ = shutdown.wait() => {
                    info!("Refresh scheduler stopped");
                    break;
                }
            }
        }
    }

    /// Rebuild immediately
    pub async fn run_now(&self) -> TreeNode {
        let tree = self.session.build_hierarchy().await;
        debug!(messages = tree.message_count, "Scheduled refresh completed");
        tree
    }
}
