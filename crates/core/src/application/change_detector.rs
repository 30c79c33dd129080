// Change Detector - classifies count changes after a refresh

use crate::application::session::constants::DEFAULT_HIGHLIGHT_DURATION;
use crate::domain::{CountChange, Highlight, NodeKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Direction of a count change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Increased,
    Decreased,
    Unchanged,
}

impl ChangeKind {
    pub fn classify(previous: u64, current: u64) -> Self {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => ChangeKind::Increased,
            std::cmp::Ordering::Less => ChangeKind::Decreased,
            std::cmp::Ordering::Equal => ChangeKind::Unchanged,
        }
    }

    /// Visual state a node takes while the change is highlighted
    pub fn highlight(&self) -> Highlight {
        match self {
            ChangeKind::Increased => Highlight::Increased,
            ChangeKind::Decreased => Highlight::Decreased,
            ChangeKind::Unchanged => Highlight::Neutral,
        }
    }
}

/// Result of comparing a node's previous and current count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetection {
    pub kind: ChangeKind,
    /// How long the highlight lasts before reverting; `None` when unchanged
    pub highlight_ms: Option<u64>,
}

impl ChangeDetection {
    pub fn highlight_duration(&self) -> Option<Duration> {
        self.highlight_ms.map(Duration::from_millis)
    }
}

/// Change detector with a fixed highlight duration
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    highlight: Duration,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_DURATION)
    }
}

impl ChangeDetector {
    pub fn new(highlight: Duration) -> Self {
        Self { highlight }
    }

    pub fn detect(&self, previous: u64, current: u64) -> ChangeDetection {
        let kind = ChangeKind::classify(previous, current);
        let highlight_ms = match kind {
            ChangeKind::Unchanged => None,
            _ => Some(self.highlight.as_millis() as u64),
        };
        ChangeDetection { kind, highlight_ms }
    }
}

/// Outcome of a targeted refresh of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub key: NodeKey,
    pub message_count: u64,
    pub previous_message_count: u64,
    pub change: ChangeDetection,
    /// Every node whose count was touched, refreshed node's leaves first
    #[serde(default)]
    pub updated: Vec<CountChange>,
}
