// Application Layer - Use Cases and Business Logic

pub mod change_detector;
pub mod hierarchy;
pub mod inspector;
pub mod refresh;
pub mod session;
pub mod transfer;

// Re-exports
pub use change_detector::{ChangeDetection, ChangeDetector, ChangeKind, RefreshOutcome};
pub use hierarchy::{build_subtree, CountedQueue, HierarchyBuilder};
pub use inspector::{describe, summarize, DisplayFields, MessageRow};
pub use refresh::RefreshScheduler;
pub use session::{shutdown_channel, BrowserConfig, BrowserSession, ShutdownSender, ShutdownToken};
pub use transfer::{BatchTransferReport, TransferEngine, TransferMode, TransferOutcome};
