// Browser session constants (ADR: No magic values)
use std::time::Duration;

/// How long a node stays highlighted after its count changed (3s)
pub const DEFAULT_HIGHLIGHT_DURATION: Duration = Duration::from_millis(3000);

/// Label of the host node when browsing the local machine
pub const LOCAL_HOST_LABEL: &str = "localhost";
