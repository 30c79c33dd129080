// Browser session configuration

use super::constants::DEFAULT_HIGHLIGHT_DURATION;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Host node label; defaults to the catalog's host name
    pub host_label: Option<String>,
    /// How long a changed node stays highlighted
    pub highlight_duration: Duration,
    /// Periodic full refresh; `None` disables it
    pub refresh_interval: Option<Duration>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            host_label: None,
            highlight_duration: DEFAULT_HIGHLIGHT_DURATION,
            refresh_interval: None,
        }
    }
}

impl BrowserConfig {
    /// Refresh interval from whole seconds (0 = off)
    pub fn with_refresh_secs(mut self, secs: u64) -> Self {
        self.refresh_interval = match secs {
            0 => None,
            n => Some(Duration::from_secs(n)),
        };
        self
    }

    pub fn with_host_label(mut self, label: impl Into<String>) -> Self {
        self.host_label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_refresh_disables() {
        let config = BrowserConfig::default().with_refresh_secs(0);
        assert!(config.refresh_interval.is_none());
        assert_eq!(config.highlight_duration, Duration::from_millis(3000));
    }

    #[test]
    fn test_refresh_secs() {
        let config = BrowserConfig::default().with_refresh_secs(30);
        assert_eq!(config.refresh_interval, Some(Duration::from_secs(30)));
    }
}
