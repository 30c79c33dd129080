//! Daemon configuration from `QUEUEINATOR_*` environment variables

use anyhow::{Context, Result};
use queueinator_api_rpc::RpcServerConfig;
use queueinator_core::application::BrowserConfig;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "~/.queueinator/queues.db";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub rpc: RpcServerConfig,
    pub browser: BrowserConfig,
    pub log_format: LogFormat,
    /// Directory for daily rolling log files; stdout only when unset
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("QUEUEINATOR_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = PathBuf::from(shellexpand::tilde(&db_path).into_owned());

        let mut rpc = RpcServerConfig::default();
        if let Some(host) = lookup("QUEUEINATOR_RPC_HOST") {
            rpc.host = host;
        }
        if let Some(port) = lookup("QUEUEINATOR_RPC_PORT") {
            rpc.port = port
                .parse()
                .with_context(|| format!("QUEUEINATOR_RPC_PORT is not a port: {}", port))?;
        }
        if let Some(burst) = lookup("QUEUEINATOR_RATE_LIMIT_BURST") {
            rpc.rate_limit_burst = burst
                .parse()
                .with_context(|| format!("QUEUEINATOR_RATE_LIMIT_BURST is not a number: {}", burst))?;
        }
        if let Some(rate) = lookup("QUEUEINATOR_RATE_LIMIT_RATE") {
            rpc.rate_limit_rate = rate
                .parse()
                .with_context(|| format!("QUEUEINATOR_RATE_LIMIT_RATE is not a number: {}", rate))?;
        }

        let refresh_secs: u64 = match lookup("QUEUEINATOR_REFRESH_SECS") {
            Some(secs) => secs
                .parse()
                .with_context(|| format!("QUEUEINATOR_REFRESH_SECS is not a number: {}", secs))?,
            None => 0,
        };
        let mut browser = BrowserConfig::default().with_refresh_secs(refresh_secs);
        if let Some(host) = lookup("QUEUEINATOR_HOST") {
            browser = browser.with_host_label(host);
        }

        let log_format = match lookup("QUEUEINATOR_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let log_dir = lookup("QUEUEINATOR_LOG_DIR")
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()));

        Ok(Self {
            db_path,
            rpc,
            browser,
            log_format,
            log_dir,
        })
    }

    /// sqlx connection URL for the database file
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.db_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn config(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert!(config.db_path.ends_with(".queueinator/queues.db"));
        assert_eq!(config.rpc.host, "127.0.0.1");
        assert_eq!(config.rpc.port, 9531);
        assert!(config.browser.refresh_interval.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("QUEUEINATOR_DB_PATH", "/tmp/q.db"),
            ("QUEUEINATOR_RPC_PORT", "9999"),
            ("QUEUEINATOR_REFRESH_SECS", "15"),
            ("QUEUEINATOR_HOST", "mq-01"),
            ("QUEUEINATOR_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.database_url(), "sqlite:///tmp/q.db");
        assert_eq!(config.rpc.port, 9999);
        assert_eq!(
            config.browser.refresh_interval,
            Some(Duration::from_secs(15))
        );
        assert_eq!(config.browser.host_label.as_deref(), Some("mq-01"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_port_rejected() {
        assert!(config(&[("QUEUEINATOR_RPC_PORT", "http")]).is_err());
    }
}
