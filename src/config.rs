//! Configuration module for upwatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Shortest auto-refresh period accepted.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
/// Longest auto-refresh period accepted.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the JSON API (default: 8080)
    pub http_port: u16,
    /// Directory holding the persisted artifacts (default: ".")
    pub data_dir: PathBuf,
    /// File name of the targets artifact (default: "urls.json")
    pub targets_file: String,
    /// File name of the history artifact (default: "history.json")
    pub history_file: String,
    /// Timeout applied to every probe (default: 10s)
    pub probe_timeout: Duration,
    /// Maximum probes in flight during one run (default: 8)
    pub max_concurrency: usize,
    /// Auto-refresh period; `None` disables auto-refresh
    pub refresh_interval: Option<Duration>,
    /// Upper bound on a single save of both artifacts (default: 5s)
    pub persist_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            data_dir: PathBuf::from("."),
            targets_file: "urls.json".to_string(),
            history_file: "history.json".to_string(),
            probe_timeout: Duration::from_secs(10),
            max_concurrency: 8,
            refresh_interval: None,
            persist_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `UPWATCH_DATA_DIR`: artifact directory (default: ".")
    /// - `UPWATCH_TARGETS_FILE`: targets file name (default: "urls.json")
    /// - `UPWATCH_HISTORY_FILE`: history file name (default: "history.json")
    /// - `UPWATCH_PROBE_TIMEOUT_SECS`: probe timeout (default: 10)
    /// - `UPWATCH_MAX_CONCURRENCY`: probes in flight (default: 8)
    /// - `UPWATCH_REFRESH_INTERVAL_SECS`: auto-refresh period, clamped to 5..=300 (default: off)
    /// - `UPWATCH_PERSIST_TIMEOUT_SECS`: save timeout (default: 5)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "UPWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(dir) = lookup("UPWATCH_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }

        if let Some(name) = lookup("UPWATCH_TARGETS_FILE") {
            cfg.targets_file = name;
        }

        if let Some(name) = lookup("UPWATCH_HISTORY_FILE") {
            cfg.history_file = name;
        }

        if let Some(secs) = parse_var::<f64, _>(&lookup, "UPWATCH_PROBE_TIMEOUT_SECS") {
            if secs.is_finite() && secs > 0.0 {
                cfg.probe_timeout = Duration::from_secs_f64(secs);
            }
        }

        if let Some(n) = parse_var::<usize, _>(&lookup, "UPWATCH_MAX_CONCURRENCY") {
            cfg.max_concurrency = n.max(1);
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "UPWATCH_REFRESH_INTERVAL_SECS") {
            cfg.refresh_interval = Some(clamp_refresh_interval(Duration::from_secs(secs)));
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "UPWATCH_PERSIST_TIMEOUT_SECS") {
            if secs > 0 {
                cfg.persist_timeout = Duration::from_secs(secs);
            }
        }

        cfg
    }

    /// Full path of the targets artifact.
    pub fn targets_path(&self) -> PathBuf {
        self.data_dir.join(&self.targets_file)
    }

    /// Full path of the history artifact.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

/// Clamp an auto-refresh period into the supported range.
pub fn clamp_refresh_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL)
}
