//! Probe module for endpoint health checks.

mod http;

pub use http::*;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::db::ProbeOutcome;

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failures. These never escape a [`Prober`]; they are
/// rendered into [`ProbeOutcome::error`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Performs a single check of one target.
///
/// Implementations must be total: every failure is captured in the
/// returned outcome, and the call completes within roughly `timeout`.
pub trait Prober: Send + Sync + 'static {
    fn check(&self, target: &str, timeout: Duration) -> impl Future<Output = ProbeOutcome> + Send;
}
