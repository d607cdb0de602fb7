//! HTTP probe implementation.

use chrono::Utc;
use reqwest::Url;
use std::error::Error as _;
use std::time::{Duration, Instant};

use super::{ProbeError, Prober};
use crate::db::ProbeOutcome;

/// Issues a GET against the target and classifies the response.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("upwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    #[cfg(test)]
    fn without_proxy() -> Self {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Self { client }
    }

    /// Returns the received status code once the full body has arrived.
    async fn fetch(&self, target: &str, timeout: Duration) -> Result<u16, ProbeError> {
        let url = Url::parse(target)
            .map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", target, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProbeError::InvalidUrl(format!(
                "{}: unsupported scheme {:?}",
                target,
                url.scheme()
            )));
        }

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();

        // Read the full body to measure complete transfer time
        let _body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(status)
    }
}

impl Prober for HttpProber {
    async fn check(&self, target: &str, timeout: Duration) -> ProbeOutcome {
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, self.fetch(target, timeout)).await {
            Ok(r) => r,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        let elapsed = start.elapsed();
        let completed = Utc::now();

        match result {
            Ok(code) => {
                tracing::debug!("Probe {} -> {} in {:?}", target, code, elapsed);
                ProbeOutcome::from_response(target, code, round_millis(elapsed), completed)
            }
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", target, e);
                ProbeOutcome::from_failure(target, e.to_string(), completed)
            }
        }
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if e.is_connect() {
        ProbeError::Connect(error_chain(&e))
    } else if e.is_builder() {
        ProbeError::InvalidUrl(error_chain(&e))
    } else {
        ProbeError::Network(error_chain(&e))
    }
}

/// reqwest's top-level message rarely says what went wrong; include the
/// underlying causes.
fn error_chain(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Milliseconds rounded to two decimal places.
fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}
