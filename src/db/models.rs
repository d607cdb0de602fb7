//! Probe outcome and snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A monitored endpoint, identified by its URL.
pub type Target = String;

/// Reachability classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    /// UP iff the code is in the 2xx range. Redirects that were not
    /// followed through to a final response count as DOWN.
    pub fn from_status_code(code: u16) -> Self {
        if (200..300).contains(&code) {
            ProbeStatus::Up
        } else {
            ProbeStatus::Down
        }
    }
}

/// The recorded result of one probe.
///
/// Either a response was received (`status_code` and `response_time_ms`
/// present, `error` absent) or the request failed in transport
/// (`error` present, the other two absent, status DOWN).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub target: Target,
    pub status: ProbeStatus,
    pub response_time_ms: Option<f64>,
    pub status_code: Option<u16>,
    /// Completion instant of the check.
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// Outcome for a target that answered with `status_code`.
    pub fn from_response(
        target: impl Into<Target>,
        status_code: u16,
        response_time_ms: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            target: target.into(),
            status: ProbeStatus::from_status_code(status_code),
            response_time_ms: Some(response_time_ms),
            status_code: Some(status_code),
            timestamp,
            error: None,
        }
    }

    /// Outcome for a target that could not be reached at all.
    pub fn from_failure(
        target: impl Into<Target>,
        error: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            target: target.into(),
            status: ProbeStatus::Down,
            response_time_ms: None,
            status_code: None,
            timestamp,
            error: Some(error.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}

/// Most recent outcome per target, as produced by one orchestration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatestSnapshot {
    /// When the run that produced this snapshot finished; `None` before
    /// the first run.
    pub completed_at: Option<DateTime<Utc>>,
    pub outcomes: HashMap<Target, ProbeOutcome>,
}

impl LatestSnapshot {
    pub fn new(completed_at: DateTime<Utc>, outcomes: HashMap<Target, ProbeOutcome>) -> Self {
        Self {
            completed_at: Some(completed_at),
            outcomes,
        }
    }

    pub fn get(&self, target: &str) -> Option<&ProbeOutcome> {
        self.outcomes.get(target)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_code() {
        assert_eq!(ProbeStatus::from_status_code(200), ProbeStatus::Up);
        assert_eq!(ProbeStatus::from_status_code(204), ProbeStatus::Up);
        assert_eq!(ProbeStatus::from_status_code(299), ProbeStatus::Up);
        assert_eq!(ProbeStatus::from_status_code(199), ProbeStatus::Down);
        assert_eq!(ProbeStatus::from_status_code(301), ProbeStatus::Down);
        assert_eq!(ProbeStatus::from_status_code(404), ProbeStatus::Down);
        assert_eq!(ProbeStatus::from_status_code(503), ProbeStatus::Down);
    }

    #[test]
    fn test_not_found_response_has_code_and_no_error() {
        let outcome = ProbeOutcome::from_response("http://a", 404, 12.5, Utc::now());
        assert_eq!(outcome.status, ProbeStatus::Down);
        assert_eq!(outcome.status_code, Some(404));
        assert_eq!(outcome.response_time_ms, Some(12.5));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_failure_has_error_only() {
        let outcome = ProbeOutcome::from_failure("http://a", "connection refused", Utc::now());
        assert_eq!(outcome.status, ProbeStatus::Down);
        assert!(outcome.status_code.is_none());
        assert!(outcome.response_time_ms.is_none());
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&ProbeStatus::Up).unwrap(), "\"UP\"");
        assert_eq!(serde_json::to_string(&ProbeStatus::Down).unwrap(), "\"DOWN\"");
    }
}
