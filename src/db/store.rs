//! JSON file store for the targets and history artifacts.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::history::HistoryLog;
use super::models::*;
use crate::targets::TargetList;

/// Store error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid data: {0}")]
    Invalid(String),
    #[error("Not found")]
    NotFound,
}

/// One history entry as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutcomeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    status: ProbeStatus,
    response_time: Option<f64>,
    status_code: Option<u16>,
    timestamp: String,
    error: Option<String>,
}

impl OutcomeRecord {
    fn encode(outcome: &ProbeOutcome) -> Self {
        Self {
            url: Some(outcome.target.clone()),
            status: outcome.status,
            response_time: outcome.response_time_ms,
            status_code: outcome.status_code,
            timestamp: format_timestamp(&outcome.timestamp),
            error: outcome.error.clone(),
        }
    }

    fn decode(self, target: &str) -> Result<ProbeOutcome, StoreError> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| {
            StoreError::Invalid(format!(
                "unparsable timestamp {:?} for {}",
                self.timestamp, target
            ))
        })?;

        // A record is either a received response or a transport failure.
        let outcome = match (self.status_code, self.response_time, self.error) {
            (Some(code), Some(rt), None) => {
                if !rt.is_finite() || rt < 0.0 {
                    return Err(StoreError::Invalid(format!(
                        "negative response time {} for {}",
                        rt, target
                    )));
                }
                ProbeOutcome::from_response(target, code, rt, timestamp)
            }
            (None, None, Some(error)) => ProbeOutcome::from_failure(target, error, timestamp),
            (code, rt, error) => {
                return Err(StoreError::Invalid(format!(
                    "inconsistent entry for {}: status_code={:?} response_time={:?} error={:?}",
                    target, code, rt, error
                )));
            }
        };

        if outcome.status != self.status {
            return Err(StoreError::Invalid(format!(
                "status {:?} does not match entry for {}",
                self.status, target
            )));
        }
        Ok(outcome)
    }
}

/// Durable storage for the two independent artifacts.
#[derive(Debug, Clone)]
pub struct Store {
    targets_path: PathBuf,
    history_path: PathBuf,
}

impl Store {
    /// Create a store over the given artifact paths.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(targets_path: P, history_path: Q) -> Self {
        Self {
            targets_path: targets_path.as_ref().to_path_buf(),
            history_path: history_path.as_ref().to_path_buf(),
        }
    }

    /// Load both artifacts. Missing or corrupt artifacts fall back to their
    /// defaults independently; nothing is returned as an error.
    pub fn load(&self) -> (TargetList, HistoryLog) {
        let targets = match self.read_targets() {
            Ok(targets) => targets,
            Err(StoreError::NotFound) => {
                tracing::info!(
                    "No targets file at {}, using defaults",
                    self.targets_path.display()
                );
                TargetList::defaults()
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt targets file {}: {}",
                    self.targets_path.display(),
                    e
                );
                TargetList::defaults()
            }
        };

        let history = match self.read_history() {
            Ok(history) => history,
            Err(StoreError::NotFound) => HistoryLog::new(),
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt history file {}: {}",
                    self.history_path.display(),
                    e
                );
                HistoryLog::new()
            }
        };

        (targets, history)
    }

    /// Write both artifacts. A failure writing one does not prevent writing
    /// the other; the first error is returned after both were attempted.
    pub fn save(&self, targets: &TargetList, history: &HistoryLog) -> Result<(), StoreError> {
        let targets_result = self.write_targets(targets);
        if let Err(e) = &targets_result {
            tracing::error!("Error saving targets: {}", e);
        }

        let history_result = self.write_history(history);
        if let Err(e) = &history_result {
            tracing::error!("Error saving history: {}", e);
        }

        targets_result.and(history_result)
    }

    // --- Targets ---

    /// Read and validate the targets artifact.
    pub fn read_targets(&self) -> Result<TargetList, StoreError> {
        let raw = read_artifact(&self.targets_path)?;
        let urls: Vec<String> = serde_json::from_str(&raw)?;
        Ok(TargetList::from_vec(urls))
    }

    pub fn write_targets(&self, targets: &TargetList) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(targets)?;
        write_artifact(&self.targets_path, &json)
    }

    // --- History ---

    /// Read and validate the history artifact.
    pub fn read_history(&self) -> Result<HistoryLog, StoreError> {
        let raw = read_artifact(&self.history_path)?;
        let records: BTreeMap<String, Vec<OutcomeRecord>> = serde_json::from_str(&raw)?;

        let mut entries = Vec::with_capacity(records.len());
        for (target, records) in records {
            let outcomes = records
                .into_iter()
                .map(|r| r.decode(&target))
                .collect::<Result<Vec<_>, _>>()?;
            entries.push((target, outcomes));
        }

        Ok(HistoryLog::from_entries(entries))
    }

    pub fn write_history(&self, history: &HistoryLog) -> Result<(), StoreError> {
        let records: BTreeMap<&str, Vec<OutcomeRecord>> = history
            .iter()
            .map(|(target, entries)| {
                (
                    target.as_str(),
                    entries.iter().map(OutcomeRecord::encode).collect(),
                )
            })
            .collect();
        let json = serde_json::to_string_pretty(&records)?;
        write_artifact(&self.history_path, &json)
    }
}

fn read_artifact(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Write via a sibling temp file and rename, so readers never see a
/// truncated artifact.
fn write_artifact(path: &Path, contents: &str) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(&tmp, contents).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Format a timestamp as RFC 3339 in UTC with full sub-second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a persisted timestamp. Zoned RFC 3339 is preferred; naive ISO-8601
/// values written without a zone are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    None
}
