//! Bounded per-target outcome history.

use std::collections::{BTreeMap, HashMap, VecDeque};

use super::models::{ProbeOutcome, Target};

/// Maximum number of outcomes retained per target.
pub const HISTORY_LIMIT: usize = 100;

/// Insertion-ordered (oldest first) outcome log per target, capped at
/// [`HISTORY_LIMIT`] entries with FIFO eviction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLog {
    logs: HashMap<Target, VecDeque<ProbeOutcome>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from already-ordered entries, keeping only the most
    /// recent [`HISTORY_LIMIT`] per target.
    pub fn from_entries(entries: impl IntoIterator<Item = (Target, Vec<ProbeOutcome>)>) -> Self {
        let mut log = Self::new();
        for (target, outcomes) in entries {
            let skip = outcomes.len().saturating_sub(HISTORY_LIMIT);
            log.logs
                .insert(target, outcomes.into_iter().skip(skip).collect());
        }
        log
    }

    /// Append an outcome to the tail of `target`'s log, evicting from the
    /// front once the cap is exceeded.
    pub fn append(&mut self, target: &str, outcome: ProbeOutcome) {
        let entries = self.logs.entry(target.to_string()).or_default();
        entries.push_back(outcome);
        while entries.len() > HISTORY_LIMIT {
            entries.pop_front();
        }
    }

    /// Delete the entire log for `target`. Returns whether one existed.
    pub fn remove_target(&mut self, target: &str) -> bool {
        self.logs.remove(target).is_some()
    }

    /// Ordered logs for the selected targets. Targets without history are
    /// absent from the result; an empty selection yields an empty map.
    pub fn query<'a, I>(&self, targets: I) -> BTreeMap<Target, Vec<ProbeOutcome>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        targets
            .into_iter()
            .filter_map(|t| {
                self.logs
                    .get(t)
                    .map(|entries| (t.to_string(), entries.iter().cloned().collect()))
            })
            .collect()
    }

    #[cfg(test)]
    pub fn entries(&self, target: &str) -> Option<&VecDeque<ProbeOutcome>> {
        self.logs.get(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Target, &VecDeque<ProbeOutcome>)> {
        self.logs.iter()
    }

    /// Number of targets with a log.
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn outcome(target: &str, seq: i64) -> ProbeOutcome {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seq);
        ProbeOutcome::from_response(target, 200, seq as f64, ts)
    }

    #[test]
    fn test_append_keeps_most_recent_in_order() {
        for n in [0usize, 1, 99, 100, 101, 250] {
            let mut log = HistoryLog::new();
            for i in 0..n {
                log.append("http://a", outcome("http://a", i as i64));
            }

            let len = log.entries("http://a").map_or(0, |e| e.len());
            assert_eq!(len, n.min(HISTORY_LIMIT), "n = {}", n);

            if n > 0 {
                let seqs: Vec<f64> = log
                    .entries("http://a")
                    .unwrap()
                    .iter()
                    .map(|o| o.response_time_ms.unwrap())
                    .collect();
                let first = n.saturating_sub(HISTORY_LIMIT);
                let expected: Vec<f64> = (first..n).map(|i| i as f64).collect();
                assert_eq!(seqs, expected, "n = {}", n);
            }
        }
    }

    #[test]
    fn test_logs_are_per_target() {
        let mut log = HistoryLog::new();
        for i in 0..150 {
            log.append("http://a", outcome("http://a", i));
        }
        log.append("http://b", outcome("http://b", 0));

        assert_eq!(log.entries("http://a").unwrap().len(), HISTORY_LIMIT);
        assert_eq!(log.entries("http://b").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_target() {
        let mut log = HistoryLog::new();
        log.append("http://a", outcome("http://a", 0));
        log.append("http://b", outcome("http://b", 0));

        assert!(log.remove_target("http://a"));
        assert!(!log.remove_target("http://a"));
        assert!(log.entries("http://a").is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_query_selection() {
        let mut log = HistoryLog::new();
        log.append("http://a", outcome("http://a", 0));
        log.append("http://a", outcome("http://a", 1));
        log.append("http://b", outcome("http://b", 0));

        let result = log.query(["http://a", "http://missing"]);
        assert_eq!(result.len(), 1);
        assert_eq!(result["http://a"].len(), 2);
        assert!(!result.contains_key("http://b"));

        assert!(log.query(std::iter::empty::<&str>()).is_empty());
    }

    #[test]
    fn test_from_entries_truncates_to_limit() {
        let entries: Vec<ProbeOutcome> = (0..130).map(|i| outcome("http://a", i)).collect();
        let log = HistoryLog::from_entries([("http://a".to_string(), entries)]);

        let kept = log.entries("http://a").unwrap();
        assert_eq!(kept.len(), HISTORY_LIMIT);
        assert_eq!(kept.front().unwrap().response_time_ms, Some(30.0));
        assert_eq!(kept.back().unwrap().response_time_ms, Some(129.0));
    }
}
