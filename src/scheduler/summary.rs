//! Up/down counts over the configured targets.

use serde::Serialize;

use crate::db::LatestSnapshot;
use crate::targets::TargetList;

/// Aggregate status of the configured targets. `up + down == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub up: usize,
    pub down: usize,
}

/// Summarize `snapshot` against the currently configured targets.
///
/// Snapshot entries for targets no longer configured are ignored, and
/// configured targets without an entry count as down.
pub fn summarize(targets: &TargetList, snapshot: &LatestSnapshot) -> StatusSummary {
    let total = targets.len();

    if snapshot.is_empty() {
        return StatusSummary {
            total,
            up: 0,
            down: total,
        };
    }

    let mut up = 0;
    let mut down = 0;
    let mut unchecked = 0;
    for target in targets {
        match snapshot.get(target) {
            Some(outcome) if outcome.is_up() => up += 1,
            Some(_) => down += 1,
            None => unchecked += 1,
        }
    }

    StatusSummary {
        total,
        up,
        down: down + unchecked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ProbeOutcome, Target};
    use chrono::Utc;
    use std::collections::HashMap;

    fn targets(urls: &[&str]) -> TargetList {
        TargetList::from_vec(urls.iter().map(|u| u.to_string()).collect())
    }

    fn snapshot(entries: &[(&str, Option<u16>)]) -> LatestSnapshot {
        let now = Utc::now();
        let outcomes: HashMap<Target, ProbeOutcome> = entries
            .iter()
            .map(|(t, code)| {
                let outcome = match code {
                    Some(code) => ProbeOutcome::from_response(*t, *code, 1.0, now),
                    None => ProbeOutcome::from_failure(*t, "connection refused", now),
                };
                (t.to_string(), outcome)
            })
            .collect();
        LatestSnapshot::new(now, outcomes)
    }

    #[test]
    fn test_one_up_one_down() {
        let summary = summarize(
            &targets(&["A", "B"]),
            &snapshot(&[("A", Some(200)), ("B", None)]),
        );
        assert_eq!(summary, StatusSummary { total: 2, up: 1, down: 1 });
    }

    #[test]
    fn test_empty_configuration() {
        assert_eq!(
            summarize(&TargetList::new(), &LatestSnapshot::default()),
            StatusSummary { total: 0, up: 0, down: 0 }
        );
        assert_eq!(
            summarize(&TargetList::new(), &snapshot(&[("A", Some(200))])),
            StatusSummary { total: 0, up: 0, down: 0 }
        );
    }

    #[test]
    fn test_no_checks_yet_counts_all_down() {
        let summary = summarize(&targets(&["A", "B", "C"]), &LatestSnapshot::default());
        assert_eq!(summary, StatusSummary { total: 3, up: 0, down: 3 });
    }

    #[test]
    fn test_stale_and_unchecked_targets() {
        // "OLD" was removed after the snapshot was taken, "NEW" was added.
        let summary = summarize(
            &targets(&["A", "NEW"]),
            &snapshot(&[("A", Some(204)), ("OLD", Some(200))]),
        );
        assert_eq!(summary, StatusSummary { total: 2, up: 1, down: 1 });
    }

    #[test]
    fn test_counts_always_add_up() {
        let universe = ["A", "B", "C", "D"];
        let codes = [Some(200), Some(404), None];

        // Every subset of configured targets against every snapshot in which
        // each target is absent, up, down by code, or down by failure.
        for mask in 0..(1u32 << universe.len()) {
            let configured: Vec<&str> = universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, t)| *t)
                .collect();
            let configured = targets(&configured);

            for combo in 0..4usize.pow(universe.len() as u32) {
                let mut entries = Vec::new();
                let mut rest = combo;
                for target in universe {
                    let pick = rest % 4;
                    rest /= 4;
                    if pick < codes.len() {
                        entries.push((target, codes[pick]));
                    }
                }

                let summary = summarize(&configured, &snapshot(&entries));
                assert_eq!(summary.total, configured.len());
                assert_eq!(summary.up + summary.down, summary.total);
            }
        }
    }
}
