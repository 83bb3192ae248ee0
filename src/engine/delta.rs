//! Baseline management and relative (delta) computation.
//!
//! performance_schema counters are cumulative since server start (or since
//! the last `TRUNCATE` of the summary table). The relative view subtracts a
//! baseline snapshot from the current one. When the current aggregate of the
//! dominant counter falls below the baseline aggregate, the counters were
//! reset and the baseline must be replaced.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::engine::aggregate::sum;
use crate::model::{CounterRow, Snapshot};

/// A counter that would go negative after subtracting the baseline.
///
/// Never returned to callers: it is logged where it is detected and the
/// affected row is shown unsubtracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeDeltaAnomaly {
    pub name: String,
    pub counter: usize,
    pub current: u64,
    pub baseline: u64,
}

impl fmt::Display for NegativeDeltaAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "negative delta for '{}' counter #{}: current={} baseline={}",
            self.name, self.counter, self.current, self.baseline
        )
    }
}

/// Compute u64 delta, returning `None` on counter regression.
fn du64(curr: u64, prev: u64) -> Option<u64> {
    curr.checked_sub(prev)
}

/// Returns `true` if the dominant counter's aggregate went backwards.
pub fn needs_rebase(baseline: &Snapshot, current: &Snapshot, dominant: usize) -> bool {
    let width = dominant + 1;
    let base_total = sum(baseline.rows(), width).value(dominant);
    let curr_total = sum(current.rows(), width).value(dominant);
    curr_total < base_total
}

/// Produces a new baseline from `current`.
///
/// The copy keeps `current`'s collection timestamp, which becomes the
/// "relative since" time shown to the user.
pub fn rebase(current: &Snapshot) -> Snapshot {
    current.clone()
}

/// Subtracts `baseline` from `current`, joining rows by name.
///
/// - rows only in `current` pass through unchanged (baseline taken as zero);
/// - rows only in `baseline` are dropped;
/// - if any counter of a row would go negative, the anomaly is logged and
///   the whole row is left at its current (unsubtracted) values.
///
/// Output order follows `current`.
pub fn compute_relative(current: &Snapshot, baseline: &Snapshot) -> Vec<CounterRow> {
    let by_name: HashMap<&str, &CounterRow> = baseline
        .rows()
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();

    current
        .rows()
        .iter()
        .map(|row| match by_name.get(row.name.as_str()) {
            None => row.clone(),
            Some(base) => match subtract(row, base) {
                Ok(delta) => delta,
                Err(anomaly) => {
                    warn!(%anomaly, "NegativeDeltaAnomaly: leaving row unsubtracted");
                    row.clone()
                }
            },
        })
        .collect()
}

fn subtract(row: &CounterRow, base: &CounterRow) -> Result<CounterRow, NegativeDeltaAnomaly> {
    let mut values = Vec::with_capacity(row.values.len());
    for (counter, &curr) in row.values.iter().enumerate() {
        let prev = base.value(counter);
        match du64(curr, prev) {
            Some(d) => values.push(d),
            None => {
                return Err(NegativeDeltaAnomaly {
                    name: row.name.clone(),
                    counter,
                    current: curr,
                    baseline: prev,
                });
            }
        }
    }
    Ok(CounterRow::new(row.name.clone(), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rank::rank;
    use chrono::{TimeZone, Utc};

    fn snap(ts: i64, rows: &[(&str, u64)]) -> Snapshot {
        Snapshot::new(
            rows.iter()
                .map(|(n, v)| CounterRow::new(*n, vec![*v, *v / 10]))
                .collect(),
            Utc.timestamp_opt(ts, 0).unwrap(),
        )
    }

    fn value_of(rows: &[CounterRow], name: &str) -> Option<u64> {
        rows.iter().find(|r| r.name == name).map(|r| r.value(0))
    }

    #[test]
    fn relative_of_self_is_zero() {
        let s = snap(100, &[("a", 100), ("b", 50), ("c", 0)]);
        let delta = compute_relative(&s, &s);
        assert_eq!(delta.len(), 3);
        assert!(delta.iter().all(CounterRow::is_zero));
    }

    #[test]
    fn relative_is_deterministic() {
        let base = snap(100, &[("a", 100), ("b", 50)]);
        let curr = snap(110, &[("a", 150), ("b", 40), ("c", 10)]);
        assert_eq!(
            compute_relative(&curr, &base),
            compute_relative(&curr, &base)
        );
    }

    #[test]
    fn baseline_only_rows_are_dropped() {
        let base = snap(100, &[("a", 100), ("gone", 70)]);
        let curr = snap(110, &[("a", 120)]);
        let delta = compute_relative(&curr, &base);
        assert_eq!(delta.len(), 1);
        assert_eq!(value_of(&delta, "gone"), None);
    }

    #[test]
    fn negative_delta_leaves_row_unsubtracted() {
        // baseline aggregate 150, current aggregate 200: no rebase.
        let base = snap(100, &[("A", 100), ("B", 50)]);
        let curr = snap(110, &[("A", 150), ("B", 40), ("C", 10)]);
        assert!(!needs_rebase(&base, &curr, 0));

        let delta = compute_relative(&curr, &base);
        assert_eq!(value_of(&delta, "A"), Some(50));
        assert_eq!(value_of(&delta, "B"), Some(40));
        assert_eq!(value_of(&delta, "C"), Some(10));

        let b = delta.iter().find(|r| r.name == "B").unwrap();
        assert_eq!(b.values, vec![40, 4]);

        let order: Vec<_> = rank(delta, 0).into_iter().map(|r| r.name).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn needs_rebase_only_on_regression() {
        let base = snap(100, &[("a", 300), ("b", 200)]);
        let lower = snap(110, &[("a", 200), ("b", 100)]);
        let equal = snap(110, &[("a", 250), ("b", 250)]);
        let higher = snap(110, &[("a", 400), ("b", 200)]);

        assert!(needs_rebase(&base, &lower, 0));
        assert!(!needs_rebase(&base, &equal, 0));
        assert!(!needs_rebase(&base, &higher, 0));
    }

    #[test]
    fn rebase_copies_current_exactly() {
        let base = snap(100, &[("a", 400), ("b", 100)]);
        let curr = snap(200, &[("a", 200), ("b", 100)]);
        assert!(needs_rebase(&base, &curr, 0));

        let new_base = rebase(&curr);
        assert_eq!(new_base, curr);
        assert_eq!(new_base.collected_at(), curr.collected_at());
        assert!(compute_relative(&curr, &new_base).iter().all(CounterRow::is_zero));
    }

    #[test]
    fn non_dominant_regression_does_not_rebase() {
        let base = Snapshot::new(vec![CounterRow::new("a", vec![10, 100])], Utc::now());
        let curr = Snapshot::new(vec![CounterRow::new("a", vec![20, 5])], Utc::now());
        assert!(!needs_rebase(&base, &curr, 0));
        assert!(needs_rebase(&base, &curr, 1));
    }

    #[test]
    fn anomaly_display_names_row() {
        let a = NegativeDeltaAnomaly {
            name: "B".to_string(),
            counter: 0,
            current: 40,
            baseline: 50,
        };
        assert!(a.to_string().contains("'B'"));
    }
}
