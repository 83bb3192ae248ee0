//! Row and snapshot model shared by every monitored table.
//!
//! A [`Snapshot`] is what one poll of one performance_schema table produces:
//! an ordered list of [`CounterRow`]s, each identified by name and carrying a
//! fixed tuple of cumulative counters whose meaning is described by the
//! source's [`SourceSchema`].

mod schema;

pub use schema::{CounterKind, CounterSpec, SourceSchema};

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Name of the synthetic aggregate row.
pub const TOTALS_NAME: &str = "Totals";

/// One named row of monotonic counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRow {
    pub name: String,
    pub values: Vec<u64>,
}

impl CounterRow {
    pub fn new(name: impl Into<String>, values: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// All-zero row with the given number of counters.
    pub fn zeroed(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, vec![0; width])
    }

    /// Value of the counter at `index`, zero if the row is narrower.
    pub fn value(&self, index: usize) -> u64 {
        self.values.get(index).copied().unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0)
    }

    /// Adds `other` counter-wise into `self`.
    pub(crate) fn accumulate(&mut self, other: &CounterRow) {
        if self.values.len() < other.values.len() {
            self.values.resize(other.values.len(), 0);
        }
        for (acc, v) in self.values.iter_mut().zip(&other.values) {
            *acc = acc.saturating_add(*v);
        }
    }
}

/// Rows collected atomically by one poll, plus the collection time.
///
/// Immutable once built: the constructor is the only way to set rows, and it
/// guarantees that names are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    rows: Vec<CounterRow>,
    collected_at: DateTime<Utc>,
}

impl Snapshot {
    /// Builds a snapshot, merging rows that share a name.
    ///
    /// Duplicate names appear when name normalization (prefix stripping)
    /// folds two source rows together; their counters are summed and the
    /// first occurrence keeps its position.
    pub fn new(rows: Vec<CounterRow>, collected_at: DateTime<Utc>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
        let mut merged: Vec<CounterRow> = Vec::with_capacity(rows.len());

        for row in rows {
            match index.get(&row.name) {
                Some(&i) => merged[i].accumulate(&row),
                None => {
                    index.insert(row.name.clone(), merged.len());
                    merged.push(row);
                }
            }
        }

        Self {
            rows: merged,
            collected_at,
        }
    }

    pub fn rows(&self) -> &[CounterRow] {
        &self.rows
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_merges_duplicate_names() {
        let snapshot = Snapshot::new(
            vec![
                CounterRow::new("a", vec![1, 2]),
                CounterRow::new("b", vec![5, 5]),
                CounterRow::new("a", vec![10, 20]),
            ],
            Utc::now(),
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.rows()[0], CounterRow::new("a", vec![11, 22]));
        assert_eq!(snapshot.rows()[1].name, "b");
    }

    #[test]
    fn counter_row_value_out_of_range_is_zero() {
        let row = CounterRow::new("x", vec![7]);
        assert_eq!(row.value(0), 7);
        assert_eq!(row.value(3), 0);
    }

    #[test]
    fn accumulate_saturates() {
        let mut row = CounterRow::new("x", vec![u64::MAX - 1]);
        row.accumulate(&CounterRow::new("y", vec![5]));
        assert_eq!(row.values, vec![u64::MAX]);
    }
}
