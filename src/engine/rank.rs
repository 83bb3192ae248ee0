//! Display ordering.

use crate::model::CounterRow;

/// Orders rows by the dominant counter descending, then by name ascending.
///
/// Only display rows are passed in; the totals row is computed and shown
/// separately and never enters the ordering.
pub fn rank(mut rows: Vec<CounterRow>, dominant: usize) -> Vec<CounterRow> {
    rows.sort_by(|a, b| {
        b.value(dominant)
            .cmp(&a.value(dominant))
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}
