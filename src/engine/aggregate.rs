//! Totals row computation.

use crate::model::{CounterRow, TOTALS_NAME};

/// Sums `rows` counter-wise into a row named [`TOTALS_NAME`].
///
/// `width` is the source's counter count, so an empty row set still yields
/// a correctly shaped all-zero totals row.
pub fn sum(rows: &[CounterRow], width: usize) -> CounterRow {
    let mut totals = CounterRow::zeroed(TOTALS_NAME, width);
    for row in rows {
        totals.accumulate(row);
    }
    totals
}
