//! Metric sources: one adapter per monitored table.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use super::CollectError;
use super::traits::{QueryExecutor, Value};
use crate::model::{CounterRow, Snapshot, SourceSchema};

/// Fetches one table's snapshot, already normalized to [`CounterRow`]s.
pub trait MetricSource: Send {
    /// Describes the source: counters, dominant metric, relative capability.
    fn schema(&self) -> &Arc<SourceSchema>;

    /// Runs one poll. Never publishes partial results: either every row
    /// scanned or the whole fetch fails.
    fn fetch(&mut self) -> Result<Snapshot, CollectError>;
}

/// Generic source driven entirely by a [`SourceSchema`].
pub struct TableSource {
    schema: Arc<SourceSchema>,
    executor: Arc<dyn QueryExecutor>,
}

impl TableSource {
    pub fn new(schema: SourceSchema, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            schema: Arc::new(schema),
            executor,
        }
    }
}

impl MetricSource for TableSource {
    fn schema(&self) -> &Arc<SourceSchema> {
        &self.schema
    }

    fn fetch(&mut self) -> Result<Snapshot, CollectError> {
        let raw = self.executor.query(&self.schema.query)?;
        let rows = scan_rows(&self.schema, raw)?;
        debug!(source = self.schema.id, rows = rows.len(), "fetched");
        Ok(Snapshot::new(rows, Utc::now()))
    }
}

/// Converts raw executor rows into counter rows.
///
/// Column 0 is the name, the rest are counters in schema order. `NULL`
/// counters read as zero; anything else non-numeric is a scan error.
fn scan_rows(schema: &SourceSchema, raw: Vec<Vec<Value>>) -> Result<Vec<CounterRow>, CollectError> {
    let expected = schema.column_count();
    let mut rows = Vec::with_capacity(raw.len());

    for (i, columns) in raw.into_iter().enumerate() {
        if columns.len() != expected {
            return Err(CollectError::Scan {
                row: i,
                message: format!("expected {} columns, got {}", expected, columns.len()),
            });
        }

        let mut cols = columns.into_iter();
        let name = cols
            .next()
            .and_then(|v| v.as_text())
            .ok_or_else(|| CollectError::Scan {
                row: i,
                message: "NULL name".to_string(),
            })?;

        let mut values = Vec::with_capacity(expected - 1);
        for (counter, value) in cols.enumerate() {
            let v = if value.is_null() {
                0
            } else {
                value.as_u64().ok_or_else(|| CollectError::Scan {
                    row: i,
                    message: format!(
                        "column '{}' is not a non-negative integer: {:?}",
                        schema.counters[counter].heading, value
                    ),
                })?
            };
            values.push(v);
        }

        trace!(source = schema.id, name = %name, ?values, "scanned row");
        rows.push(CounterRow::new(schema.normalize_name(&name), values));
    }

    Ok(rows)
}
