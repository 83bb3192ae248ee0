//! UI-agnostic presentation of one source's published state.
//!
//! A [`ViewBundle`] is built by the poll cycle and published atomically; the
//! TUI and batch mode only ever read formatted strings from it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::collector::{DisplayMode, SourceHealth};
use crate::fmt::{FmtStyle, divide, format_counter, format_duration, format_pct};
use crate::model::{CounterRow, SourceSchema, TOTALS_NAME};

/// Width of the percent column that follows the dominant counter.
const PCT_WIDTH: usize = 6;

/// Immutable snapshot of everything the presenter shows for one source.
#[derive(Debug, Clone)]
pub struct ViewBundle {
    pub schema: Arc<SourceSchema>,
    /// Mode the rows were computed in.
    pub mode: DisplayMode,
    /// Ranked display rows, totals excluded.
    pub rows: Vec<CounterRow>,
    pub totals: CounterRow,
    pub collected_at: Option<DateTime<Utc>>,
    pub baseline_at: Option<DateTime<Utc>>,
    pub health: SourceHealth,
    pub enabled: bool,
}

impl ViewBundle {
    /// Bundle for a source that has not been polled yet.
    pub fn placeholder(schema: Arc<SourceSchema>, mode: DisplayMode) -> Self {
        let mode = if schema.relative_capable {
            mode
        } else {
            DisplayMode::Absolute
        };
        let totals = CounterRow::zeroed(TOTALS_NAME, schema.width());
        Self {
            schema,
            mode,
            rows: Vec::new(),
            totals,
            collected_at: None,
            baseline_at: None,
            health: SourceHealth::Healthy,
            enabled: true,
        }
    }

    pub fn rows(&self) -> &[CounterRow] {
        &self.rows
    }

    pub fn totals(&self) -> &CounterRow {
        &self.totals
    }

    pub fn is_stale(&self) -> bool {
        self.health.is_stale()
    }

    /// Rows whose dominant counter is non-zero.
    pub fn active_rows(&self) -> usize {
        let dominant = self.schema.dominant;
        self.rows.iter().filter(|r| r.value(dominant) > 0).count()
    }

    /// Column headings, aligned with [`row_content`](Self::row_content).
    pub fn headings(&self) -> String {
        let cells = self.schema.counters.iter().map(|c| c.heading.to_string());
        self.layout(cells, "%", self.schema.name_heading)
    }

    /// One formatted line per ranked row.
    pub fn row_content(&self) -> Vec<String> {
        self.rows.iter().map(|r| self.format_row(r, false)).collect()
    }

    pub fn total_row_content(&self) -> String {
        self.format_row(&self.totals, true)
    }

    /// Blank line with the same width as a data row, used as filler.
    pub fn empty_row_content(&self) -> String {
        let cells = self.schema.counters.iter().map(|_| String::new());
        self.layout(cells, "", "")
    }

    /// One-line summary: title, table, active row count, mode, baseline age
    /// and staleness.
    pub fn description(&self) -> String {
        let n = self.active_rows();
        let mut out = format!(
            "{} ({}) {} row{} [{}]",
            self.schema.title,
            self.schema.table,
            n,
            if n == 1 { "" } else { "s" },
            self.mode.as_str()
        );

        if self.mode == DisplayMode::Relative
            && let Some(age) = self.baseline_age()
        {
            out.push_str(&format!(" since {}", format_duration(age, FmtStyle::Compact)));
        }

        if !self.enabled {
            out.push_str(" DISABLED");
        }
        match &self.health {
            SourceHealth::Healthy => {}
            SourceHealth::Stale { failures, error } if *failures > 0 => {
                out.push_str(&format!(" STALE ({} failures): {}", failures, error));
            }
            SourceHealth::Stale { error, .. } => {
                out.push_str(&format!(" STALE: {}", error));
            }
            SourceHealth::Failed { error } => {
                out.push_str(&format!(" FAILED: {}", error));
            }
        }
        out
    }

    /// Seconds between the baseline and the latest data.
    pub fn baseline_age(&self) -> Option<u64> {
        let (collected, baseline) = (self.collected_at?, self.baseline_at?);
        u64::try_from((collected - baseline).num_seconds()).ok()
    }

    /// All-zero data rows are filler and show no name; the totals row
    /// always does.
    fn format_row(&self, row: &CounterRow, is_totals: bool) -> String {
        let dominant = self.schema.dominant;
        let cells = self
            .schema
            .counters
            .iter()
            .enumerate()
            .map(|(i, spec)| format_counter(row.value(i), spec.kind));
        let pct = format_pct(divide(row.value(dominant), self.totals.value(dominant)));
        let name = if row.is_zero() && !is_totals {
            ""
        } else {
            row.name.as_str()
        };
        self.layout(cells, &pct, name)
    }

    /// Right-aligns `cells` to their counter widths, inserts `pct` after the
    /// dominant counter and appends `|name`.
    fn layout(&self, cells: impl Iterator<Item = String>, pct: &str, name: &str) -> String {
        let mut out = String::new();
        for (i, (cell, spec)) in cells.zip(&self.schema.counters).enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{:>width$}", cell, width = spec.width));
            if i == self.schema.dominant {
                out.push_str(&format!(" {:>width$}", pct, width = PCT_WIDTH));
            }
        }
        out.push('|');
        out.push_str(name);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectError;
    use crate::model::{CounterKind, CounterSpec};
    use chrono::TimeZone;

    fn schema() -> Arc<SourceSchema> {
        Arc::new(SourceSchema {
            id: "stages",
            title: "SQL Stage Latency",
            table: "events_stages_summary_global_by_event_name",
            query: String::new(),
            counters: vec![
                CounterSpec::new("Latency", CounterKind::Time, 10),
                CounterSpec::new("Count", CounterKind::Count, 8),
            ],
            dominant: 0,
            name_prefix: None,
            name_heading: "Stage",
            relative_capable: true,
        })
    }

    fn bundle(rows: Vec<CounterRow>) -> ViewBundle {
        let totals = crate::engine::sum(&rows, 2);
        let mut b = ViewBundle::placeholder(schema(), DisplayMode::Relative);
        b.rows = rows;
        b.totals = totals;
        b
    }

    #[test]
    fn headings_align_with_rows() {
        let b = bundle(vec![
            CounterRow::new("init", vec![3_000_000, 1_500]),
            CounterRow::new("end", vec![1_000_000, 2]),
        ]);

        assert_eq!(b.headings(), "   Latency      %    Count|Stage");
        let rows = b.row_content();
        assert_eq!(rows[0], "   3.00 us  75.0%   1.50 k|init");
        assert_eq!(rows[1], "   1.00 us  25.0%        2|end");
        assert_eq!(b.total_row_content(), "   4.00 us 100.0%   1.50 k|Totals");
        assert_eq!(b.empty_row_content().len(), b.headings().len() - "Stage".len());
    }

    #[test]
    fn zero_rows_render_without_name() {
        let b = bundle(vec![
            CounterRow::new("idle", vec![0, 0]),
            CounterRow::new(TOTALS_NAME, vec![0, 0]),
        ]);
        let rows = b.row_content();
        assert!(rows[0].ends_with('|'));
        assert!(rows[1].ends_with('|'));
        assert!(b.total_row_content().ends_with("|Totals"));
    }

    #[test]
    fn description_counts_active_rows() {
        let mut b = bundle(vec![
            CounterRow::new("a", vec![5, 1]),
            CounterRow::new("b", vec![0, 3]),
        ]);
        assert_eq!(
            b.description(),
            "SQL Stage Latency (events_stages_summary_global_by_event_name) 1 row [relative]"
        );

        b.collected_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 3, 5).unwrap());
        b.baseline_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(b.description().ends_with("[relative] since 3m5s"));

        b.health = SourceHealth::Stale {
            failures: 2,
            error: CollectError::Connection("refused".into()),
        };
        assert!(b.description().contains("STALE (2 failures)"));
        assert!(b.is_stale());
    }

    #[test]
    fn failed_description() {
        let mut b = bundle(Vec::new());
        b.health = SourceHealth::Failed {
            error: CollectError::Timeout(std::time::Duration::from_secs(5)),
        };
        assert!(b.description().contains("0 rows"));
        assert!(b.description().contains("FAILED: fetch exceeded time budget"));
        assert_eq!(b.totals().name, TOTALS_NAME);
    }
}
