//! Per-source schema descriptor.

/// How a counter is rendered by the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// performance_schema timer value in picoseconds.
    Time,
    /// Plain event/row count.
    Count,
    /// Byte amount.
    Bytes,
}

/// One counter column of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    pub heading: &'static str,
    pub kind: CounterKind,
    pub width: usize,
}

impl CounterSpec {
    pub const fn new(heading: &'static str, kind: CounterKind, width: usize) -> Self {
        Self {
            heading,
            kind,
            width,
        }
    }
}

/// Everything the generic collection pipeline needs to know about a table.
///
/// The query must return the row name as its first column followed by one
/// column per entry in `counters`, in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSchema {
    /// Short stable identifier (`statements`, `file_io`, ...).
    pub id: &'static str,
    /// Human readable title used in the description line.
    pub title: &'static str,
    /// Underlying performance_schema table.
    pub table: &'static str,
    pub query: String,
    pub counters: Vec<CounterSpec>,
    /// Index into `counters` of the metric used for reset detection and ranking.
    pub dominant: usize,
    /// Fixed prefix stripped from every row name.
    pub name_prefix: Option<String>,
    pub name_heading: &'static str,
    /// `false` for gauge-like tables that are always shown as absolute values.
    pub relative_capable: bool,
}

impl SourceSchema {
    pub fn width(&self) -> usize {
        self.counters.len()
    }

    /// Column count the query is expected to return.
    pub fn column_count(&self) -> usize {
        self.counters.len() + 1
    }

    /// Strips the configured prefix from a raw source name.
    pub fn normalize_name(&self, raw: &str) -> String {
        match self.name_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() && raw.len() > prefix.len() => raw
                .strip_prefix(prefix)
                .unwrap_or(raw)
                .to_string(),
            _ => raw.to_string(),
        }
    }
}
