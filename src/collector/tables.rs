//! Schema descriptors for the monitored performance_schema tables.
//!
//! Adding a table only requires a new descriptor here; collection, deltas,
//! totals and ranking are generic.

use crate::model::{CounterKind, CounterSpec, SourceSchema};

/// Identifiers of every known source, in display order.
pub const SOURCE_IDS: &[&str] = &[
    "statements",
    "table_io",
    "file_io",
    "stages",
    "mutex",
    "memory",
];

const LATENCY: CounterSpec = CounterSpec::new("Latency", CounterKind::Time, 10);
const COUNT: CounterSpec = CounterSpec::new("Count", CounterKind::Count, 8);

/// `events_statements_summary_global_by_event_name`.
pub fn statements() -> SourceSchema {
    SourceSchema {
        id: "statements",
        title: "SQL Statement Latency",
        table: "events_statements_summary_global_by_event_name",
        query: "SELECT EVENT_NAME, SUM_TIMER_WAIT, COUNT_STAR, SUM_ROWS_EXAMINED \
                FROM performance_schema.events_statements_summary_global_by_event_name \
                WHERE SUM_TIMER_WAIT > 0"
            .to_string(),
        counters: vec![
            LATENCY,
            COUNT,
            CounterSpec::new("Rows Exam", CounterKind::Count, 9),
        ],
        dominant: 0,
        name_prefix: Some("statement/".to_string()),
        name_heading: "Statement",
        relative_capable: true,
    }
}

/// `events_stages_summary_global_by_event_name`.
pub fn stages() -> SourceSchema {
    SourceSchema {
        id: "stages",
        title: "SQL Stage Latency",
        table: "events_stages_summary_global_by_event_name",
        query: "SELECT EVENT_NAME, SUM_TIMER_WAIT, COUNT_STAR \
                FROM performance_schema.events_stages_summary_global_by_event_name \
                WHERE SUM_TIMER_WAIT > 0"
            .to_string(),
        counters: vec![LATENCY, COUNT],
        dominant: 0,
        name_prefix: Some("stage/sql/".to_string()),
        name_heading: "Stage",
        relative_capable: true,
    }
}

/// Mutex waits from `events_waits_summary_global_by_event_name`.
pub fn mutex() -> SourceSchema {
    SourceSchema {
        id: "mutex",
        title: "Mutex Latency",
        table: "events_waits_summary_global_by_event_name",
        query: "SELECT EVENT_NAME, SUM_TIMER_WAIT, COUNT_STAR \
                FROM performance_schema.events_waits_summary_global_by_event_name \
                WHERE EVENT_NAME LIKE 'wait/synch/mutex/%' AND SUM_TIMER_WAIT > 0"
            .to_string(),
        counters: vec![LATENCY, COUNT],
        dominant: 0,
        name_prefix: Some("wait/synch/mutex/".to_string()),
        name_heading: "Mutex",
        relative_capable: true,
    }
}

/// `file_summary_by_instance`; file names are shown relative to `datadir`.
pub fn file_io(datadir: Option<&str>) -> SourceSchema {
    SourceSchema {
        id: "file_io",
        title: "File I/O Latency",
        table: "file_summary_by_instance",
        query: "SELECT FILE_NAME, SUM_TIMER_WAIT, SUM_TIMER_READ, SUM_TIMER_WRITE, \
                SUM_NUMBER_OF_BYTES_READ, SUM_NUMBER_OF_BYTES_WRITE, COUNT_STAR \
                FROM performance_schema.file_summary_by_instance \
                WHERE SUM_TIMER_WAIT > 0"
            .to_string(),
        counters: vec![
            LATENCY,
            CounterSpec::new("Read", CounterKind::Time, 10),
            CounterSpec::new("Write", CounterKind::Time, 10),
            CounterSpec::new("Rd Bytes", CounterKind::Bytes, 9),
            CounterSpec::new("Wr Bytes", CounterKind::Bytes, 9),
            COUNT,
        ],
        dominant: 0,
        name_prefix: datadir.filter(|d| !d.is_empty()).map(str::to_string),
        name_heading: "File",
        relative_capable: true,
    }
}

/// `table_io_waits_summary_by_table`.
pub fn table_io() -> SourceSchema {
    SourceSchema {
        id: "table_io",
        title: "Table I/O Latency",
        table: "table_io_waits_summary_by_table",
        query: "SELECT CONCAT(OBJECT_SCHEMA, '.', OBJECT_NAME), SUM_TIMER_WAIT, \
                SUM_TIMER_FETCH, SUM_TIMER_INSERT, SUM_TIMER_UPDATE, SUM_TIMER_DELETE, COUNT_STAR \
                FROM performance_schema.table_io_waits_summary_by_table \
                WHERE SUM_TIMER_WAIT > 0"
            .to_string(),
        counters: vec![
            LATENCY,
            CounterSpec::new("Fetch", CounterKind::Time, 10),
            CounterSpec::new("Insert", CounterKind::Time, 10),
            CounterSpec::new("Update", CounterKind::Time, 10),
            CounterSpec::new("Delete", CounterKind::Time, 10),
            COUNT,
        ],
        dominant: 0,
        name_prefix: None,
        name_heading: "Table",
        relative_capable: true,
    }
}

/// `memory_summary_global_by_event_name`. Gauges, so always absolute.
pub fn memory() -> SourceSchema {
    SourceSchema {
        id: "memory",
        title: "Memory Usage",
        table: "memory_summary_global_by_event_name",
        query: "SELECT EVENT_NAME, GREATEST(CURRENT_NUMBER_OF_BYTES_USED, 0), \
                GREATEST(HIGH_NUMBER_OF_BYTES_USED, 0), GREATEST(CURRENT_COUNT_USED, 0) \
                FROM performance_schema.memory_summary_global_by_event_name \
                WHERE CURRENT_NUMBER_OF_BYTES_USED > 0"
            .to_string(),
        counters: vec![
            CounterSpec::new("Current", CounterKind::Bytes, 9),
            CounterSpec::new("High", CounterKind::Bytes, 9),
            CounterSpec::new("Allocs", CounterKind::Count, 8),
        ],
        dominant: 0,
        name_prefix: Some("memory/".to_string()),
        name_heading: "Event",
        relative_capable: false,
    }
}

/// Looks up a descriptor by id.
pub fn by_id(id: &str, datadir: Option<&str>) -> Option<SourceSchema> {
    match id {
        "statements" => Some(statements()),
        "stages" => Some(stages()),
        "mutex" => Some(mutex()),
        "file_io" => Some(file_io(datadir)),
        "table_io" => Some(table_io()),
        "memory" => Some(memory()),
        _ => None,
    }
}
