//! Collection side: query execution, per-table sources, the poll cycle
//! and the registry that runs one cycle per source.
//!
//! The executor is abstracted behind [`QueryExecutor`] so sources, the poll
//! cycle and the registry can be tested without a server (see [`mock`]).

mod cycle;
mod executor;
mod instruments;
pub mod mock;
mod registry;
mod source;
mod status;
pub mod tables;
mod traits;

pub use cycle::{CyclePhase, DisplayMode, PollCycle, RetryPolicy, SourceHealth};
pub use executor::{ConnectionConfig, MysqlExecutor};
pub use instruments::{EXPECTED_UPDATE_ERRORS, SetupInstruments, enable_or_warn};
pub use registry::{CollectorRegistry, CommandError, SourceId};
pub use source::{MetricSource, TableSource};
pub use status::{GlobalStatus, server_variable};
pub use traits::{QueryExecutor, Value};

use std::time::Duration;

/// Error type for metric collection and instrumentation setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    /// No connection could be obtained.
    Connection(String),
    /// Query rejected or failed on the server.
    Query { code: Option<u16>, message: String },
    /// Fetch exceeded its time budget.
    Timeout(Duration),
    /// Row shape did not match the source's column layout.
    Scan { row: usize, message: String },
    /// Insufficient rights to change instrumentation (expected, non-fatal).
    Privilege { code: u16, message: String },
    /// Any other failure while configuring instrumentation.
    Configuration(String),
}

impl CollectError {
    /// Failures that are retried on the next tick and count toward escalation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CollectError::Connection(_) | CollectError::Query { .. } | CollectError::Timeout(_)
        )
    }

    /// Server error code, if the server reported one.
    pub fn code(&self) -> Option<u16> {
        match self {
            CollectError::Query { code, .. } => *code,
            CollectError::Privilege { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Connection(msg) => write!(f, "MySQL: {}", msg),
            CollectError::Query {
                code: Some(code),
                message,
            } => write!(f, "MySQL query error {}: {}", code, message),
            CollectError::Query {
                code: None,
                message,
            } => write!(f, "MySQL query error: {}", message),
            CollectError::Timeout(budget) => {
                write!(f, "fetch exceeded time budget of {:?}", budget)
            }
            CollectError::Scan { row, message } => write!(f, "scan error at row {}: {}", row, message),
            CollectError::Privilege { code, message } => {
                write!(f, "insufficient privileges ({}): {}", code, message)
            }
            CollectError::Configuration(msg) => write!(f, "instrumentation setup failed: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(CollectError::Connection("refused".into()).is_recoverable());
        assert!(CollectError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(
            CollectError::Query {
                code: Some(1146),
                message: "no such table".into()
            }
            .is_recoverable()
        );
        assert!(
            !CollectError::Scan {
                row: 0,
                message: "bad".into()
            }
            .is_recoverable()
        );
        assert!(!CollectError::Configuration("x".into()).is_recoverable());
    }

    #[test]
    fn display_includes_code() {
        let e = CollectError::Query {
            code: Some(1142),
            message: "denied".into(),
        };
        assert_eq!(e.to_string(), "MySQL query error 1142: denied");
        assert_eq!(e.code(), Some(1142));
    }
}
