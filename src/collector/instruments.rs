//! One-time instrumentation setup in `performance_schema.setup_instruments`.
//!
//! Mutex and stage instruments are disabled by default on most servers. The
//! monitor turns them on at startup and puts back the original values on
//! shutdown. Lacking the rights to do so is expected and only logged.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::CollectError;
use super::traits::QueryExecutor;

/// Server error codes treated as an expected privilege failure:
/// 1142 (UPDATE command denied) and 1290 (server running read-only).
pub const EXPECTED_UPDATE_ERRORS: &[u16] = &[1142, 1290];

const MUTEX_PATTERN: &str = "wait/synch/mutex/%";
const STAGE_PATTERN: &str = "stage/sql/%";

const UPDATE_SQL: &str =
    "UPDATE performance_schema.setup_instruments SET ENABLED = ?, TIMED = ? WHERE NAME = ?";

/// Original state of one instrument before it was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InstrumentState {
    name: String,
    enabled: String,
    timed: String,
}

/// Enables instruments and remembers what to restore.
pub struct SetupInstruments {
    executor: Arc<dyn QueryExecutor>,
    original: Vec<InstrumentState>,
    update_tried: bool,
    update_succeeded: bool,
    disabled: bool,
}

impl SetupInstruments {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            original: Vec::new(),
            update_tried: false,
            update_succeeded: false,
            disabled: false,
        }
    }

    /// Enables every instrument the monitored sources rely on.
    pub fn enable_monitoring(&mut self) -> Result<(), CollectError> {
        self.enable_mutex_monitoring()?;
        self.enable_stage_monitoring()
    }

    pub fn enable_mutex_monitoring(&mut self) -> Result<(), CollectError> {
        self.configure(MUTEX_PATTERN)
    }

    pub fn enable_stage_monitoring(&mut self) -> Result<(), CollectError> {
        self.configure(STAGE_PATTERN)
    }

    /// Sets ENABLED and TIMED to `YES` for all instruments matching the
    /// `LIKE` pattern that are not already fully on.
    ///
    /// A privilege failure is logged and turns all later calls into no-ops.
    /// Any other failure is returned as `Configuration`.
    pub fn configure(&mut self, pattern: &str) -> Result<(), CollectError> {
        if self.disabled {
            debug!(pattern, "instrument configuration disabled, skipping");
            return Ok(());
        }

        let sql = format!(
            "SELECT NAME, ENABLED, TIMED FROM performance_schema.setup_instruments \
             WHERE NAME LIKE '{}' AND 'YES' NOT IN (ENABLED, TIMED)",
            pattern.replace('\'', "''")
        );
        let rows = self
            .executor
            .query(&sql)
            .map_err(|e| self.classify(e))?;

        let mut changed = 0usize;
        for row in rows {
            let text = |i: usize| row.get(i).and_then(|v| v.as_text()).unwrap_or_default();
            let state = InstrumentState {
                name: text(0),
                enabled: text(1),
                timed: text(2),
            };
            if state.name.is_empty() {
                continue;
            }

            self.update_tried = true;
            let params = ["YES", "YES", state.name.as_str()];
            if let Err(e) = self.executor.execute(UPDATE_SQL, &params) {
                return Err(self.classify(e));
            }
            self.update_succeeded = true;
            self.original.push(state);
            changed += 1;
        }

        if changed > 0 {
            info!(pattern, changed, "enabled instruments");
        }
        Ok(())
    }

    /// Puts back the original ENABLED/TIMED values of every changed
    /// instrument. Does nothing unless an update succeeded earlier.
    ///
    /// Every instrument is attempted; the ones that could not be restored
    /// stay recorded for a later call and the first error is returned.
    pub fn restore_configuration(&mut self) -> Result<(), CollectError> {
        if !self.update_succeeded {
            return Ok(());
        }

        let executor = &self.executor;
        let mut restored = 0usize;
        let mut first_error = None;
        self.original.retain(|state| {
            let params = [
                state.enabled.as_str(),
                state.timed.as_str(),
                state.name.as_str(),
            ];
            match executor.execute(UPDATE_SQL, &params) {
                Ok(_) => {
                    restored += 1;
                    false
                }
                Err(e) => {
                    warn!(instrument = %state.name, "cannot restore instrument: {}", e);
                    first_error.get_or_insert(CollectError::Configuration(e.to_string()));
                    true
                }
            }
        });

        if let Some(e) = first_error {
            info!(
                restored,
                pending = self.original.len(),
                "partially restored instrument configuration"
            );
            return Err(e);
        }
        self.update_succeeded = false;
        info!(restored, "restored instrument configuration");
        Ok(())
    }

    /// True once any UPDATE was attempted.
    pub fn update_tried(&self) -> bool {
        self.update_tried
    }

    /// True while there are changes to restore.
    pub fn update_succeeded(&self) -> bool {
        self.update_succeeded
    }

    fn classify(&mut self, e: CollectError) -> CollectError {
        match e.code() {
            Some(code) if EXPECTED_UPDATE_ERRORS.contains(&code) => {
                warn!(code, "insufficient privileges to configure instruments: {}", e);
                self.disabled = true;
                let message = match e {
                    CollectError::Query { message, .. } => message,
                    other => other.to_string(),
                };
                CollectError::Privilege { code, message }
            }
            _ => CollectError::Configuration(e.to_string()),
        }
    }
}

/// Runs `enable_monitoring`, absorbing privilege failures.
///
/// Returns `Err` only for unexpected failures; the caller logs it and keeps
/// monitoring with whatever instrumentation the server already has.
pub fn enable_or_warn(setup: &mut SetupInstruments) -> Result<(), CollectError> {
    match setup.enable_monitoring() {
        Ok(()) | Err(CollectError::Privilege { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockExecutor;
    use crate::collector::traits::Value;

    fn instrument(name: &str, enabled: &str, timed: &str) -> Vec<Value> {
        vec![name.into(), enabled.into(), timed.into()]
    }

    #[test]
    fn enables_and_restores() {
        let mock = Arc::new(MockExecutor::new());
        mock.push_rows(
            "wait/synch/mutex/%",
            vec![instrument("wait/synch/mutex/sql/LOCK_open", "NO", "NO")],
        );
        mock.push_rows(
            "stage/sql/%",
            vec![instrument("stage/sql/init", "YES", "NO")],
        );
        let mut setup = SetupInstruments::new(mock.clone());

        setup.enable_monitoring().unwrap();
        assert!(setup.update_succeeded());

        setup.restore_configuration().unwrap();
        assert!(!setup.update_succeeded());

        let executed = mock.executed();
        assert_eq!(executed.len(), 4);
        assert_eq!(executed[0].1, vec!["YES", "YES", "wait/synch/mutex/sql/LOCK_open"]);
        assert_eq!(executed[2].1, vec!["NO", "NO", "wait/synch/mutex/sql/LOCK_open"]);
        assert_eq!(executed[3].1, vec!["YES", "NO", "stage/sql/init"]);
    }

    #[test]
    fn privilege_error_disables_further_attempts() {
        let mock = Arc::new(MockExecutor::new());
        mock.push_rows(
            "setup_instruments",
            vec![instrument("wait/synch/mutex/sql/LOCK_open", "NO", "NO")],
        );
        mock.push_execute_result(Err(CollectError::Query {
            code: Some(1142),
            message: "UPDATE command denied".into(),
        }));
        let mut setup = SetupInstruments::new(mock.clone());

        let err = setup.enable_mutex_monitoring().unwrap_err();
        assert_eq!(
            err,
            CollectError::Privilege {
                code: 1142,
                message: "UPDATE command denied".into()
            }
        );
        assert!(setup.update_tried());
        assert!(!setup.update_succeeded());

        let queries = mock.query_count();
        setup.enable_stage_monitoring().unwrap();
        assert_eq!(mock.query_count(), queries);

        // Nothing succeeded, so nothing is restored.
        setup.restore_configuration().unwrap();
        assert_eq!(mock.executed().len(), 1);
    }

    #[test]
    fn read_only_server_is_expected() {
        let mock = Arc::new(MockExecutor::new());
        mock.push_rows(
            "setup_instruments",
            vec![instrument("stage/sql/init", "NO", "NO")],
        );
        mock.push_execute_result(Err(CollectError::Query {
            code: Some(1290),
            message: "read-only".into(),
        }));
        let mut setup = SetupInstruments::new(mock);

        assert!(enable_or_warn(&mut setup).is_ok());
    }

    #[test]
    fn unexpected_error_is_configuration() {
        let mock = Arc::new(MockExecutor::new());
        mock.push_error("setup_instruments", CollectError::Connection("lost".into()));
        let mut setup = SetupInstruments::new(mock);

        assert!(matches!(
            enable_or_warn(&mut setup),
            Err(CollectError::Configuration(_))
        ));
        assert!(!setup.update_tried());
    }

    #[test]
    fn failed_restore_keeps_unrestored_instruments() {
        let mock = Arc::new(MockExecutor::new());
        mock.push_rows(
            "wait/synch/mutex/%",
            vec![
                instrument("wait/synch/mutex/m1", "NO", "NO"),
                instrument("wait/synch/mutex/m2", "NO", "YES"),
                instrument("wait/synch/mutex/m3", "YES", "NO"),
            ],
        );
        let mut setup = SetupInstruments::new(mock.clone());
        setup.enable_mutex_monitoring().unwrap();
        assert_eq!(mock.executed().len(), 3);

        mock.push_execute_result(Err(CollectError::Connection("lost".into())));
        let err = setup.restore_configuration().unwrap_err();
        assert!(matches!(err, CollectError::Configuration(_)));
        assert_eq!(mock.executed().len(), 6);
        assert_eq!(setup.original.len(), 1);
        assert_eq!(setup.original[0].name, "wait/synch/mutex/m1");
        assert!(setup.update_succeeded());

        setup.restore_configuration().unwrap();
        let executed = mock.executed();
        assert_eq!(executed.len(), 7);
        assert_eq!(executed[6].1, vec!["NO", "NO", "wait/synch/mutex/m1"]);
        assert!(setup.original.is_empty());
        assert!(!setup.update_succeeded());
    }

    #[test]
    fn nothing_to_enable() {
        let mock = Arc::new(MockExecutor::new());
        mock.push_rows("setup_instruments", Vec::new());
        let mut setup = SetupInstruments::new(mock.clone());

        setup.enable_monitoring().unwrap();
        assert!(!setup.update_tried());
        setup.restore_configuration().unwrap();
        assert!(mock.executed().is_empty());
    }
}
