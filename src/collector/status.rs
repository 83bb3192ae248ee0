//! Global status and server variable lookups.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::CollectError;
use super::traits::QueryExecutor;

/// "The 'INFORMATION_SCHEMA.GLOBAL_STATUS' feature is disabled".
const FEATURE_DISABLED: u16 = 3167;

/// Reads single global status variables such as `Uptime`.
///
/// Starts with `INFORMATION_SCHEMA.GLOBAL_STATUS` and switches permanently to
/// `performance_schema.global_status` once the server reports the former as
/// disabled.
pub struct GlobalStatus {
    executor: Arc<dyn QueryExecutor>,
    use_performance_schema: AtomicBool,
}

impl GlobalStatus {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            use_performance_schema: AtomicBool::new(false),
        }
    }

    /// Returns the numeric value of `name`, or `None` if the server does not
    /// know the variable.
    pub fn get(&self, name: &str) -> Result<Option<u64>, CollectError> {
        if !is_identifier(name) {
            return Ok(None);
        }

        let result = self.executor.query(&self.status_query(name));
        let rows = match result {
            Err(e) if e.code() == Some(FEATURE_DISABLED) && !self.uses_performance_schema() => {
                info!("INFORMATION_SCHEMA.GLOBAL_STATUS disabled, using performance_schema");
                self.use_performance_schema.store(true, Ordering::Relaxed);
                self.executor.query(&self.status_query(name))?
            }
            other => other?,
        };

        let value = rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_u64());
        debug!(name, ?value, "global status");
        Ok(value)
    }

    pub fn uses_performance_schema(&self) -> bool {
        self.use_performance_schema.load(Ordering::Relaxed)
    }

    fn status_query(&self, name: &str) -> String {
        let table = if self.uses_performance_schema() {
            "performance_schema.global_status"
        } else {
            "INFORMATION_SCHEMA.GLOBAL_STATUS"
        };
        format!(
            "SELECT VARIABLE_VALUE FROM {} WHERE VARIABLE_NAME = '{}'",
            table, name
        )
    }
}

/// Reads `@@<name>` as text. `None` when the server returns `NULL`.
pub fn server_variable(
    executor: &dyn QueryExecutor,
    name: &str,
) -> Result<Option<String>, CollectError> {
    if !is_identifier(name) {
        return Err(CollectError::Query {
            code: None,
            message: format!("invalid variable name '{}'", name),
        });
    }
    let rows = executor.query(&format!("SELECT @@{}", name))?;
    Ok(rows.first().and_then(|row| row.first()).and_then(|v| v.as_text()))
}

/// Variable names are interpolated into SQL, so only plain identifiers pass.
fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
