//! In-memory scripted executor.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::collector::CollectError;
use crate::collector::traits::{QueryExecutor, Value};

type QueryResult = Result<Vec<Vec<Value>>, CollectError>;

/// Scripted responses for queries containing `needle`.
#[derive(Debug)]
struct Script {
    needle: String,
    responses: VecDeque<QueryResult>,
}

/// Executor that replays scripted results.
///
/// Responses are matched by substring of the SQL text and consumed in order;
/// the last response for a needle stays in place and is repeated. Queries
/// with no matching script fail with a `Query` error.
#[derive(Debug, Default)]
pub struct MockExecutor {
    scripts: Mutex<Vec<Script>>,
    execute_results: Mutex<VecDeque<Result<u64, CollectError>>>,
    executed: Mutex<Vec<(String, Vec<String>)>>,
    queries: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MockExecutor {
    /// Creates a new executor with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a successful result for queries containing `needle`.
    pub fn push_rows(&self, needle: &str, rows: Vec<Vec<Value>>) {
        self.push_result(needle, Ok(rows));
    }

    /// Appends an error for queries containing `needle`.
    pub fn push_error(&self, needle: &str, error: CollectError) {
        self.push_result(needle, Err(error));
    }

    /// Appends a result for queries containing `needle`.
    pub fn push_result(&self, needle: &str, result: QueryResult) {
        let mut scripts = lock(&self.scripts);
        match scripts.iter_mut().find(|s| s.needle == needle) {
            Some(script) => script.responses.push_back(result),
            None => scripts.push(Script {
                needle: needle.to_string(),
                responses: VecDeque::from([result]),
            }),
        }
    }

    /// Appends a result for the next `execute` call. Defaults to `Ok(1)`.
    pub fn push_execute_result(&self, result: Result<u64, CollectError>) {
        lock(&self.execute_results).push_back(result);
    }

    /// Makes every query sleep before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    /// Number of `query` calls so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Statements passed to `execute`, with their parameters.
    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.executed).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl QueryExecutor for MockExecutor {
    fn query(&self, sql: &str) -> QueryResult {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut scripts = lock(&self.scripts);
        let Some(script) = scripts.iter_mut().find(|s| sql.contains(&s.needle)) else {
            return Err(CollectError::Query {
                code: Some(1146),
                message: format!("no scripted result for: {}", sql.trim()),
            });
        };

        if script.responses.len() > 1 {
            script.responses.pop_front().unwrap_or(Ok(Vec::new()))
        } else {
            script.responses.front().cloned().unwrap_or(Ok(Vec::new()))
        }
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, CollectError> {
        lock(&self.executed).push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));
        lock(&self.execute_results).pop_front().unwrap_or(Ok(1))
    }
}
