//! Abstraction over the SQL client.
//!
//! The `QueryExecutor` trait allows sources to run against a real MySQL
//! server or a scripted mock for tests.

use super::CollectError;

/// A single column value as returned by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Interprets the value as a non-negative counter.
    ///
    /// Text is accepted because the text protocol returns every column as a
    /// string, and `SUM()` over unsigned columns yields `DECIMAL` (`"123"` or
    /// `"123.0000"`). Negative or non-numeric values return `None`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Float(v) if v.is_finite() && *v >= 0.0 => Some(*v as u64),
            Value::Float(_) => None,
            Value::Text(s) => parse_unsigned(s),
            Value::Null => None,
        }
    }

    /// Interprets the value as text; numbers are rendered in decimal.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Int(v) => Some(v.to_string()),
            Value::UInt(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

fn parse_unsigned(s: &str) -> Option<u64> {
    let s = s.trim();
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    if let Some(frac) = frac_part
        && !frac.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    int_part.parse::<u64>().ok()
}

/// Executes SQL against the monitored server.
///
/// Implementations must be shareable between source worker threads.
pub trait QueryExecutor: Send + Sync {
    /// Runs a query and returns all rows as column vectors.
    fn query(&self, sql: &str) -> Result<Vec<Vec<Value>>, CollectError>;

    /// Runs a statement with positional text parameters, returning the
    /// number of affected rows.
    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, CollectError>;
}
