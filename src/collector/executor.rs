//! MySQL-backed query executor.
//!
//! Connects using the standard MySQL client environment variables:
//! - `MYSQL_HOST` (default: localhost)
//! - `MYSQL_TCP_PORT` (default: 3306)
//! - `MYSQL_USER` (default: $USER)
//! - `MYSQL_PWD` (default: empty)
//!
//! The default schema is `performance_schema`. Every connection carries
//! read/write/connect timeouts equal to the fetch budget, so a stuck server
//! turns into a `Timeout` error instead of a hung worker.

use std::io;
use std::time::Duration;

use mysql::prelude::Queryable;
use mysql::{Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts};
use tracing::debug;

use super::CollectError;
use super::traits::{QueryExecutor, Value};

/// Connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionConfig {
    /// Reads connection parameters from the environment.
    ///
    /// Uses $USER as default if MYSQL_USER is not set.
    pub fn from_env() -> Result<Self, CollectError> {
        let user = std::env::var("MYSQL_USER")
            .or_else(|_| std::env::var("USER"))
            .map_err(|_| CollectError::Connection("MYSQL_USER or USER not set".to_string()))?;

        let host = std::env::var("MYSQL_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = match std::env::var("MYSQL_TCP_PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|_| CollectError::Connection(format!("invalid MYSQL_TCP_PORT '{}'", p)))?,
            Err(_) => 3306,
        };
        let password = std::env::var("MYSQL_PWD").unwrap_or_default();

        Ok(Self {
            host,
            port,
            user,
            password,
            database: "performance_schema".to_string(),
        })
    }

    /// `user@host:port`, safe to log.
    pub fn describe(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Executor backed by a small `mysql` connection pool.
///
/// The pool is shared by all source workers; each query borrows one
/// connection for its duration.
#[derive(Clone)]
pub struct MysqlExecutor {
    pool: Pool,
    budget: Duration,
}

impl MysqlExecutor {
    /// Opens a pool against the configured server.
    ///
    /// `max_connections` should cover one connection per concurrently
    /// polled source.
    pub fn connect(
        config: &ConnectionConfig,
        budget: Duration,
        max_connections: usize,
    ) -> Result<Self, CollectError> {
        let constraints = PoolConstraints::new(1, max_connections.max(1))
            .ok_or_else(|| CollectError::Connection("invalid pool size".to_string()))?;

        let mut builder = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .db_name(Some(config.database.clone()))
            .read_timeout(Some(budget))
            .write_timeout(Some(budget))
            .tcp_connect_timeout(Some(budget))
            .pool_opts(PoolOpts::default().with_constraints(constraints));
        if !config.password.is_empty() {
            builder = builder.pass(Some(config.password.clone()));
        }

        let pool = Pool::new(Opts::from(builder)).map_err(|e| map_mysql_error(e, budget))?;
        debug!("connected to {}", config.describe());

        Ok(Self { pool, budget })
    }

    fn conn(&self) -> Result<mysql::PooledConn, CollectError> {
        self.pool
            .get_conn()
            .map_err(|e| map_mysql_error(e, self.budget))
    }
}

impl QueryExecutor for MysqlExecutor {
    fn query(&self, sql: &str) -> Result<Vec<Vec<Value>>, CollectError> {
        let mut conn = self.conn()?;
        let rows: Vec<mysql::Row> = conn
            .query(sql)
            .map_err(|e| map_mysql_error(e, self.budget))?;

        Ok(rows
            .into_iter()
            .map(|row| row.unwrap().into_iter().map(convert_value).collect())
            .collect())
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, CollectError> {
        let mut conn = self.conn()?;
        let params = if params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(params.iter().map(|p| mysql::Value::from(*p)).collect())
        };
        conn.exec_drop(sql, params)
            .map_err(|e| map_mysql_error(e, self.budget))?;
        Ok(conn.affected_rows())
    }
}

fn convert_value(value: mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        mysql::Value::Int(v) => Value::Int(v),
        mysql::Value::UInt(v) => Value::UInt(v),
        mysql::Value::Float(v) => Value::Float(f64::from(v)),
        mysql::Value::Double(v) => Value::Float(v),
        other => Value::Text(other.as_sql(true)),
    }
}

/// Maps a driver error onto the collection error taxonomy.
fn map_mysql_error(e: mysql::Error, budget: Duration) -> CollectError {
    match e {
        mysql::Error::MySqlError(err) => CollectError::Query {
            code: Some(err.code),
            message: err.message,
        },
        mysql::Error::IoError(err)
            if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
        {
            CollectError::Timeout(budget)
        }
        mysql::Error::IoError(err) => CollectError::Connection(format_io_error(&err)),
        mysql::Error::DriverError(err) => CollectError::Connection(err.to_string()),
        other => CollectError::Query {
            code: None,
            message: other.to_string(),
        },
    }
}

/// Formats I/O errors for display.
fn format_io_error(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => "connection refused".to_string(),
        io::ErrorKind::ConnectionReset => "connection reset by server".to_string(),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_value_maps_text_protocol_bytes() {
        assert_eq!(
            convert_value(mysql::Value::Bytes(b"12345".to_vec())),
            Value::Text("12345".to_string())
        );
        assert_eq!(convert_value(mysql::Value::NULL), Value::Null);
        assert_eq!(convert_value(mysql::Value::UInt(9)), Value::UInt(9));
    }

    #[test]
    fn io_timeout_maps_to_timeout() {
        let budget = Duration::from_secs(2);
        let err = mysql::Error::IoError(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(map_mysql_error(err, budget), CollectError::Timeout(budget));

        let err = mysql::Error::IoError(io::Error::new(io::ErrorKind::ConnectionRefused, "x"));
        assert_eq!(
            map_mysql_error(err, budget),
            CollectError::Connection("connection refused".to_string())
        );
    }

    #[test]
    fn describe_hides_password() {
        let config = ConnectionConfig {
            host: "db1".to_string(),
            port: 3307,
            user: "monitor".to_string(),
            password: "secret".to_string(),
            database: "performance_schema".to_string(),
        };
        assert_eq!(config.describe(), "monitor@db1:3307");
        assert!(!config.describe().contains("secret"));
    }
}
