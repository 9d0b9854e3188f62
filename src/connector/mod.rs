//! Target Connector
//!
//! Abstraction over a database connection: connect, run query, disconnect.
//! The engine issues opaque query strings through this interface and never
//! interprets them; drivers for specific engines implement [`TargetConnector`].
//!
//! Sessions are short-lived: one control evaluation acquires a session, runs
//! its query, and releases the session on every exit path. Retry policy, if
//! any, belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::parse::parse_duration;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PgConnector;

/// A factory for database sessions.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    /// Open a session against the target database.
    async fn connect(&self) -> Result<Box<dyn Session>, ConnectorError>;
}

/// An open database session.
///
/// Dropping a session must release the underlying connection; [`close`] is
/// the graceful form and is called by the engine on normal paths.
///
/// [`close`]: Session::close
#[async_trait]
pub trait Session: Send {
    /// Run a query and return its tabular result.
    ///
    /// Does not retry. A malformed query or permission denial surfaces as
    /// [`ConnectorError::Query`].
    async fn query(&mut self, sql: &str) -> Result<QueryOutput, ConnectorError>;

    /// Release the session gracefully.
    async fn close(self: Box<Self>);
}

/// Tabular query result.
///
/// All values are carried as strings; comparison semantics live in the
/// executor, not here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutput {
    /// Column names, in result order
    pub columns: Vec<String>,

    /// Rows, each aligned with `columns`
    pub rows: Vec<Vec<String>>,
}

impl QueryOutput {
    /// Create an empty result with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. The row must align with the column list.
    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of the named column, in row order. Column lookup is
    /// case-insensitive. Returns `None` if the column does not exist.
    pub fn column_values(&self, name: &str) -> Option<Vec<String>> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))?;
        Some(self.rows.iter().map(|row| row[index].clone()).collect())
    }

    /// The single value of a one-row, one-column result
    pub fn scalar(&self) -> Option<&str> {
        match (&self.rows[..], &self.columns[..]) {
            ([row], [_]) => row.first().map(|s| s.as_str()),
            _ => None,
        }
    }
}

/// Connector failures.
///
/// These describe infrastructure problems, never policy violations; the
/// executor maps them to `Error` verdicts, distinct from `Fail`.
#[derive(Debug)]
pub enum ConnectorError {
    /// Invalid connection parameters
    Configuration(String),
    /// Target unreachable or protocol failure
    Connection(String),
    /// Authentication rejected
    Auth(String),
    /// Query rejected by the target (malformed SQL, permission denied)
    Query(String),
    /// Query did not complete within the allotted time
    Timeout(Duration),
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "connector configuration error: {}", msg),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Auth(msg) => write!(f, "authentication error: {}", msg),
            Self::Query(msg) => write!(f, "query error: {}", msg),
            Self::Timeout(limit) => write!(f, "query timed out after {:?}", limit),
        }
    }
}

impl std::error::Error for ConnectorError {}

/// Connection parameters for a target database.
///
/// Credentials come from external configuration, never from the catalog.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Target host
    pub host: String,

    /// Target port
    pub port: u16,

    /// Database name to evaluate
    pub database: String,

    /// Named instance, where the engine distinguishes instances
    pub instance: Option<String>,

    /// Login user
    pub username: String,

    /// Login password
    pub password: String,

    /// Time allowed for connection establishment
    pub connect_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: String::new(),
            instance: None,
            username: String::new(),
            password: String::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ConnectorConfig {
    /// Load connection parameters from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REDOUBT_DB_HOST`: target host (default: "localhost")
    /// - `REDOUBT_DB_PORT`: target port (default: 5432)
    /// - `REDOUBT_DB_NAME`: database name (required)
    /// - `REDOUBT_DB_INSTANCE`: named instance (optional)
    /// - `REDOUBT_DB_USER`: login user (required)
    /// - `REDOUBT_DB_PASSWORD`: login password (required)
    /// - `REDOUBT_DB_CONNECT_TIMEOUT`: e.g. "10s" (default: 10s)
    pub fn from_env() -> Result<Self, ConnectorError> {
        let require = |var: &str| {
            std::env::var(var)
                .map_err(|_| ConnectorError::Configuration(format!("{} must be set", var)))
        };

        let host = std::env::var("REDOUBT_DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("REDOUBT_DB_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5432);
        let connect_timeout = std::env::var("REDOUBT_DB_CONNECT_TIMEOUT")
            .map(|s| parse_duration(&s))
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            host,
            port,
            database: require("REDOUBT_DB_NAME")?,
            instance: std::env::var("REDOUBT_DB_INSTANCE").ok(),
            username: require("REDOUBT_DB_USER")?,
            password: require("REDOUBT_DB_PASSWORD")?,
            connect_timeout,
        })
    }

    /// Create a builder for programmatic configuration.
    pub fn builder(database: impl Into<String>) -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::new(database)
    }
}

/// Builder for [`ConnectorConfig`]
#[derive(Debug, Clone)]
pub struct ConnectorConfigBuilder {
    config: ConnectorConfig,
}

impl ConnectorConfigBuilder {
    /// Create a new builder targeting the given database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            config: ConnectorConfig {
                database: database.into(),
                ..Default::default()
            },
        }
    }

    /// Set the target host (default: "localhost")
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the target port (default: 5432)
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the named instance
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.config.instance = Some(instance.into());
        self
    }

    /// Set login credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output() -> QueryOutput {
        let mut out = QueryOutput::new(vec!["role member".to_string(), "role name".to_string()]);
        out.push_row(vec!["alice".to_string(), "db_owner".to_string()]);
        out.push_row(vec!["bob".to_string(), "db_owner".to_string()]);
        out
    }

    #[test]
    fn test_column_values_case_insensitive() {
        let out = sample_output();
        assert_eq!(
            out.column_values("ROLE MEMBER"),
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
        assert!(out.column_values("missing").is_none());
    }

    #[test]
    fn test_scalar() {
        let mut out = QueryOutput::new(vec!["count_of_ids".to_string()]);
        out.push_row(vec!["0".to_string()]);
        assert_eq!(out.scalar(), Some("0"));

        assert_eq!(sample_output().scalar(), None);
        assert_eq!(QueryOutput::default().scalar(), None);
    }

    #[test]
    fn test_empty_output() {
        let out = QueryOutput::new(vec!["name".to_string()]);
        assert!(out.is_empty());
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.column_values("name"), Some(vec![]));
    }

    #[test]
    fn test_builder() {
        let config = ConnectorConfig::builder("appdb")
            .host("db.internal")
            .port(5433)
            .instance("main")
            .credentials("auditor", "secret")
            .connect_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5433);
        assert_eq!(config.database, "appdb");
        assert_eq!(config.instance.as_deref(), Some("main"));
        assert_eq!(config.username, "auditor");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }
}
