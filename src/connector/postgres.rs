//! PostgreSQL connector (sqlx)
//!
//! One dedicated connection per session rather than a shared pool: sessions
//! belong to a single control evaluation and concurrency is bounded by the
//! runner, so pooling would only hide the connection lifecycle the engine is
//! required to manage deterministically.

use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column, ConnectOptions, Connection, Row};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ConnectorConfig, ConnectorError, QueryOutput, Session, TargetConnector};

/// sqlx-backed PostgreSQL connector.
pub struct PgConnector {
    config: ConnectorConfig,
}

impl PgConnector {
    /// Create a connector from connection parameters.
    pub fn new(config: ConnectorConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&self.config.username)
            .password(&self.config.password)
            .ssl_mode(PgSslMode::Prefer)
            .application_name("redoubt")
    }
}

#[async_trait]
impl TargetConnector for PgConnector {
    async fn connect(&self) -> Result<Box<dyn Session>, ConnectorError> {
        debug!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            user = %self.config.username,
            "Opening database session"
        );

        let options = self.options();
        let conn = tokio::time::timeout(self.config.connect_timeout, options.connect())
            .await
            .map_err(|_| ConnectorError::Timeout(self.config.connect_timeout))?
            .map_err(map_connect_error)?;

        Ok(Box::new(PgSession { conn }))
    }
}

struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl Session for PgSession {
    async fn query(&mut self, sql: &str) -> Result<QueryOutput, ConnectorError> {
        let rows: Vec<PgRow> = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| ConnectorError::Query(e.to_string()))?;

        let columns = match rows.first() {
            Some(row) => row
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            None => Vec::new(),
        };

        let mut output = QueryOutput::new(columns);
        for row in &rows {
            let values = (0..row.columns().len())
                .map(|i| decode_column(row, i))
                .collect();
            output.push_row(values);
        }
        Ok(output)
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.close().await {
            warn!(error = %e, "Session close failed");
        }
    }
}

/// Decode a column value to its string form, whatever its SQL type.
fn decode_column(row: &PgRow, index: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return v.to_string();
    }
    warn!(column = index, "Unsupported column type, treating as empty");
    String::new()
}

fn map_connect_error(e: sqlx::Error) -> ConnectorError {
    match &e {
        // Class 28 is invalid authorization
        sqlx::Error::Database(db) if db.code().map(|c| c.starts_with("28")).unwrap_or(false) => {
            ConnectorError::Auth(e.to_string())
        }
        _ => ConnectorError::Connection(e.to_string()),
    }
}
