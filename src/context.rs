//! Execution Context
//!
//! Runtime configuration for one evaluation run: connection parameters,
//! organization-supplied expected values (allow-lists), and the environment
//! flags applicability rules depend on. Immutable during a run.
//!
//! Inputs are a typed struct rather than a string-keyed lookup: every
//! recognized option is enumerated here, and a catalog that references an
//! input the operator did not supply fails at [`validate_for`] time, before
//! any query is issued.
//!
//! [`validate_for`]: ExecutionContext::validate_for

use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::{Catalog, CheckSpec, ContextFlag, ContextKey, Expected};
use crate::connector::ConnectorConfig;
use crate::parse::parse_duration;

/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on concurrently evaluating controls; database connection
/// limits are typically small.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Immutable per-run configuration.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Target connection parameters
    pub connector: ConnectorConfig,

    /// Principals authorized to own or access database objects
    pub authorized_principals: Option<BTreeSet<String>>,

    /// Principals authorized to maintain audit specifications
    pub authorized_audit_maintainers: Option<BTreeSet<String>>,

    /// SQL audit is required at the database level
    pub audit_at_database_level_required: bool,

    /// Encryption of data at rest is required
    pub encryption_required: bool,

    /// Security labeling requirements have been specified
    pub security_labeling_required: bool,

    /// Per-query timeout; a timed-out query yields an `Error` verdict
    pub query_timeout: Duration,

    /// Bound on concurrently evaluating controls
    pub max_concurrency: usize,
}

impl ExecutionContext {
    /// Create a context with default limits and no supplied expected values.
    pub fn new(connector: ConnectorConfig) -> Self {
        Self {
            connector,
            authorized_principals: None,
            authorized_audit_maintainers: None,
            audit_at_database_level_required: false,
            encryption_required: false,
            security_labeling_required: false,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Create a builder.
    pub fn builder(connector: ConnectorConfig) -> ExecutionContextBuilder {
        ExecutionContextBuilder {
            context: Self::new(connector),
        }
    }

    /// Load context values from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REDOUBT_DB_*`: connection parameters (see [`ConnectorConfig::from_env`])
    /// - `REDOUBT_AUTHORIZED_PRINCIPALS`: comma-separated allow-list
    /// - `REDOUBT_AUTHORIZED_AUDIT_MAINTAINERS`: comma-separated allow-list
    /// - `REDOUBT_AUDIT_AT_DATABASE_LEVEL_REQUIRED`: "true"/"false" (default: false)
    /// - `REDOUBT_ENCRYPTION_REQUIRED`: "true"/"false" (default: false)
    /// - `REDOUBT_SECURITY_LABELING_REQUIRED`: "true"/"false" (default: false)
    /// - `REDOUBT_QUERY_TIMEOUT`: e.g. "30s" (default: 30s)
    /// - `REDOUBT_MAX_CONCURRENCY`: worker bound (default: 4)
    pub fn from_env() -> Result<Self, ContextError> {
        let connector = ConnectorConfig::from_env()
            .map_err(|e| ContextError::Connector(e.to_string()))?;

        let flag = |var: &str| {
            std::env::var(var)
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false)
        };
        let list = |var: &str| {
            std::env::var(var).ok().map(|s| {
                s.split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect::<BTreeSet<String>>()
            })
        };

        let query_timeout = std::env::var("REDOUBT_QUERY_TIMEOUT")
            .map(|s| parse_duration(&s))
            .unwrap_or(DEFAULT_QUERY_TIMEOUT);
        let max_concurrency = std::env::var("REDOUBT_MAX_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENCY);

        Ok(Self {
            connector,
            authorized_principals: list("REDOUBT_AUTHORIZED_PRINCIPALS"),
            authorized_audit_maintainers: list("REDOUBT_AUTHORIZED_AUDIT_MAINTAINERS"),
            audit_at_database_level_required: flag("REDOUBT_AUDIT_AT_DATABASE_LEVEL_REQUIRED"),
            encryption_required: flag("REDOUBT_ENCRYPTION_REQUIRED"),
            security_labeling_required: flag("REDOUBT_SECURITY_LABELING_REQUIRED"),
            query_timeout,
            max_concurrency,
        })
    }

    /// Resolve an applicability flag.
    pub fn flag(&self, flag: ContextFlag) -> bool {
        match flag {
            ContextFlag::AuditAtDatabaseLevelRequired => self.audit_at_database_level_required,
            ContextFlag::EncryptionRequired => self.encryption_required,
            ContextFlag::SecurityLabelingRequired => self.security_labeling_required,
        }
    }

    /// Resolve an operator-supplied expected value set, if supplied.
    pub fn expected_values(&self, key: ContextKey) -> Option<&BTreeSet<String>> {
        match key {
            ContextKey::AuthorizedPrincipals => self.authorized_principals.as_ref(),
            ContextKey::AuthorizedAuditMaintainers => self.authorized_audit_maintainers.as_ref(),
        }
    }

    /// Fail fast if the catalog references a context input that was not
    /// supplied for this run.
    pub fn validate_for(&self, catalog: &Catalog) -> Result<(), ContextError> {
        for control in catalog.controls() {
            if let CheckSpec::QueryCompare {
                expected: Some(Expected::FromContext(key)),
                ..
            } = &control.check
            {
                if self.expected_values(*key).is_none() {
                    return Err(ContextError::MissingInput {
                        control: control.id.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`ExecutionContext`]
#[derive(Debug, Clone)]
pub struct ExecutionContextBuilder {
    context: ExecutionContext,
}

impl ExecutionContextBuilder {
    /// Supply the authorized principals allow-list
    pub fn authorized_principals<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.authorized_principals =
            Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Supply the authorized audit maintainers allow-list
    pub fn authorized_audit_maintainers<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.authorized_audit_maintainers =
            Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Require database-level SQL audit
    pub fn audit_at_database_level_required(mut self, required: bool) -> Self {
        self.context.audit_at_database_level_required = required;
        self
    }

    /// Require encryption of data at rest
    pub fn encryption_required(mut self, required: bool) -> Self {
        self.context.encryption_required = required;
        self
    }

    /// Specify security labeling requirements
    pub fn security_labeling_required(mut self, required: bool) -> Self {
        self.context.security_labeling_required = required;
        self
    }

    /// Set the per-query timeout
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.context.query_timeout = timeout;
        self
    }

    /// Set the bound on concurrently evaluating controls
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.context.max_concurrency = limit.max(1);
        self
    }

    /// Build the context
    pub fn build(self) -> ExecutionContext {
        self.context
    }
}

/// Context construction and validation errors. Fatal to the run.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Connection parameters missing or invalid
    #[error("connector configuration: {0}")]
    Connector(String),

    /// A control references an input the operator did not supply
    #[error("control {control} requires context input '{key}' which was not supplied")]
    MissingInput { control: String, key: String },
}
