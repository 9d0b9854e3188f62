//! # Redoubt
//!
//! Rule-based compliance evaluation engine for relational databases.
//!
//! Redoubt loads a catalog of STIG-style control definitions, evaluates each
//! control against a target database through a connector abstraction, and
//! aggregates the verdicts into a report with CLI-friendly exit semantics.
//!
//! ## Architecture
//!
//! - **[`catalog`]**: immutable control definitions (policy text, CCI/NIST
//!   tags, applicability rule, check procedure), loaded once per run
//! - **[`connector`]**: connect / query / disconnect abstraction over the
//!   target database; a sqlx PostgreSQL driver ships behind the `postgres`
//!   feature
//! - **[`context`]**: typed per-run configuration — connection parameters,
//!   organization-supplied allow-lists, applicability flags
//! - **[`executor`]**: evaluates one control to one [`Verdict`]; failures are
//!   contained per control and never abort the run
//! - **[`runner`]**: bounded worker pool with run-level cancellation
//! - **[`report`]**: order-independent fold of verdicts into summary counts
//!   and an exit status
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use redoubt::{Catalog, ExecutionContext, PgConnector, Runner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = Catalog::from_file("controls/stig_sqlserver2022_db.yml")?;
//!
//!     let ctx = ExecutionContext::from_env()?;
//!     ctx.validate_for(&catalog)?;
//!
//!     let connector = Arc::new(PgConnector::new(ctx.connector.clone()));
//!     let report = Runner::new(ctx, connector).run(&catalog).await;
//!
//!     println!("{}", report);
//!     std::process::exit(report.exit_status() as i32);
//! }
//! ```
//!
//! ## Verdict Semantics
//!
//! A connector or query failure yields `Error`, never `Fail` — a failed
//! connection is not evidence of a policy violation. Inapplicable controls
//! short-circuit to `NotApplicable` without issuing a query, and controls
//! without an automated procedure always yield `NeedsManualReview`.

pub mod catalog;
pub mod connector;
pub mod context;
pub mod executor;
pub mod report;
pub mod runner;
pub mod verdict;

mod parse;

// Re-exports
pub use catalog::{Catalog, CatalogError, Control, Severity};
pub use connector::{ConnectorConfig, ConnectorError, QueryOutput, Session, TargetConnector};
pub use context::{ContextError, ExecutionContext, ExecutionContextBuilder};
pub use executor::evaluate;
pub use parse::parse_duration;
pub use report::{Report, RunSummary};
pub use runner::Runner;
pub use verdict::{Outcome, Verdict};

#[cfg(feature = "postgres")]
pub use connector::PgConnector;
