//! Check Executor
//!
//! Evaluates one control against the target: resolves applicability, runs the
//! automated check (or yields "needs manual review"), and produces exactly one
//! [`Verdict`]. Connector failures are contained here — they surface as
//! `Error` verdicts and never abort the rest of the run.

use std::collections::BTreeSet;

use tracing::debug;

use crate::catalog::{Applicability, CheckSpec, Compare, Control, Expected};
use crate::connector::{ConnectorError, QueryOutput, TargetConnector};
use crate::context::ExecutionContext;
use crate::verdict::{Outcome, Verdict};

/// Evaluate one control and produce its verdict.
///
/// The session acquired for an automated check is released on every exit
/// path, including query failure and timeout.
pub async fn evaluate(
    control: &Control,
    ctx: &ExecutionContext,
    connector: &dyn TargetConnector,
) -> Verdict {
    // Inapplicable controls short-circuit before any connection is made.
    if let Applicability::RequiresFlag(flag) = control.applicability {
        if !ctx.flag(flag) {
            debug!(control = %control.id, %flag, "Control not applicable");
            return Verdict::new(control, Outcome::NotApplicable)
                .with_message(format!("requires {}", flag));
        }
    }

    let verdict = match &control.check {
        CheckSpec::Manual { instructions } => {
            Verdict::new(control, Outcome::NeedsManualReview).with_message(instructions.clone())
        }
        CheckSpec::QueryCompare {
            query,
            column,
            compare,
            expected,
        } => run_query_compare(control, ctx, connector, query, column, *compare, expected).await,
    };

    debug!(control = %control.id, outcome = %verdict.outcome, "Control evaluated");
    verdict
}

async fn run_query_compare(
    control: &Control,
    ctx: &ExecutionContext,
    connector: &dyn TargetConnector,
    query: &str,
    column: &str,
    compare: Compare,
    expected: &Option<Expected>,
) -> Verdict {
    // Resolve the expected value before spending a connection on the query.
    let expected = match resolve_expected(ctx, compare, expected) {
        Ok(expected) => expected,
        Err(message) => return Verdict::error(control, message),
    };

    let mut session = match connector.connect().await {
        Ok(session) => session,
        Err(e) => return Verdict::error(control, e.to_string()),
    };

    let result = tokio::time::timeout(ctx.query_timeout, session.query(query)).await;
    session.close().await;

    let output = match result {
        Err(_) => {
            let e = ConnectorError::Timeout(ctx.query_timeout);
            return Verdict::error(control, e.to_string());
        }
        Ok(Err(e)) => return Verdict::error(control, e.to_string()),
        Ok(Ok(output)) => output,
    };

    apply_compare(control, &output, column, compare, expected)
}

/// Expected value after context resolution.
enum Resolved {
    /// No expected value (the `Empty` operator)
    None,
    /// A single scalar
    Scalar(String),
    /// An unordered, de-duplicated value set
    Set(BTreeSet<String>),
}

fn resolve_expected(
    ctx: &ExecutionContext,
    compare: Compare,
    expected: &Option<Expected>,
) -> Result<Resolved, String> {
    if !compare.needs_expected() {
        return Ok(Resolved::None);
    }

    let expected = expected
        .as_ref()
        .ok_or_else(|| "comparison requires an expected value".to_string())?;

    let resolved = match expected {
        Expected::Value(v) => Resolved::Scalar(v.clone()),
        Expected::Values(vs) => Resolved::Set(vs.iter().cloned().collect()),
        Expected::FromContext(key) => match ctx.expected_values(*key) {
            Some(values) => Resolved::Set(values.clone()),
            None => return Err(format!("context input '{}' was not supplied", key)),
        },
    };
    Ok(resolved)
}

fn apply_compare(
    control: &Control,
    output: &QueryOutput,
    column: &str,
    compare: Compare,
    expected: Resolved,
) -> Verdict {
    // Zero rows means there is nothing to extract; for set comparisons this
    // is the empty set, not an error.
    let actual: Vec<String> = if output.is_empty() {
        Vec::new()
    } else {
        match output.column_values(column) {
            Some(values) => values,
            None => {
                return Verdict::error(
                    control,
                    format!("result has no column named '{}'", column),
                )
            }
        }
    };

    match (compare, expected) {
        (Compare::Empty, _) => {
            if output.is_empty() {
                Verdict::new(control, Outcome::Pass)
            } else {
                Verdict::new(control, Outcome::Fail)
                    .with_message(format!("query returned {} row(s)", output.row_count()))
            }
        }

        (Compare::Equals, expected) => {
            let expected = match scalar_of(expected) {
                Ok(v) => v,
                Err(message) => return Verdict::error(control, message),
            };
            if actual.is_empty() {
                return Verdict::error(control, "query returned no rows for scalar comparison");
            }
            if actual.iter().all(|v| v.trim() == expected.trim()) {
                Verdict::new(control, Outcome::Pass)
            } else {
                Verdict::new(control, Outcome::Fail)
                    .with_message(format!("expected '{}', got: {}", expected, actual.join(", ")))
            }
        }

        (Compare::SetEquals, expected) => {
            let expected = set_of(expected);
            let actual: BTreeSet<String> = actual.into_iter().collect();
            if actual == expected {
                Verdict::new(control, Outcome::Pass)
            } else {
                let unexpected: Vec<&str> = actual
                    .difference(&expected)
                    .map(|s| s.as_str())
                    .collect();
                let missing: Vec<&str> = expected
                    .difference(&actual)
                    .map(|s| s.as_str())
                    .collect();
                Verdict::new(control, Outcome::Fail).with_message(format!(
                    "unexpected: [{}]; missing: [{}]",
                    unexpected.join(", "),
                    missing.join(", ")
                ))
            }
        }

        (Compare::SubsetOf, expected) => {
            let expected = set_of(expected);
            let actual: BTreeSet<String> = actual.into_iter().collect();
            let unauthorized: Vec<&str> = actual
                .difference(&expected)
                .map(|s| s.as_str())
                .collect();
            if unauthorized.is_empty() {
                Verdict::new(control, Outcome::Pass)
            } else {
                Verdict::new(control, Outcome::Fail)
                    .with_message(format!("unauthorized: [{}]", unauthorized.join(", ")))
            }
        }
    }
}

fn scalar_of(resolved: Resolved) -> Result<String, String> {
    match resolved {
        Resolved::Scalar(v) => Ok(v),
        Resolved::Set(set) if set.len() == 1 => {
            Ok(set.into_iter().next().unwrap_or_default())
        }
        Resolved::Set(set) => Err(format!(
            "scalar comparison needs a single expected value, got {}",
            set.len()
        )),
        Resolved::None => Err("scalar comparison needs an expected value".to_string()),
    }
}

fn set_of(resolved: Resolved) -> BTreeSet<String> {
    match resolved {
        Resolved::Scalar(v) => std::iter::once(v).collect(),
        Resolved::Set(set) => set,
        Resolved::None => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::catalog::{
        Applicability, CheckSpec, Compare, ContextFlag, ContextKey, Control, Expected, Severity,
    };
    use crate::connector::{ConnectorConfig, ConnectorError, Session};

    /// Connector that serves a fixed result and records whether it was used.
    struct StubConnector {
        output: QueryOutput,
        queried: Arc<AtomicBool>,
    }

    impl StubConnector {
        fn new(output: QueryOutput) -> Self {
            Self {
                output,
                queried: Arc::new(AtomicBool::new(false)),
            }
        }

        fn rows(column: &str, values: &[&str]) -> Self {
            let mut output = QueryOutput::new(vec![column.to_string()]);
            for v in values {
                output.push_row(vec![v.to_string()]);
            }
            Self::new(output)
        }
    }

    #[async_trait]
    impl TargetConnector for StubConnector {
        async fn connect(&self) -> Result<Box<dyn Session>, ConnectorError> {
            Ok(Box::new(StubSession {
                output: self.output.clone(),
                queried: Arc::clone(&self.queried),
            }))
        }
    }

    struct StubSession {
        output: QueryOutput,
        queried: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Session for StubSession {
        async fn query(&mut self, _sql: &str) -> Result<QueryOutput, ConnectorError> {
            self.queried.store(true, Ordering::SeqCst);
            Ok(self.output.clone())
        }

        async fn close(self: Box<Self>) {}
    }

    /// Connector whose connect always fails.
    struct UnreachableConnector;

    #[async_trait]
    impl TargetConnector for UnreachableConnector {
        async fn connect(&self) -> Result<Box<dyn Session>, ConnectorError> {
            Err(ConnectorError::Connection("host unreachable".to_string()))
        }
    }

    fn manual_control() -> Control {
        Control {
            id: "SV-M".to_string(),
            severity: Severity::High,
            title: "manual".to_string(),
            discussion: None,
            check_text: None,
            fix_text: None,
            tags: Default::default(),
            applicability: Applicability::Always,
            check: CheckSpec::Manual {
                instructions: "Review the system documentation.".to_string(),
            },
        }
    }

    fn query_control(compare: Compare, expected: Option<Expected>) -> Control {
        Control {
            id: "SV-Q".to_string(),
            severity: Severity::Medium,
            title: "automated".to_string(),
            discussion: None,
            check_text: None,
            fix_text: None,
            tags: Default::default(),
            applicability: Applicability::Always,
            check: CheckSpec::QueryCompare {
                query: "SELECT name FROM sys.database_principals".to_string(),
                column: "name".to_string(),
                compare,
                expected,
            },
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::builder(ConnectorConfig::default())
            .authorized_audit_maintainers(["alice", "bob"])
            .build()
    }

    #[tokio::test]
    async fn test_manual_always_needs_review() {
        let connector = StubConnector::rows("name", &["whatever"]);
        let verdict = evaluate(&manual_control(), &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::NeedsManualReview);
        assert_eq!(
            verdict.message.as_deref(),
            Some("Review the system documentation.")
        );
        // No automated judgment is made, so no query is issued.
        assert!(!connector.queried.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_inapplicable_control_skips_connector() {
        let mut control = query_control(
            Compare::SetEquals,
            Some(Expected::FromContext(ContextKey::AuthorizedAuditMaintainers)),
        );
        control.applicability =
            Applicability::RequiresFlag(ContextFlag::AuditAtDatabaseLevelRequired);

        let connector = StubConnector::rows("name", &["alice"]);
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::NotApplicable);
        assert!(!connector.queried.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_set_equals_is_order_insensitive() {
        let control = query_control(
            Compare::SetEquals,
            Some(Expected::Values(vec!["bob".to_string(), "alice".to_string()])),
        );
        let connector = StubConnector::rows("name", &["alice", "bob"]);
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_set_equals_deduplicates_actual() {
        let control = query_control(
            Compare::SetEquals,
            Some(Expected::Values(vec!["alice".to_string()])),
        );
        let connector = StubConnector::rows("name", &["alice", "alice", "alice"]);
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_set_equals_reports_offending_values() {
        let control = query_control(
            Compare::SetEquals,
            Some(Expected::FromContext(ContextKey::AuthorizedAuditMaintainers)),
        );
        let connector = StubConnector::rows("name", &["alice", "mallory"]);
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Fail);
        let message = verdict.message.unwrap();
        assert!(message.contains("mallory"));
        assert!(message.contains("bob"));
    }

    #[tokio::test]
    async fn test_subset_of_flags_unauthorized() {
        let control = query_control(
            Compare::SubsetOf,
            Some(Expected::Values(vec!["admin".to_string()])),
        );
        let connector = StubConnector::rows("name", &["admin", "guest"]);
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Fail);
        assert!(verdict.message.unwrap().contains("guest"));
    }

    #[tokio::test]
    async fn test_empty_result_passes_empty_compare() {
        let control = query_control(Compare::Empty, None);
        let connector = StubConnector::new(QueryOutput::new(vec!["name".to_string()]));
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_empty_result_is_empty_set_not_error() {
        let control = query_control(
            Compare::SubsetOf,
            Some(Expected::Values(vec!["admin".to_string()])),
        );
        let connector = StubConnector::new(QueryOutput::default());
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_scalar_equals() {
        let control = query_control(
            Compare::Equals,
            Some(Expected::Value("0".to_string())),
        );
        let connector = StubConnector::rows("count_of_ids", &["0"]);
        let mut control_col = control.clone();
        if let CheckSpec::QueryCompare { ref mut column, .. } = control_col.check {
            *column = "count_of_ids".to_string();
        }
        let verdict = evaluate(&control_col, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Pass);

        let connector = StubConnector::rows("count_of_ids", &["3"]);
        let verdict = evaluate(&control_col, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Fail);
        assert!(verdict.message.unwrap().contains("3"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_error_not_fail() {
        let control = query_control(
            Compare::SetEquals,
            Some(Expected::Values(vec!["alice".to_string()])),
        );
        let verdict = evaluate(&control, &ctx(), &UnreachableConnector).await;
        assert_eq!(verdict.outcome, Outcome::Error);
        assert!(!verdict.message.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_context_input_is_error() {
        let control = query_control(
            Compare::SubsetOf,
            Some(Expected::FromContext(ContextKey::AuthorizedPrincipals)),
        );
        let connector = StubConnector::rows("name", &["dbo"]);
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Error);
        assert!(verdict
            .message
            .unwrap()
            .contains("authorized_principals"));
        // Resolution happens before any connection is spent.
        assert!(!connector.queried.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_column_is_error() {
        let control = query_control(
            Compare::SetEquals,
            Some(Expected::Values(vec!["alice".to_string()])),
        );
        let connector = StubConnector::rows("wrong_column", &["alice"]);
        let verdict = evaluate(&control, &ctx(), &connector).await;
        assert_eq!(verdict.outcome, Outcome::Error);
        assert!(verdict.message.unwrap().contains("name"));
    }
}
