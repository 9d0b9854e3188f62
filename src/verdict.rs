//! Verdicts
//!
//! The outcome of evaluating one control in one run. Severity is carried from
//! the control for reporting; it never alters the outcome.

use serde::{Deserialize, Serialize};

use crate::catalog::{Control, Severity};

/// Outcome of one control evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The check ran and the target is compliant
    Pass,
    /// The check ran and found a policy violation
    Fail,
    /// The control does not apply in this environment; no query was issued
    NotApplicable,
    /// The control has no automated procedure
    NeedsManualReview,
    /// Evaluation could not complete (connection, query, or input failure).
    /// Not evidence of a policy violation.
    Error,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::NotApplicable => write!(f, "not_applicable"),
            Self::NeedsManualReview => write!(f, "needs_manual_review"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The resolved outcome of one control in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Identifier of the control this verdict resolves
    pub control_id: String,

    /// Severity carried from the control
    pub severity: Severity,

    /// Evaluation outcome
    pub outcome: Outcome,

    /// Offending actual values, manual instructions, or failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Verdict {
    /// Create a verdict for a control.
    pub fn new(control: &Control, outcome: Outcome) -> Self {
        Self {
            control_id: control.id.clone(),
            severity: control.severity,
            outcome,
            message: None,
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Shorthand for an `Error` verdict with a message.
    pub fn error(control: &Control, message: impl Into<String>) -> Self {
        Self::new(control, Outcome::Error).with_message(message)
    }

    /// Whether this verdict counts against the run's exit status
    pub fn is_adverse(&self) -> bool {
        matches!(self.outcome, Outcome::Fail | Outcome::Error)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.control_id, self.severity.category(), self.outcome)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {}", msg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CheckSpec, Control};

    fn control(id: &str, severity: Severity) -> Control {
        Control {
            id: id.to_string(),
            severity,
            title: "t".to_string(),
            discussion: None,
            check_text: None,
            fix_text: None,
            tags: Default::default(),
            applicability: Default::default(),
            check: CheckSpec::Manual {
                instructions: "i".to_string(),
            },
        }
    }

    #[test]
    fn test_verdict_carries_control_identity() {
        let c = control("SV-1", Severity::High);
        let v = Verdict::new(&c, Outcome::Pass);
        assert_eq!(v.control_id, "SV-1");
        assert_eq!(v.severity, Severity::High);
        assert!(!v.is_adverse());
    }

    #[test]
    fn test_adverse_outcomes() {
        let c = control("SV-1", Severity::Low);
        assert!(Verdict::new(&c, Outcome::Fail).is_adverse());
        assert!(Verdict::error(&c, "boom").is_adverse());
        assert!(!Verdict::new(&c, Outcome::NotApplicable).is_adverse());
        assert!(!Verdict::new(&c, Outcome::NeedsManualReview).is_adverse());
    }

    #[test]
    fn test_display() {
        let c = control("SV-2", Severity::Medium);
        let v = Verdict::new(&c, Outcome::Fail).with_message("unexpected: guest");
        assert_eq!(v.to_string(), "SV-2 [CAT II] fail: unexpected: guest");
    }
}
