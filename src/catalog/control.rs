//! Control definitions
//!
//! A [`Control`] binds the policy text of a single compliance requirement
//! (title, discussion, check procedure, fix text) to its reference tags and
//! to the machine-readable check the engine can execute against a target
//! database.

use serde::{Deserialize, Serialize};

use super::tags::ControlTags;

/// A single compliance control from a catalog file.
///
/// Controls are read-only after catalog load. Every control carries exactly
/// one [`CheckSpec`]; controls without an automated procedure use
/// [`CheckSpec::Manual`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    /// Control identifier, unique within a catalog (e.g., "SV-271124")
    pub id: String,

    /// Severity category
    pub severity: Severity,

    /// Requirement title
    pub title: String,

    /// Vulnerability discussion / rationale
    #[serde(default)]
    pub discussion: Option<String>,

    /// Check procedure text for a human reviewer
    #[serde(default)]
    pub check_text: Option<String>,

    /// Remediation text
    #[serde(default)]
    pub fix_text: Option<String>,

    /// External-standard references (CCI, NIST 800-53, STIG id, legacy ids)
    #[serde(default)]
    pub tags: ControlTags,

    /// Whether the control applies in the current environment
    #[serde(default)]
    pub applicability: Applicability,

    /// The executable (or manual) check procedure
    pub check: CheckSpec,
}

impl Control {
    /// Check if this control has an automated check procedure
    pub fn is_automated(&self) -> bool {
        matches!(self.check, CheckSpec::QueryCompare { .. })
    }
}

/// DISA severity categories, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// CAT III
    Low,
    /// CAT II
    Medium,
    /// CAT I
    High,
}

impl Severity {
    /// Parse from a severity or DISA category string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "high" | "cat_i" | "cat1" | "cati" => Some(Self::High),
            "medium" | "cat_ii" | "cat2" | "catii" => Some(Self::Medium),
            "low" | "cat_iii" | "cat3" | "catiii" => Some(Self::Low),
            _ => None,
        }
    }

    /// DISA category label
    pub fn category(&self) -> &'static str {
        match self {
            Self::High => "CAT I",
            Self::Medium => "CAT II",
            Self::Low => "CAT III",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "CAT I (High)"),
            Self::Medium => write!(f, "CAT II (Medium)"),
            Self::Low => write!(f, "CAT III (Low)"),
        }
    }
}

/// Predicate determining whether a control's check should run.
///
/// Applicability is resolved against the [`ExecutionContext`] before any
/// query is issued; an inapplicable control short-circuits to a
/// `NotApplicable` verdict.
///
/// [`ExecutionContext`]: crate::context::ExecutionContext
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    /// The control always applies
    #[default]
    Always,
    /// The control applies only when the named context flag is set
    RequiresFlag(ContextFlag),
}

/// Environment flags a control's applicability may depend on.
///
/// Flags are a closed enum rather than free-form strings so that an unknown
/// flag name fails at catalog parse time, not mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextFlag {
    /// SQL audit is required at the database level
    AuditAtDatabaseLevelRequired,
    /// Encryption of data at rest is required for this system
    EncryptionRequired,
    /// Security labeling requirements have been specified
    SecurityLabelingRequired,
}

impl std::fmt::Display for ContextFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuditAtDatabaseLevelRequired => write!(f, "audit_at_database_level_required"),
            Self::EncryptionRequired => write!(f, "encryption_required"),
            Self::SecurityLabelingRequired => write!(f, "security_labeling_required"),
        }
    }
}

/// Keys naming organization-supplied expected values in the execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    /// Principals authorized to own or access database objects
    AuthorizedPrincipals,
    /// Principals authorized to create and maintain audit specifications
    AuthorizedAuditMaintainers,
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizedPrincipals => write!(f, "authorized_principals"),
            Self::AuthorizedAuditMaintainers => write!(f, "authorized_audit_maintainers"),
        }
    }
}

/// The check procedure for a control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSpec {
    /// No automated procedure; evaluation always yields "needs manual review"
    /// with the instructions attached verbatim.
    Manual {
        /// Instructions for the human reviewer
        instructions: String,
    },

    /// Run a query against the target and compare a result column to an
    /// expected value.
    QueryCompare {
        /// Opaque query text, passed unmodified to the connector
        query: String,
        /// Result column to extract (case-insensitive)
        column: String,
        /// Comparison operator
        compare: Compare,
        /// Expected value; not used by [`Compare::Empty`]
        #[serde(default)]
        expected: Option<Expected>,
    },
}

/// Comparison operators for automated checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compare {
    /// Single value equals the expected value
    Equals,
    /// Result values equal the expected set, ignoring order and duplicates
    SetEquals,
    /// Every result value is a member of the expected set
    SubsetOf,
    /// The query returns no rows ("none found" is the compliant outcome)
    Empty,
}

impl Compare {
    /// Whether this operator needs an expected value
    pub fn needs_expected(&self) -> bool {
        !matches!(self, Self::Empty)
    }
}

/// Expected value for an automated comparison.
///
/// `FromContext` values are supplied per run by the operator (e.g., an
/// organization-approved allow-list) and resolved at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expected {
    /// A literal scalar value
    Value(String),
    /// A literal set of values
    Values(Vec<String>),
    /// A value set supplied by the execution context
    FromContext(ContextKey),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("high"), Some(Severity::High));
        assert_eq!(Severity::parse("CAT I"), Some(Severity::High));
        assert_eq!(Severity::parse("medium"), Some(Severity::Medium));
        assert_eq!(Severity::parse("cat_iii"), Some(Severity::Low));
        assert_eq!(Severity::parse("critical"), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_parse_manual_control() {
        let yaml = r#"
id: SV-271119
severity: high
title: 'Enforce approved authorizations for logical access.'
check:
  manual:
    instructions: 'Review the permissions in place in the database.'
"#;
        let control: Control = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(control.id, "SV-271119");
        assert_eq!(control.severity, Severity::High);
        assert_eq!(control.applicability, Applicability::Always);
        assert!(!control.is_automated());
    }

    #[test]
    fn test_parse_query_compare_control() {
        let yaml = r#"
id: SV-271124
severity: medium
title: 'Only the ISSM may select auditable events.'
applicability:
  requires_flag: audit_at_database_level_required
check:
  query_compare:
    query: 'SELECT name FROM sys.database_principals'
    column: name
    compare: set_equals
    expected:
      from_context: authorized_audit_maintainers
"#;
        let control: Control = serde_yaml::from_str(yaml).unwrap();
        assert!(control.is_automated());
        assert_eq!(
            control.applicability,
            Applicability::RequiresFlag(ContextFlag::AuditAtDatabaseLevelRequired)
        );
        match control.check {
            CheckSpec::QueryCompare {
                compare, expected, ..
            } => {
                assert_eq!(compare, Compare::SetEquals);
                assert_eq!(
                    expected,
                    Some(Expected::FromContext(ContextKey::AuthorizedAuditMaintainers))
                );
            }
            _ => panic!("expected query_compare"),
        }
    }

    #[test]
    fn test_unknown_context_flag_fails_at_parse() {
        let yaml = r#"
id: C1
severity: low
title: t
applicability:
  requires_flag: no_such_flag
check:
  manual:
    instructions: i
"#;
        assert!(serde_yaml::from_str::<Control>(yaml).is_err());
    }

    #[test]
    fn test_compare_needs_expected() {
        assert!(Compare::Equals.needs_expected());
        assert!(Compare::SetEquals.needs_expected());
        assert!(Compare::SubsetOf.needs_expected());
        assert!(!Compare::Empty.needs_expected());
    }
}
