//! Catalog loading and structural validation
//!
//! A catalog is loaded once per run from a static YAML definition file.
//! Loading is deterministic (controls keep document order) and validates the
//! structure eagerly: a malformed record aborts the run before any control is
//! evaluated.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::control::{CheckSpec, Control, Severity};

/// An immutable, ordered collection of controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Policy name (e.g., "MS SQL Server 2022 Database STIG")
    pub policy: String,

    /// Catalog identifier (e.g., "stig_sqlserver2022_db")
    pub id: String,

    /// Policy release (e.g., "V1R1")
    #[serde(default)]
    pub version: Option<String>,

    /// Source URL for the policy
    #[serde(default)]
    pub source: Option<String>,

    /// Controls in document order
    #[serde(default)]
    pub controls: Vec<Control>,
}

impl Catalog {
    /// Load a catalog from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_yaml(&content)?;
        info!(
            catalog = %catalog.id,
            controls = catalog.controls.len(),
            path = %path.display(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse a catalog from YAML content and validate its structure.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: Self =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Structural validation: non-empty unique ids, expected values present
    /// where the comparison operator requires one.
    ///
    /// Duplicate ids are a hard error. The source material carries
    /// near-duplicate records for the same id across releases; silently
    /// picking one would make runs nondeterministic.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for (index, control) in self.controls.iter().enumerate() {
            if control.id.trim().is_empty() {
                return Err(CatalogError::MissingId { index });
            }
            if !seen.insert(control.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    id: control.id.clone(),
                });
            }
            if let CheckSpec::QueryCompare {
                compare, expected, ..
            } = &control.check
            {
                if compare.needs_expected() && expected.is_none() {
                    return Err(CatalogError::MissingExpected {
                        id: control.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Controls in document order
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    /// Look up a control by id
    pub fn get(&self, id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.id == id)
    }

    /// Number of controls
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Whether the catalog has no controls
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Summary statistics over the catalog
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats::default();
        for control in &self.controls {
            stats.total += 1;
            if control.is_automated() {
                stats.automated += 1;
            } else {
                stats.manual += 1;
            }
            match control.severity {
                Severity::High => stats.high += 1,
                Severity::Medium => stats.medium += 1,
                Severity::Low => stats.low += 1,
            }
        }
        stats
    }
}

/// Catalog summary counts.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CatalogStats {
    /// Total controls
    pub total: usize,
    /// Controls with an automated check
    pub automated: usize,
    /// Controls requiring manual review
    pub manual: usize,
    /// CAT I controls
    pub high: usize,
    /// CAT II controls
    pub medium: usize,
    /// CAT III controls
    pub low: usize,
}

impl std::fmt::Display for CatalogStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} controls ({} automated, {} manual; CAT I: {}, CAT II: {}, CAT III: {})",
            self.total, self.automated, self.manual, self.high, self.medium, self.low
        )
    }
}

/// Errors raised while loading a catalog. All of these are fatal to the run.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Definition file could not be read
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Definition file is not valid YAML or has the wrong shape
    #[error("failed to parse catalog: {0}")]
    Parse(String),

    /// A control record has no identifier
    #[error("control at index {index} has no identifier")]
    MissingId { index: usize },

    /// Two control records share an identifier
    #[error("duplicate control identifier: {id}")]
    DuplicateId { id: String },

    /// A comparison operator requires an expected value but none was given
    #[error("control {id}: comparison requires an expected value")]
    MissingExpected { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
policy: 'Test STIG'
id: test
version: V1R1
controls:
  - id: C-1
    severity: high
    title: 'Manual control'
    check:
      manual:
        instructions: 'Review the documentation.'
  - id: C-2
    severity: medium
    title: 'Automated control'
    check:
      query_compare:
        query: 'SELECT name FROM sys.schemas'
        column: name
        compare: subset_of
        expected:
          from_context: authorized_principals
"#;

    #[test]
    fn test_load_valid_catalog() {
        let catalog = Catalog::from_yaml(VALID).unwrap();
        assert_eq!(catalog.id, "test");
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("C-1").is_some());
        assert!(catalog.get("C-9").is_none());

        let stats = catalog.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.automated, 1);
        assert_eq!(stats.manual, 1);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.medium, 1);
    }

    #[test]
    fn test_controls_keep_document_order() {
        let catalog = Catalog::from_yaml(VALID).unwrap();
        let ids: Vec<&str> = catalog.controls().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C-1", "C-2"]);
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let yaml = r#"
policy: t
id: t
controls:
  - id: C-1
    severity: low
    title: a
    check: { manual: { instructions: x } }
  - id: C-1
    severity: high
    title: b
    check: { manual: { instructions: y } }
"#;
        match Catalog::from_yaml(yaml) {
            Err(CatalogError::DuplicateId { id }) => assert_eq!(id, "C-1"),
            other => panic!("expected DuplicateId, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_id_is_fatal() {
        let yaml = r#"
policy: t
id: t
controls:
  - id: '  '
    severity: low
    title: a
    check: { manual: { instructions: x } }
"#;
        assert!(matches!(
            Catalog::from_yaml(yaml),
            Err(CatalogError::MissingId { index: 0 })
        ));
    }

    #[test]
    fn test_unknown_severity_is_fatal() {
        let yaml = r#"
policy: t
id: t
controls:
  - id: C-1
    severity: catastrophic
    title: a
    check: { manual: { instructions: x } }
"#;
        assert!(matches!(
            Catalog::from_yaml(yaml),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_expected_is_fatal() {
        let yaml = r#"
policy: t
id: t
controls:
  - id: C-1
    severity: low
    title: a
    check:
      query_compare:
        query: 'SELECT 1'
        column: c
        compare: equals
"#;
        assert!(matches!(
            Catalog::from_yaml(yaml),
            Err(CatalogError::MissingExpected { .. })
        ));
    }

    #[test]
    fn test_empty_compare_needs_no_expected() {
        let yaml = r#"
policy: t
id: t
controls:
  - id: C-1
    severity: low
    title: a
    check:
      query_compare:
        query: 'SELECT name FROM sys.symmetric_keys'
        column: name
        compare: empty
"#;
        assert!(Catalog::from_yaml(yaml).is_ok());
    }
}
