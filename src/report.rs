//! Result Aggregator
//!
//! Folds a run's verdicts into a report: counts by outcome and by severity,
//! an overall pass/fail judgment, and an exit status for CLI-style
//! consumption. No control-specific logic lives here.

use serde::Serialize;

use crate::catalog::Severity;
use crate::verdict::{Outcome, Verdict};

/// Aggregated result of one evaluation run.
///
/// Enumerates every evaluated control exactly once; aggregation is a pure
/// fold over verdicts, so summary counts are independent of input order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Verdicts, one per control
    pub verdicts: Vec<Verdict>,

    /// Summary counts
    pub summary: RunSummary,
}

impl Report {
    /// Fold a sequence of verdicts into a report.
    pub fn aggregate(verdicts: Vec<Verdict>) -> Self {
        let summary = RunSummary::from_verdicts(&verdicts);
        Self { verdicts, summary }
    }

    /// Whether any control failed or errored
    pub fn has_failures(&self) -> bool {
        self.verdicts.iter().any(|v| v.is_adverse())
    }

    /// Process exit status: 0 if no control failed or errored, 1 otherwise
    pub fn exit_status(&self) -> u8 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Verdicts with a given outcome
    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(move |v| v.outcome == outcome)
    }

    /// Export as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the JSON report to a file
    pub fn write_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Counts by outcome and by severity.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    /// Total controls evaluated
    pub total: usize,
    /// Compliant controls
    pub pass: usize,
    /// Policy violations
    pub fail: usize,
    /// Controls that do not apply in this environment
    pub not_applicable: usize,
    /// Controls requiring a human reviewer
    pub needs_manual_review: usize,
    /// Controls whose evaluation could not complete
    pub error: usize,

    /// CAT I (high) pass/fail
    pub cat_i: SeverityCounts,
    /// CAT II (medium) pass/fail
    pub cat_ii: SeverityCounts,
    /// CAT III (low) pass/fail
    pub cat_iii: SeverityCounts,
}

/// Adverse/compliant counts within one severity category.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SeverityCounts {
    /// Controls that passed
    pub passed: usize,
    /// Controls that failed or errored
    pub adverse: usize,
}

impl RunSummary {
    fn from_verdicts(verdicts: &[Verdict]) -> Self {
        let mut summary = Self::default();
        for verdict in verdicts {
            summary.total += 1;
            match verdict.outcome {
                Outcome::Pass => summary.pass += 1,
                Outcome::Fail => summary.fail += 1,
                Outcome::NotApplicable => summary.not_applicable += 1,
                Outcome::NeedsManualReview => summary.needs_manual_review += 1,
                Outcome::Error => summary.error += 1,
            }

            let counts = match verdict.severity {
                Severity::High => &mut summary.cat_i,
                Severity::Medium => &mut summary.cat_ii,
                Severity::Low => &mut summary.cat_iii,
            };
            if verdict.is_adverse() {
                counts.adverse += 1;
            } else if verdict.outcome == Outcome::Pass {
                counts.passed += 1;
            }
        }
        summary
    }

    /// Whether no CAT I control failed or errored
    pub fn cat_i_compliant(&self) -> bool {
        self.cat_i.adverse == 0
    }

    /// Compliance percentage over automatically judged controls
    /// (pass vs. fail/error; NA and manual-review excluded)
    pub fn compliance_percentage(&self) -> f64 {
        let judged = self.pass + self.fail + self.error;
        if judged == 0 {
            100.0
        } else {
            (self.pass as f64 / judged as f64) * 100.0
        }
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Compliance Evaluation Report")?;
        writeln!(f, "============================")?;
        writeln!(
            f,
            "Status: {}",
            if self.has_failures() {
                "NON-COMPLIANT"
            } else {
                "COMPLIANT"
            }
        )?;
        writeln!(
            f,
            "Controls: {} evaluated, {} passed, {} failed, {} errors, {} N/A, {} manual ({:.1}%)",
            self.summary.total,
            self.summary.pass,
            self.summary.fail,
            self.summary.error,
            self.summary.not_applicable,
            self.summary.needs_manual_review,
            self.summary.compliance_percentage()
        )?;
        writeln!(
            f,
            "CAT I: {}/{}  CAT II: {}/{}  CAT III: {}/{}",
            self.summary.cat_i.passed,
            self.summary.cat_i.passed + self.summary.cat_i.adverse,
            self.summary.cat_ii.passed,
            self.summary.cat_ii.passed + self.summary.cat_ii.adverse,
            self.summary.cat_iii.passed,
            self.summary.cat_iii.passed + self.summary.cat_iii.adverse,
        )?;

        if !self.verdicts.is_empty() {
            writeln!(f, "\nVerdicts:")?;
            for verdict in &self.verdicts {
                let mark = match verdict.outcome {
                    Outcome::Pass => "✓",
                    Outcome::Fail | Outcome::Error => "✗",
                    Outcome::NotApplicable => "-",
                    Outcome::NeedsManualReview => "?",
                };
                writeln!(f, "  {} {}", mark, verdict)?;
            }
        }

        Ok(())
    }
}
