//! Output formatting and display utilities
//!
//! Provides colored, formatted output for the CLI

use colored::Colorize;

use redoubt::catalog::Control;
use redoubt::{Outcome, Report};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", msg.bold().underline());
}

/// Print a subheader
pub fn subheader(msg: &str) {
    println!("\n{}", msg.bold());
}

/// Print a scan report, failures first.
pub fn print_report(report: &Report) {
    header("Evaluation Report");

    if report.has_failures() {
        error(&format!(
            "{} failed, {} errors out of {} controls",
            report.summary.fail, report.summary.error, report.summary.total
        ));
    } else {
        success(&format!(
            "No failures across {} controls ({:.1}% of judged controls compliant)",
            report.summary.total,
            report.summary.compliance_percentage()
        ));
    }

    print_group(report, Outcome::Fail, "Failed (policy violations):");
    print_group(report, Outcome::Error, "Errors (could not evaluate):");
    print_group(report, Outcome::NeedsManualReview, "Needs manual review:");
    print_group(report, Outcome::NotApplicable, "Not applicable:");
    print_group(report, Outcome::Pass, "Passed:");

    subheader("By category:");
    println!(
        "  CAT I: {}/{}  CAT II: {}/{}  CAT III: {}/{}",
        report.summary.cat_i.passed,
        report.summary.cat_i.passed + report.summary.cat_i.adverse,
        report.summary.cat_ii.passed,
        report.summary.cat_ii.passed + report.summary.cat_ii.adverse,
        report.summary.cat_iii.passed,
        report.summary.cat_iii.passed + report.summary.cat_iii.adverse,
    );
    println!();
}

fn print_group(report: &Report, outcome: Outcome, title: &str) {
    let verdicts: Vec<_> = report.with_outcome(outcome).collect();
    if verdicts.is_empty() {
        return;
    }

    subheader(title);
    for verdict in verdicts {
        let icon = match outcome {
            Outcome::Pass => "✓".green(),
            Outcome::Fail => "✗".red(),
            Outcome::Error => "!".red(),
            Outcome::NeedsManualReview => "?".yellow(),
            Outcome::NotApplicable => "-".dimmed(),
        };
        let category = format!("[{}]", verdict.severity.category()).dimmed();
        println!("  {} {} {}", icon, category, verdict.control_id);
        if let Some(ref msg) = verdict.message {
            println!("    {}", msg.dimmed());
        }
    }
}

/// Print a one-line catalog listing entry
pub fn print_control_line(control: &Control) {
    let kind = if control.is_automated() {
        "automated".cyan()
    } else {
        "manual".yellow()
    };
    let category = format!("[{}]", control.severity.category()).dimmed();
    println!("  {} {} ({}) {}", control.id.bold(), category, kind, control.title);
}

/// Print the full text of one control
pub fn print_control_detail(control: &Control) {
    header(&format!("{} — {}", control.id, control.severity));
    println!("{}", control.title.bold());

    if let Some(ref stig_id) = control.tags.stig_id {
        println!("\nSTIG ID: {}", stig_id);
    }
    if !control.tags.cci.is_empty() {
        println!("CCI: {}", control.tags.cci.join(", "));
    }
    // Parsed refs print in normalized form; raw strings are the fallback.
    let nist_refs = control.tags.nist_refs();
    if !nist_refs.is_empty() {
        let ids: Vec<String> = nist_refs.iter().map(|r| r.full_id()).collect();
        println!("NIST: {}", ids.join(", "));
    } else if !control.tags.nist.is_empty() {
        println!("NIST: {}", control.tags.nist.join(", "));
    }

    if let Some(ref discussion) = control.discussion {
        subheader("Discussion:");
        println!("{}", discussion);
    }
    if let Some(ref check) = control.check_text {
        subheader("Check:");
        println!("{}", check);
    }
    if let Some(ref fix) = control.fix_text {
        subheader("Fix:");
        println!("{}", fix);
    }
    println!();
}

/// Print a JSON report
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
