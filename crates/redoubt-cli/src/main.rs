//! Redoubt CLI - Database compliance scanning tool
//!
//! Loads a STIG-style control catalog, evaluates it against a target
//! database, and reports verdicts with CI-friendly exit codes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use redoubt::catalog::Control;
use redoubt::{parse_duration, Catalog, ExecutionContext, PgConnector, Runner, Severity};

mod error;
mod output;

use error::{CliError, Result};

/// Redoubt - STIG compliance evaluation for relational databases
#[derive(Parser)]
#[command(name = "redoubt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the control catalog file
    #[arg(short, long, default_value = "controls/stig_sqlserver2022_db.yml", global = true)]
    catalog: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the catalog against the target database
    Scan {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Also count manual-review verdicts against the exit status
        #[arg(short, long)]
        strict: bool,

        /// Write the JSON report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bound on concurrently evaluating controls
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Per-query timeout (e.g. "30s")
        #[arg(long)]
        query_timeout: Option<String>,
    },

    /// List the controls in the catalog
    List {
        /// Only controls mapping to this NIST 800-53 base control (e.g., "SC-28")
        #[arg(long)]
        nist: Option<String>,

        /// Only controls of this severity ("high", "medium", "low", or "CAT I".."CAT III")
        #[arg(long)]
        severity: Option<String>,
    },

    /// Show the full text of one control
    Show {
        /// Control identifier (e.g., "SV-271124")
        id: String,
    },

    /// Validate the catalog structure without connecting to a target
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("redoubt=debug,redoubt_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("redoubt=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Scan {
            json,
            strict,
            output,
            max_concurrency,
            query_timeout,
        } => {
            cmd_scan(
                &cli.catalog,
                json,
                strict,
                output,
                max_concurrency,
                query_timeout,
            )
            .await
        }
        Commands::List { nist, severity } => cmd_list(&cli.catalog, nist, severity),
        Commands::Show { id } => cmd_show(&cli.catalog, &id),
        Commands::Validate => cmd_validate(&cli.catalog),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

async fn cmd_scan(
    catalog_path: &PathBuf,
    json: bool,
    strict: bool,
    output_path: Option<PathBuf>,
    max_concurrency: Option<usize>,
    query_timeout: Option<String>,
) -> Result<()> {
    let catalog = Catalog::from_file(catalog_path)?;

    let mut ctx = ExecutionContext::from_env()?;
    if let Some(limit) = max_concurrency {
        ctx.max_concurrency = limit.max(1);
    }
    if let Some(ref timeout) = query_timeout {
        ctx.query_timeout = parse_duration(timeout);
    }
    ctx.validate_for(&catalog)?;

    let connector = Arc::new(PgConnector::new(ctx.connector.clone()));
    let runner = Runner::new(ctx, connector);

    // Ctrl-C aborts in-flight queries; finished controls keep their verdicts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            let _ = shutdown_tx.send(true);
        } else {
            // Keep the sender alive so the run can complete uninterrupted.
            std::future::pending::<()>().await;
        }
    });

    let report = runner.run_with_shutdown(&catalog, shutdown_rx).await;

    if let Some(ref path) = output_path {
        report.write_to_file(path)?;
        output::info(&format!("Report written to {}", path.display()));
    }

    if json {
        output::print_json(&report)?;
    } else {
        output::print_report(&report);
    }

    if report.has_failures() {
        return Err(CliError::NonCompliant {
            fail: report.summary.fail,
            error: report.summary.error,
        });
    }
    if strict && report.summary.needs_manual_review > 0 {
        return Err(CliError::ManualReviewOutstanding {
            count: report.summary.needs_manual_review,
        });
    }

    Ok(())
}

fn cmd_list(
    catalog_path: &PathBuf,
    nist: Option<String>,
    severity: Option<String>,
) -> Result<()> {
    let catalog = Catalog::from_file(catalog_path)?;

    let severity = match severity {
        Some(ref s) => Some(
            Severity::parse(s).ok_or_else(|| CliError::InvalidSeverity { value: s.clone() })?,
        ),
        None => None,
    };

    output::header(&format!(
        "{}{}",
        catalog.policy,
        catalog
            .version
            .as_deref()
            .map(|v| format!(" ({})", v))
            .unwrap_or_default()
    ));
    let mut shown = 0;
    for control in catalog
        .controls()
        .filter(|c| matches_filters(c, nist.as_deref(), severity))
    {
        output::print_control_line(control);
        shown += 1;
    }
    println!();
    if nist.is_some() || severity.is_some() {
        output::info(&format!("{} of {} controls shown", shown, catalog.len()));
    } else {
        output::info(&catalog.stats().to_string());
    }
    Ok(())
}

/// Listing filters: NIST base-control mapping (enhancements ignored) and
/// severity category.
fn matches_filters(control: &Control, nist: Option<&str>, severity: Option<Severity>) -> bool {
    if let Some(base) = nist {
        if !control.tags.maps_to_nist(base) {
            return false;
        }
    }
    if let Some(severity) = severity {
        if control.severity != severity {
            return false;
        }
    }
    true
}

fn cmd_show(catalog_path: &PathBuf, id: &str) -> Result<()> {
    let catalog = Catalog::from_file(catalog_path)?;
    let control = catalog
        .get(id)
        .ok_or_else(|| CliError::ControlNotFound { id: id.to_string() })?;
    output::print_control_detail(control);
    Ok(())
}

fn cmd_validate(catalog_path: &PathBuf) -> Result<()> {
    let catalog = Catalog::from_file(catalog_path)?;
    output::success(&format!(
        "Catalog '{}' is structurally valid: {}",
        catalog.id,
        catalog.stats()
    ));
    Ok(())
}
