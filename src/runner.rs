//! Run loop
//!
//! Controls are independent, so they evaluate on a bounded worker pool sized
//! to the connector's safe concurrent-connection limit. Each unit of work is
//! one control's evaluation and produces exactly one verdict; no control
//! depends on another's completion.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::connector::TargetConnector;
use crate::context::ExecutionContext;
use crate::executor::evaluate;
use crate::report::Report;
use crate::verdict::Verdict;

/// Evaluates a catalog against one target and aggregates the verdicts.
pub struct Runner {
    connector: Arc<dyn TargetConnector>,
    ctx: Arc<ExecutionContext>,
}

impl Runner {
    /// Create a runner for the given context and connector.
    pub fn new(ctx: ExecutionContext, connector: Arc<dyn TargetConnector>) -> Self {
        Self {
            connector,
            ctx: Arc::new(ctx),
        }
    }

    /// Evaluate every control in the catalog and aggregate a report.
    pub async fn run(&self, catalog: &Catalog) -> Report {
        // Shutdown channel that never signals; the sender must outlive the run.
        let (_tx, rx) = watch::channel(false);
        self.run_with_shutdown(catalog, rx).await
    }

    /// Evaluate with a run-level cancellation signal.
    ///
    /// When the signal flips to `true`, in-flight evaluations are dropped
    /// (releasing their sessions) and not-yet-started controls are skipped.
    /// Every control still appears in the report exactly once: cancelled
    /// controls carry an `Error` verdict, finished controls keep their true
    /// terminal verdicts.
    pub async fn run_with_shutdown(
        &self,
        catalog: &Catalog,
        shutdown: watch::Receiver<bool>,
    ) -> Report {
        info!(
            catalog = %catalog.id,
            controls = catalog.len(),
            max_concurrency = self.ctx.max_concurrency,
            "Evaluation run started"
        );

        let semaphore = Arc::new(Semaphore::new(self.ctx.max_concurrency));
        let mut tasks = JoinSet::new();

        for control in catalog.controls() {
            let control = control.clone();
            let ctx = Arc::clone(&self.ctx);
            let connector = Arc::clone(&self.connector);
            let semaphore = Arc::clone(&semaphore);
            let shutdown = shutdown.clone();

            tasks.spawn(async move {
                if *shutdown.borrow() {
                    return Verdict::error(&control, "run cancelled");
                }
                tokio::select! {
                    _ = wait_for_shutdown(shutdown.clone()) => {
                        Verdict::error(&control, "run cancelled")
                    }
                    verdict = async {
                        match semaphore.acquire_owned().await {
                            Ok(_permit) => evaluate(&control, &ctx, connector.as_ref()).await,
                            Err(_) => Verdict::error(&control, "worker pool closed"),
                        }
                    } => verdict,
                }
            });
        }

        let mut by_id: HashMap<String, Verdict> = HashMap::with_capacity(catalog.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(verdict) => {
                    by_id.insert(verdict.control_id.clone(), verdict);
                }
                Err(e) => error!(error = %e, "Evaluation task failed"),
            }
        }

        // Every control appears exactly once, even if its task panicked.
        let verdicts = catalog
            .controls()
            .map(|control| {
                by_id
                    .remove(&control.id)
                    .unwrap_or_else(|| Verdict::error(control, "evaluation task failed"))
            })
            .collect();

        let report = Report::aggregate(verdicts);
        info!(
            passed = report.summary.pass,
            failed = report.summary.fail,
            errors = report.summary.error,
            "Evaluation run finished"
        );
        report
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without signalling; cancellation can no longer occur.
            std::future::pending::<()>().await;
        }
    }
}
