//! Load-then-reconcile pipeline
//!
//! The two procedures are opaque server-side functions. Their only contract
//! here is ordering: merge runs after a successful reconciliation, never
//! otherwise.

use crate::error::DeployError;
use crate::loader::catalog::{MERGE_PROCEDURE, RECONCILIATION_PROCEDURE};
use crate::loader::DataLoader;
use crate::models::{
    LoadSummary, MemberBacklog, MergeLogEntry, PipelineFailure, PipelineRun, PipelineStatistics,
    PipelineSuccess, StepOutcome,
};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{error, info, warn};

/// Best-effort read taken after a procedure completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readback {
    MemberBacklog,
    MergeLog,
}

impl DataLoader {
    /// Load every seed file, reconcile, merge, then read back statistics
    pub async fn run_data_pipeline(&mut self) -> PipelineRun {
        info!(run_id = %self.ctx.run_id, "Running data processing pipeline");
        let timestamp = Utc::now();
        let timer = Instant::now();

        let csv_load = match self.load_all_csvs(true).await {
            LoadSummary::Success(totals) => totals,
            failed => {
                return failed_run(
                    "CSV loading failed".to_string(),
                    failed,
                    StepOutcome::NotRun,
                    StepOutcome::NotRun,
                    timer,
                    timestamp,
                );
            }
        };

        let reconciliation = self.run_step(RECONCILIATION_PROCEDURE, Readback::MemberBacklog).await;
        if let StepOutcome::Failed { error, .. } = &reconciliation {
            return failed_run(
                error.clone(),
                LoadSummary::Success(csv_load),
                reconciliation,
                StepOutcome::NotRun,
                timer,
                timestamp,
            );
        }

        let merge = self.run_step(MERGE_PROCEDURE, Readback::MergeLog).await;
        if let StepOutcome::Failed { error, .. } = &merge {
            return failed_run(
                error.clone(),
                LoadSummary::Success(csv_load),
                reconciliation,
                merge,
                timer,
                timestamp,
            );
        }

        let statistics = self.pipeline_statistics().await;
        let total_duration_seconds = timer.elapsed().as_secs_f64();
        info!(
            "Pipeline succeeded in {:.2}s: {} unified agents, {} need review",
            total_duration_seconds, statistics.unified_agents_count, statistics.needs_review_count
        );

        PipelineRun::Success(PipelineSuccess {
            csv_load,
            reconciliation,
            merge,
            statistics,
            total_duration_seconds,
            timestamp,
        })
    }

    async fn run_step(&self, procedure: &str, readback: Readback) -> StepOutcome {
        info!("Running {}...", procedure);
        let timer = Instant::now();

        if let Err(e) = self.db.call_procedure(procedure).await {
            let err = DeployError::Procedure {
                name: procedure.to_string(),
                message: e.to_string(),
            };
            error!("{}", err);
            return StepOutcome::Failed {
                procedure: procedure.to_string(),
                duration_seconds: timer.elapsed().as_secs_f64(),
                error: err.to_string(),
            };
        }
        let duration_seconds = timer.elapsed().as_secs_f64();
        info!("✓ {} completed ({:.2}s)", procedure, duration_seconds);

        let (backlog, merge_log) = match readback {
            Readback::MemberBacklog => (self.member_backlog().await, None),
            Readback::MergeLog => (None, self.latest_merge_log().await),
        };

        StepOutcome::Completed {
            procedure: procedure.to_string(),
            duration_seconds,
            backlog,
            merge_log,
        }
    }

    async fn member_backlog(&self) -> Option<MemberBacklog> {
        match self.db.member_backlog().await {
            Ok(backlog) => {
                info!(
                    "Member staging: {} records, {} unprocessed",
                    backlog.total_records, backlog.unprocessed
                );
                Some(backlog)
            }
            Err(e) => {
                warn!("Could not read member backlog: {}", e);
                None
            }
        }
    }

    async fn latest_merge_log(&self) -> Option<MergeLogEntry> {
        match self.db.latest_merge_log().await {
            Ok(Some(entry)) => {
                info!(
                    "Latest merge: {} records processed ({})",
                    entry.total_processed, entry.status
                );
                Some(entry)
            }
            Ok(None) => {
                warn!("Merge log is empty");
                None
            }
            Err(e) => {
                warn!("Could not read merge log: {}", e);
                None
            }
        }
    }

    async fn pipeline_statistics(&self) -> PipelineStatistics {
        match self.db.unified_agent_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Could not get pipeline stats: {}", e);
                PipelineStatistics::default()
            }
        }
    }
}

fn failed_run(
    error: String,
    csv_load: LoadSummary,
    reconciliation: StepOutcome,
    merge: StepOutcome,
    timer: Instant,
    timestamp: DateTime<Utc>,
) -> PipelineRun {
    let total_duration_seconds = timer.elapsed().as_secs_f64();
    error!(
        "Pipeline failed after {:.2}s: {}",
        total_duration_seconds, error
    );
    PipelineRun::Failed(PipelineFailure {
        error,
        csv_load,
        reconciliation,
        merge,
        total_duration_seconds,
        timestamp,
    })
}
