//! Orchestrator - one deployment run from connectivity check to report
//!
//! `INIT -> SCHEMA_DEPLOY -> [VERIFY] -> [DATA_LOAD] -> DONE`. The first
//! stage failure moves the run to `FAILED` and skips every later stage; the
//! partial report is still finalized and returned.

use crate::db::Database;
use crate::deployer::SqlDeployer;
use crate::error::{DeployError, DeployResult};
use crate::loader::DataLoader;
use crate::models::{DataStage, DeploymentReport, RunState, Stage};
use crate::state::SharedContext;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// Closes the pool when dropped, on every exit path of the orchestrator
struct PoolGuard(Arc<dyn Database>);

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.0.close();
        info!("Database connection pool closed");
    }
}

pub struct Orchestrator {
    ctx: SharedContext,
    db: Arc<dyn Database>,
    state: RunState,
    report: DeploymentReport,
    _pool: PoolGuard,
}

impl Orchestrator {
    pub fn new(ctx: SharedContext, db: Arc<dyn Database>) -> Self {
        let report = DeploymentReport::begin(ctx.run_id.clone(), ctx.started_at, ctx.options);
        Self {
            _pool: PoolGuard(db.clone()),
            ctx,
            db,
            state: RunState::Init,
            report,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute every selected stage and return the finalized report.
    /// The pool is closed before this returns.
    pub async fn run(mut self) -> DeploymentReport {
        let span = self.ctx.span().clone();
        async move {
            info!(options = ?self.ctx.options, "Starting deployment");

            let outcome = self.run_stages().await;
            match &outcome {
                Ok(()) => {
                    self.transition(RunState::Done);
                    info!("Deployment completed successfully");
                }
                Err(e) => {
                    self.transition(RunState::Failed);
                    error!("Deployment failed: {}", e);
                }
            }

            self.report.finish(outcome.as_ref().map(|_| ()));
            info!(
                status = ?self.report.status,
                "Run finished in {:.2}s",
                self.report.total_duration_seconds
            );
            self.report
        }
        .instrument(span)
        .await
    }

    fn transition(&mut self, next: RunState) {
        if self.state == RunState::Failed {
            return;
        }
        info!("Stage transition: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.report.stages_visited.push(next);
    }

    async fn run_stages(&mut self) -> DeployResult<()> {
        let options = self.ctx.options;

        if !self.db.test_connection().await {
            return Err(DeployError::Connection(
                "Database connection test failed".to_string(),
            ));
        }

        let database_info = self.db.database_info().await;
        if !database_info.is_empty() {
            info!(
                "Connected to {} as {}",
                database_info.database_name.as_deref().unwrap_or("?"),
                database_info.user_name.as_deref().unwrap_or("?")
            );
            self.report.database_info = Some(database_info);
        }

        let mut deployer = SqlDeployer::new(self.ctx.clone(), self.db.clone())?;

        self.transition(RunState::SchemaDeploy);
        let deployment = deployer
            .deploy_all(options.force_recreate, options.enable_security)
            .await;
        let schema_error = deployment.error().map(str::to_string);
        self.report.sql_deployment = Stage::Ran(deployment);
        if let Some(message) = schema_error {
            return Err(DeployError::StageFailed {
                stage: "SQL deployment",
                message,
            });
        }

        if options.verify {
            self.transition(RunState::Verify);
            let verification = deployer.verify_deployment().await;
            if !verification.all_verified {
                warn!("Some components failed verification");
            }
            self.report.verification = Stage::Ran(verification);
        } else {
            self.report.verification = Stage::disabled();
        }

        if !options.load_data {
            self.report.data = Stage::disabled();
            return Ok(());
        }

        self.transition(RunState::DataLoad);
        let mut loader = DataLoader::new(self.ctx.clone(), self.db.clone())?;
        let (stage, data_error) = if options.run_pipeline {
            let run = loader.run_data_pipeline().await;
            let failed = run.error().map(|m| ("Data pipeline", m.to_string()));
            (DataStage::Pipeline(run), failed)
        } else {
            let summary = loader.load_all_csvs(true).await;
            let failed = summary.error().map(|m| ("Data loading", m.to_string()));
            (DataStage::Load(summary), failed)
        };
        self.report.data = Stage::Ran(stage);

        match data_error {
            Some((stage, message)) => Err(DeployError::StageFailed { stage, message }),
            None => Ok(()),
        }
    }
}
