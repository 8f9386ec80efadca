//! Top-level deployment report
//!
//! Stage results stay typed until [`DeploymentReport::save`] turns the whole
//! aggregate into JSON at the process boundary.

use crate::config::RunOptions;
use crate::error::{DeployError, DeployResult};
use crate::models::deployment::{SqlDeployment, VerificationReport};
use crate::models::load::{LoadSummary, PipelineRun};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Orchestrator states. `Failed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    SchemaDeploy,
    Verify,
    DataLoad,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Turned off by the run options
    Disabled,
    /// An earlier stage failed, or the run ended before reaching it
    NotReached,
}

/// Slot for one stage's sub-report
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum Stage<T> {
    NotRun { reason: SkipReason },
    Ran(T),
}

impl<T> Stage<T> {
    pub fn not_reached() -> Self {
        Stage::NotRun {
            reason: SkipReason::NotReached,
        }
    }

    pub fn disabled() -> Self {
        Stage::NotRun {
            reason: SkipReason::Disabled,
        }
    }

    pub fn ran(&self) -> Option<&T> {
        match self {
            Stage::Ran(value) => Some(value),
            Stage::NotRun { .. } => None,
        }
    }
}

/// The data stage either loads seed files only, or loads and reconciles
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataStage {
    Load(LoadSummary),
    Pipeline(PipelineRun),
}

/// Best-effort server metadata; every field empty when the lookup failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_size: Option<String>,
}

impl DatabaseInfo {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Cumulative report of one run
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub deployment_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration_seconds: f64,
    pub configuration: RunOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_info: Option<DatabaseInfo>,
    pub sql_deployment: Stage<SqlDeployment>,
    pub verification: Stage<VerificationReport>,
    pub data: Stage<DataStage>,
    pub stages_visited: Vec<RunState>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    clock: Instant,
}

impl DeploymentReport {
    pub fn begin(deployment_id: impl Into<String>, start_time: DateTime<Utc>, configuration: RunOptions) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            start_time,
            end_time: None,
            total_duration_seconds: 0.0,
            configuration,
            database_info: None,
            sql_deployment: Stage::not_reached(),
            verification: Stage::not_reached(),
            data: Stage::not_reached(),
            stages_visited: vec![RunState::Init],
            status: RunStatus::Running,
            error: None,
            clock: Instant::now(),
        }
    }

    /// Stamp end time, duration and final status
    pub fn finish(&mut self, outcome: Result<(), &DeployError>) {
        self.end_time = Some(Utc::now());
        self.total_duration_seconds = self.clock.elapsed().as_secs_f64();
        match outcome {
            Ok(()) => {
                self.status = RunStatus::Success;
                self.error = None;
            }
            Err(err) => {
                self.status = RunStatus::Failed;
                self.error = Some(err.to_string());
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Write the report as pretty JSON, creating parent directories
    pub async fn save(&self, path: &Path) -> DeployResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, body).await?;
        info!("Deployment report saved to: {}", path.display());
        Ok(())
    }
}
