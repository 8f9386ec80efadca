//! SQL Deployer
//!
//! Executes the catalogued scripts phase by phase. The first failing script
//! aborts its phase and every later phase.

use crate::db::{queries, Database};
use crate::deployer::catalog::{self, DeploymentScript, ScriptCategory};
use crate::error::{not_found_error, DeployError, DeployResult};
use crate::models::{
    DeploymentResult, PhaseCounts, PolicyOutcome, ScriptStatus, SqlDeployFailure, SqlDeploySuccess,
    SqlDeployment,
};
use crate::state::SharedContext;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub struct SqlDeployer {
    pub(super) ctx: SharedContext,
    pub(super) db: Arc<dyn Database>,
    sql_base_path: PathBuf,
    deployment_log: Vec<DeploymentResult>,
}

impl SqlDeployer {
    pub fn new(ctx: SharedContext, db: Arc<dyn Database>) -> DeployResult<Self> {
        let sql_base_path = ctx.settings.paths.sql_base_path.clone();
        if !sql_base_path.is_dir() {
            return Err(not_found_error(format!(
                "SQL base path not found: {}",
                sql_base_path.display()
            )));
        }

        info!("SQL Deployer initialized with base path: {}", sql_base_path.display());
        Ok(Self {
            ctx,
            db,
            sql_base_path,
            deployment_log: Vec::new(),
        })
    }

    /// Every script executed so far, in execution order
    pub fn deployment_log(&self) -> &[DeploymentResult] {
        &self.deployment_log
    }

    async fn load_script(&self, script: &DeploymentScript) -> DeployResult<String> {
        let path = self
            .sql_base_path
            .join(script.category.directory())
            .join(script.filename);

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found_error(format!(
                "SQL file not found: {}",
                path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn execute_script(
        &mut self,
        script: &DeploymentScript,
        sql: &str,
    ) -> DeployResult<DeploymentResult> {
        let identifier = script.identifier();
        let timestamp = Utc::now();
        let timer = Instant::now();

        info!("Executing: {}", identifier);
        let outcome = self.db.execute_script(sql, true).await;
        let duration_seconds = timer.elapsed().as_secs_f64();

        let mut result = DeploymentResult {
            script: identifier.clone(),
            category: script.category,
            status: ScriptStatus::Success,
            duration_seconds,
            timestamp,
            checksum: Some(checksum(sql)),
            error: None,
        };

        match outcome {
            Ok(()) => {
                info!("✓ {} executed successfully ({:.2}s)", identifier, duration_seconds);
                self.deployment_log.push(result.clone());
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                error!("✗ {} failed: {}", identifier, message);
                result.status = ScriptStatus::Failed;
                result.error = Some(message.clone());
                self.deployment_log.push(result);
                Err(DeployError::ScriptExecution {
                    script: identifier,
                    message,
                })
            }
        }
    }

    async fn deploy_phase(
        &mut self,
        category: ScriptCategory,
        force_recreate: bool,
    ) -> DeployResult<Vec<DeploymentResult>> {
        info!("Deploying {}", category.label());

        let mut results = Vec::new();
        for script in catalog::scripts_for(category) {
            let mut sql = self.load_script(script).await.inspect_err(|e| {
                error!("{} deployment failed at {}: {}", category.label(), script.filename, e);
            })?;

            if force_recreate {
                if let Some(table) = catalog::recreate_target(script.filename) {
                    warn!("Force recreate enabled for {}", table);
                    sql = format!("{}{}", queries::drop_table_cascade(table), sql);
                }
            }

            let result = self.execute_script(script, &sql).await?;
            results.push(result);
        }

        info!(
            "{} deployment completed: {} scripts executed",
            category.label(),
            results.len()
        );
        Ok(results)
    }

    /// Table scripts, optionally each preceded by `DROP TABLE ... CASCADE`
    pub async fn deploy_schema(&mut self, force_recreate: bool) -> DeployResult<Vec<DeploymentResult>> {
        self.deploy_phase(ScriptCategory::Schema, force_recreate).await
    }

    pub async fn deploy_functions(&mut self) -> DeployResult<Vec<DeploymentResult>> {
        self.deploy_phase(ScriptCategory::Function, false).await
    }

    pub async fn deploy_triggers(&mut self) -> DeployResult<Vec<DeploymentResult>> {
        self.deploy_phase(ScriptCategory::Trigger, false).await
    }

    /// Row-level-security policies. Disabled means no I/O at all.
    pub async fn deploy_security_policies(&mut self, enabled: bool) -> DeployResult<PolicyOutcome> {
        if !enabled {
            info!("RLS deployment skipped (disabled in config)");
            return Ok(PolicyOutcome::Skipped {
                reason: "disabled".to_string(),
            });
        }

        let results = self.deploy_phase(ScriptCategory::SecurityPolicy, false).await?;
        Ok(match results.last() {
            Some(result) => PolicyOutcome::Deployed {
                script: result.script.clone(),
                duration_seconds: result.duration_seconds,
            },
            None => PolicyOutcome::Skipped {
                reason: "no policy script catalogued".to_string(),
            },
        })
    }

    async fn run_phases(&mut self, force_recreate: bool, enable_security: bool) -> DeployResult<PolicyOutcome> {
        self.deploy_schema(force_recreate).await?;
        self.deploy_functions().await?;
        self.deploy_triggers().await?;
        self.deploy_security_policies(enable_security).await
    }

    /// Schema, functions, triggers, policies, strictly in that order.
    /// Always returns a summary; a failure is carried inside it.
    pub async fn deploy_all(&mut self, force_recreate: bool, enable_security: bool) -> SqlDeployment {
        info!(
            run_id = %self.ctx.run_id,
            force_recreate,
            enable_security,
            "Starting full SQL deployment"
        );
        let timestamp = Utc::now();
        let timer = Instant::now();

        let outcome = self.run_phases(force_recreate, enable_security).await;
        let total_duration_seconds = timer.elapsed().as_secs_f64();
        let counts = PhaseCounts::from_log(&self.deployment_log);

        match outcome {
            Ok(security_policies) => {
                info!(
                    "SQL deployment succeeded in {:.2}s: {} DDL, {} functions, {} triggers, RLS enabled: {}",
                    total_duration_seconds,
                    counts.schema,
                    counts.functions,
                    counts.triggers,
                    enable_security
                );
                SqlDeployment::Success(SqlDeploySuccess {
                    counts,
                    security_policies,
                    total_duration_seconds,
                    timestamp,
                    deployment_log: self.deployment_log.clone(),
                })
            }
            Err(e) => {
                error!(
                    "SQL deployment failed after {:.2}s: {}",
                    total_duration_seconds, e
                );
                SqlDeployment::Failed(SqlDeployFailure {
                    error: e.to_string(),
                    counts,
                    total_duration_seconds,
                    timestamp,
                    deployment_log: self.deployment_log.clone(),
                })
            }
        }
    }
}

fn checksum(sql: &str) -> String {
    format!("{:x}", Sha256::digest(sql.as_bytes()))
}
