//! seed-deploy - Database deployment and seed data sync
//!
//! Applies the catalogued SQL scripts (tables, functions, triggers and
//! row-level-security policies) to a Postgres database, verifies the result,
//! loads the seed CSV files and runs the reconciliation procedures.
//!
//! Every run writes a JSON report, successful or not. The exit code is 0 only
//! when every selected stage succeeded.

mod config;
mod connection;
mod db;
mod deployer;
mod error;
mod loader;
mod models;
mod pipeline;
mod state;
#[cfg(test)]
mod testing;

use crate::config::{ConfigError, RunMode, RunOptions, RunToggles, Settings};
use crate::connection::ConnectionManager;
use crate::error::DeployError;
use crate::models::{DeploymentReport, RunState};
use crate::pipeline::Orchestrator;
use crate::state::{run_id_for, DeployContext};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "seed-deploy", version, about = "Deploy the database schema and load seed data")]
#[command(group(ArgGroup::new("mode").args(["full", "ddl_only", "data_only"])))]
struct Cli {
    /// Schema, verification, data load and pipeline (default)
    #[arg(long)]
    full: bool,

    /// Deploy scripts only; never touches CSV files
    #[arg(long)]
    ddl_only: bool,

    /// Load data and run the pipeline; scripts are re-applied without policies
    #[arg(long)]
    data_only: bool,

    /// Drop each table before its CREATE script runs (destroys data)
    #[arg(long)]
    force_recreate: bool,

    /// Skip row-level-security policies
    #[arg(long)]
    no_rls: bool,

    #[arg(long)]
    no_verify: bool,

    /// Load CSV files without running the reconciliation procedures
    #[arg(long)]
    no_pipeline: bool,

    /// Overrides LOG_LEVEL; RUST_LOG wins over both
    #[arg(long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long, default_value = "logs/deployment_report.json")]
    report_file: PathBuf,

    /// Environment file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.ddl_only {
            RunMode::SchemaOnly
        } else if self.data_only {
            RunMode::DataOnly
        } else {
            RunMode::Full
        }
    }

    fn toggles(&self) -> RunToggles {
        RunToggles {
            force_recreate: self.force_recreate,
            disable_security: self.no_rls,
            skip_verify: self.no_verify,
            skip_pipeline: self.no_pipeline,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let env_loaded = load_env(cli.env_file.as_deref());
    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    let _log_guard = init_tracing(&level, cli.log_file.as_deref())?;

    info!("Starting seed-deploy ({:?} mode)", cli.mode());
    let started_at = Utc::now();

    let settings = match env_loaded.and_then(|()| Settings::load()) {
        Ok(settings) => settings,
        Err(e) => {
            let options = RunOptions::resolve(cli.mode(), cli.toggles(), false);
            return write_failed_report(&cli.report_file, started_at, options, &DeployError::from(e)).await;
        }
    };
    info!("Configuration loaded successfully");

    let options = RunOptions::resolve(cli.mode(), cli.toggles(), settings.enable_rls);
    let ctx = Arc::new(DeployContext::starting_at(settings, options, started_at));

    let manager = match ConnectionManager::connect(&ctx).await {
        Ok(manager) => manager,
        Err(e) => return write_failed_report(&cli.report_file, started_at, options, &e).await,
    };

    let report = Orchestrator::new(ctx, Arc::new(manager)).run().await;
    report.save(&cli.report_file).await?;
    log_summary(&report);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Load the environment file. A missing default `.env` is fine; a missing
/// explicitly named file is not.
fn load_env(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => dotenvy::from_path(path).map_err(ConfigError::from),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(e.into()),
        },
    }
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;

            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Report for a run that never reached the orchestrator
async fn write_failed_report(
    path: &Path,
    started_at: DateTime<Utc>,
    options: RunOptions,
    err: &DeployError,
) -> anyhow::Result<ExitCode> {
    error!("Deployment failed before any stage ran: {}", err);

    let mut report = DeploymentReport::begin(run_id_for(started_at), started_at, options);
    report.stages_visited.push(RunState::Failed);
    report.finish(Err(err));
    report.save(path).await?;

    Ok(ExitCode::FAILURE)
}

fn log_summary(report: &DeploymentReport) {
    info!("Deployment ID: {}", report.deployment_id);
    info!("Status: {:?}", report.status);
    info!("Duration: {:.2}s", report.total_duration_seconds);
    if let Some(err) = &report.error {
        error!("Error: {}", err);
    }
}
