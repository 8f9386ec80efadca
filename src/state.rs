//! Run context
//!
//! Built once at entry and handed to every component constructor. Holds the
//! resolved settings, the stage selection and the `deploy` span that all
//! run-scoped events are recorded under.

use crate::config::{RunOptions, Settings};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Span;

/// Context shared by the components of one deployment run
#[derive(Debug)]
pub struct DeployContext {
    pub settings: Settings,
    pub options: RunOptions,
    /// `deploy_YYYYMMDD_HHMMSS`, derived from `started_at`
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    span: Span,
}

impl DeployContext {
    pub fn new(settings: Settings, options: RunOptions) -> Self {
        Self::starting_at(settings, options, Utc::now())
    }

    pub fn starting_at(settings: Settings, options: RunOptions, started_at: DateTime<Utc>) -> Self {
        let run_id = run_id_for(started_at);
        let span = tracing::info_span!("deploy", run_id = %run_id);
        Self {
            settings,
            options,
            run_id,
            started_at,
            span,
        }
    }

    /// Span every stage of this run is instrumented with
    pub fn span(&self) -> &Span {
        &self.span
    }
}

pub fn run_id_for(started_at: DateTime<Utc>) -> String {
    format!("deploy_{}", started_at.format("%Y%m%d_%H%M%S"))
}

/// Type alias for shared context
pub type SharedContext = Arc<DeployContext>;
