//! Seed loading and reconciliation pipeline records

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Success,
    Failed,
}

/// Path that actually moved the rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMethod {
    BulkCopy,
    BatchedInsert,
    /// Batched insert after the bulk copy failed
    BatchedInsertFallback,
}

/// Per-file load record, appended to the load log regardless of outcome
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub csv_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub status: LoadStatus,
    pub rows_loaded: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<LoadMethod>,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadTotals {
    pub files_loaded: usize,
    /// Catalogued sources absent from disk; tolerated
    pub files_skipped: Vec<String>,
    pub total_rows: u64,
    pub total_duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub load_log: Vec<LoadResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub error: String,
    pub total_duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub load_log: Vec<LoadResult>,
}

/// Summary of `DataLoader::load_all_csvs`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadSummary {
    Success(LoadTotals),
    Failed(LoadFailure),
}

impl LoadSummary {
    pub fn error(&self) -> Option<&str> {
        match self {
            LoadSummary::Success(_) => None,
            LoadSummary::Failed(f) => Some(&f.error),
        }
    }

    pub fn load_log(&self) -> &[LoadResult] {
        match self {
            LoadSummary::Success(t) => &t.load_log,
            LoadSummary::Failed(f) => &f.load_log,
        }
    }
}

/// Staging-table state read back after reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberBacklog {
    pub total_records: i64,
    pub unprocessed: i64,
}

/// Most recent row of the merge log, written by the merge procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeLogEntry {
    pub total_processed: i64,
    pub status: String,
}

/// Aggregates read from the unified agents table; never computed here
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineStatistics {
    pub unified_agents_count: i64,
    pub needs_review_count: i64,
    pub avg_confidence: f64,
}

/// Outcome of one opaque procedure call
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed {
        procedure: String,
        duration_seconds: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        backlog: Option<MemberBacklog>,
        #[serde(skip_serializing_if = "Option::is_none")]
        merge_log: Option<MergeLogEntry>,
    },
    Failed {
        procedure: String,
        duration_seconds: f64,
        error: String,
    },
    NotRun,
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSuccess {
    pub csv_load: LoadTotals,
    pub reconciliation: StepOutcome,
    pub merge: StepOutcome,
    pub statistics: PipelineStatistics,
    pub total_duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineFailure {
    pub error: String,
    pub csv_load: LoadSummary,
    pub reconciliation: StepOutcome,
    pub merge: StepOutcome,
    pub total_duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

/// Summary of `DataLoader::run_data_pipeline`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineRun {
    Success(PipelineSuccess),
    Failed(PipelineFailure),
}

impl PipelineRun {
    pub fn error(&self) -> Option<&str> {
        match self {
            PipelineRun::Success(_) => None,
            PipelineRun::Failed(f) => Some(&f.error),
        }
    }
}
