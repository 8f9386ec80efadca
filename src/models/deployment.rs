//! SQL deployment and verification records

use crate::deployer::catalog::ScriptCategory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
    Success,
    Failed,
}

/// One executed script. Appended to the deployment log, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentResult {
    pub script: String,
    pub category: ScriptCategory,
    pub status: ScriptStatus,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of the statement text actually sent, drop prefix included
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Successful scripts per phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseCounts {
    pub schema: usize,
    pub functions: usize,
    pub triggers: usize,
    pub security_policies: usize,
}

impl PhaseCounts {
    pub fn from_log(log: &[DeploymentResult]) -> Self {
        let mut counts = Self::default();
        for entry in log.iter().filter(|e| e.status == ScriptStatus::Success) {
            match entry.category {
                ScriptCategory::Schema => counts.schema += 1,
                ScriptCategory::Function => counts.functions += 1,
                ScriptCategory::Trigger => counts.triggers += 1,
                ScriptCategory::SecurityPolicy => counts.security_policies += 1,
            }
        }
        counts
    }
}

/// Outcome of the security-policy phase
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PolicyOutcome {
    Deployed { script: String, duration_seconds: f64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlDeploySuccess {
    pub counts: PhaseCounts,
    pub security_policies: PolicyOutcome,
    pub total_duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub deployment_log: Vec<DeploymentResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlDeployFailure {
    pub error: String,
    /// Scripts that completed before the failing one
    pub counts: PhaseCounts,
    pub total_duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub deployment_log: Vec<DeploymentResult>,
}

/// Aggregate summary returned by `SqlDeployer::deploy_all`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SqlDeployment {
    Success(SqlDeploySuccess),
    Failed(SqlDeployFailure),
}

impl SqlDeployment {
    pub fn error(&self) -> Option<&str> {
        match self {
            SqlDeployment::Success(_) => None,
            SqlDeployment::Failed(f) => Some(&f.error),
        }
    }

    pub fn counts(&self) -> PhaseCounts {
        match self {
            SqlDeployment::Success(s) => s.counts,
            SqlDeployment::Failed(f) => f.counts,
        }
    }

    pub fn deployment_log(&self) -> &[DeploymentResult] {
        match self {
            SqlDeployment::Success(s) => &s.deployment_log,
            SqlDeployment::Failed(f) => &f.deployment_log,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCheck {
    pub exists: bool,
    pub row_count: i64,
}

/// An expected object that was not found. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationGap {
    MissingTable {
        table: String,
    },
    MissingFunction {
        function: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        lookup_error: Option<String>,
    },
    /// No index found on the core tables, or the lookup failed
    NoIndexes {
        #[serde(skip_serializing_if = "Option::is_none")]
        lookup_error: Option<String>,
    },
    DataQualityUnavailable {
        error: String,
    },
}

/// An index on one of the core tables, from `pg_indexes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub schema: String,
    pub table: String,
    pub index: String,
}

/// Aggregates over the unified agents table. Confidence bounds are absent
/// while the table is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_records: i64,
    pub needs_review: i64,
    pub avg_confidence: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    pub unique_teams: i64,
}

/// Read-only snapshot of the deployed objects
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    pub tables: BTreeMap<String, TableCheck>,
    pub functions: BTreeMap<String, bool>,
    pub indexes: Vec<IndexEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,
    pub gaps: Vec<VerificationGap>,
    pub all_verified: bool,
}
