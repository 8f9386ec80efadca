//! Seed file to destination table mapping

use crate::db::TableRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvSource {
    pub filename: &'static str,
    pub table: TableRef,
}

/// Every known seed file, in load order. These are also the only inputs
/// allowed to be absent from disk.
pub const CSV_SOURCES: [CsvSource; 2] = [
    CsvSource {
        filename: "raw_company_info.csv",
        // public, not the bronze table CREATE_company_info_raw.sql creates
        table: TableRef::new("public", "company_info_raw"),
    },
    CsvSource {
        filename: "new_agents.csv",
        table: TableRef::new("public", "new_agents"),
    },
];

pub fn destination(filename: &str) -> Option<TableRef> {
    CSV_SOURCES
        .iter()
        .find(|source| source.filename == filename)
        .map(|source| source.table)
}

/// Reconciles freshly loaded members into the staging table
pub const RECONCILIATION_PROCEDURE: &str = "run_unified_member_pipeline";

/// Deduplicates staged members into the unified agents table
pub const MERGE_PROCEDURE: &str = "run_unified_merge_batch";
