//! Database access seam
//!
//! Every component reaches Postgres through [`Database`]. The production
//! implementation is `connection::ConnectionManager`; tests swap in a fake.

pub mod queries;

use crate::error::DeployResult;
use crate::models::{
    DataQuality, DatabaseInfo, IndexEntry, MemberBacklog, MergeLogEntry, PipelineStatistics,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// A schema-qualified table from the static catalogues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: &'static str,
    pub table: &'static str,
}

impl TableRef {
    pub const fn new(schema: &'static str, table: &'static str) -> Self {
        Self { schema, table }
    }

    /// Quoted `"schema"."table"` for splicing into statement text
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(self.schema), quote_ident(self.table))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Operations the deployer, loader and orchestrator need from the database.
///
/// Statement-level methods each run in their own unit of work: committed on
/// success, rolled back on error, connection released on every path.
#[async_trait]
pub trait Database: Send + Sync {
    /// Trivial round trip. Never errors.
    async fn test_connection(&self) -> bool;

    /// Name, user, version and size. Empty on failure.
    async fn database_info(&self) -> DatabaseInfo;

    /// Catalog lookup. `false` on failure.
    async fn table_exists(&self, table: TableRef) -> bool;

    /// Current row count, `-1` when the count query fails.
    async fn row_count(&self, table: TableRef) -> i64;

    async fn function_exists(&self, schema: &str, name: &str) -> DeployResult<bool>;

    /// Indexes on the core tables
    async fn index_inventory(&self) -> DeployResult<Vec<IndexEntry>>;

    async fn data_quality(&self) -> DeployResult<DataQuality>;

    /// Run a possibly multi-statement script.
    async fn execute_script(&self, sql: &str, autocommit: bool) -> DeployResult<()>;

    /// Server-side bulk copy of a headered CSV body. All-or-nothing.
    async fn copy_csv(&self, table: TableRef, data: Bytes) -> DeployResult<u64>;

    /// Insert one batch, ignoring rows that conflict with existing keys.
    /// Returns the number of rows the server actually wrote.
    async fn insert_batch(
        &self,
        table: TableRef,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> DeployResult<u64>;

    /// `SELECT public.<name>()`
    async fn call_procedure(&self, name: &str) -> DeployResult<()>;

    async fn member_backlog(&self) -> DeployResult<MemberBacklog>;

    async fn unified_agent_stats(&self) -> DeployResult<PipelineStatistics>;

    /// Latest merge-log row, `None` while the log is empty
    async fn latest_merge_log(&self) -> DeployResult<Option<MergeLogEntry>>;

    /// Tear down the pool. Idempotent.
    fn close(&self);
}
