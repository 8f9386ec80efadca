//! SQL query constants and builders
//!
//! Contains the catalog and statistics queries issued by the connection manager.

use crate::db::{quote_ident, TableRef};

/// Connectivity check
pub const PING: &str = "SELECT 1";

/// Server metadata snapshot
pub const DATABASE_INFO: &str = r#"
    SELECT
        current_database() AS database_name,
        current_user::text AS user_name,
        version() AS version,
        pg_size_pretty(pg_database_size(current_database())) AS database_size
"#;

/// Does a table exist ($1 = schema, $2 = table)
pub const TABLE_EXISTS: &str = r#"
    SELECT EXISTS (
        SELECT FROM information_schema.tables
        WHERE table_schema = $1::text
          AND table_name = $2::text
    )
"#;

/// Does a function exist in a namespace ($1 = schema, $2 = function name)
pub const FUNCTION_EXISTS: &str = r#"
    SELECT EXISTS (
        SELECT FROM pg_proc p
        JOIN pg_namespace n ON p.pronamespace = n.oid
        WHERE n.nspname = $1::text AND p.proname = $2::text
    )
"#;

/// Staging table state after the reconciliation procedure
pub const MEMBER_BACKLOG: &str = r#"
    SELECT
        COUNT(*) AS total_records,
        COUNT(*) FILTER (WHERE processed = false) AS unprocessed
    FROM public.unified_company_member
"#;

/// Aggregates over the merged agents
pub const UNIFIED_AGENT_STATS: &str = r#"
    SELECT
        COUNT(*) AS total_count,
        COALESCE(SUM(CASE WHEN needs_review THEN 1 ELSE 0 END), 0)::bigint AS needs_review_count,
        ROUND(AVG(confidence_score)::numeric, 2)::float8 AS avg_confidence
    FROM public.new_unified_agents
"#;

/// Indexes on the core tables
pub const INDEX_INVENTORY: &str = r#"
    SELECT
        schemaname::text AS schema_name,
        tablename::text AS table_name,
        indexname::text AS index_name
    FROM pg_indexes
    WHERE schemaname IN ('public', 'bronze')
      AND tablename IN ('new_unified_agents', 'unified_company_member', 'new_agents')
    ORDER BY tablename, indexname
"#;

/// Confidence and team spread over the merged agents
pub const DATA_QUALITY: &str = r#"
    SELECT
        COUNT(*) AS total_records,
        COALESCE(SUM(CASE WHEN needs_review THEN 1 ELSE 0 END), 0)::bigint AS needs_review,
        ROUND(AVG(confidence_score)::numeric, 2)::float8 AS avg_confidence,
        MIN(confidence_score)::float8 AS min_confidence,
        MAX(confidence_score)::float8 AS max_confidence,
        COUNT(DISTINCT source_team_id) AS unique_teams
    FROM public.new_unified_agents
"#;

/// Row written by the most recent merge batch
pub const MERGE_LOG_LATEST: &str = r#"
    SELECT total_processed::bigint AS total_processed, status::text AS status
    FROM public.unified_merge_logs
    ORDER BY started_at DESC
    LIMIT 1
"#;

pub fn row_count(table: TableRef) -> String {
    format!("SELECT COUNT(*) FROM {}", table.qualified())
}

pub fn copy_csv(table: TableRef) -> String {
    format!(
        "COPY {} FROM STDIN WITH (FORMAT csv, HEADER true, DELIMITER ',', NULL '', ENCODING 'UTF8')",
        table.qualified()
    )
}

/// Multi-row insert fed by one JSON array parameter. `json_populate_recordset`
/// coerces the textual CSV values to the destination column types.
pub fn insert_batch(table: TableRef, columns: &[String]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({cols}) SELECT {cols} FROM json_populate_recordset(NULL::{table}, $1::json) ON CONFLICT DO NOTHING",
        table = table.qualified(),
        cols = column_list,
    )
}

pub fn call_procedure(name: &str) -> String {
    format!("SELECT public.{}()", quote_ident(name))
}

pub fn drop_table_cascade(table: TableRef) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE;\n", table.qualified())
}
