//! Data Loader
//!
//! Moves seed CSV files into their mapped tables and drives the two
//! reconciliation procedures that follow a load.
//!
//! Each file is loaded with a server-side `COPY` first. If that fails the
//! file is re-read and inserted in batches, once; there is no further retry.

pub mod catalog;
mod reconcile;

use crate::db::{Database, TableRef};
use crate::error::{mapping_error, not_found_error, DeployResult};
use crate::models::{LoadFailure, LoadMethod, LoadResult, LoadStatus, LoadSummary, LoadTotals};
use crate::state::SharedContext;
use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

type Row = Vec<Option<String>>;

pub struct DataLoader {
    ctx: SharedContext,
    db: Arc<dyn Database>,
    csv_base_path: PathBuf,
    batch_size: usize,
    load_log: Vec<LoadResult>,
}

impl DataLoader {
    pub fn new(ctx: SharedContext, db: Arc<dyn Database>) -> DeployResult<Self> {
        let csv_base_path = ctx.settings.paths.csv_base_path.clone();
        if !csv_base_path.is_dir() {
            return Err(not_found_error(format!(
                "CSV base path not found: {}",
                csv_base_path.display()
            )));
        }

        let batch_size = ctx.settings.batch_size;
        info!("Data Loader initialized with CSV path: {}", csv_base_path.display());
        Ok(Self {
            ctx,
            db,
            csv_base_path,
            batch_size,
            load_log: Vec::new(),
        })
    }

    /// Every load attempted so far, failed ones included
    pub fn load_log(&self) -> &[LoadResult] {
        &self.load_log
    }

    /// Load one catalogued file into its destination table
    pub async fn load_csv(&mut self, filename: &str, use_copy: bool) -> DeployResult<LoadResult> {
        let timestamp = Utc::now();
        let timer = Instant::now();

        let outcome = self.load_source(filename, use_copy).await;
        let duration_seconds = timer.elapsed().as_secs_f64();

        match outcome {
            Ok((table, rows_loaded, method)) => {
                info!(
                    "✓ {} loaded successfully ({} rows, {:.2}s)",
                    filename, rows_loaded, duration_seconds
                );
                let result = LoadResult {
                    csv_file: filename.to_string(),
                    table: Some(table.to_string()),
                    status: LoadStatus::Success,
                    rows_loaded,
                    method: Some(method),
                    duration_seconds,
                    timestamp,
                    error: None,
                };
                self.load_log.push(result.clone());
                Ok(result)
            }
            Err(e) => {
                error!("✗ {} load failed: {}", filename, e);
                self.load_log.push(LoadResult {
                    csv_file: filename.to_string(),
                    table: None,
                    status: LoadStatus::Failed,
                    rows_loaded: 0,
                    method: None,
                    duration_seconds,
                    timestamp,
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    async fn load_source(
        &self,
        filename: &str,
        use_copy: bool,
    ) -> DeployResult<(TableRef, u64, LoadMethod)> {
        let table = catalog::destination(filename)
            .ok_or_else(|| mapping_error(format!("No table mapping found for CSV: {}", filename)))?;
        let data = read_source(&self.csv_base_path.join(filename)).await?;

        info!("Loading {} into {}", filename, table);
        if !self.db.table_exists(table).await {
            return Err(mapping_error(format!(
                "Table {} does not exist. Run DDL deployment first.",
                table
            )));
        }

        if !use_copy {
            let rows = self.insert_rows(table, &data).await?;
            return Ok((table, rows, LoadMethod::BatchedInsert));
        }

        match self.db.copy_csv(table, data.clone()).await {
            Ok(rows) => {
                info!("Loaded {} rows into {}", rows, table);
                Ok((table, rows, LoadMethod::BulkCopy))
            }
            Err(e) => {
                warn!("COPY failed, falling back to INSERT: {}", e);
                let rows = self.insert_rows(table, &data).await?;
                Ok((table, rows, LoadMethod::BatchedInsertFallback))
            }
        }
    }

    /// Header-keyed batched insert. Counts rows submitted, so rows skipped
    /// on key conflicts still count as loaded. Short rows are padded with
    /// NULLs and fields past the header are dropped.
    async fn insert_rows(&self, table: TableRef, data: &[u8]) -> DeployResult<u64> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(mapping_error(format!("No columns found in CSV for {}", table)));
        }

        let mut batch: Vec<Row> = Vec::with_capacity(self.batch_size);
        let mut total = 0;
        for record in reader.records() {
            let record = record?;
            batch.push(header_row(&record, columns.len()));

            if batch.len() >= self.batch_size {
                total += self.flush(table, &columns, &mut batch).await?;
            }
        }
        if !batch.is_empty() {
            total += self.flush(table, &columns, &mut batch).await?;
        }

        info!("Loaded {} rows into {}", total, table);
        Ok(total)
    }

    async fn flush(&self, table: TableRef, columns: &[String], batch: &mut Vec<Row>) -> DeployResult<u64> {
        let submitted = batch.len() as u64;
        let written = self.db.insert_batch(table, columns, batch).await?;
        if written < submitted {
            debug!(
                "{} of {} rows already present in {}",
                submitted - written,
                submitted,
                table
            );
        }
        batch.clear();
        Ok(submitted)
    }

    /// Load every catalogued file present on disk. Absent files are skipped;
    /// the first failing file stops the iteration.
    pub async fn load_all_csvs(&mut self, use_copy: bool) -> LoadSummary {
        info!(run_id = %self.ctx.run_id, "Loading CSV data");
        let timestamp = Utc::now();
        let timer = Instant::now();

        let mut files_loaded = 0;
        let mut files_skipped = Vec::new();
        let mut total_rows = 0;
        let mut failure = None;

        for source in catalog::CSV_SOURCES.iter() {
            if !self.csv_base_path.join(source.filename).is_file() {
                warn!("CSV file not found, skipping: {}", source.filename);
                files_skipped.push(source.filename.to_string());
                continue;
            }

            match self.load_csv(source.filename, use_copy).await {
                Ok(result) => {
                    files_loaded += 1;
                    total_rows += result.rows_loaded;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let total_duration_seconds = timer.elapsed().as_secs_f64();
        match failure {
            None => {
                info!(
                    "CSV load succeeded in {:.2}s: {} files, {} rows",
                    total_duration_seconds, files_loaded, total_rows
                );
                LoadSummary::Success(LoadTotals {
                    files_loaded,
                    files_skipped,
                    total_rows,
                    total_duration_seconds,
                    timestamp,
                    load_log: self.load_log.clone(),
                })
            }
            Some(e) => {
                error!("CSV load failed after {:.2}s: {}", total_duration_seconds, e);
                LoadSummary::Failed(LoadFailure {
                    error: e.to_string(),
                    total_duration_seconds,
                    timestamp,
                    load_log: self.load_log.clone(),
                })
            }
        }
    }
}

fn header_row(record: &csv::StringRecord, width: usize) -> Row {
    let mut row: Row = record
        .iter()
        .take(width)
        .map(|field| (!field.is_empty()).then(|| field.to_string()))
        .collect();
    row.resize(width, None);
    row
}

async fn read_source(path: &Path) -> DeployResult<Bytes> {
    match tokio::fs::read(path).await {
        Ok(content) => Ok(Bytes::from(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found_error(format!(
            "CSV file not found: {}",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunMode, RunOptions, RunToggles};
    use crate::error::DeployError;
    use crate::testing::{self, FakeDatabase};
    use pretty_assertions::assert_eq;

    const AGENTS: &str = "agent_id,full_name,email\n\
                          a-1,Ada Lovelace,ada@example.com\n\
                          a-2,Grace Hopper,\n\
                          a-3,Alan Turing,alan@example.com\n";

    fn loader_with_batch(db: &Arc<FakeDatabase>, batch_size: usize) -> (tempfile::TempDir, DataLoader) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context_with_batch(
            dir.path(),
            dir.path(),
            RunOptions::resolve(RunMode::Full, RunToggles::default(), true),
            batch_size,
        );
        let loader = DataLoader::new(ctx, db.clone()).unwrap();
        (dir, loader)
    }

    fn loader(db: &Arc<FakeDatabase>) -> (tempfile::TempDir, DataLoader) {
        loader_with_batch(db, 1000)
    }

    #[tokio::test]
    async fn test_header_only_file_loads_zero_rows() {
        let db = Arc::new(FakeDatabase::deployed());
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "new_agents.csv", "agent_id,full_name,email\n");

        let result = loader.load_csv("new_agents.csv", true).await.unwrap();

        assert_eq!(result.rows_loaded, 0);
        assert_eq!(result.status, LoadStatus::Success);
        assert_eq!(result.method, Some(LoadMethod::BulkCopy));
    }

    #[tokio::test]
    async fn test_unmapped_file_is_rejected_and_logged() {
        let db = Arc::new(FakeDatabase::deployed());
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "stray.csv", "a,b\n1,2\n");

        let err = loader.load_csv("stray.csv", true).await.unwrap_err();

        assert!(matches!(err, DeployError::Mapping(_)));
        assert_eq!(loader.load_log().len(), 1);
        assert_eq!(loader.load_log()[0].status, LoadStatus::Failed);
        assert!(db.state().copies.is_empty());
    }

    #[tokio::test]
    async fn test_missing_destination_table_requires_schema_first() {
        let db = Arc::new(FakeDatabase::new());
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "new_agents.csv", AGENTS);

        let err = loader.load_csv("new_agents.csv", true).await.unwrap_err();

        assert!(matches!(err, DeployError::Mapping(ref m) if m.contains("Run DDL deployment first")));
    }

    #[tokio::test]
    async fn test_missing_file_through_load_csv_is_not_found() {
        let db = Arc::new(FakeDatabase::deployed());
        let (_dir, mut loader) = loader(&db);

        let err = loader.load_csv("new_agents.csv", true).await.unwrap_err();

        assert!(matches!(err, DeployError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_copy_failure_falls_back_to_batched_insert() {
        let db = Arc::new(FakeDatabase::deployed().with(|s| s.fail_copy = true));
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "new_agents.csv", AGENTS);

        let result = loader.load_csv("new_agents.csv", true).await.unwrap();

        assert_eq!(result.rows_loaded, 3);
        assert_eq!(result.method, Some(LoadMethod::BatchedInsertFallback));
        let state = db.state();
        assert_eq!(state.copies.len(), 1);
        assert_eq!(state.inserted.len(), 1);
        assert_eq!(state.inserted[0].1[1], vec![
            Some("a-2".to_string()),
            Some("Grace Hopper".to_string()),
            None,
        ]);
    }

    #[tokio::test]
    async fn test_ragged_rows_load_through_fallback() {
        let ragged = "agent_id,full_name,email\n\
                      a-1,Ada,ada@x.com\n\
                      a-2,Grace\n\
                      a-3,Alan,alan@x.com,extra\n";
        let db = Arc::new(FakeDatabase::deployed());
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "new_agents.csv", ragged);

        let result = loader.load_csv("new_agents.csv", true).await.unwrap();

        assert_eq!(result.rows_loaded, 3);
        assert_eq!(result.method, Some(LoadMethod::BatchedInsertFallback));
        let state = db.state();
        let rows = &state.inserted[0].1;
        assert_eq!(rows[1], vec![Some("a-2".to_string()), Some("Grace".to_string()), None]);
        assert_eq!(rows[2].len(), 3);
        assert_eq!(rows[2][2], Some("alan@x.com".to_string()));
    }

    #[tokio::test]
    async fn test_ragged_rows_count_the_same_loaded_directly() {
        let ragged = "agent_id,full_name,email\na-1,Ada,ada@x.com\na-2,Grace\na-3,Alan,alan@x.com\n";

        let direct_db = Arc::new(FakeDatabase::deployed());
        let (direct_dir, mut direct) = loader(&direct_db);
        testing::write_file(direct_dir.path(), "new_agents.csv", ragged);

        let fallback_db = Arc::new(FakeDatabase::deployed());
        let (fallback_dir, mut fallback) = loader(&fallback_db);
        testing::write_file(fallback_dir.path(), "new_agents.csv", ragged);

        let direct = direct.load_csv("new_agents.csv", false).await.unwrap();
        let fallback = fallback.load_csv("new_agents.csv", true).await.unwrap();

        assert_eq!(direct.rows_loaded, 3);
        assert_eq!(fallback.method, Some(LoadMethod::BatchedInsertFallback));
        assert_eq!(direct.rows_loaded, fallback.rows_loaded);
    }

    #[tokio::test]
    async fn test_fallback_is_attempted_exactly_once() {
        let db = Arc::new(FakeDatabase::deployed().with(|s| {
            s.fail_copy = true;
            s.fail_insert = true;
        }));
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "new_agents.csv", AGENTS);

        let result = loader.load_csv("new_agents.csv", true).await;

        assert!(result.is_err());
        let state = db.state();
        assert_eq!(state.copies.len(), 1);
        assert_eq!(state.insert_attempts, 1);
        assert_eq!(loader.load_log()[0].status, LoadStatus::Failed);
    }

    #[tokio::test]
    async fn test_fallback_count_matches_direct_insert() {
        let direct_db = Arc::new(FakeDatabase::deployed());
        let (direct_dir, mut direct) = loader(&direct_db);
        testing::write_file(direct_dir.path(), "new_agents.csv", AGENTS);

        let fallback_db = Arc::new(FakeDatabase::deployed().with(|s| s.fail_copy = true));
        let (fallback_dir, mut fallback) = loader(&fallback_db);
        testing::write_file(fallback_dir.path(), "new_agents.csv", AGENTS);

        let direct = direct.load_csv("new_agents.csv", false).await.unwrap();
        let fallback = fallback.load_csv("new_agents.csv", true).await.unwrap();

        assert_eq!(direct.method, Some(LoadMethod::BatchedInsert));
        assert_eq!(direct.rows_loaded, fallback.rows_loaded);
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let db = Arc::new(FakeDatabase::deployed());
        let (dir, mut loader) = loader_with_batch(&db, 2);
        let body = (1..=5).fold(String::from("agent_id,full_name\n"), |mut acc, i| {
            acc.push_str(&format!("a-{},Agent {}\n", i, i));
            acc
        });
        testing::write_file(dir.path(), "new_agents.csv", &body);

        let result = loader.load_csv("new_agents.csv", false).await.unwrap();

        assert_eq!(result.rows_loaded, 5);
        let sizes: Vec<usize> = db.state().inserted.iter().map(|(_, rows)| rows.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_conflicting_rows_still_count_as_loaded() {
        let db = Arc::new(FakeDatabase::deployed().with(|s| {
            s.existing_keys.insert("a-1".to_string());
        }));
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "new_agents.csv", AGENTS);

        let result = loader.load_csv("new_agents.csv", false).await.unwrap();

        assert_eq!(result.rows_loaded, 3);
        assert_eq!(db.state().tables["public.new_agents"], 2);
    }

    #[tokio::test]
    async fn test_load_all_with_no_files_present_succeeds() {
        let db = Arc::new(FakeDatabase::deployed());
        let (_dir, mut loader) = loader(&db);

        let summary = loader.load_all_csvs(true).await;

        let LoadSummary::Success(totals) = summary else {
            panic!("expected success");
        };
        assert_eq!(totals.files_loaded, 0);
        assert_eq!(totals.total_rows, 0);
        assert_eq!(totals.files_skipped, vec!["raw_company_info.csv", "new_agents.csv"]);
    }

    #[tokio::test]
    async fn test_load_all_stops_at_first_failure() {
        // company_info_raw lives in bronze, so its public destination is absent
        let db = Arc::new(FakeDatabase::deployed());
        let (dir, mut loader) = loader(&db);
        testing::write_file(dir.path(), "raw_company_info.csv", "company_id,name\nc-1,Acme\n");
        testing::write_file(dir.path(), "new_agents.csv", AGENTS);

        let summary = loader.load_all_csvs(true).await;

        assert!(summary.error().unwrap().contains("public.company_info_raw"));
        assert_eq!(summary.load_log().len(), 1);
        assert!(db.state().copies.is_empty());
    }

    #[test]
    fn test_missing_csv_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context(
            dir.path(),
            &dir.path().join("CSVs"),
            RunOptions::resolve(RunMode::Full, RunToggles::default(), true),
        );
        let result = DataLoader::new(ctx, Arc::new(FakeDatabase::new()));
        assert!(matches!(result, Err(DeployError::ResourceNotFound(_))));
    }
}
