//! Post-deployment verification
//!
//! Read-only. Missing objects become [`VerificationGap`]s in the report;
//! nothing here returns an error. The index inventory and data-quality
//! aggregates are reported alongside the catalog checks.

use crate::deployer::catalog::{EXPECTED_FUNCTIONS, EXPECTED_TABLES, FUNCTION_SCHEMA};
use crate::deployer::SqlDeployer;
use crate::models::{TableCheck, VerificationGap, VerificationReport};
use tracing::{error, info, warn};

impl SqlDeployer {
    /// Check every expected table, function and index, then sample data quality
    pub async fn verify_deployment(&self) -> VerificationReport {
        info!(run_id = %self.ctx.run_id, "Verifying deployment");
        let mut report = VerificationReport::default();

        for table in EXPECTED_TABLES {
            let exists = self.db.table_exists(table).await;
            let row_count = if exists { self.db.row_count(table).await } else { 0 };

            if exists {
                info!("✓ Table {} exists ({} rows)", table, row_count);
            } else {
                error!("✗ Table {} NOT FOUND", table);
                report.gaps.push(VerificationGap::MissingTable {
                    table: table.to_string(),
                });
            }
            report
                .tables
                .insert(table.to_string(), TableCheck { exists, row_count });
        }

        for function in EXPECTED_FUNCTIONS {
            let (exists, lookup_error) = match self.db.function_exists(FUNCTION_SCHEMA, function).await {
                Ok(exists) => (exists, None),
                Err(e) => {
                    error!("Error checking function {}: {}", function, e);
                    (false, Some(e.to_string()))
                }
            };

            if exists {
                info!("✓ Function {}() exists", function);
            } else {
                error!("✗ Function {}() NOT FOUND", function);
                report.gaps.push(VerificationGap::MissingFunction {
                    function: function.to_string(),
                    lookup_error,
                });
            }
            report.functions.insert(function.to_string(), exists);
        }

        self.verify_indexes(&mut report).await;
        self.verify_data_quality(&mut report).await;

        report.all_verified = report.gaps.is_empty();
        if report.all_verified {
            info!("✓ All components verified successfully");
        } else {
            error!("✗ Verification found {} missing components", report.gaps.len());
        }
        report
    }

    async fn verify_indexes(&self, report: &mut VerificationReport) {
        match self.db.index_inventory().await {
            Ok(indexes) if indexes.is_empty() => {
                warn!("✗ No indexes found on the core tables");
                report.gaps.push(VerificationGap::NoIndexes { lookup_error: None });
            }
            Ok(indexes) => {
                info!("✓ Found {} indexes on the core tables", indexes.len());
                report.indexes = indexes;
            }
            Err(e) => {
                error!("Error checking indexes: {}", e);
                report.gaps.push(VerificationGap::NoIndexes {
                    lookup_error: Some(e.to_string()),
                });
            }
        }
    }

    async fn verify_data_quality(&self, report: &mut VerificationReport) {
        match self.db.data_quality().await {
            Ok(quality) => {
                info!(
                    "✓ Data quality: {} records, {} need review, {} teams",
                    quality.total_records, quality.needs_review, quality.unique_teams
                );
                report.data_quality = Some(quality);
            }
            Err(e) => {
                error!("Error checking data quality: {}", e);
                report.gaps.push(VerificationGap::DataQualityUnavailable {
                    error: e.to_string(),
                });
            }
        }
    }
}
