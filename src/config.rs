//! Application configuration module
//!
//! Resolves settings once at startup. The binary loads `.env` before calling
//! [`Settings::load`]; everything below only reads through a key lookup.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load environment file: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

const DEFAULT_SQL_BASE_PATH: &str = "Supabase_replicate";
const DEFAULT_BATCH_SIZE: usize = 1000;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub min_pool_size: usize,
    pub max_pool_size: usize,
}

/// Where scripts and seed files live on disk
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub sql_base_path: PathBuf,
    pub csv_base_path: PathBuf,
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub paths: PathsConfig,
    /// `ENABLE_RLS`; only the literal `true` turns policies on
    pub enable_rls: bool,
    pub batch_size: usize,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let min_pool_size = parse_or(&lookup, "DB_MIN_CONNECTIONS", 1)?;
        let max_pool_size = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?;
        if min_pool_size == 0 || max_pool_size < min_pool_size {
            return Err(ConfigError::InvalidValue(format!(
                "pool bounds must satisfy max >= min >= 1 (min={}, max={})",
                min_pool_size, max_pool_size
            )));
        }

        let batch_size = parse_or(&lookup, "BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue("BATCH_SIZE must be > 0".to_string()));
        }

        let sql_base_path = lookup("SQL_BASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SQL_BASE_PATH));
        let csv_base_path = lookup("CSV_BASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| sql_base_path.join("CSVs"));

        let enable_rls = lookup("ENABLE_RLS")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Ok(Self {
            database: DatabaseConfig {
                url,
                min_pool_size,
                max_pool_size,
            },
            paths: PathsConfig {
                sql_base_path,
                csv_base_path,
            },
            enable_rls,
            batch_size,
        })
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be a positive integer, got {:?}", key, raw))),
        None => Ok(default),
    }
}

/// Which stages a run selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    SchemaOnly,
    DataOnly,
}

/// Operator toggles layered on top of the mode
#[derive(Debug, Clone, Copy, Default)]
pub struct RunToggles {
    pub force_recreate: bool,
    pub disable_security: bool,
    pub skip_verify: bool,
    pub skip_pipeline: bool,
}

/// Stage selection resolved once at entry; never changes mid-run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    pub mode: RunMode,
    pub force_recreate: bool,
    pub enable_security: bool,
    pub load_data: bool,
    pub run_pipeline: bool,
    pub verify: bool,
}

impl RunOptions {
    pub fn resolve(mode: RunMode, toggles: RunToggles, enable_rls: bool) -> Self {
        let enable_security = enable_rls && !toggles.disable_security;
        match mode {
            RunMode::Full => Self {
                mode,
                force_recreate: toggles.force_recreate,
                enable_security,
                load_data: true,
                run_pipeline: !toggles.skip_pipeline,
                verify: !toggles.skip_verify,
            },
            RunMode::SchemaOnly => Self {
                mode,
                force_recreate: toggles.force_recreate,
                enable_security,
                load_data: false,
                run_pipeline: false,
                verify: !toggles.skip_verify,
            },
            RunMode::DataOnly => Self {
                mode,
                force_recreate: false,
                enable_security: false,
                load_data: true,
                run_pipeline: !toggles.skip_pipeline,
                verify: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        let result = Settings::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingVar(ref v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_blank_database_url_is_fatal() {
        let result = Settings::from_lookup(lookup_from(&[("DATABASE_URL", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://u:p@localhost/db")]))
                .unwrap();
        assert_eq!(settings.batch_size, 1000);
        assert!(settings.enable_rls);
        assert_eq!(settings.database.min_pool_size, 1);
        assert_eq!(settings.database.max_pool_size, 10);
        assert_eq!(settings.paths.sql_base_path, PathBuf::from("Supabase_replicate"));
        assert_eq!(settings.paths.csv_base_path, PathBuf::from("Supabase_replicate/CSVs"));
    }

    #[test]
    fn test_enable_rls_requires_literal_true() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
            ("ENABLE_RLS", "yes"),
        ]))
        .unwrap();
        assert!(!settings.enable_rls);

        let settings = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
            ("ENABLE_RLS", "TRUE"),
        ]))
        .unwrap();
        assert!(settings.enable_rls);
    }

    #[test]
    fn test_invalid_pool_bounds() {
        let result = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
            ("DB_MIN_CONNECTIONS", "4"),
            ("DB_MAX_CONNECTIONS", "2"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://u:p@localhost/db"),
            ("BATCH_SIZE", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_data_only_disables_schema_side_effects() {
        let toggles = RunToggles {
            force_recreate: true,
            ..Default::default()
        };
        let options = RunOptions::resolve(RunMode::DataOnly, toggles, true);
        assert!(!options.force_recreate);
        assert!(!options.enable_security);
        assert!(!options.verify);
        assert!(options.load_data);
        assert!(options.run_pipeline);
    }

    #[test]
    fn test_schema_only_never_loads_data() {
        let options = RunOptions::resolve(RunMode::SchemaOnly, RunToggles::default(), true);
        assert!(!options.load_data);
        assert!(!options.run_pipeline);
        assert!(options.verify);
        assert!(options.enable_security);
    }

    #[test]
    fn test_security_needs_both_env_and_flag() {
        let toggles = RunToggles {
            disable_security: true,
            ..Default::default()
        };
        assert!(!RunOptions::resolve(RunMode::Full, toggles, true).enable_security);
        assert!(!RunOptions::resolve(RunMode::Full, RunToggles::default(), false).enable_security);
    }
}
