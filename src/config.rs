//! Editor configuration, read from the environment (and `.env`)

use crate::ingestion::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

pub const DATABASE_VAR: &str = "DBEDITOR_DATABASE";
pub const BATCH_SIZE_VAR: &str = "DBEDITOR_BATCH_SIZE";
pub const LOG_VAR: &str = "DBEDITOR_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// SQLite file to open; `None` means an in-memory database.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Rows per merge transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Default `tracing` filter when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            batch_size: default_batch_size(),
            log_filter: default_log_filter(),
        }
    }
}

/// The default `tracing` filter from `DBEDITOR_LOG`. Read on its own so the
/// subscriber can be installed before the rest of the configuration, whose
/// warnings would otherwise be dropped.
pub fn log_filter_from_env() -> String {
    log_filter_from_lookup(|key| std::env::var(key).ok())
}

fn log_filter_from_lookup<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(LOG_VAR)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(default_log_filter)
}

impl EditorConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup. Unset or empty values keep
    /// their defaults; an unparsable batch size is ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get(DATABASE_VAR) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = get(BATCH_SIZE_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.batch_size = n,
                _ => warn!(
                    value = %raw,
                    default = config.batch_size,
                    "Invalid {}, using default",
                    BATCH_SIZE_VAR
                ),
            }
        }

        config.log_filter = log_filter_from_lookup(&lookup);
        config
    }
}
