//! Configuration types
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for development (in-memory storage).

use crate::{ConfigError, HrdbResult};
use std::path::PathBuf;

/// Default LMDB map size in megabytes.
pub const DEFAULT_LMDB_MAX_SIZE_MB: usize = 64;

/// Largest LMDB map size whose byte count still fits in `usize`.
pub const MAX_LMDB_MAX_SIZE_MB: usize = usize::MAX / (1024 * 1024);

/// Which storage backend the facade registry is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Process-local maps; data is lost on exit.
    Memory,
    /// LMDB environment on disk.
    Lmdb,
}

impl StorageKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "inmem" => Ok(StorageKind::Memory),
            "lmdb" => Ok(StorageKind::Lmdb),
            other => Err(ConfigError::InvalidValue {
                field: "HRDB_STORAGE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected memory or lmdb".to_string(),
            }),
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq)]
pub struct HrdbConfig {
    pub storage: StorageKind,
    /// Directory of the LMDB environment (required for [`StorageKind::Lmdb`]).
    pub lmdb_path: Option<PathBuf>,
    pub lmdb_max_size_mb: usize,
}

impl Default for HrdbConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::Memory,
            lmdb_path: None,
            lmdb_max_size_mb: DEFAULT_LMDB_MAX_SIZE_MB,
        }
    }
}

impl HrdbConfig {
    /// In-memory configuration, used by tests and demos.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// LMDB configuration rooted at `path`.
    pub fn lmdb(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageKind::Lmdb,
            lmdb_path: Some(path.into()),
            lmdb_max_size_mb: DEFAULT_LMDB_MAX_SIZE_MB,
        }
    }

    /// Create HrdbConfig from environment variables.
    ///
    /// Environment variables:
    /// - `HRDB_STORAGE_BACKEND`: "memory" or "lmdb" (default: memory)
    /// - `HRDB_LMDB_PATH`: LMDB directory (required when backend is lmdb)
    /// - `HRDB_LMDB_MAX_SIZE_MB`: LMDB map size in megabytes (default: 64)
    pub fn from_env() -> HrdbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, then validate it.
    pub fn from_lookup<F>(lookup: F) -> HrdbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup("HRDB_STORAGE_BACKEND") {
            Some(value) => StorageKind::parse(&value)?,
            None => StorageKind::Memory,
        };

        let lmdb_path = lookup("HRDB_LMDB_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let lmdb_max_size_mb = match lookup("HRDB_LMDB_MAX_SIZE_MB") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "HRDB_LMDB_MAX_SIZE_MB".to_string(),
                value: value.clone(),
                reason: "must be a positive integer".to_string(),
            })?,
            None => DEFAULT_LMDB_MAX_SIZE_MB,
        };

        let config = Self {
            storage,
            lmdb_path,
            lmdb_max_size_mb,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - lmdb_path is set when the LMDB backend is selected
    /// - 0 < lmdb_max_size_mb <= MAX_LMDB_MAX_SIZE_MB
    pub fn validate(&self) -> HrdbResult<()> {
        if self.storage == StorageKind::Lmdb && self.lmdb_path.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "HRDB_LMDB_PATH".to_string(),
            }
            .into());
        }

        if self.lmdb_max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "HRDB_LMDB_MAX_SIZE_MB".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.lmdb_max_size_mb > MAX_LMDB_MAX_SIZE_MB {
            return Err(ConfigError::InvalidValue {
                field: "HRDB_LMDB_MAX_SIZE_MB".to_string(),
                value: self.lmdb_max_size_mb.to_string(),
                reason: format!("must be at most {}", MAX_LMDB_MAX_SIZE_MB),
            }
            .into());
        }

        Ok(())
    }
}
