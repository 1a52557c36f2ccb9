use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::file::PAGE_SIZE;

/// Number of pages cached when no capacity is given
pub const DEFAULT_PAGES: usize = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Buffer pool capacity must be at least one page")]
    ZeroCapacity,

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which clean page gets evicted when the pool is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    /// Least recently touched clean page
    #[default]
    Recency,
    /// Uniformly random clean page
    Random,
    /// First clean page found in the page table
    FirstClean,
}

/// Window after which a blocked lock request aborts its transaction:
/// `abort_min_ms` plus a uniform jitter in `[0, abort_jitter_ms]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTimeout {
    pub abort_min_ms: u64,
    pub abort_jitter_ms: u64,
}

impl LockTimeout {
    pub fn new(min: Duration, jitter: Duration) -> Self {
        Self {
            abort_min_ms: min.as_millis() as u64,
            abort_jitter_ms: jitter.as_millis() as u64,
        }
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.abort_min_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.abort_jitter_ms)
    }
}

impl Default for LockTimeout {
    fn default() -> Self {
        Self {
            abort_min_ms: 200,
            abort_jitter_ms: 200,
        }
    }
}

/// Buffer pool configuration, fixed for the lifetime of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of resident pages
    pub capacity: usize,
    /// Page size used when creating table files
    pub page_size: usize,
    pub eviction: EvictionStrategy,
    pub lock_timeout: LockTimeout,
    /// Seed for lock-timeout jitter and random eviction; entropy when unset
    pub seed: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PAGES,
            page_size: PAGE_SIZE,
            eviction: EvictionStrategy::default(),
            lock_timeout: LockTimeout::default(),
            seed: None,
        }
    }
}

impl PoolConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_eviction(mut self, eviction: EvictionStrategy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_lock_timeout(mut self, min: Duration, jitter: Duration) -> Self {
        self.lock_timeout = LockTimeout::new(min, jitter);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.capacity, DEFAULT_PAGES);
        assert_eq!(config.page_size, PAGE_SIZE);
        assert_eq!(config.eviction, EvictionStrategy::Recency);
        assert_eq!(config.lock_timeout.min(), Duration::from_millis(200));
        assert_eq!(config.lock_timeout.jitter(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pool.json");

        let config = PoolConfig::new(8)
            .with_eviction(EvictionStrategy::FirstClean)
            .with_lock_timeout(Duration::from_millis(30), Duration::from_millis(5))
            .with_seed(7);
        config.save(&path).unwrap();

        assert_eq!(PoolConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PoolConfig =
            serde_json::from_str(r#"{ "capacity": 3, "eviction": "random" }"#).unwrap();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.eviction, EvictionStrategy::Random);
        assert_eq!(config.page_size, PAGE_SIZE);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(PoolConfig::load(&missing), Err(ConfigError::Io(_))));

        let garbled = temp_dir.path().join("garbled.json");
        std::fs::write(&garbled, "{ capacity: ").unwrap();
        assert!(matches!(PoolConfig::load(&garbled), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        assert!(matches!(
            PoolConfig::new(0).validate(),
            Err(ConfigError::ZeroCapacity)
        ));

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pool.json");
        std::fs::write(&path, r#"{ "capacity": 0 }"#).unwrap();
        assert!(matches!(
            PoolConfig::load(&path),
            Err(ConfigError::ZeroCapacity)
        ));
    }
}
