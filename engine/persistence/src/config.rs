//! Configuration for the round store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the on-disk round store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Base directory for stored rounds
    pub data_dir: PathBuf,

    /// Gzip round files
    pub compress: bool,

    /// Whether to fsync each round file before it is renamed into place
    pub fsync_on_commit: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), compress: false, fsync_on_commit: true }
    }
}

impl PersistenceConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// One file per committed round lives here
    pub fn rounds_dir(&self) -> PathBuf {
        self.data_dir.join("rounds")
    }

    /// Season-start multipliers
    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir.join("baseline.json")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }

        Ok(())
    }
}
