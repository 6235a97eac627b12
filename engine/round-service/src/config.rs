//! Service configuration management

use anyhow::{Context, Result};
use persistence::PersistenceConfig;
use scoring_engine::RuleSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `SCORING_DATA_DIR`, `SCORING_LOGGING__LEVEL`
pub const ENV_PREFIX: &str = "SCORING";

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where committed rounds are stored
    pub data_dir: PathBuf,

    /// Rule set file; the built-in standard rules when unset
    pub ruleset_path: Option<PathBuf>,

    /// Gzip stored rounds
    pub compress: bool,

    pub fsync_on_commit: bool,

    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            ruleset_path: None,
            compress: false,
            fsync_on_commit: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl ServiceConfig {
    pub fn persistence(&self) -> PersistenceConfig {
        PersistenceConfig {
            data_dir: self.data_dir.clone(),
            compress: self.compress,
            fsync_on_commit: self.fsync_on_commit,
        }
    }

    /// The configured rule set
    pub fn load_ruleset(&self) -> Result<RuleSet> {
        match &self.ruleset_path {
            Some(path) => RuleSet::load(path)
                .with_context(|| format!("Failed to load rule set from {:?}", path)),
            None => RuleSet::standard().context("Built-in rule set is invalid"),
        }
    }
}

/// Load configuration: defaults, then the optional TOML file, then
/// `SCORING_*` environment variables
pub fn load_config(file: Option<&Path>) -> Result<ServiceConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration sources")?;

    let config: ServiceConfig =
        settings.try_deserialize().context("Failed to parse service configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
fn validate_config(config: &ServiceConfig) -> Result<()> {
    config.persistence().validate().map_err(|e| anyhow::anyhow!(e))?;

    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    if let Some(path) = &config.ruleset_path {
        if !path.exists() {
            return Err(anyhow::anyhow!("Rule set file not found: {:?}", path));
        }
    }

    Ok(())
}
