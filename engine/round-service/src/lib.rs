//! Fantasy Scoring Round Service Library
//!
//! Wires the pure scoring engine to a score store: configuration, logging,
//! input loading and the round runner that guarantees each round is
//! committed exactly once no matter how often it is retried.

use anyhow::{Context, Result};
use std::path::Path;

pub mod config;
pub mod inputs;
pub mod logging;
pub mod service;

pub use config::{LoggingConfig, ServiceConfig};
pub use logging::initialize_logging;
pub use service::{RoundRun, RoundService, ServiceError, TeamHistory};

/// Load configuration from an optional file and environment variables
pub fn load_configuration(file: Option<&Path>) -> Result<ServiceConfig> {
    config::load_config(file).context("Failed to load service configuration")
}
