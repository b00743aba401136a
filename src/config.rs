//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Result, TollgateError};
use crate::transport::MissingKeyPolicy;

/// Prefix for environment variables overriding file configuration.
pub const ENV_PREFIX: &str = "TOLLGATE";

/// Main configuration: limiters to register at startup and interceptor policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// What the interceptor does with a key that has no limiter
    #[serde(default)]
    pub missing_key: MissingKeyPolicy,

    /// Limiters to register
    #[serde(default)]
    pub limiters: Vec<LimiterConfig>,
}

/// One `(key, rate, burst)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Registry key
    pub key: String,
    /// Tokens per second
    pub rate: f64,
    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_burst() -> u32 {
    1
}

impl TollgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse limiter config: {}", e)))
    }

    /// Load configuration from an optional YAML file, then apply `TOLLGATE_*`
    /// environment overrides such as `TOLLGATE_MISSING_KEY=fail_closed`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading limiter configuration");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
