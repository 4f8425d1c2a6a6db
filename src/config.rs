use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::instance::Origin;
use crate::output::OutputFormat;
use crate::scheduler::OverlapPolicy;

pub const DEFAULT_PARALLELISM: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
const CONFIG_FILE_NAME: &str = "config.json";
const LOCAL_CONFIG_FILE: &str = "driftwatch.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aws: AwsConfig,
    pub terraform: TerraformConfig,
    pub detection: DetectionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// JSON captured from `aws ec2 describe-instances`.
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    pub state_path: Option<PathBuf>,
    /// Terraform HTTP backend address; takes precedence over `state_path`.
    pub state_url: Option<String>,
    pub state_token: Option<String>,
}

impl fmt::Debug for TerraformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerraformConfig")
            .field("state_path", &self.state_path)
            .field("state_url", &self.state_url)
            .field("state_token", &self.state_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub source_of_truth: Origin,
    /// Empty means the default EC2 attribute set.
    pub attribute_paths: Vec<String>,
    pub parallelism: usize,
    pub timeout_secs: u64,
    pub schedule: Option<String>,
    pub overlap: OverlapPolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            source_of_truth: Origin::Aws,
            attribute_paths: Vec::new(),
            parallelism: DEFAULT_PARALLELISM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            schedule: None,
            overlap: OverlapPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

impl Config {
    /// Loads `explicit` if given, otherwise the first existing default location, otherwise
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }

        for candidate in Self::default_locations() {
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "using config file");
                return Self::from_path(&candidate);
            }
        }

        Ok(Self::default())
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_locations() -> Vec<PathBuf> {
        let mut locations = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            locations.push(dir.join("driftwatch").join(CONFIG_FILE_NAME));
        }
        locations.push(PathBuf::from(LOCAL_CONFIG_FILE));
        locations
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.parallelism == 0 {
            return Err(ConfigError::Invalid(
                "detection.parallelism must be at least 1".to_string(),
            ));
        }

        if self.detection.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "detection.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self
            .detection
            .attribute_paths
            .iter()
            .any(|p| p.trim().is_empty() || p.split('.').any(str::is_empty))
        {
            return Err(ConfigError::Invalid(
                "detection.attribute_paths contains an empty path segment".to_string(),
            ));
        }

        Ok(())
    }
}
