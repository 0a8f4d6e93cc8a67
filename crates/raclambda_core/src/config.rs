use std::path::PathBuf;

use crate::commands::OutputMode;
use crate::error::CycleError;

pub const PROJECT_ENV: &str = "RAC_PROJECT";
pub const DREGS_BUCKET_ENV: &str = "RAC_DREGS";
pub const OUTPUT_BUCKET_ENV: &str = "RAC_OUTPUT";
pub const SYNC_CONFIG_PARAMETER_ENV: &str = "RCLONE_CONFIG_SSM_NAME";
pub const INPUT_BUCKET_ENV: &str = "RAC_INPUT_BUCKET";
pub const CONVERSION_BINARY_ENV: &str = "RAC_BINARY";
pub const SYNC_BINARY_ENV: &str = "RCLONE_BINARY";
pub const SYNC_REMOTE_ENV: &str = "RCLONE_REMOTE";
pub const OUTPUT_MODE_ENV: &str = "RAC_OUTPUT_MODE";
pub const STAGING_ROOT_ENV: &str = "RAC_STAGING_ROOT";

pub const DEFAULT_CONVERSION_BINARY: &str = "./rac";
pub const DEFAULT_SYNC_BINARY: &str = "rclone";
pub const DEFAULT_SYNC_REMOTE: &str = "S3";

/// Settings for one invocation, read once and passed to every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub project: String,
    pub dregs_bucket: String,
    pub output_bucket: String,
    pub sync_config_parameter: String,
    /// Only envelopes naming this bucket are accepted.
    pub input_bucket: String,
    pub conversion_binary: PathBuf,
    pub sync_binary: PathBuf,
    pub sync_remote: String,
    pub output_mode: OutputMode,
    pub staging_root: PathBuf,
}

impl HandlerConfig {
    /// Builds the configuration from a variable lookup.
    ///
    /// Blank values are treated as absent. The first missing required
    /// variable is reported, in declaration order.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CycleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            optional(name).ok_or_else(|| CycleError::ConfigurationMissing {
                name: name.to_string(),
            })
        };

        let input_bucket = required(INPUT_BUCKET_ENV)?;
        let project = required(PROJECT_ENV)?;
        let dregs_bucket = required(DREGS_BUCKET_ENV)?;
        let output_bucket = required(OUTPUT_BUCKET_ENV)?;
        let sync_config_parameter = required(SYNC_CONFIG_PARAMETER_ENV)?;

        let output_mode = match optional(OUTPUT_MODE_ENV) {
            Some(value) => {
                OutputMode::parse(&value).ok_or_else(|| CycleError::InvalidConfiguration {
                    name: OUTPUT_MODE_ENV.to_string(),
                    message: format!("expected 'parquet' or 'aws', got '{value}'"),
                })?
            }
            None => OutputMode::Parquet,
        };

        Ok(Self {
            project,
            dregs_bucket,
            output_bucket,
            sync_config_parameter,
            input_bucket,
            conversion_binary: optional(CONVERSION_BINARY_ENV)
                .unwrap_or_else(|| DEFAULT_CONVERSION_BINARY.to_string())
                .into(),
            sync_binary: optional(SYNC_BINARY_ENV)
                .unwrap_or_else(|| DEFAULT_SYNC_BINARY.to_string())
                .into(),
            sync_remote: optional(SYNC_REMOTE_ENV)
                .unwrap_or_else(|| DEFAULT_SYNC_REMOTE.to_string()),
            output_mode,
            staging_root: optional(STAGING_ROOT_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }

    pub fn from_env() -> Result<Self, CycleError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}
