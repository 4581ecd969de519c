mod env_overrides;
pub mod execution;
pub mod log;
pub mod subgraphs;
pub mod traffic_shaping;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, path::PathBuf};

use crate::{
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    execution::ExecutionConfig,
    log::LoggingConfig,
    subgraphs::SubgraphsConfig,
    traffic_shaping::TrafficShapingConfig,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// The logger configuration.
    ///
    /// By default only `info` and above is printed.
    #[serde(default)]
    pub log: LoggingConfig,

    /// The subgraph services a plan may call, keyed by service name.
    #[serde(default)]
    pub subgraphs: SubgraphsConfig,

    /// Controls how requests are being sent to subgraphs.
    /// Covers connection pooling, concurrency and timeouts.
    #[serde(default)]
    pub traffic_shaping: TrafficShapingConfig,

    /// Whole-execution deadline and cancellation behaviour.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to parse the configuration file path: {0}")]
    ConfigPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "executor.config.yaml",
    "executor.config.yml",
    "executor.config.json",
    "executor.config.json5",
];

/// Loads the configuration from `override_config_path`, or from the first default file name found
/// in the working directory, then applies the environment variable overrides.
pub fn load_config(
    override_config_path: Option<String>,
) -> Result<ExecutorConfig, ExecutorConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();

    if let Some(path_str) = override_config_path {
        let path_buf = path_str
            .parse::<PathBuf>()
            .map_err(ExecutorConfigError::ConfigPathParseError)?;
        let as_file: File<FileSourceFile, _> = path_buf.into();

        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<ExecutorConfig>()?)
}

pub fn parse_yaml_config(config_raw: String) -> Result<ExecutorConfig, ExecutorConfigError> {
    Config::builder()
        .add_source(File::from_str(&config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<ExecutorConfig>()
        .map_err(ExecutorConfigError::ConfigLoadError)
}
