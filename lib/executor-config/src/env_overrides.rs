use config::{builder::BuilderState, ConfigBuilder, ConfigError};
use envconfig::Envconfig;
use tracing::debug;

use crate::{
    execution::CancellationPolicy,
    log::{LogFormat, LogLevel},
};

#[derive(Envconfig)]
pub struct EnvVarOverrides {
    // Logger overrides
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,

    // Execution overrides
    #[envconfig(from = "EXECUTION_TIMEOUT")]
    pub execution_timeout: Option<String>,
    #[envconfig(from = "EXECUTION_CANCELLATION_POLICY")]
    pub execution_cancellation_policy: Option<CancellationPolicy>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override configuration: {0}")]
    FailedToOverrideConfig(#[from] ConfigError),
    #[error("Invalid duration in {0}: {1}")]
    InvalidDuration(&'static str, humantime::DurationError),
}

impl EnvVarOverrides {
    pub fn apply_overrides<T: BuilderState>(
        mut self,
        mut config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        if let Some(log_level) = self.log_level.take() {
            debug!("[config-override] 'log.level' = {:?}", log_level);
            config = config.set_override("log.level", log_level.as_str())?;
        }
        if let Some(log_format) = self.log_format.take() {
            debug!("[config-override] 'log.format' = {:?}", log_format);
            config = config.set_override("log.format", log_format.as_str())?;
        }
        if let Some(log_filter) = self.log_filter.take() {
            debug!("[config-override] 'log.filter' = {:?}", log_filter);
            config = config.set_override("log.filter", log_filter)?;
        }

        if let Some(timeout) = self.execution_timeout.take() {
            humantime::parse_duration(&timeout)
                .map_err(|e| EnvVarOverridesError::InvalidDuration("EXECUTION_TIMEOUT", e))?;
            debug!("[config-override] 'execution.timeout' = {}", timeout);
            config = config.set_override("execution.timeout", timeout)?;
        }
        if let Some(policy) = self.execution_cancellation_policy.take() {
            debug!(
                "[config-override] 'execution.cancellation_policy' = {:?}",
                policy
            );
            config = config.set_override("execution.cancellation_policy", policy.as_str())?;
        }

        Ok(config)
    }
}
