use std::{str::FromStr, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Deadline of a whole plan execution. Fetches still running when it elapses are cancelled.
    ///
    /// Can also be set via the `EXECUTION_TIMEOUT` environment variable.
    #[serde(
        default,
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize"
    )]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,

    /// What happens to in-flight subgraph calls once the execution is cancelled.
    ///
    /// Can also be set via the `EXECUTION_CANCELLATION_POLICY` environment variable.
    #[serde(default)]
    pub cancellation_policy: CancellationPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    /// In-flight calls are dropped as soon as cancellation is observed.
    #[default]
    Abandon,
    /// In-flight calls are awaited, and their results discarded.
    RunToCompletion,
}

impl CancellationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationPolicy::Abandon => "abandon",
            CancellationPolicy::RunToCompletion => "run_to_completion",
        }
    }
}

impl FromStr for CancellationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "abandon" => Ok(CancellationPolicy::Abandon),
            "run_to_completion" => Ok(CancellationPolicy::RunToCompletion),
            other => Err(format!("Invalid cancellation policy: {}", other)),
        }
    }
}
