use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::executors::common::{
    SubgraphExecutionRequest, SubgraphExecutor, SubgraphExecutorBoxedArc,
};
use crate::executors::error::SubgraphExecutorError;
use crate::response::subgraph_response::SubgraphResponse;

/// Fails a subgraph call that does not complete within `timeout`.
///
/// The in-flight request is dropped when the timeout expires.
pub struct TimeoutExecutor {
    pub subgraph_name: String,
    pub timeout: Duration,
    pub executor: SubgraphExecutorBoxedArc,
}

impl TimeoutExecutor {
    pub fn new(subgraph_name: &str, timeout: Duration, executor: SubgraphExecutorBoxedArc) -> Self {
        Self {
            subgraph_name: subgraph_name.to_string(),
            timeout,
            executor,
        }
    }
}

#[async_trait]
impl SubgraphExecutor for TimeoutExecutor {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let execution = self.executor.execute(execution_request);
        match tokio::time::timeout(self.timeout, execution).await {
            Ok(response) => response,
            Err(_) => {
                warn!(
                    subgraph_name = %self.subgraph_name,
                    timeout = ?self.timeout,
                    "subgraph request timed out"
                );
                Err(SubgraphExecutorError::RequestTimeout(self.timeout))
            }
        }
    }
}
