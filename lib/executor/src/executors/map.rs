use std::{collections::HashMap, sync::Arc};

use federation_executor_config::{traffic_shaping::TrafficShapingConfig, ExecutorConfig};
use hyper_util::{
    client::legacy::Client,
    rt::{TokioExecutor, TokioTimer},
};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor, SubgraphExecutorBoxedArc},
        error::SubgraphExecutorError,
        http::{HTTPSubgraphExecutor, HttpClient},
        timeout::TimeoutExecutor,
    },
    response::subgraph_response::SubgraphResponse,
};

/// The service registry: subgraph name to executor.
///
/// Read-only once built, so one map can be shared by concurrent plan executions.
pub struct SubgraphExecutorMap {
    inner: HashMap<String, SubgraphExecutorBoxedArc>,
}

impl Default for SubgraphExecutorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SubgraphExecutorMap {
    pub fn new() -> Self {
        SubgraphExecutorMap {
            inner: HashMap::new(),
        }
    }

    pub async fn execute<'a>(
        &self,
        subgraph_name: &str,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        match self.inner.get(subgraph_name) {
            Some(executor) => executor.execute(execution_request).await,
            None => Err(SubgraphExecutorError::UnknownService(
                subgraph_name.to_string(),
            )),
        }
    }

    pub fn insert_boxed_arc(
        &mut self,
        subgraph_name: String,
        boxed_arc: SubgraphExecutorBoxedArc,
    ) {
        self.inner.insert(subgraph_name, boxed_arc);
    }

    pub fn contains(&self, subgraph_name: &str) -> bool {
        self.inner.contains_key(subgraph_name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Registers one HTTP executor per configured subgraph, sharing a single connection pool.
    pub fn from_config(config: &ExecutorConfig) -> Result<Self, SubgraphExecutorError> {
        let traffic_shaping = &config.traffic_shaping;
        let http_client = Arc::new(build_http_client(traffic_shaping));

        let mut map = SubgraphExecutorMap::new();
        for (subgraph_name, subgraph_config) in &config.subgraphs {
            let endpoint = parse_endpoint(subgraph_config.url.as_str())?;
            let semaphore = Arc::new(Semaphore::new(traffic_shaping.max_connections_per_host));
            let executor = HTTPSubgraphExecutor::new(
                subgraph_name,
                endpoint,
                http_client.clone(),
                semaphore,
            )
            .to_boxed_arc();

            let executor = match traffic_shaping.timeout_for(subgraph_name) {
                Some(timeout) => {
                    TimeoutExecutor::new(subgraph_name, timeout, executor).to_boxed_arc()
                }
                None => executor,
            };

            debug!(
                subgraph_name = %subgraph_name,
                endpoint = %subgraph_config.url,
                "registered subgraph executor"
            );
            map.insert_boxed_arc(subgraph_name.clone(), executor);
        }

        Ok(map)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<http::Uri, SubgraphExecutorError> {
    endpoint.parse().map_err(|e: http::uri::InvalidUri| {
        SubgraphExecutorError::EndpointParseFailure(endpoint.to_string(), e.to_string())
    })
}

fn build_http_client(traffic_shaping: &TrafficShapingConfig) -> HttpClient {
    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(traffic_shaping.pool_idle_timeout)
        .pool_max_idle_per_host(traffic_shaping.max_connections_per_host)
        .build_http()
}
