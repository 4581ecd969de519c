use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use http::HeaderValue;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::{body::Bytes, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::executors::common::{SubgraphExecutionRequest, SubgraphExecutor};
use crate::executors::error::SubgraphExecutorError;
use crate::response::subgraph_response::SubgraphResponse;

pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

#[derive(Debug)]
pub struct HTTPSubgraphExecutor {
    pub subgraph_name: String,
    pub endpoint: http::Uri,
    pub http_client: Arc<HttpClient>,
    pub header_map: HeaderMap,
    pub semaphore: Arc<Semaphore>,
}

impl HTTPSubgraphExecutor {
    pub fn new(
        subgraph_name: &str,
        endpoint: http::Uri,
        http_client: Arc<HttpClient>,
        semaphore: Arc<Semaphore>,
    ) -> Self {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        header_map.insert(
            http::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        Self {
            subgraph_name: subgraph_name.to_string(),
            endpoint,
            http_client,
            header_map,
            semaphore,
        }
    }

    async fn _execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<Bytes, SubgraphExecutorError> {
        let body = execution_request.to_body()?;
        trace!(endpoint = %self.endpoint, body_size = body.len(), "sending subgraph request");

        let mut req = hyper::Request::builder()
            .method(http::Method::POST)
            .uri(&self.endpoint)
            .version(Version::HTTP_11)
            .body(Full::new(body))
            .map_err(|e| {
                SubgraphExecutorError::RequestBuildFailure(self.endpoint.to_string(), e.to_string())
            })?;

        *req.headers_mut() = self.header_map.clone();

        let res = self.http_client.request(req).await.map_err(|e| {
            SubgraphExecutorError::RequestFailure(self.endpoint.to_string(), e.to_string())
        })?;

        let status = res.status();
        if !status.is_success() {
            return Err(SubgraphExecutorError::HttpStatus(
                self.subgraph_name.clone(),
                status.as_u16(),
            ));
        }

        Ok(res
            .into_body()
            .collect()
            .await
            .map_err(|e| {
                SubgraphExecutorError::RequestFailure(self.endpoint.to_string(), e.to_string())
            })?
            .to_bytes())
    }
}

#[async_trait]
impl SubgraphExecutor for HTTPSubgraphExecutor {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            SubgraphExecutorError::RequestFailure(self.endpoint.to_string(), e.to_string())
        })?;

        let bytes = self._execute(execution_request).await?;
        debug!(
            subgraph_name = %self.subgraph_name,
            response_size = bytes.len(),
            "subgraph responded"
        );
        SubgraphResponse::deserialize_from_bytes(&bytes)
    }
}
