use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    executors::{
        common::{SubgraphExecutionRequest, SubgraphExecutor},
        error::SubgraphExecutorError,
    },
    response::{subgraph_response::SubgraphResponse, value::Value},
    SubgraphExecutorMap,
};

pub mod value_types;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service_name: String,
    pub body: Value,
}

/// Every call made to the test subgraphs, in the order they were sent.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    fn record(&self, service_name: &str, body: Value) {
        self.0.lock().unwrap().push(RecordedCall {
            service_name: service_name.to_string(),
            body,
        });
    }

    pub fn services(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.service_name.clone())
            .collect()
    }

    pub fn bodies_for(&self, service_name: &str) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.service_name == service_name)
            .map(|call| call.body.to_string())
            .collect()
    }
}

type Responder =
    Box<dyn Fn(&Value) -> Result<SubgraphResponse, SubgraphExecutorError> + Send + Sync>;

/// An in-process subgraph that records the body of each call and answers with `responder`.
pub struct TestSubgraph {
    name: String,
    log: CallLog,
    delay: Option<Duration>,
    responder: Responder,
}

impl TestSubgraph {
    pub fn new(
        name: &str,
        log: &CallLog,
        responder: impl Fn(&Value) -> Result<SubgraphResponse, SubgraphExecutorError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            delay: None,
            responder: Box::new(responder),
        }
    }

    /// Always answers with the same response body.
    pub fn fixed(name: &str, log: &CallLog, response: &'static str) -> Self {
        Self::new(name, log, move |_| Ok(json_response(response)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SubgraphExecutor for TestSubgraph {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let body: Value = sonic_rs::from_slice(&execution_request.to_body()?).unwrap();
        self.log.record(&self.name, body.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&body)
    }
}

pub fn json_response(raw: &str) -> SubgraphResponse {
    sonic_rs::from_str(raw).unwrap()
}

/// Answers an entity fetch by resolving each representation of the request body.
pub fn resolve_entities(body: &Value, resolve: impl Fn(&Value) -> Value) -> SubgraphResponse {
    let entities = body
        .get("variables")
        .and_then(|variables| variables.get("representations"))
        .and_then(Value::as_array)
        .map(|representations| representations.iter().map(&resolve).collect())
        .unwrap_or_default();

    let mut data = Value::empty_object();
    if let Some(obj) = data.as_object_mut() {
        obj.insert("_entities".to_string(), Value::Array(entities));
    }
    SubgraphResponse {
        data,
        ..Default::default()
    }
}

pub fn executor_map(subgraphs: Vec<TestSubgraph>) -> SubgraphExecutorMap {
    let mut map = SubgraphExecutorMap::new();
    for subgraph in subgraphs {
        let name = subgraph.name.clone();
        map.insert_boxed_arc(name, subgraph.to_boxed_arc());
    }
    map
}
