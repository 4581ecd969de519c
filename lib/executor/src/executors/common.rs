use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    executors::error::SubgraphExecutorError,
    response::{subgraph_response::SubgraphResponse, value::Value},
    utils::consts::REPRESENTATIONS_VARIABLE_NAME,
};

#[async_trait]
pub trait SubgraphExecutor {
    async fn execute<'a>(
        &self,
        execution_request: SubgraphExecutionRequest<'a>,
    ) -> Result<SubgraphResponse, SubgraphExecutorError>;

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn SubgraphExecutor + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type SubgraphExecutorType = dyn crate::executors::common::SubgraphExecutor + Send + Sync;

pub type SubgraphExecutorBoxedArc = Arc<Box<SubgraphExecutorType>>;

/// One outgoing call of a `Fetch` node.
#[derive(Debug, Clone)]
pub struct SubgraphExecutionRequest<'a> {
    pub query: &'a str,
    pub operation_name: Option<&'a str>,
    /// Root variables forwarded to the subgraph, in the order they are written to the body.
    pub variables: Vec<(&'a str, &'a Value)>,
    /// Entity representations, sent as the last variable.
    pub representations: Option<Vec<Value>>,
}

const QUERY_KEY: &[u8] = b"{\"query\":";
const OPERATION_NAME_KEY: &[u8] = b",\"operationName\":";
const VARIABLES_KEY: &[u8] = b",\"variables\":{";

impl<'a> SubgraphExecutionRequest<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            operation_name: None,
            variables: Vec::new(),
            representations: None,
        }
    }

    /// Serializes the request as `{"query", "operationName"?, "variables"}`.
    ///
    /// `variables` is always written, `representations` last.
    pub fn to_body(&self) -> Result<Bytes, SubgraphExecutorError> {
        let mut body = BytesMut::with_capacity(self.query.len() + 256);
        body.put(QUERY_KEY);
        body.put(serialize_json(&self.query, "query")?.as_slice());

        if let Some(operation_name) = self.operation_name {
            body.put(OPERATION_NAME_KEY);
            body.put(serialize_json(&operation_name, "operationName")?.as_slice());
        }

        body.put(VARIABLES_KEY);
        let mut first_variable = true;
        for (variable_name, variable_value) in &self.variables {
            if !first_variable {
                body.put_u8(b',');
            }
            first_variable = false;
            body.put(serialize_json(variable_name, variable_name)?.as_slice());
            body.put_u8(b':');
            body.put(serialize_json(variable_value, variable_name)?.as_slice());
        }
        if let Some(representations) = &self.representations {
            if !first_variable {
                body.put_u8(b',');
            }
            body.put_u8(b'"');
            body.put(REPRESENTATIONS_VARIABLE_NAME.as_bytes());
            body.put(&b"\":"[..]);
            body.put(
                serialize_json(representations, REPRESENTATIONS_VARIABLE_NAME)?.as_slice(),
            );
        }
        body.put(&b"}}"[..]);

        Ok(body.freeze())
    }
}

fn serialize_json<T: serde::Serialize + ?Sized>(
    value: &T,
    name: &str,
) -> Result<Vec<u8>, SubgraphExecutorError> {
    sonic_rs::to_vec(value).map_err(|err| {
        SubgraphExecutorError::VariablesSerializationFailure(name.to_string(), err.to_string())
    })
}
