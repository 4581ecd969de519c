use std::time::Duration;

use federation_executor_config::execution::{CancellationPolicy, ExecutionConfig};
use tokio_util::sync::CancellationToken;

use crate::{
    execution::cancellation::ExecutionCancellation,
    executors::map::SubgraphExecutorMap,
    response::{
        graphql_error::GraphQLError,
        value::{ObjectValue, Value},
    },
};

/// State of one plan execution. Created per execution, consumed when it ends.
pub struct ExecutionContext<'a> {
    pub executors: &'a SubgraphExecutorMap,
    pub variable_values: ObjectValue,
    pub cancellation: ExecutionCancellation,
    pub errors: Vec<GraphQLError>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(executors: &'a SubgraphExecutorMap) -> Self {
        ExecutionContext {
            executors,
            variable_values: ObjectValue::new(),
            cancellation: ExecutionCancellation::default(),
            errors: Vec::new(),
        }
    }

    /// Root variables of the operation. Anything but an object is treated as no variables.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variable_values = match variables {
            Value::Object(obj) => obj,
            _ => ObjectValue::new(),
        };
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation.token = token;
        self
    }

    /// Starts the execution deadline now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cancellation = self.cancellation.with_timeout(timeout);
        self
    }

    pub fn with_cancellation_policy(mut self, policy: CancellationPolicy) -> Self {
        self.cancellation.policy = policy;
        self
    }

    pub fn with_execution_config(self, config: &ExecutionConfig) -> Self {
        let ctx = self.with_cancellation_policy(config.cancellation_policy);
        match config.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}
