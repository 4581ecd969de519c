use std::fmt;

use serde::Serialize;

use crate::response::{graphql_error::GraphQLError, value::Value};

/// The top-level result of a plan execution.
///
/// `errors` is serialized only when at least one fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResponse {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl ExecutionResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Writes compact JSON.
impl fmt::Display for ExecutionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let serialized = sonic_rs::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&serialized)
    }
}
