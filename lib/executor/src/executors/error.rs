use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubgraphExecutorError {
    #[error("Failed to parse endpoint \"{0}\" as URI: {1}")]
    EndpointParseFailure(String, String),
    #[error("Failed to build request to subgraph \"{0}\": {1}")]
    RequestBuildFailure(String, String),
    #[error("Failed to send request to subgraph \"{0}\": {1}")]
    RequestFailure(String, String),
    #[error("Subgraph \"{0}\" responded with HTTP status {1}")]
    HttpStatus(String, u16),
    #[error("Failed to serialize variable \"{0}\": {1}")]
    VariablesSerializationFailure(String, String),
    #[error("Failed to deserialize subgraph response: {0}")]
    ResponseDeserializationFailure(String),
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),
    #[error("No executor registered for subgraph \"{0}\"")]
    UnknownService(String),
}

impl SubgraphExecutorError {
    /// `extensions.code` of the GraphQL error reported for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            SubgraphExecutorError::UnknownService(_) => "UNKNOWN_SERVICE",
            _ => "SUBREQUEST_HTTP_ERROR",
        }
    }
}
