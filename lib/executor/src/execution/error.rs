use crate::plan::validation::PlanValidationError;

/// Failures that abort a whole plan execution.
///
/// Per-fetch failures never end up here, they are recorded as GraphQL errors of the response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanExecutionError {
    #[error("Invalid query plan: {0}")]
    InvalidPlan(#[from] PlanValidationError),
    #[error("Flatten expected a list at \"{path}\", found {found}")]
    FlattenOverNonList { path: String, found: &'static str },
    #[error("Flatten expected an object at \"{path}\", found {found}")]
    FlattenOverNonObject { path: String, found: &'static str },
}
