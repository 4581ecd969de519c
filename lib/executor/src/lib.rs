pub mod context;
pub mod execution;
pub mod executors;
pub mod plan;
pub mod projection;
pub mod response;
pub mod utils;

#[cfg(test)]
mod tests;

pub use context::ExecutionContext;
pub use execution::{error::PlanExecutionError, plan::execute_query_plan};
pub use executors::map::SubgraphExecutorMap;
pub use plan::{validate_query_plan, PlanNode, QueryPlan};
pub use response::{response::ExecutionResponse, value::Value};
