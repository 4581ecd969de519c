pub mod nodes;
pub mod operation;
pub mod path;
pub mod pretty_display;
pub mod selection;
pub mod validation;

pub use nodes::{FetchNode, FlattenNode, ParallelNode, PlanNode, QueryPlan, SequenceNode};
pub use path::{FlattenPath, FlattenPathSegment};
pub use selection::SelectionItem;
pub use validation::{validate_query_plan, PlanValidationError};
