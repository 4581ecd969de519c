use tracing::trace;

use crate::{
    response::{
        graphql_error::{GraphQLError, GraphQLErrorPath},
        merge::deep_merge,
        value::Value,
    },
    utils::traverse::value_at_mut,
};

/// Everything one `Fetch` node execution writes, addressed by concrete response positions.
///
/// Jobs are computed against a view of the response and applied afterwards, so the same job can
/// be applied to a branch-local copy and later to the execution's response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchJob {
    pub service_name: String,
    /// Fragments deep-merged at their position.
    pub merges: Vec<(GraphQLErrorPath, Value)>,
    /// Response keys set to `null` at their position, unless already present.
    pub nullified: Vec<(GraphQLErrorPath, Vec<String>)>,
    pub errors: Vec<GraphQLError>,
}

impl FetchJob {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Default::default()
        }
    }

    /// Applies merges, then nullified keys. Errors are left to the caller.
    pub fn apply(&self, tree: &mut Value) {
        for (position, fragment) in &self.merges {
            match value_at_mut(tree, position) {
                Some(target) => deep_merge(target, fragment.clone()),
                None => trace!(path = %position, "merge position no longer exists"),
            }
        }

        for (position, keys) in &self.nullified {
            if let Some(obj) = value_at_mut(tree, position).and_then(Value::as_object_mut) {
                for key in keys {
                    obj.entry(key.clone()).or_insert(Value::Null);
                }
            }
        }
    }
}
