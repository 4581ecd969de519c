use crate::{
    plan::{
        nodes::{FetchNode, ParallelNode, PlanNode, QueryPlan, SequenceNode},
        operation::{OperationParseError, OperationShape},
        path::{FlattenPath, FlattenPathSegment},
    },
    utils::consts::LIST_WILDCARD,
};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("Fetch node has an empty serviceName")]
    EmptyServiceName,
    #[error("Fetch to \"{0}\" declares requires but is not nested under a Flatten")]
    RequiresOutsideFlatten(String),
    #[error("Fetch to \"{service_name}\" at \"{path}\" has no requires")]
    MissingRequires { service_name: String, path: String },
    #[error("Flatten node has an empty path")]
    EmptyFlattenPath,
    #[error("Invalid operation for subgraph \"{service_name}\": {source}")]
    InvalidOperation {
        service_name: String,
        #[source]
        source: OperationParseError,
    },
    #[error("Parallel branches {first} and {second} both write \"{path}\"")]
    OverlappingWrites {
        first: usize,
        second: usize,
        path: String,
    },
}

/// A response key written by one fetch.
#[derive(Debug, Clone)]
struct WriteTarget {
    /// Field names and `@`, without casts.
    path: Vec<String>,
    /// `None` when the write applies to every type at `path`.
    type_condition: Option<String>,
    key: String,
}

impl WriteTarget {
    fn full_path(&self) -> impl Iterator<Item = &str> {
        self.path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.key.as_str()))
    }

    fn overlaps(&self, other: &WriteTarget) -> bool {
        let is_prefix = self
            .full_path()
            .zip(other.full_path())
            .all(|(a, b)| a == b);
        if !is_prefix {
            return false;
        }
        if self.path.len() != other.path.len() {
            // One write replaces an ancestor of the other.
            return true;
        }
        match (&self.type_condition, &other.type_condition) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    fn describe(&self) -> String {
        let mut out = self.full_path().collect::<Vec<_>>().join(".");
        if let Some(type_condition) = &self.type_condition {
            out.push_str(" on ");
            out.push_str(type_condition);
        }
        out
    }
}

/// Checks that a plan can be executed.
///
/// Beyond the structure of `Fetch` and `Flatten` nodes, this rejects `Parallel` nodes whose
/// children write the same response field, as the outcome would depend on completion order.
pub fn validate_query_plan(plan: &QueryPlan) -> Result<(), PlanValidationError> {
    if let Some(node) = &plan.node {
        let mut writes = Vec::new();
        collect_writes(node, &FlattenPath::default(), false, &mut writes)?;
    }
    Ok(())
}

fn collect_writes(
    node: &PlanNode,
    scope: &FlattenPath,
    in_flatten: bool,
    writes: &mut Vec<WriteTarget>,
) -> Result<(), PlanValidationError> {
    match node {
        PlanNode::Fetch(fetch) => collect_fetch_writes(fetch, scope, in_flatten, writes),
        PlanNode::Flatten(flatten) => {
            if flatten.path.is_empty() {
                return Err(PlanValidationError::EmptyFlattenPath);
            }
            collect_writes(&flatten.node, &scope.join(&flatten.path), true, writes)
        }
        PlanNode::Sequence(SequenceNode { nodes }) => {
            for child in nodes {
                collect_writes(child, scope, in_flatten, writes)?;
            }
            Ok(())
        }
        PlanNode::Parallel(ParallelNode { nodes }) => {
            let mut per_child: Vec<Vec<WriteTarget>> = Vec::with_capacity(nodes.len());
            for child in nodes {
                let mut child_writes = Vec::new();
                collect_writes(child, scope, in_flatten, &mut child_writes)?;
                per_child.push(child_writes);
            }

            for (first, first_writes) in per_child.iter().enumerate() {
                for (offset, second_writes) in per_child[first + 1..].iter().enumerate() {
                    let second = first + 1 + offset;
                    for a in first_writes {
                        if let Some(b) = second_writes.iter().find(|b| a.overlaps(b)) {
                            let shorter = if a.path.len() <= b.path.len() { a } else { b };
                            return Err(PlanValidationError::OverlappingWrites {
                                first,
                                second,
                                path: shorter.describe(),
                            });
                        }
                    }
                }
            }

            writes.extend(per_child.into_iter().flatten());
            Ok(())
        }
    }
}

fn collect_fetch_writes(
    fetch: &FetchNode,
    scope: &FlattenPath,
    in_flatten: bool,
    writes: &mut Vec<WriteTarget>,
) -> Result<(), PlanValidationError> {
    if fetch.service_name.trim().is_empty() {
        return Err(PlanValidationError::EmptyServiceName);
    }

    let scope = match &fetch.representations_path {
        Some(path) => scope.join(path),
        None => scope.clone(),
    };
    let is_entity_scope = in_flatten || fetch.representations_path.is_some();

    match (is_entity_scope, fetch.requires.is_some()) {
        (false, true) => {
            return Err(PlanValidationError::RequiresOutsideFlatten(
                fetch.service_name.clone(),
            ))
        }
        (true, false) => {
            return Err(PlanValidationError::MissingRequires {
                service_name: fetch.service_name.clone(),
                path: scope.to_string(),
            })
        }
        _ => {}
    }

    let shape = OperationShape::parse(&fetch.operation, fetch.operation_name.as_deref()).map_err(
        |source| PlanValidationError::InvalidOperation {
            service_name: fetch.service_name.clone(),
            source,
        },
    )?;

    let (path, cast) = normalize_path(&scope);
    if is_entity_scope {
        for group in &shape.entity_keys {
            let type_condition = group.type_condition.clone().or_else(|| cast.clone());
            for key in &group.keys {
                writes.push(WriteTarget {
                    path: path.clone(),
                    type_condition: type_condition.clone(),
                    key: key.clone(),
                });
            }
        }
    } else {
        for key in &shape.root_keys {
            writes.push(WriteTarget {
                path: path.clone(),
                type_condition: None,
                key: key.clone(),
            });
        }
    }

    Ok(())
}

/// Splits a path into its field/list segments and the last type cast, if any.
fn normalize_path(path: &FlattenPath) -> (Vec<String>, Option<String>) {
    let mut segments = Vec::with_capacity(path.len());
    let mut cast = None;
    for segment in path.as_slice() {
        match segment {
            FlattenPathSegment::Field(name) => {
                segments.push(name.clone());
                cast = None;
            }
            FlattenPathSegment::List => segments.push(LIST_WILDCARD.to_string()),
            FlattenPathSegment::Cast(type_name) => cast = Some(type_name.clone()),
        }
    }
    (segments, cast)
}
