use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::plan::{
    operation::format_fetch_selection,
    path::FlattenPath,
    pretty_display::{get_indent, PrettyDisplay},
    selection::SelectionItem,
};

/// A compiled federated query plan, as produced by the query planner.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "QueryPlanRepr", into = "QueryPlanRepr")]
pub struct QueryPlan {
    pub node: Option<PlanNode>,
}

#[derive(Deserialize, Serialize)]
#[serde(tag = "kind")]
enum QueryPlanRepr {
    QueryPlan {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node: Option<PlanNode>,
    },
}

impl From<QueryPlanRepr> for QueryPlan {
    fn from(repr: QueryPlanRepr) -> Self {
        match repr {
            QueryPlanRepr::QueryPlan { node } => QueryPlan { node },
        }
    }
}

impl From<QueryPlan> for QueryPlanRepr {
    fn from(plan: QueryPlan) -> Self {
        QueryPlanRepr::QueryPlan { node: plan.node }
    }
}

impl QueryPlan {
    pub fn new(node: PlanNode) -> Self {
        Self { node: Some(node) }
    }

    /// Reads a plan document. A bare plan node, without the `QueryPlan` envelope, is accepted too.
    pub fn from_json_str(raw: &str) -> Result<Self, sonic_rs::Error> {
        match sonic_rs::from_str::<QueryPlan>(raw) {
            Ok(plan) => Ok(plan),
            Err(plan_err) => match sonic_rs::from_str::<PlanNode>(raw) {
                Ok(node) => Ok(QueryPlan::new(node)),
                Err(_) => Err(plan_err),
            },
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.node.as_ref().map_or(0, PlanNode::fetch_count)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum PlanNode {
    Sequence(SequenceNode),
    Parallel(ParallelNode),
    Fetch(FetchNode),
    Flatten(FlattenNode),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SequenceNode {
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParallelNode {
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchNode {
    pub service_name: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Root variables forwarded to the subgraph. All root variables are forwarded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_usages: Option<Vec<String>>,
    /// Fields, grouped by type condition, projected from each position into the `representations`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<SelectionItem>>,
    /// Narrows the position the fetch runs at, like a `Flatten` wrapping this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representations_path: Option<FlattenPath>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlattenNode {
    pub path: FlattenPath,
    pub node: Box<PlanNode>,
}

impl PlanNode {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanNode::Sequence(_) => "Sequence",
            PlanNode::Parallel(_) => "Parallel",
            PlanNode::Fetch(_) => "Fetch",
            PlanNode::Flatten(_) => "Flatten",
        }
    }

    pub fn fetch_count(&self) -> usize {
        match self {
            PlanNode::Fetch(_) => 1,
            PlanNode::Flatten(node) => node.node.fetch_count(),
            PlanNode::Sequence(SequenceNode { nodes })
            | PlanNode::Parallel(ParallelNode { nodes }) => {
                nodes.iter().map(PlanNode::fetch_count).sum()
            }
        }
    }
}

impl FetchNode {
    pub fn new(service_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            operation: operation.into(),
            operation_name: None,
            variable_usages: None,
            requires: None,
            representations_path: None,
        }
    }

    pub fn with_requires(mut self, requires: Vec<SelectionItem>) -> Self {
        self.requires = Some(requires);
        self
    }

    pub fn is_entity_fetch(&self) -> bool {
        self.requires.is_some()
    }
}

impl From<FetchNode> for PlanNode {
    fn from(node: FetchNode) -> Self {
        PlanNode::Fetch(node)
    }
}

impl PlanNode {
    pub fn sequence(nodes: Vec<PlanNode>) -> Self {
        PlanNode::Sequence(SequenceNode { nodes })
    }

    pub fn parallel(nodes: Vec<PlanNode>) -> Self {
        PlanNode::Parallel(ParallelNode { nodes })
    }

    pub fn flatten(path: FlattenPath, node: impl Into<PlanNode>) -> Self {
        PlanNode::Flatten(FlattenNode {
            path,
            node: Box::new(node.into()),
        })
    }
}

impl Display for QueryPlan {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl Display for PlanNode {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl PrettyDisplay for QueryPlan {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}QueryPlan {{")?;
        if let Some(node) = &self.node {
            node.pretty_fmt(f, depth + 1)?;
        }
        writeln!(f, "{indent}}},")
    }
}

impl PrettyDisplay for FetchNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        match &self.representations_path {
            Some(path) => writeln!(
                f,
                "{indent}Fetch(service: \"{}\", representationsPath: \"{}\") {{",
                self.service_name, path
            )?,
            None => writeln!(f, "{indent}Fetch(service: \"{}\") {{", self.service_name)?,
        }
        if let Some(requires) = &self.requires {
            writeln!(f, "{indent}  {{")?;
            for item in requires {
                item.pretty_fmt(f, depth + 2)?;
            }
            writeln!(f, "{indent}  }} =>")?;
        }
        match format_fetch_selection(&self.operation, self.operation_name.as_deref()) {
            Ok(selection) => {
                for line in selection.lines() {
                    writeln!(f, "{indent}  {line}")?;
                }
            }
            Err(_) => {
                writeln!(f, "{indent}  {{")?;
                writeln!(f, "{indent}    {}", self.operation.trim())?;
                writeln!(f, "{indent}  }}")?;
            }
        }
        writeln!(f, "{indent}}},")
    }
}

impl PrettyDisplay for FlattenNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}Flatten(path: \"{}\") {{", self.path)?;
        self.node.pretty_fmt(f, depth + 1)?;
        writeln!(f, "{indent}}},")
    }
}

impl PrettyDisplay for PlanNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        match self {
            PlanNode::Fetch(node) => node.pretty_fmt(f, depth),
            PlanNode::Flatten(node) => node.pretty_fmt(f, depth),
            PlanNode::Parallel(ParallelNode { nodes })
            | PlanNode::Sequence(SequenceNode { nodes }) => {
                let indent = get_indent(depth);
                writeln!(f, "{indent}{} {{", self.kind())?;
                for node in nodes {
                    node.pretty_fmt(f, depth + 1)?;
                }
                writeln!(f, "{indent}}},")
            }
        }
    }
}
