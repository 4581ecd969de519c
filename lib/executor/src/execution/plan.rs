use futures::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    context::ExecutionContext,
    execution::{
        cancellation::{ExecutionCancellation, Guarded},
        error::PlanExecutionError,
        job::FetchJob,
    },
    executors::{
        common::SubgraphExecutionRequest, error::SubgraphExecutorError, map::SubgraphExecutorMap,
    },
    plan::{
        nodes::{FetchNode, ParallelNode, PlanNode, QueryPlan, SequenceNode},
        operation::OperationShape,
        path::FlattenPath,
        validation::validate_query_plan,
    },
    projection::request::project_requires,
    response::{
        error_normalization::{
            add_subgraph_info_to_error, normalize_errors_for_representations,
            normalize_errors_for_root, unlocated_error_path, CANCELLED,
        },
        graphql_error::{GraphQLError, GraphQLErrorPath},
        response::ExecutionResponse,
        subgraph_response::SubgraphResponse,
        value::{ObjectValue, Value},
    },
    utils::traverse::{resolve_positions, value_at},
};

/// Executes `query_plan` and returns the merged response.
///
/// Failed fetches are reported in `errors` of the response. Only an invalid plan, or a
/// `Flatten` that does not fit the shape of the response, fails the whole execution.
#[instrument(level = "debug", skip_all, fields(fetch_count = query_plan.fetch_count()))]
pub async fn execute_query_plan(
    query_plan: &QueryPlan,
    ctx: ExecutionContext<'_>,
) -> Result<ExecutionResponse, PlanExecutionError> {
    validate_query_plan(query_plan)?;

    let mut ctx = ctx;
    let mut data = Value::empty_object();
    if let Some(node) = &query_plan.node {
        let executor = Executor::new(&ctx.variable_values, ctx.executors, &ctx.cancellation);
        let jobs = executor
            .execute_plan_node(node, &mut data, Scope::root())
            .await?;
        let errors = jobs.into_iter().flat_map(|job| job.errors).collect::<Vec<_>>();
        ctx.errors.extend(errors);
    }

    debug!(errors_count = ctx.errors.len(), "query plan executed");
    Ok(ExecutionResponse {
        data,
        errors: ctx.errors,
    })
}

/// The positions a node runs at: the logical path from the root, and what it resolved to.
#[derive(Debug, Clone)]
struct Scope {
    path: FlattenPath,
    positions: Vec<GraphQLErrorPath>,
}

impl Scope {
    fn root() -> Self {
        Self {
            path: FlattenPath::default(),
            positions: vec![GraphQLErrorPath::root()],
        }
    }

    fn narrow(&self, tree: &Value, path: &FlattenPath) -> Result<Scope, PlanExecutionError> {
        Ok(Scope {
            path: self.path.join(path),
            positions: resolve_positions(tree, &self.positions, path.as_slice())?,
        })
    }
}

pub struct Executor<'a> {
    variable_values: &'a ObjectValue,
    executors: &'a SubgraphExecutorMap,
    cancellation: &'a ExecutionCancellation,
}

/// Polls its futures together on the calling task, so their subgraph calls are in flight at the
/// same time. The HTTP client drives connections on its own runtime tasks.
struct ConcurrencyScope<'exec, T> {
    jobs: FuturesUnordered<BoxFuture<'exec, (usize, T)>>,
}

impl<'exec, T: Send + 'exec> ConcurrencyScope<'exec, T> {
    fn new() -> Self {
        Self {
            jobs: FuturesUnordered::new(),
        }
    }

    fn spawn(&mut self, future: BoxFuture<'exec, T>) {
        let index = self.jobs.len();
        self.jobs.push(Box::pin(async move { (index, future.await) }));
    }

    /// Waits for every spawned future. Results are returned in spawn order.
    async fn join_all(mut self) -> Vec<T> {
        let mut results = Vec::with_capacity(self.jobs.len());
        while let Some(result) = self.jobs.next().await {
            results.push(result);
        }
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

type NodeResult = Result<Vec<FetchJob>, PlanExecutionError>;

impl<'a> Executor<'a> {
    pub fn new(
        variable_values: &'a ObjectValue,
        executors: &'a SubgraphExecutorMap,
        cancellation: &'a ExecutionCancellation,
    ) -> Self {
        Executor {
            variable_values,
            executors,
            cancellation,
        }
    }

    /// Runs `node` and applies each fetch job to `tree` as soon as it is available.
    ///
    /// The applied jobs are returned in plan order.
    fn execute_plan_node<'s>(
        &'s self,
        node: &'s PlanNode,
        tree: &'s mut Value,
        scope: Scope,
    ) -> BoxFuture<'s, NodeResult> {
        Box::pin(async move {
            match node {
                PlanNode::Fetch(fetch_node) => {
                    let job = self.execute_fetch_node(fetch_node, tree, &scope).await?;
                    job.apply(tree);
                    Ok(vec![job])
                }
                PlanNode::Flatten(flatten_node) => {
                    let scope = scope.narrow(tree, &flatten_node.path)?;
                    if scope.positions.is_empty() {
                        debug!(path = %scope.path, "flatten resolved to no positions");
                        return Ok(Vec::new());
                    }
                    self.execute_plan_node(&flatten_node.node, tree, scope).await
                }
                PlanNode::Sequence(sequence_node) => {
                    self.execute_sequence_wave(sequence_node, tree, scope).await
                }
                PlanNode::Parallel(parallel_node) => {
                    let jobs = self.execute_parallel_wave(parallel_node, tree, &scope).await?;
                    for job in &jobs {
                        job.apply(tree);
                    }
                    Ok(jobs)
                }
            }
        })
    }

    /// Runs `node` against a read-only view of the response, without applying anything.
    fn execute_detached<'s>(
        &'s self,
        node: &'s PlanNode,
        tree: &'s Value,
        scope: Scope,
    ) -> BoxFuture<'s, NodeResult> {
        Box::pin(async move {
            match node {
                PlanNode::Fetch(fetch_node) => {
                    Ok(vec![self.execute_fetch_node(fetch_node, tree, &scope).await?])
                }
                PlanNode::Flatten(flatten_node) => {
                    let scope = scope.narrow(tree, &flatten_node.path)?;
                    if scope.positions.is_empty() {
                        debug!(path = %scope.path, "flatten resolved to no positions");
                        return Ok(Vec::new());
                    }
                    self.execute_detached(&flatten_node.node, tree, scope).await
                }
                PlanNode::Parallel(parallel_node) => {
                    self.execute_parallel_wave(parallel_node, tree, &scope).await
                }
                PlanNode::Sequence(sequence_node) => {
                    // Later children of the branch read what earlier ones wrote.
                    let mut branch_tree = tree.clone();
                    self.execute_sequence_wave(sequence_node, &mut branch_tree, scope)
                        .await
                }
            }
        })
    }

    #[instrument(level = "debug", skip_all, fields(nodes_count = node.nodes.len()))]
    async fn execute_sequence_wave(
        &self,
        node: &SequenceNode,
        tree: &mut Value,
        scope: Scope,
    ) -> NodeResult {
        let mut jobs = Vec::new();
        for child in &node.nodes {
            jobs.extend(self.execute_plan_node(child, tree, scope.clone()).await?);
        }
        Ok(jobs)
    }

    #[instrument(level = "debug", skip_all, fields(nodes_count = node.nodes.len()))]
    async fn execute_parallel_wave(
        &self,
        node: &ParallelNode,
        tree: &Value,
        scope: &Scope,
    ) -> NodeResult {
        let mut concurrency_scope = ConcurrencyScope::new();
        for child in &node.nodes {
            concurrency_scope.spawn(self.execute_detached(child, tree, scope.clone()));
        }

        let mut jobs = Vec::new();
        for result in concurrency_scope.join_all().await {
            jobs.extend(result?);
        }
        Ok(jobs)
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(service_name = %fetch_node.service_name, path = %scope.path)
    )]
    async fn execute_fetch_node(
        &self,
        fetch_node: &FetchNode,
        tree: &Value,
        scope: &Scope,
    ) -> Result<FetchJob, PlanExecutionError> {
        let narrowed;
        let scope = match &fetch_node.representations_path {
            Some(path) => {
                narrowed = scope.narrow(tree, path)?;
                &narrowed
            }
            None => scope,
        };

        let (positions, representations) = match &fetch_node.requires {
            Some(requires) => {
                let mut positions = Vec::new();
                let mut representations = Vec::new();
                for position in &scope.positions {
                    let Some(entity) = value_at(tree, position) else {
                        continue;
                    };
                    match project_requires(requires, entity) {
                        Some(representation) => {
                            positions.push(position.clone());
                            representations.push(representation);
                        }
                        None => trace!(path = %position, "requires do not apply to position"),
                    }
                }
                if representations.is_empty() {
                    debug!("no representations to resolve, fetch skipped");
                    return Ok(FetchJob::new(&fetch_node.service_name));
                }
                (positions, Some(representations))
            }
            None => (scope.positions.clone(), None),
        };

        debug!(
            representations_count = representations.as_ref().map_or(0, Vec::len),
            "executing fetch"
        );
        let request = SubgraphExecutionRequest {
            query: &fetch_node.operation,
            operation_name: fetch_node.operation_name.as_deref(),
            variables: self.variables_for(fetch_node),
            representations,
        };

        let call = self.executors.execute(&fetch_node.service_name, request);
        let job = match self.cancellation.guard(call).await {
            Guarded::Completed(Ok(response)) => {
                self.process_response(fetch_node, tree, scope, positions, response)
            }
            Guarded::Completed(Err(err)) => {
                self.process_failure(fetch_node, tree, scope, &positions, err)
            }
            Guarded::Cancelled(reason) => {
                warn!(reason = %reason, "fetch cancelled");
                let mut job = FetchJob::new(&fetch_node.service_name);
                job.errors.push(located(
                    GraphQLError::from_message_and_code(
                        format!(
                            "Fetch from subgraph \"{}\" was cancelled: {}",
                            fetch_node.service_name, reason
                        ),
                        CANCELLED,
                    )
                    .add_subgraph_name(&fetch_node.service_name),
                    &scope.path,
                ));
                job
            }
        };

        Ok(job)
    }

    fn process_response(
        &self,
        fetch_node: &FetchNode,
        tree: &Value,
        scope: &Scope,
        positions: Vec<GraphQLErrorPath>,
        response: SubgraphResponse,
    ) -> FetchJob {
        let service_name = fetch_node.service_name.as_str();
        let SubgraphResponse {
            mut data, errors, ..
        } = response;
        let errors = errors.unwrap_or_default();
        let mut job = FetchJob::new(service_name);

        if fetch_node.is_entity_fetch() {
            let mut entities = data.take_entities().unwrap_or_default().into_iter();
            let mut missing = Vec::new();
            for position in &positions {
                match entities.next() {
                    Some(entity) if entity.is_object() => {
                        job.merges.push((position.clone(), entity))
                    }
                    _ => missing.push(position.clone()),
                }
            }
            job.nullified = nullified_keys(fetch_node, tree, &missing);
            job.errors =
                normalize_errors_for_representations(service_name, &scope.path, &positions, errors);
        } else {
            if !data.is_object() {
                job.nullified = nullified_keys(fetch_node, tree, &positions);
            } else {
                for position in &positions {
                    job.merges.push((position.clone(), data.clone()));
                }
            }
            job.errors = normalize_errors_for_root(service_name, errors);
        }

        if !job.errors.is_empty() {
            debug!(errors_count = job.errors.len(), "subgraph returned errors");
        }
        job
    }

    fn process_failure(
        &self,
        fetch_node: &FetchNode,
        tree: &Value,
        scope: &Scope,
        positions: &[GraphQLErrorPath],
        err: SubgraphExecutorError,
    ) -> FetchJob {
        let service_name = fetch_node.service_name.as_str();
        error!(error = %err, "subgraph request failed");

        let message = match &err {
            SubgraphExecutorError::UnknownService(_) => err.to_string(),
            _ => format!(
                "Failed to execute request to subgraph \"{}\": {}",
                service_name, err
            ),
        };
        let graphql_error = add_subgraph_info_to_error(
            GraphQLError::from_message_and_code(message, err.error_code()),
            service_name,
        );

        let mut job = FetchJob::new(service_name);
        job.errors.push(located(graphql_error, &scope.path));
        job.nullified = nullified_keys(fetch_node, tree, positions);
        job
    }

    fn variables_for<'s>(&'s self, fetch_node: &'s FetchNode) -> Vec<(&'s str, &'s Value)> {
        match &fetch_node.variable_usages {
            Some(variable_usages) => variable_usages
                .iter()
                .filter_map(|name| {
                    self.variable_values
                        .get_key_value(name.as_str())
                        .map(|(name, value)| (name.as_str(), value))
                })
                .collect(),
            None => self
                .variable_values
                .iter()
                .map(|(name, value)| (name.as_str(), value))
                .collect(),
        }
    }
}

fn located(error: GraphQLError, path: &FlattenPath) -> GraphQLError {
    match unlocated_error_path(path) {
        Some(path) => error.with_path(path),
        None => error,
    }
}

/// The response keys the fetch would have written at each of `positions`.
fn nullified_keys(
    fetch_node: &FetchNode,
    tree: &Value,
    positions: &[GraphQLErrorPath],
) -> Vec<(GraphQLErrorPath, Vec<String>)> {
    if positions.is_empty() {
        return Vec::new();
    }
    let operation_name = fetch_node.operation_name.as_deref();
    let shape = match OperationShape::parse(&fetch_node.operation, operation_name) {
        Ok(shape) => shape,
        Err(err) => {
            warn!(error = %err, "cannot nullify fields of an unparseable operation");
            return Vec::new();
        }
    };

    positions
        .iter()
        .map(|position| {
            let keys = if fetch_node.is_entity_fetch() {
                let typename = value_at(tree, position).and_then(Value::typename);
                shape
                    .entity_keys_for(typename)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            } else {
                shape.root_keys.clone()
            };
            (position.clone(), keys)
        })
        .collect()
}
