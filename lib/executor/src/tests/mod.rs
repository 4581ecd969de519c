use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::{
    context::ExecutionContext,
    execution::{error::PlanExecutionError, plan::execute_query_plan},
    plan::{
        nodes::{FetchNode, PlanNode, QueryPlan},
        path::FlattenPath,
        selection::SelectionItem,
        validation::PlanValidationError,
    },
    response::value::Value,
};

use fixtures::{executor_map, json_response, resolve_entities, value_types, CallLog, TestSubgraph};

mod fixtures;

fn user_reviews_fetch() -> FetchNode {
    FetchNode::new(
        "reviews",
        "query($representations:[_Any!]!){_entities(representations:$representations){...on User{reviews{__typename id body}}}}",
    )
    .with_requires(vec![SelectionItem::inline_fragment(
        "User",
        vec![SelectionItem::field("__typename"), SelectionItem::field("id")],
    )])
}

fn user_reviews(log: &CallLog) -> TestSubgraph {
    TestSubgraph::new("reviews", log, |body| {
        Ok(resolve_entities(body, |_| {
            sonic_rs::from_str(
                r#"{"reviews":[{"__typename":"Review","id":"r1","body":"ok"},null]}"#,
            )
            .unwrap()
        }))
    })
}

fn flatten(path: &str, fetch: FetchNode) -> PlanNode {
    PlanNode::flatten(FlattenPath::parse(path).unwrap(), fetch)
}

#[tokio::test]
async fn value_types_resolve_from_their_respective_subgraphs() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        value_types::product(&log, value_types::TOP_PRODUCTS),
        value_types::reviews(&log),
        value_types::books(&log),
    ]);

    let response = execute_query_plan(&value_types::query_plan(), ExecutionContext::new(&executors))
        .await
        .unwrap();

    let services = log.services();
    assert_eq!(services.len(), 3);
    assert_eq!(services[0], "product");
    let mut parallel_services = services[1..].to_vec();
    parallel_services.sort();
    assert_eq!(parallel_services, vec!["books", "reviews"]);

    assert!(log.bodies_for("product")[0].ends_with(r#""variables":{}}"#));
    assert!(log.bodies_for("reviews")[0].ends_with(
        r#""variables":{"representations":[{"__typename":"Furniture","upc":"1"},{"__typename":"Book","isbn":"0136291554"}]}}"#
    ));
    // Furniture is never sent to the subgraph only resolving books.
    assert!(log.bodies_for("books")[0].ends_with(
        r#""variables":{"representations":[{"__typename":"Book","isbn":"0136291554"}]}}"#
    ));

    assert!(!response.has_errors());
    insta::assert_snapshot!(response.to_string(), @r#"{"data":{"topProducts":[{"__typename":"Furniture","upc":"1","metadata":[{"__typename":"KeyValue","key":"Condition","value":"excellent"}],"reviews":[{"metadata":[{"__typename":"Error","code":418,"message":"I'm a teapot"}]}]},{"__typename":"Book","upc":"0136291554","isbn":"0136291554","reviews":[{"metadata":[{"__typename":"KeyValue","key":"Condition","value":"used"}]}],"metadata":[{"__typename":"KeyValue","key":"Condition","value":"used"},{"__typename":"Error","code":401,"message":"Unauthorized"}]}]}}"#);
}

async fn execute_value_types(
    reviews: TestSubgraph,
    books: TestSubgraph,
    log: &CallLog,
) -> String {
    let executors = executor_map(vec![
        value_types::product(log, value_types::TOP_PRODUCTS),
        reviews,
        books,
    ]);

    execute_query_plan(&value_types::query_plan(), ExecutionContext::new(&executors))
        .await
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn parallel_results_do_not_depend_on_arrival_order() {
    let delay = Duration::from_millis(50);

    let reviews_last = CallLog::default();
    let slow_reviews = execute_value_types(
        value_types::reviews(&reviews_last).with_delay(delay),
        value_types::books(&reviews_last),
        &reviews_last,
    )
    .await;

    let books_last = CallLog::default();
    let slow_books = execute_value_types(
        value_types::reviews(&books_last),
        value_types::books(&books_last).with_delay(delay),
        &books_last,
    )
    .await;

    assert_eq!(slow_reviews, slow_books);
}

#[tokio::test]
async fn parallel_children_are_in_flight_together() {
    let delay = Duration::from_millis(300);
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed("accounts", &log, r#"{"data":{"me":{"id":"1"}}}"#).with_delay(delay),
        TestSubgraph::fixed("product", &log, r#"{"data":{"version":"1"}}"#).with_delay(delay),
    ]);
    let plan = QueryPlan::new(PlanNode::parallel(vec![
        FetchNode::new("accounts", "{me{id}}").into(),
        FetchNode::new("product", "{version}").into(),
    ]));

    let started = Instant::now();
    let response = execute_query_plan(&plan, ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert!(started.elapsed() < delay * 2);
    assert_eq!(response.to_string(), r#"{"data":{"me":{"id":"1"},"version":"1"}}"#);
}

#[tokio::test]
async fn entity_errors_point_at_the_failed_position() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        value_types::product(&log, value_types::TOP_PRODUCTS),
        value_types::reviews(&log),
        value_types::failing_books(&log),
    ]);

    let response = execute_query_plan(&value_types::query_plan(), ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert_eq!(error.message, "boom");
    assert_eq!(error.code(), Some("DOWNSTREAM_SERVICE_ERROR"));
    assert_eq!(error.service_name(), Some("books"));
    insta::assert_snapshot!(response.to_string(), @r#"{"data":{"topProducts":[{"__typename":"Furniture","upc":"1","metadata":[{"__typename":"KeyValue","key":"Condition","value":"excellent"}],"reviews":[{"metadata":[{"__typename":"Error","code":418,"message":"I'm a teapot"}]}]},{"__typename":"Book","upc":"0136291554","isbn":"0136291554","reviews":[{"metadata":[{"__typename":"KeyValue","key":"Condition","value":"used"}]}],"metadata":null}]},"errors":[{"message":"boom","path":["topProducts",1,"metadata"],"extensions":{"serviceName":"books","code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#);
}

#[tokio::test]
async fn failed_fetch_keeps_sibling_data() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed("accounts", &log, r#"{"data":{"me":{"id":"1"}}}"#),
        TestSubgraph::fixed("product", &log, r#"{"errors":[{"message":"boom"}]}"#),
    ]);
    let plan = QueryPlan::new(PlanNode::parallel(vec![
        FetchNode::new("accounts", "{me{id}}").into(),
        FetchNode::new("product", "{topProducts{upc}}").into(),
    ]));

    let response = execute_query_plan(&plan, ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert_eq!(log.services().len(), 2);
    insta::assert_snapshot!(response.to_string(), @r#"{"data":{"me":{"id":"1"},"topProducts":null},"errors":[{"message":"boom","extensions":{"serviceName":"product","code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#);
}

#[tokio::test]
async fn non_object_data_is_treated_as_missing() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed(
            "accounts",
            &log,
            r#"{"data":{"me":{"__typename":"User","id":"1"}}}"#,
        ),
        TestSubgraph::fixed("reviews", &log, r#"{"data":{"_entities":["x"]}}"#),
        TestSubgraph::fixed("product", &log, r#"{"data":["x"]}"#),
    ]);
    let plan = QueryPlan::new(PlanNode::sequence(vec![
        FetchNode::new("accounts", "{me{__typename id}}").into(),
        flatten("me", user_reviews_fetch()),
        FetchNode::new("product", "{version}").into(),
    ]));

    let response = execute_query_plan(&plan, ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert_eq!(log.services(), vec!["accounts", "reviews", "product"]);
    assert!(!response.has_errors());
    insta::assert_snapshot!(response.to_string(), @r#"{"data":{"me":{"__typename":"User","id":"1","reviews":null},"version":null}}"#);
}

#[tokio::test]
async fn sequence_calls_follow_plan_order() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed(
            "accounts",
            &log,
            r#"{"data":{"me":{"__typename":"User","id":"1"}}}"#,
        ),
        user_reviews(&log),
        TestSubgraph::new("products", &log, |body| {
            Ok(resolve_entities(body, |_| {
                sonic_rs::from_str(r#"{"product":{"upc":"1"}}"#).unwrap()
            }))
        }),
    ]);
    let plan = QueryPlan::new(PlanNode::sequence(vec![
        FetchNode::new("accounts", "{me{__typename id}}").into(),
        flatten("me", user_reviews_fetch()),
        flatten(
            "me.reviews.@",
            FetchNode::new(
                "products",
                "query($representations:[_Any!]!){_entities(representations:$representations){...on Review{product{upc}}}}",
            )
            .with_requires(vec![SelectionItem::inline_fragment(
                "Review",
                vec![SelectionItem::field("__typename"), SelectionItem::field("id")],
            )]),
        ),
    ]));

    let response = execute_query_plan(&plan, ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert_eq!(log.services(), vec!["accounts", "reviews", "products"]);
    // The null review is skipped.
    assert!(log.bodies_for("products")[0]
        .ends_with(r#""variables":{"representations":[{"__typename":"Review","id":"r1"}]}}"#));
    insta::assert_snapshot!(response.to_string(), @r#"{"data":{"me":{"__typename":"User","id":"1","reviews":[{"__typename":"Review","id":"r1","body":"ok","product":{"upc":"1"}},null]}}}"#);
}

#[tokio::test]
async fn fetch_without_representations_is_not_sent() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        value_types::product(
            &log,
            r#"{"data":{"topProducts":[null,{"__typename":"Furniture","upc":"1"}]}}"#,
        ),
        value_types::reviews(&log),
        value_types::books(&log),
    ]);

    let response = execute_query_plan(&value_types::query_plan(), ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert_eq!(log.services(), vec!["product", "reviews"]);
    assert!(log.bodies_for("books").is_empty());
    insta::assert_snapshot!(response.to_string(), @r#"{"data":{"topProducts":[null,{"__typename":"Furniture","upc":"1","reviews":[{"metadata":[{"__typename":"Error","code":418,"message":"I'm a teapot"}]}]}]}}"#);
}

#[tokio::test]
async fn sequence_inside_parallel_reads_its_own_writes() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed(
            "accounts",
            &log,
            r#"{"data":{"me":{"__typename":"User","id":"1"}}}"#,
        ),
        user_reviews(&log),
        TestSubgraph::fixed("product", &log, r#"{"data":{"topProducts":[{"upc":"1"}]}}"#),
    ]);
    let plan = QueryPlan::new(PlanNode::parallel(vec![
        PlanNode::sequence(vec![
            FetchNode::new("accounts", "{me{__typename id}}").into(),
            flatten("me", user_reviews_fetch()),
        ]),
        FetchNode::new("product", "{topProducts{upc}}").into(),
    ]));

    let response = execute_query_plan(&plan, ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert!(log.bodies_for("reviews")[0]
        .ends_with(r#""variables":{"representations":[{"__typename":"User","id":"1"}]}}"#));
    insta::assert_snapshot!(response.to_string(), @r#"{"data":{"me":{"__typename":"User","id":"1","reviews":[{"__typename":"Review","id":"r1","body":"ok"},null]},"topProducts":[{"upc":"1"}]}}"#);
}

#[tokio::test]
async fn forwards_operation_name_and_used_variables() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed("product", &log, r#"{"data":{"topProducts":[]}}"#),
        TestSubgraph::fixed("accounts", &log, r#"{"data":{"me":null}}"#),
    ]);
    let mut top_products = FetchNode::new(
        "product",
        "query Top($first:Int){topProducts(first:$first){upc}}",
    );
    top_products.operation_name = Some("Top".to_string());
    top_products.variable_usages = Some(vec!["first".to_string(), "missing".to_string()]);
    let plan = QueryPlan::new(PlanNode::sequence(vec![
        top_products.into(),
        FetchNode::new("accounts", "query($locale:String){me{id}}").into(),
    ]));
    let variables: Value = sonic_rs::from_str(r#"{"first":2,"locale":"en"}"#).unwrap();

    let response = execute_query_plan(
        &plan,
        ExecutionContext::new(&executors).with_variables(variables),
    )
    .await
    .unwrap();

    assert_eq!(
        log.bodies_for("product"),
        vec![r#"{"query":"query Top($first:Int){topProducts(first:$first){upc}}","operationName":"Top","variables":{"first":2}}"#]
    );
    assert_eq!(
        log.bodies_for("accounts"),
        vec![r#"{"query":"query($locale:String){me{id}}","variables":{"first":2,"locale":"en"}}"#]
    );
    assert_eq!(response.to_string(), r#"{"data":{"topProducts":[],"me":null}}"#);
}

#[tokio::test]
async fn unknown_service_is_reported_per_fetch() {
    let log = CallLog::default();
    let executors = executor_map(vec![TestSubgraph::fixed(
        "accounts",
        &log,
        r#"{"data":{"me":{"id":"1"}}}"#,
    )]);
    let plan = QueryPlan::new(PlanNode::sequence(vec![
        FetchNode::new("nowhere", "{version}").into(),
        FetchNode::new("accounts", "{me{id}}").into(),
    ]));

    let response = execute_query_plan(&plan, ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code(), Some("UNKNOWN_SERVICE"));
    assert_eq!(response.errors[0].service_name(), Some("nowhere"));
    assert_eq!(response.data.to_string(), r#"{"version":null,"me":{"id":"1"}}"#);
}

#[tokio::test]
async fn deadline_cancels_in_flight_and_pending_fetches() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed("accounts", &log, r#"{"data":{"me":{"id":"1"}}}"#)
            .with_delay(Duration::from_secs(5)),
        TestSubgraph::fixed("product", &log, r#"{"data":{"version":"1"}}"#),
    ]);
    let plan = QueryPlan::new(PlanNode::sequence(vec![
        FetchNode::new("accounts", "{me{id}}").into(),
        FetchNode::new("product", "{version}").into(),
    ]));

    let started = Instant::now();
    let response = execute_query_plan(
        &plan,
        ExecutionContext::new(&executors).with_timeout(Duration::from_millis(50)),
    )
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(log.services(), vec!["accounts"]);
    assert_eq!(response.errors.len(), 2);
    assert!(response
        .errors
        .iter()
        .all(|error| error.code() == Some("CANCELLED")));
    // Nothing is merged or nullified for a cancelled fetch.
    assert_eq!(response.data.to_string(), "{}");
}

#[tokio::test]
async fn cancelled_token_sends_nothing() {
    let log = CallLog::default();
    let executors = executor_map(vec![value_types::product(&log, value_types::TOP_PRODUCTS)]);
    let token = CancellationToken::new();
    token.cancel();

    let response = execute_query_plan(
        &value_types::query_plan(),
        ExecutionContext::new(&executors).with_cancellation_token(token),
    )
    .await
    .unwrap();

    assert!(log.services().is_empty());
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code(), Some("CANCELLED"));
    assert_eq!(response.errors[0].service_name(), Some("product"));
}

#[tokio::test]
async fn overlapping_parallel_writes_are_rejected_before_any_call() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed("a", &log, r#"{"data":{"me":{"id":"1"}}}"#),
        TestSubgraph::fixed("b", &log, r#"{"data":{"me":{"name":"Ada"}}}"#),
    ]);
    let plan = QueryPlan::new(PlanNode::parallel(vec![
        FetchNode::new("a", "{me{id}}").into(),
        FetchNode::new("b", "{me{name}}").into(),
    ]));

    let result = execute_query_plan(&plan, ExecutionContext::new(&executors)).await;

    assert_eq!(
        result,
        Err(PlanExecutionError::InvalidPlan(
            PlanValidationError::OverlappingWrites {
                first: 0,
                second: 1,
                path: "me".to_string(),
            }
        ))
    );
    assert!(log.services().is_empty());
}

#[tokio::test]
async fn flatten_over_an_object_is_fatal() {
    let log = CallLog::default();
    let executors = executor_map(vec![
        TestSubgraph::fixed(
            "accounts",
            &log,
            r#"{"data":{"me":{"__typename":"User","id":"1"}}}"#,
        ),
        user_reviews(&log),
    ]);
    let plan = QueryPlan::new(PlanNode::sequence(vec![
        FetchNode::new("accounts", "{me{__typename id}}").into(),
        flatten("me.@", user_reviews_fetch()),
    ]));

    let result = execute_query_plan(&plan, ExecutionContext::new(&executors)).await;

    assert_eq!(
        result,
        Err(PlanExecutionError::FlattenOverNonList {
            path: "me".to_string(),
            found: "object",
        })
    );
    assert_eq!(log.services(), vec!["accounts"]);
}

#[tokio::test]
async fn empty_plan_yields_empty_data() {
    let executors = executor_map(vec![]);

    let response = execute_query_plan(&QueryPlan::default(), ExecutionContext::new(&executors))
        .await
        .unwrap();

    assert_eq!(response.to_string(), r#"{"data":{}}"#);
}

#[test]
fn subgraph_response_fixture_decodes() {
    let response = json_response(value_types::TOP_PRODUCTS);

    assert_eq!(
        response
            .data
            .get("topProducts")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(2)
    );
}
