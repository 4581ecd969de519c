//! Products of two types, whose `metadata` value type is resolved by different subgraphs.

use crate::{plan::nodes::QueryPlan, response::value::Value};

use super::{resolve_entities, CallLog, TestSubgraph};

pub const QUERY_PLAN: &str = r#"{
  "kind": "QueryPlan",
  "node": {
    "kind": "Sequence",
    "nodes": [
      {
        "kind": "Fetch",
        "serviceName": "product",
        "variableUsages": [],
        "operation": "{topProducts(first:10){__typename upc ...on Book{__typename isbn} ...on Furniture{__typename upc metadata{__typename ...on KeyValue{key value} ...on Error{code message}}}}}"
      },
      {
        "kind": "Parallel",
        "nodes": [
          {
            "kind": "Flatten",
            "path": ["topProducts", "@"],
            "node": {
              "kind": "Fetch",
              "serviceName": "reviews",
              "variableUsages": [],
              "requires": [
                {
                  "kind": "InlineFragment",
                  "typeCondition": "Book",
                  "selections": [
                    { "kind": "Field", "name": "__typename" },
                    { "kind": "Field", "name": "isbn" }
                  ]
                },
                {
                  "kind": "InlineFragment",
                  "typeCondition": "Furniture",
                  "selections": [
                    { "kind": "Field", "name": "__typename" },
                    { "kind": "Field", "name": "upc" }
                  ]
                }
              ],
              "operation": "query($representations:[_Any!]!){_entities(representations:$representations){...on Book{reviews{metadata{__typename ...on KeyValue{key value} ...on Error{code message}}}} ...on Furniture{reviews{metadata{__typename ...on KeyValue{key value} ...on Error{code message}}}}}}"
            }
          },
          {
            "kind": "Flatten",
            "path": ["topProducts", "@"],
            "node": {
              "kind": "Fetch",
              "serviceName": "books",
              "variableUsages": [],
              "requires": [
                {
                  "kind": "InlineFragment",
                  "typeCondition": "Book",
                  "selections": [
                    { "kind": "Field", "name": "__typename" },
                    { "kind": "Field", "name": "isbn" }
                  ]
                }
              ],
              "operation": "query($representations:[_Any!]!){_entities(representations:$representations){...on Book{metadata{__typename ...on KeyValue{key value} ...on Error{code message}}}}}"
            }
          }
        ]
      }
    ]
  }
}"#;

pub const TOP_PRODUCTS: &str = r#"{"data":{"topProducts":[
  {"__typename":"Furniture","upc":"1","metadata":[{"__typename":"KeyValue","key":"Condition","value":"excellent"}]},
  {"__typename":"Book","upc":"0136291554","isbn":"0136291554"}
]}}"#;

pub fn query_plan() -> QueryPlan {
    QueryPlan::from_json_str(QUERY_PLAN).unwrap()
}

pub fn product(log: &CallLog, response: &'static str) -> TestSubgraph {
    TestSubgraph::fixed("product", log, response)
}

pub fn reviews(log: &CallLog) -> TestSubgraph {
    TestSubgraph::new("reviews", log, |body| {
        Ok(resolve_entities(body, |representation| {
            match representation.typename() {
                Some("Furniture") => json(
                    r#"{"reviews":[{"metadata":[{"__typename":"Error","code":418,"message":"I'm a teapot"}]}]}"#,
                ),
                Some("Book") => json(
                    r#"{"reviews":[{"metadata":[{"__typename":"KeyValue","key":"Condition","value":"used"}]}]}"#,
                ),
                _ => Value::Null,
            }
        }))
    })
}

pub fn books(log: &CallLog) -> TestSubgraph {
    TestSubgraph::new("books", log, |body| {
        Ok(resolve_entities(body, |representation| {
            match representation.typename() {
                Some("Book") => json(
                    r#"{"metadata":[{"__typename":"KeyValue","key":"Condition","value":"used"},{"__typename":"Error","code":401,"message":"Unauthorized"}]}"#,
                ),
                _ => Value::Null,
            }
        }))
    })
}

pub fn failing_books(log: &CallLog) -> TestSubgraph {
    TestSubgraph::fixed(
        "books",
        log,
        r#"{"data":{"_entities":[null]},"errors":[{"message":"boom","path":["_entities",0,"metadata"]}]}"#,
    )
}

fn json(raw: &str) -> Value {
    sonic_rs::from_str(raw).unwrap()
}
