#[cfg(test)]
mod timeout_per_subgraph_e2e_tests {
    use std::{thread::sleep, time::Duration};

    use crate::testkit::{execute_with_config_inline, TOP_PRODUCTS, VALUE_TYPES_PLAN};

    #[tokio::test]
    async fn slow_subgraph_times_out_without_affecting_siblings() {
        let mut server = mockito::Server::new_async().await;
        let host = server.host_with_port();
        // The slow subgraph gets its own server, as the delay blocks the server thread.
        let mut books_server = mockito::Server::new_async().await;
        let books_host = books_server.host_with_port();

        let _product_mock = server
            .mock("POST", "/product")
            .with_status(200)
            .with_body(TOP_PRODUCTS)
            .create_async()
            .await;
        let _reviews_mock = server
            .mock("POST", "/reviews")
            .with_status(200)
            .with_body(r#"{"data":{"_entities":[{"reviews":[]},{"reviews":[]}]}}"#)
            .create_async()
            .await;
        let books_mock = books_server
            .mock("POST", "/books")
            .expect(1)
            .with_status(200)
            .with_chunked_body(|writer| {
                sleep(Duration::from_secs(1));
                writer.write_all(br#"{"data":{"_entities":[{"metadata":[]}]}}"#)
            })
            .create_async()
            .await;

        let response = execute_with_config_inline(
            VALUE_TYPES_PLAN,
            &format!(
                r#"
                subgraphs:
                  product:
                    url: http://{host}/product
                  reviews:
                    url: http://{host}/reviews
                  books:
                    url: http://{books_host}/books
                traffic_shaping:
                  timeout: 10s
                  subgraphs:
                    books:
                      timeout: 100ms
                "#
            ),
        )
        .await;

        books_mock.assert_async().await;

        insta::assert_snapshot!(response.to_string(), @r#"{"data":{"topProducts":[{"__typename":"Furniture","upc":"1","metadata":[{"__typename":"KeyValue","key":"Condition","value":"excellent"}],"reviews":[]},{"__typename":"Book","upc":"0136291554","isbn":"0136291554","reviews":[],"metadata":null}]},"errors":[{"message":"Failed to execute request to subgraph \"books\": Request timed out after 100ms","path":["topProducts"],"extensions":{"code":"SUBREQUEST_HTTP_ERROR","serviceName":"books"}}]}"#);
    }
}
