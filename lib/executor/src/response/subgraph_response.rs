use core::fmt;

use bytes::Bytes;
use serde::de::{self, Deserializer, MapAccess, Visitor};

use crate::{
    executors::error::SubgraphExecutorError,
    response::{graphql_error::GraphQLError, value::Value},
};

/// The decoded body of a subgraph response. A missing `data` field decodes as `null`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SubgraphResponse {
    pub data: Value,
    pub errors: Option<Vec<GraphQLError>>,
    pub extensions: Option<Value>,
}

impl<'de> de::Deserialize<'de> for SubgraphResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SubgraphResponseVisitor;

        impl<'de> Visitor<'de> for SubgraphResponseVisitor {
            type Value = SubgraphResponse;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter
                    .write_str("a GraphQL response object with data, errors, and extensions fields")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut data = None;
                let mut errors = None;
                let mut extensions = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "data" => {
                            if data.is_some() {
                                return Err(de::Error::duplicate_field("data"));
                            }
                            data = Some(map.next_value()?);
                        }
                        "errors" => {
                            if errors.is_some() {
                                return Err(de::Error::duplicate_field("errors"));
                            }
                            errors = Some(map.next_value::<Option<Vec<GraphQLError>>>()?);
                        }
                        "extensions" => {
                            if extensions.is_some() {
                                return Err(de::Error::duplicate_field("extensions"));
                            }
                            extensions = Some(map.next_value()?);
                        }
                        _ => {
                            let _ = map.next_value::<de::IgnoredAny>()?;
                        }
                    }
                }

                Ok(SubgraphResponse {
                    data: data.unwrap_or(Value::Null),
                    errors: errors.flatten().filter(|errors| !errors.is_empty()),
                    extensions,
                })
            }
        }

        deserializer.deserialize_map(SubgraphResponseVisitor)
    }
}

impl SubgraphResponse {
    pub fn deserialize_from_bytes(
        bytes: &Bytes,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        sonic_rs::from_slice(bytes)
            .map_err(|e| SubgraphExecutorError::ResponseDeserializationFailure(e.to_string()))
    }
}
