use std::fmt;

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::response::value::Value;

pub type GraphQLErrorExtensions = IndexMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<GraphQLErrorPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<GraphQLErrorExtensions>,
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError {
            message,
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

impl From<&str> for GraphQLError {
    fn from(message: &str) -> Self {
        message.to_string().into()
    }
}

impl GraphQLError {
    pub fn from_message_and_code(message: impl Into<String>, code: &str) -> Self {
        let mut extensions = GraphQLErrorExtensions::new();
        extensions.insert("code".to_string(), code.into());
        GraphQLError {
            message: message.into(),
            locations: None,
            path: None,
            extensions: Some(extensions),
        }
    }

    pub fn with_path(mut self, path: GraphQLErrorPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Sets `extensions.serviceName`, unless the error already names a service.
    pub fn add_subgraph_name(mut self, subgraph_name: &str) -> Self {
        let extensions = self.extensions.get_or_insert_with(IndexMap::new);
        if !extensions.contains_key("serviceName") {
            extensions.insert("serviceName".to_string(), subgraph_name.into());
        }
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.extension_str("code")
    }

    pub fn service_name(&self) -> Option<&str> {
        self.extension_str("serviceName")
    }

    fn extension_str(&self, key: &str) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get(key))
            .and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

/// A concrete location in a response: field names and list indexes, from the root.
///
/// Used both as the `path` of a GraphQL error and as the address of a position in the
/// response tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GraphQLErrorPath {
    pub segments: Vec<GraphQLErrorPathSegment>,
}

impl GraphQLErrorPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn concat_index(&self, index: usize) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(GraphQLErrorPathSegment::Index(index));
        Self { segments }
    }

    pub fn concat_str(&self, field: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(GraphQLErrorPathSegment::String(field.into()));
        Self { segments }
    }

    pub fn extend(&mut self, rest: &[GraphQLErrorPathSegment]) {
        self.segments.extend_from_slice(rest);
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl From<Vec<GraphQLErrorPathSegment>> for GraphQLErrorPath {
    fn from(segments: Vec<GraphQLErrorPathSegment>) -> Self {
        Self { segments }
    }
}

impl fmt::Display for GraphQLErrorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                GraphQLErrorPathSegment::String(field) => write!(f, "{}", field)?,
                GraphQLErrorPathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GraphQLErrorPathSegment {
    String(String),
    Index(usize),
}

impl Serialize for GraphQLErrorPathSegment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            GraphQLErrorPathSegment::String(field) => serializer.serialize_str(field),
            GraphQLErrorPathSegment::Index(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

impl<'de> Deserialize<'de> for GraphQLErrorPathSegment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PathSegmentVisitor;

        impl<'de> de::Visitor<'de> for PathSegmentVisitor {
            type Value = GraphQLErrorPathSegment;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or an integer for a GraphQL path segment")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value.to_owned()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    return Err(E::custom(format!(
                        "path segment must be a non-negative integer, but got {}",
                        value
                    )));
                }
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }
        }

        deserializer.deserialize_any(PathSegmentVisitor)
    }
}
