use std::fmt::{self, Display};

use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::utils::consts::{CAST_PREFIX, LIST_WILDCARD};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlattenPathSegment {
    /// Descends into a field of an object.
    Field(String),
    /// `@`, every element of the list at the current position.
    List,
    /// `... on T`, keeps only positions whose `__typename` is `T`.
    Cast(String),
}

impl Display for FlattenPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenPathSegment::Field(name) => write!(f, "{}", name),
            FlattenPathSegment::List => write!(f, "{}", LIST_WILDCARD),
            FlattenPathSegment::Cast(type_name) => write!(f, "{}{}", CAST_PREFIX, type_name),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FlattenPathParseError {
    #[error("empty segment in path \"{0}\"")]
    EmptySegment(String),
    #[error("missing type name in cast segment of path \"{0}\"")]
    MissingCastType(String),
}

impl FlattenPathSegment {
    fn parse(raw: &str, whole: &str) -> Result<Self, FlattenPathParseError> {
        if raw == LIST_WILDCARD {
            return Ok(FlattenPathSegment::List);
        }
        if let Some(type_name) = raw.strip_prefix(CAST_PREFIX) {
            let type_name = type_name.trim();
            if type_name.is_empty() {
                return Err(FlattenPathParseError::MissingCastType(whole.to_string()));
            }
            return Ok(FlattenPathSegment::Cast(type_name.to_string()));
        }
        if raw.trim().is_empty() {
            return Err(FlattenPathParseError::EmptySegment(whole.to_string()));
        }
        Ok(FlattenPathSegment::Field(raw.to_string()))
    }
}

/// The path of a `Flatten` node, relative to the position the node runs at.
///
/// Serialized as a list of strings (`["topProducts", "@", "... on Book"]`).
/// [`FlattenPath::parse`] also accepts the dotted form, `topProducts.@.... on Book`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlattenPath {
    segments: Vec<FlattenPathSegment>,
}

impl FlattenPath {
    pub fn new(segments: Vec<FlattenPathSegment>) -> Self {
        Self { segments }
    }

    pub fn parse(raw: &str) -> Result<Self, FlattenPathParseError> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while !rest.is_empty() {
            // A cast segment contains dots of its own.
            // It is cut at the first dot after the type name.
            let end = match rest.strip_prefix(CAST_PREFIX) {
                Some(after_prefix) => {
                    CAST_PREFIX.len() + after_prefix.find('.').unwrap_or(after_prefix.len())
                }
                None => rest.find('.').unwrap_or(rest.len()),
            };
            segments.push(FlattenPathSegment::parse(&rest[..end], raw)?);
            rest = &rest[end..];
            if let Some(stripped) = rest.strip_prefix('.') {
                if stripped.is_empty() {
                    return Err(FlattenPathParseError::EmptySegment(raw.to_string()));
                }
                rest = stripped;
            }
        }

        Ok(Self { segments })
    }

    pub fn as_slice(&self) -> &[FlattenPathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn join(&self, other: &FlattenPath) -> FlattenPath {
        let mut segments = Vec::with_capacity(self.segments.len() + other.segments.len());
        segments.extend_from_slice(&self.segments);
        segments.extend_from_slice(&other.segments);
        FlattenPath { segments }
    }

    /// Field names up to, not including, the first `@`.
    pub fn fields_before_first_list(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .take_while(|segment| !matches!(segment, FlattenPathSegment::List))
            .filter_map(|segment| match segment {
                FlattenPathSegment::Field(name) => Some(name.as_str()),
                _ => None,
            })
    }
}

impl From<Vec<FlattenPathSegment>> for FlattenPath {
    fn from(segments: Vec<FlattenPathSegment>) -> Self {
        Self::new(segments)
    }
}

impl Display for FlattenPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl Serialize for FlattenPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.segments.len()))?;
        for segment in &self.segments {
            seq.serialize_element(&segment.to_string())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for FlattenPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlattenPathVisitor;

        impl<'de> Visitor<'de> for FlattenPathVisitor {
            type Value = FlattenPath;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a list of path segments or a dotted path string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                FlattenPath::parse(value).map_err(E::custom)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut segments = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(raw) = seq.next_element::<String>()? {
                    let segment =
                        FlattenPathSegment::parse(&raw, &raw).map_err(de::Error::custom)?;
                    segments.push(segment);
                }
                Ok(FlattenPath { segments })
            }
        }

        deserializer.deserialize_any(FlattenPathVisitor)
    }
}
