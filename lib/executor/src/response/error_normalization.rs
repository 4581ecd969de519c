use crate::{
    plan::path::FlattenPath,
    response::graphql_error::{GraphQLError, GraphQLErrorPath, GraphQLErrorPathSegment},
    utils::consts::ENTITIES_FIELD_NAME,
};

pub const DOWNSTREAM_SERVICE_ERROR: &str = "DOWNSTREAM_SERVICE_ERROR";
pub const CANCELLED: &str = "CANCELLED";

/**
 * Map `[_entities, 0, field]` to the position representation `0` was built from.
 *
 * For example if the error location is `[_entities, 1, name]`
 * and representation `1` came from `products.0.reviews.2.author`,
 * it becomes `["products", 0, "reviews", 2, "author", "name"]`.
 *
 * Errors without a usable `_entities` path get the flatten path, up to its first `@`.
 */
pub fn normalize_errors_for_representations(
    subgraph_name: &str,
    flatten_path: &FlattenPath,
    representation_positions: &[GraphQLErrorPath],
    errors: Vec<GraphQLError>,
) -> Vec<GraphQLError> {
    errors
        .into_iter()
        .map(|error| {
            let real_path = entity_error_position(&error, representation_positions)
                .or_else(|| unlocated_error_path(flatten_path));
            let mut new_error = error;
            if let Some(real_path) = real_path {
                new_error.path = Some(real_path);
            }
            add_subgraph_info_to_error(new_error, subgraph_name)
        })
        .collect()
}

/// Errors of a fetch merged at the root keep their own path.
pub fn normalize_errors_for_root(
    subgraph_name: &str,
    errors: Vec<GraphQLError>,
) -> Vec<GraphQLError> {
    errors
        .into_iter()
        .map(|error| add_subgraph_info_to_error(error, subgraph_name))
        .collect()
}

fn entity_error_position(
    error: &GraphQLError,
    representation_positions: &[GraphQLErrorPath],
) -> Option<GraphQLErrorPath> {
    let path_in_error = &error.path.as_ref()?.segments;
    match path_in_error.as_slice() {
        [
            GraphQLErrorPathSegment::String(first),
            GraphQLErrorPathSegment::Index(entity_index),
            rest @ ..,
        ] if first == ENTITIES_FIELD_NAME => {
            let mut real_path = representation_positions.get(*entity_index)?.clone();
            real_path.extend(rest);
            Some(real_path)
        }
        _ => None,
    }
}

/// The flatten path without list indexes, `None` at the root.
pub fn unlocated_error_path(flatten_path: &FlattenPath) -> Option<GraphQLErrorPath> {
    let segments: Vec<GraphQLErrorPathSegment> = flatten_path
        .fields_before_first_list()
        .map(|field| GraphQLErrorPathSegment::String(field.to_string()))
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.into())
    }
}

pub fn add_subgraph_info_to_error(error: GraphQLError, subgraph_name: &str) -> GraphQLError {
    let mut error = error.add_subgraph_name(subgraph_name);
    let extensions = error.extensions.get_or_insert_with(Default::default);
    if !extensions.contains_key("code") {
        extensions.insert("code".to_string(), DOWNSTREAM_SERVICE_ERROR.into());
    }
    error
}
