use tracing::trace;

use crate::{
    execution::error::PlanExecutionError,
    plan::path::FlattenPathSegment,
    response::{
        graphql_error::{GraphQLErrorPath, GraphQLErrorPathSegment},
        value::Value,
    },
};

/// Walks `remaining_path` from `current_data`,
/// calling `callback` with every position it resolves to.
///
/// Absent fields, `null` values and positions failing a type cast resolve to nothing.
/// A `@` over anything but a list, or a field over anything but an object, is an error.
pub fn traverse_and_callback<'a, Callback>(
    current_data: &'a Value,
    remaining_path: &[FlattenPathSegment],
    current_path: GraphQLErrorPath,
    callback: &mut Callback,
) -> Result<(), PlanExecutionError>
where
    Callback: FnMut(&'a Value, GraphQLErrorPath),
{
    if current_data.is_null() {
        trace!(path = %current_path, "null position skipped");
        return Ok(());
    }

    let Some((segment, rest_of_path)) = remaining_path.split_first() else {
        if let Value::Array(arr) = current_data {
            // A path ending on a list targets its elements.
            for (index, item) in arr.iter().enumerate() {
                if !item.is_null() {
                    callback(item, current_path.concat_index(index));
                }
            }
        } else {
            callback(current_data, current_path);
        }
        return Ok(());
    };

    match segment {
        FlattenPathSegment::List => match current_data {
            Value::Array(arr) => {
                for (index, item) in arr.iter().enumerate() {
                    traverse_and_callback(
                        item,
                        rest_of_path,
                        current_path.concat_index(index),
                        callback,
                    )?;
                }
                Ok(())
            }
            other => Err(PlanExecutionError::FlattenOverNonList {
                path: current_path.to_string(),
                found: other.kind(),
            }),
        },
        FlattenPathSegment::Field(field_name) => match current_data {
            Value::Object(obj) => match obj.get(field_name) {
                Some(next_data) => traverse_and_callback(
                    next_data,
                    rest_of_path,
                    current_path.concat_str(field_name.as_str()),
                    callback,
                ),
                None => {
                    trace!(path = %current_path, field = %field_name, "absent field skipped");
                    Ok(())
                }
            },
            other => Err(PlanExecutionError::FlattenOverNonObject {
                path: current_path.to_string(),
                found: other.kind(),
            }),
        },
        FlattenPathSegment::Cast(type_condition) => {
            if current_data.typename() == Some(type_condition.as_str()) {
                traverse_and_callback(current_data, rest_of_path, current_path, callback)
            } else {
                Ok(())
            }
        }
    }
}

/// Resolves `path` relative to every position of `scope`, in order.
pub fn resolve_positions(
    tree: &Value,
    scope: &[GraphQLErrorPath],
    path: &[FlattenPathSegment],
) -> Result<Vec<GraphQLErrorPath>, PlanExecutionError> {
    let mut positions = Vec::new();
    for base in scope {
        if let Some(base_value) = value_at(tree, base) {
            traverse_and_callback(base_value, path, base.clone(), &mut |_, position| {
                positions.push(position)
            })?;
        }
    }
    Ok(positions)
}

pub fn value_at<'a>(tree: &'a Value, path: &GraphQLErrorPath) -> Option<&'a Value> {
    let mut current = tree;
    for segment in &path.segments {
        current = match (segment, current) {
            (GraphQLErrorPathSegment::String(field), Value::Object(obj)) => obj.get(field)?,
            (GraphQLErrorPathSegment::Index(index), Value::Array(arr)) => arr.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn value_at_mut<'a>(tree: &'a mut Value, path: &GraphQLErrorPath) -> Option<&'a mut Value> {
    let mut current = tree;
    for segment in &path.segments {
        current = match (segment, current) {
            (GraphQLErrorPathSegment::String(field), Value::Object(obj)) => obj.get_mut(field)?,
            (GraphQLErrorPathSegment::Index(index), Value::Array(arr)) => arr.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}
