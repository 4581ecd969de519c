use indexmap::IndexMap;

use crate::{
    plan::selection::SelectionItem,
    projection::matcher::match_requires,
    response::value::{ObjectValue, Value},
    utils::consts::TYPENAME_FIELD_NAME,
};

/// Builds the representation of `entity` sent to a subgraph: the `requires` fields that
/// apply to its `__typename`.
///
/// Returns `None` when `requires` does not apply to the entity.
pub fn project_requires(requires: &[SelectionItem], entity: &Value) -> Option<Value> {
    let matched = match_requires(requires, entity)?;
    let obj = entity.as_object()?;

    let mut representation = IndexMap::with_capacity(matched.len());
    for item in matched {
        project_item(item, obj, &mut representation);
    }
    Some(Value::Object(representation))
}

fn project_item(item: &SelectionItem, source: &ObjectValue, target: &mut ObjectValue) {
    match item {
        SelectionItem::Field(field) => {
            let Some(value) = source.get(field.response_key()) else {
                return;
            };
            let projected = match &field.selections {
                Some(selections) if !selections.is_empty() => project_value(selections, value),
                _ => value.clone(),
            };
            target.insert(field.name.clone(), projected);
        }
        SelectionItem::InlineFragment(fragment) => {
            let applies = match &fragment.type_condition {
                None => true,
                Some(type_condition) => source
                    .get(TYPENAME_FIELD_NAME)
                    .and_then(Value::as_str)
                    .is_some_and(|typename| typename == type_condition),
            };
            if applies {
                for nested in &fragment.selections {
                    project_item(nested, source, target);
                }
            }
        }
    }
}

fn project_value(selections: &[SelectionItem], value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut projected = IndexMap::with_capacity(selections.len());
            for item in selections {
                project_item(item, obj, &mut projected);
            }
            Value::Object(projected)
        }
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|item| project_value(selections, item))
                .collect(),
        ),
        other => other.clone(),
    }
}
