use tracing::warn;

use crate::response::value::{ObjectValue, Value};

/// Merges a fetched fragment into a position of the response tree.
///
/// A `null` position or a `null` fragment leaves the position untouched. Only an object fragment
/// is merged into an object position; anything else is skipped.
/// Below the position, objects are merged key by key, and any other value (lists included)
/// replaces what was there.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_obj), Value::Object(source_obj)) => {
            merge_objects(target_obj, source_obj);
        }
        (Value::Null, _) | (_, Value::Null) => {}
        (target, source) => warn!(
            position = target.kind(),
            fragment = source.kind(),
            "skipping merge of a non-object fragment"
        ),
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_obj), Value::Object(source_obj)) => {
            merge_objects(target_obj, source_obj);
        }
        (target_val, source_val) => {
            *target_val = source_val;
        }
    }
}

fn merge_objects(target_obj: &mut ObjectValue, source_obj: ObjectValue) {
    if target_obj.is_empty() {
        *target_obj = source_obj;
        return;
    }

    for (key, source_val) in source_obj {
        match target_obj.get_mut(&key) {
            Some(target_val) => merge_values(target_val, source_val),
            None => {
                target_obj.insert(key, source_val);
            }
        }
    }
}
