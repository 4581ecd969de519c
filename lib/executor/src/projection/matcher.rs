use crate::{plan::selection::SelectionItem, response::value::Value};

/// Picks the part of a `requires` selection that applies to `value`.
///
/// A typed fragment applies only when its type condition equals the value's `__typename`
/// exactly. Interface and union membership was already resolved when the plan was built.
/// Untyped items (plain fields, fragments without a type condition) apply to every value.
/// Returns `None` when nothing applies, which means the fetch has nothing to do at this position.
pub fn match_requires<'r>(
    requires: &'r [SelectionItem],
    value: &Value,
) -> Option<Vec<&'r SelectionItem>> {
    let Value::Object(_) = value else {
        return None;
    };
    let typename = value.typename();

    let mut matched: Vec<&'r SelectionItem> = Vec::new();
    for item in requires {
        match item {
            SelectionItem::Field(_) => matched.push(item),
            SelectionItem::InlineFragment(fragment) => match &fragment.type_condition {
                None => matched.extend(fragment.selections.iter()),
                Some(type_condition) if Some(type_condition.as_str()) == typename => {
                    matched.extend(fragment.selections.iter())
                }
                Some(_) => {}
            },
        }
    }

    if matched.is_empty() {
        None
    } else {
        Some(matched)
    }
}
