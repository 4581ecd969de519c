use std::collections::{HashMap, HashSet};

use graphql_parser::query::{
    parse_query, Definition, FragmentDefinition, OperationDefinition, Selection, SelectionSet,
    TypeCondition,
};

use crate::utils::consts::{ENTITIES_FIELD_NAME, TYPENAME_FIELD_NAME};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum OperationParseError {
    #[error("failed to parse operation: {0}")]
    Syntax(String),
    #[error("operation document contains no executable operation")]
    MissingOperation,
    #[error("operation \"{0}\" not found in document")]
    UnknownOperationName(String),
    #[error("unknown fragment \"{0}\"")]
    UnknownFragment(String),
    #[error("fragment \"{0}\" spreads itself")]
    FragmentCycle(String),
}

/// The response keys a subgraph operation writes.
///
/// `__typename` is never listed: every fetch may select it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationShape {
    /// Keys of the root selection set.
    pub root_keys: Vec<String>,
    /// Keys selected under `_entities`, grouped by type condition. `None` applies to every type.
    pub entity_keys: Vec<EntityKeys>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKeys {
    pub type_condition: Option<String>,
    pub keys: Vec<String>,
}

type Fragments<'d> = HashMap<&'d str, &'d FragmentDefinition<'d, String>>;

/// Fragments of a document, and the spreads currently being expanded.
struct FragmentScope<'d> {
    fragments: Fragments<'d>,
    expanding: HashSet<&'d str>,
}

impl<'d> FragmentScope<'d> {
    /// Expands `name` with `expand`.
    /// A fragment reached again while it is being expanded is a cycle.
    fn spread<T>(
        &mut self,
        name: &str,
        expand: impl FnOnce(
            &mut Self,
            &'d FragmentDefinition<'d, String>,
        ) -> Result<T, OperationParseError>,
    ) -> Result<T, OperationParseError> {
        let fragment = *self
            .fragments
            .get(name)
            .ok_or_else(|| OperationParseError::UnknownFragment(name.to_string()))?;
        if !self.expanding.insert(fragment.name.as_str()) {
            return Err(OperationParseError::FragmentCycle(name.to_string()));
        }
        let result = expand(self, fragment);
        self.expanding.remove(fragment.name.as_str());
        result
    }
}

impl OperationShape {
    pub fn parse(
        operation: &str,
        operation_name: Option<&str>,
    ) -> Result<Self, OperationParseError> {
        let document = parse_query::<String>(operation)
            .map_err(|e| OperationParseError::Syntax(e.to_string()))?;

        let mut fragments: Fragments = HashMap::new();
        let mut operations = Vec::new();
        for definition in &document.definitions {
            match definition {
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.as_str(), fragment);
                }
                Definition::Operation(op) => operations.push(op),
            }
        }

        let selection_set = select_operation(&operations, operation_name)?;

        let mut scope = FragmentScope {
            fragments,
            expanding: HashSet::new(),
        };
        let mut shape = OperationShape::default();
        collect_keys(selection_set, &mut scope, &mut shape.root_keys)?;

        if let Some(entities) = find_field(selection_set, ENTITIES_FIELD_NAME) {
            collect_entity_keys(entities, &mut scope, None, &mut shape.entity_keys)?;
        }

        Ok(shape)
    }

    /// Keys an entity fetch writes on a position of type `typename`.
    pub fn entity_keys_for(&self, typename: Option<&str>) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for group in &self.entity_keys {
            let applies = match (&group.type_condition, typename) {
                (None, _) => true,
                (Some(condition), Some(typename)) => condition == typename,
                (Some(_), None) => false,
            };
            if applies {
                for key in &group.keys {
                    if !keys.contains(&key.as_str()) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }
}

/// Formatted selection set of a fetch operation, followed by its fragment definitions.
/// Entity fetches print only the selection under `_entities`.
pub fn format_fetch_selection(
    operation: &str,
    operation_name: Option<&str>,
) -> Result<String, OperationParseError> {
    let document = parse_query::<String>(operation)
        .map_err(|e| OperationParseError::Syntax(e.to_string()))?;

    let mut fragments = Vec::new();
    let mut operations = Vec::new();
    for definition in &document.definitions {
        match definition {
            Definition::Fragment(fragment) => fragments.push(fragment),
            Definition::Operation(op) => operations.push(op),
        }
    }

    let selection_set = select_operation(&operations, operation_name)?;
    let selection_set = find_field(selection_set, ENTITIES_FIELD_NAME).unwrap_or(selection_set);

    let mut formatted = selection_set.to_string();
    for fragment in fragments {
        formatted.push_str(&fragment.to_string());
    }
    Ok(formatted)
}

fn select_operation<'d>(
    operations: &[&'d OperationDefinition<'d, String>],
    operation_name: Option<&str>,
) -> Result<&'d SelectionSet<'d, String>, OperationParseError> {
    let op = match operation_name {
        Some(name) => operations
            .iter()
            .find(|op| operation_definition_name(op) == Some(name))
            .ok_or_else(|| OperationParseError::UnknownOperationName(name.to_string()))?,
        None => operations
            .first()
            .ok_or(OperationParseError::MissingOperation)?,
    };
    Ok(operation_selection_set(op))
}

fn operation_definition_name<'d>(op: &'d OperationDefinition<'d, String>) -> Option<&'d str> {
    match op {
        OperationDefinition::Query(q) => q.name.as_deref(),
        OperationDefinition::Mutation(m) => m.name.as_deref(),
        OperationDefinition::Subscription(s) => s.name.as_deref(),
        OperationDefinition::SelectionSet(_) => None,
    }
}

fn operation_selection_set<'d>(
    op: &'d OperationDefinition<'d, String>,
) -> &'d SelectionSet<'d, String> {
    match op {
        OperationDefinition::Query(q) => &q.selection_set,
        OperationDefinition::Mutation(m) => &m.selection_set,
        OperationDefinition::Subscription(s) => &s.selection_set,
        OperationDefinition::SelectionSet(s) => s,
    }
}

fn find_field<'d>(
    selection_set: &'d SelectionSet<'d, String>,
    name: &str,
) -> Option<&'d SelectionSet<'d, String>> {
    selection_set.items.iter().find_map(|item| match item {
        Selection::Field(field) if field.name == name => Some(&field.selection_set),
        Selection::InlineFragment(fragment) => find_field(&fragment.selection_set, name),
        _ => None,
    })
}

fn collect_keys<'d>(
    selection_set: &'d SelectionSet<'d, String>,
    scope: &mut FragmentScope<'d>,
    keys: &mut Vec<String>,
) -> Result<(), OperationParseError> {
    for item in &selection_set.items {
        match item {
            Selection::Field(field) => {
                let key = field.alias.as_ref().unwrap_or(&field.name);
                if key != TYPENAME_FIELD_NAME && !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
            Selection::InlineFragment(fragment) => {
                collect_keys(&fragment.selection_set, scope, keys)?;
            }
            Selection::FragmentSpread(spread) => {
                scope.spread(&spread.fragment_name, |scope, fragment| {
                    collect_keys(&fragment.selection_set, scope, keys)
                })?;
            }
        }
    }
    Ok(())
}

fn collect_entity_keys<'d>(
    selection_set: &'d SelectionSet<'d, String>,
    scope: &mut FragmentScope<'d>,
    type_condition: Option<&str>,
    groups: &mut Vec<EntityKeys>,
) -> Result<(), OperationParseError> {
    for item in &selection_set.items {
        match item {
            Selection::Field(field) => {
                let key = field.alias.as_ref().unwrap_or(&field.name);
                if key != TYPENAME_FIELD_NAME {
                    push_keys(groups, type_condition, vec![key.clone()]);
                }
            }
            Selection::InlineFragment(fragment) => {
                let condition = match &fragment.type_condition {
                    Some(TypeCondition::On(name)) => Some(name.as_str()),
                    None => type_condition,
                };
                collect_entity_keys(&fragment.selection_set, scope, condition, groups)?;
            }
            Selection::FragmentSpread(spread) => {
                scope.spread(&spread.fragment_name, |scope, fragment| {
                    let TypeCondition::On(name) = &fragment.type_condition;
                    let condition = Some(name.as_str());
                    collect_entity_keys(&fragment.selection_set, scope, condition, groups)
                })?;
            }
        }
    }
    Ok(())
}

fn push_keys(groups: &mut Vec<EntityKeys>, type_condition: Option<&str>, keys: Vec<String>) {
    if keys.is_empty() {
        return;
    }
    let group = match groups
        .iter_mut()
        .position(|group| group.type_condition.as_deref() == type_condition)
    {
        Some(index) => &mut groups[index],
        None => {
            groups.push(EntityKeys {
                type_condition: type_condition.map(str::to_string),
                keys: Vec::new(),
            });
            let last = groups.len() - 1;
            &mut groups[last]
        }
    };
    for key in keys {
        if !group.keys.contains(&key) {
            group.keys.push(key);
        }
    }
}
