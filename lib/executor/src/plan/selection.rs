use std::fmt::{Formatter as FmtFormatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::plan::pretty_display::{get_indent, PrettyDisplay};

/// One item of a `requires` selection set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum SelectionItem {
    Field(FieldSelection),
    InlineFragment(InlineFragmentSelection),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selections: Option<Vec<SelectionItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragmentSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_condition: Option<String>,
    pub selections: Vec<SelectionItem>,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            selections: None,
        }
    }

    /// The key under which the field appears in a response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl SelectionItem {
    pub fn field(name: impl Into<String>) -> Self {
        SelectionItem::Field(FieldSelection::new(name))
    }

    pub fn inline_fragment(
        type_condition: impl Into<String>,
        selections: Vec<SelectionItem>,
    ) -> Self {
        SelectionItem::InlineFragment(InlineFragmentSelection {
            type_condition: Some(type_condition.into()),
            selections,
        })
    }
}

impl PrettyDisplay for SelectionItem {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        match self {
            SelectionItem::Field(field) => {
                match &field.alias {
                    Some(alias) => write!(f, "{indent}{alias}: {}", field.name)?,
                    None => write!(f, "{indent}{}", field.name)?,
                }
                match &field.selections {
                    Some(selections) if !selections.is_empty() => {
                        writeln!(f, " {{")?;
                        for item in selections {
                            item.pretty_fmt(f, depth + 1)?;
                        }
                        writeln!(f, "{indent}}}")
                    }
                    _ => writeln!(f),
                }
            }
            SelectionItem::InlineFragment(fragment) => {
                match &fragment.type_condition {
                    Some(type_condition) => writeln!(f, "{indent}... on {type_condition} {{")?,
                    None => writeln!(f, "{indent}... {{")?,
                }
                for item in &fragment.selections {
                    item.pretty_fmt(f, depth + 1)?;
                }
                writeln!(f, "{indent}}}")
            }
        }
    }
}
