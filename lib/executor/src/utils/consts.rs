pub const TYPENAME_FIELD_NAME: &str = "__typename";
pub const ENTITIES_FIELD_NAME: &str = "_entities";
pub const REPRESENTATIONS_VARIABLE_NAME: &str = "representations";
pub const LIST_WILDCARD: &str = "@";
pub const CAST_PREFIX: &str = "... on ";
