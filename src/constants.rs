//! Names the compiler gives meaning to: framework directives, their
//! arguments, and the suffixes of derived documents.

/// Marks a field as a list the runtime can insert into / remove from
pub const LIST_DIRECTIVE: &str = "list";
pub const LIST_NAME_ARG: &str = "name";
pub const LIST_CONNECTION_ARG: &str = "connection";

/// Marks a field as paginated
pub const PAGINATE_DIRECTIVE: &str = "paginate";
pub const PAGINATE_NAME_ARG: &str = "name";
pub const PAGINATE_MODE_ARG: &str = "mode";

pub const PREPEND_DIRECTIVE: &str = "prepend";
pub const APPEND_DIRECTIVE: &str = "append";
pub const DEDUPE_DIRECTIVE: &str = "dedupe";
pub const DEDUPE_MATCH_ARG: &str = "match";
pub const OPTIMISTIC_KEY_DIRECTIVE: &str = "optimisticKey";
pub const ALL_LISTS_DIRECTIVE: &str = "allLists";
pub const PARENT_ID_DIRECTIVE: &str = "parentID";
pub const WHEN_DIRECTIVE: &str = "when";
pub const WHEN_NOT_DIRECTIVE: &str = "when_not";
pub const ARGUMENTS_DIRECTIVE: &str = "arguments";
pub const WITH_DIRECTIVE: &str = "with";
pub const CACHE_DIRECTIVE: &str = "cache";
pub const MASK_ENABLE_DIRECTIVE: &str = "mask_enable";
pub const MASK_DISABLE_DIRECTIVE: &str = "mask_disable";
pub const LOADING_DIRECTIVE: &str = "loading";
pub const REQUIRED_DIRECTIVE: &str = "required";

pub const COMPONENT_FIELD_DIRECTIVE: &str = "componentField";
pub const COMPONENT_FIELD_PROP_ARG: &str = "prop";
pub const COMPONENT_FIELD_FIELD_ARG: &str = "field";

/// Private marker attached to variables whose runtime scalar was replaced
pub const RUNTIME_SCALAR_DIRECTIVE: &str = "__houdini__runtimeScalar";
pub const RUNTIME_SCALAR_TYPE_ARG: &str = "type";

/// Directives whose arguments are free-form and never checked against
/// `directive_arguments`
pub const FREE_FORM_DIRECTIVES: [&str; 4] = [
    WITH_DIRECTIVE,
    WHEN_DIRECTIVE,
    WHEN_NOT_DIRECTIVE,
    ARGUMENTS_DIRECTIVE,
];

/// Prefix of every fragment backing a component field
pub const COMPONENT_FIELD_PREFIX: &str = "__componentField__";

/// Type of the synthetic field registered for each component field
pub const COMPONENT_TYPE: &str = "Component";

pub const ARGUMENT_SPECIFICATION_TYPE: &str = "__ArgumentSpecification";

pub const INSERT_SUFFIX: &str = "_insert";
pub const TOGGLE_SUFFIX: &str = "_toggle";
pub const REMOVE_SUFFIX: &str = "_remove";
pub const DELETE_SUFFIX: &str = "_delete";

/// Suffixes of the fragments generated for every named list
pub const LIST_OPERATION_SUFFIXES: [&str; 3] = [INSERT_SUFFIX, TOGGLE_SUFFIX, REMOVE_SUFFIX];

pub const TYPENAME_FIELD: &str = "__typename";

/// Built-in scalars every schema has
pub const BUILT_IN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Build the name of the fragment backing a component field
pub fn component_field_fragment_name(type_name: &str, field: &str) -> String {
    format!("{}{}_{}", COMPONENT_FIELD_PREFIX, type_name, field)
}

/// Build the name of the delete directive generated for a list type
pub fn delete_directive_name(type_name: &str) -> String {
    format!("{}{}", type_name, DELETE_SUFFIX)
}
