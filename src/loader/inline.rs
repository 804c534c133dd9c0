//! Inline component fields
//!
//! A component can declare its field with an anonymous inline fragment:
//!
//! ```graphql
//! { ... on User @componentField(field: "Avatar") { avatar } }
//! ```
//!
//! The loader turns that into a named fragment definition so the rest of the
//! pipeline only ever sees fragments.

use graphql_parser::query::{
    Definition, Directive, Document, FragmentDefinition, OperationDefinition, Selection,
    SelectionSet, TypeCondition, Value,
};
use graphql_parser::Pos;

use crate::constants::{
    component_field_fragment_name, COMPONENT_FIELD_DIRECTIVE, COMPONENT_FIELD_FIELD_ARG,
    COMPONENT_FIELD_PROP_ARG,
};

/// Why an inline component field could not be converted, with the position
/// to report it at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineError {
    pub message: String,
    pub position: Pos,
}

impl InlineError {
    fn new(message: impl Into<String>, position: Pos) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Convert the single anonymous operation of `document` into a component
/// field fragment
pub fn convert_inline_component_field<'a>(
    document: &Document<'a, String>,
    prop: Option<&str>,
) -> Result<FragmentDefinition<'a, String>, InlineError> {
    let start = Pos { line: 1, column: 1 };
    let set = match document.definitions.as_slice() {
        [Definition::Operation(OperationDefinition::SelectionSet(set))] => set,
        [Definition::Operation(OperationDefinition::Query(query))] if query.name.is_none() => {
            &query.selection_set
        }
        _ => {
            return Err(InlineError::new(
                "An inline component field must be a single anonymous selection",
                start,
            ))
        }
    };

    let inline = match set.items.as_slice() {
        [Selection::InlineFragment(inline)] => inline,
        [] | [_] => {
            return Err(InlineError::new(
                "An inline component field must contain an inline fragment",
                set.span.0,
            ))
        }
        _ => {
            return Err(InlineError::new(
                "An inline component field can only have one root selection",
                set.span.0,
            ))
        }
    };

    let Some(TypeCondition::On(type_name)) = &inline.type_condition else {
        return Err(InlineError::new(
            "An inline component field needs a type condition",
            inline.position,
        ));
    };

    let Some(directive) = inline
        .directives
        .iter()
        .find(|d| d.name == COMPONENT_FIELD_DIRECTIVE)
    else {
        return Err(InlineError::new(
            format!("An inline component field needs @{}", COMPONENT_FIELD_DIRECTIVE),
            inline.position,
        ));
    };

    let field = string_argument(directive, COMPONENT_FIELD_FIELD_ARG)?.ok_or_else(|| {
        InlineError::new(
            format!("@{} needs a field argument", COMPONENT_FIELD_DIRECTIVE),
            directive.position,
        )
    })?;
    let existing_prop = string_argument(directive, COMPONENT_FIELD_PROP_ARG)?;

    let mut directives = inline.directives.clone();
    if existing_prop.is_none() {
        if let (Some(prop), Some(target)) = (
            prop,
            directives
                .iter_mut()
                .find(|d| d.name == COMPONENT_FIELD_DIRECTIVE),
        ) {
            target
                .arguments
                .push((COMPONENT_FIELD_PROP_ARG.to_string(), Value::String(prop.to_string())));
        }
    }

    Ok(FragmentDefinition {
        position: inline.position,
        name: component_field_fragment_name(type_name, &field),
        type_condition: TypeCondition::On(type_name.clone()),
        directives,
        selection_set: SelectionSet {
            span: inline.selection_set.span,
            items: inline.selection_set.items.clone(),
        },
    })
}

fn string_argument(
    directive: &Directive<'_, String>,
    name: &str,
) -> Result<Option<String>, InlineError> {
    match directive.arguments.iter().find(|(arg, _)| arg == name) {
        None => Ok(None),
        Some((_, Value::String(value))) => Ok(Some(value.clone())),
        Some(_) => Err(InlineError::new(
            format!("@{}({}:) must be a string", COMPONENT_FIELD_DIRECTIVE, name),
            directive.position,
        )),
    }
}
