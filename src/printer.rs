//! Print documents back out of the IR as GraphQL text
//!
//! Used by the `compile --print` command and by tests that compare the
//! rewritten documents. Output uses two-space indentation and has no
//! trailing newline.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

use crate::db::ir::{self, DirectiveNode, SelectionNode, VariableRow};
use crate::types::{DocumentKind, SelectionKind};
use crate::values::ArgumentValue;

/// Print one document
pub fn print_document(conn: &Connection, document: i64) -> Result<String> {
    let row = ir::get_document(conn, document)?
        .ok_or_else(|| anyhow!("no document with id {}", document))?;

    let mut output = String::new();
    match row.kind {
        DocumentKind::Fragment => {
            output.push_str(&format!(
                "fragment {} on {}",
                row.name,
                row.type_condition.as_deref().unwrap_or("")
            ));
        }
        kind => {
            output.push_str(kind.as_str());
            if !row.name.is_empty() {
                output.push(' ');
                output.push_str(&row.name);
            }
            let variables = ir::document_variables(conn, document)?;
            if !variables.is_empty() {
                let printed = variables
                    .iter()
                    .map(|v| print_variable(conn, v))
                    .collect::<Result<Vec<_>>>()?;
                output.push_str(&format!("({})", printed.join(", ")));
            }
        }
    }
    output.push_str(&print_directives(&ir::document_directives(conn, document)?));
    output.push_str(" {\n");
    print_selections(&mut output, &ir::selection_tree(conn, document)?, 1);
    output.push('}');
    Ok(output)
}

/// Print every document, separated by blank lines
pub fn print_all(conn: &Connection) -> Result<String> {
    let printed = ir::all_documents(conn)?
        .iter()
        .map(|document| print_document(conn, document.id))
        .collect::<Result<Vec<_>>>()?;
    Ok(printed.join("\n\n"))
}

/// Render a type name with its modifiers (`User`, `!]!` → `[User!]!`)
pub fn print_type(name: &str, modifiers: &str) -> String {
    let depth = modifiers.matches(']').count();
    format!("{}{}{}", "[".repeat(depth), name, modifiers)
}

fn print_variable(conn: &Connection, variable: &VariableRow) -> Result<String> {
    let mut printed = format!(
        "${}: {}",
        variable.name,
        print_type(&variable.type_name, &variable.modifiers)
    );
    if let Some(default) = variable.default_value {
        printed.push_str(" = ");
        printed.push_str(&ir::load_value(conn, default)?.print());
    }
    Ok(printed)
}

fn print_arguments(arguments: &[(String, ArgumentValue)]) -> String {
    if arguments.is_empty() {
        return String::new();
    }
    let printed: Vec<String> = arguments
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value.print()))
        .collect();
    format!("({})", printed.join(", "))
}

fn print_directives(directives: &[DirectiveNode]) -> String {
    directives
        .iter()
        .map(|d| format!(" @{}{}", d.name, print_arguments(&d.arguments)))
        .collect()
}

fn print_selections(output: &mut String, selections: &[SelectionNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for selection in selections {
        output.push_str(&indent);
        match selection.kind {
            SelectionKind::Field => {
                if let Some(alias) = selection.alias.as_deref().filter(|a| *a != selection.field_name) {
                    output.push_str(alias);
                    output.push_str(": ");
                }
                output.push_str(&selection.field_name);
                output.push_str(&print_arguments(&selection.arguments));
            }
            SelectionKind::Fragment => {
                output.push_str("...");
                output.push_str(&selection.field_name);
            }
            SelectionKind::InlineFragment => {
                output.push_str("... on ");
                output.push_str(&selection.field_name);
            }
        }
        output.push_str(&print_directives(&selection.directives));
        if selection.children.is_empty() {
            output.push('\n');
        } else {
            output.push_str(" {\n");
            print_selections(output, &selection.children, depth + 1);
            output.push_str(&indent);
            output.push_str("}\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{compile_until_loaded, SCHEMA};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_print_type() {
        assert_eq!(print_type("User", ""), "User");
        assert_eq!(print_type("User", "!]!"), "[User!]!");
        assert_eq!(print_type("Int", "]]"), "[[Int]]");
    }

    #[test]
    fn test_print_operation() {
        let store = compile_until_loaded(
            SCHEMA,
            &[r#"query Q($id: ID = "1") @cache(policy: NetworkOnly) { user(id: $id) { me: firstName ... on User { id } } }"#],
        );
        let conn = store.connection().unwrap();
        let query = ir::find_document(&conn, "Q", DocumentKind::Query).unwrap().unwrap();
        assert_eq!(
            print_document(&conn, query.id).unwrap(),
            "query Q($id: ID = \"1\") @cache(policy: NetworkOnly) {\n  user(id: $id) {\n    me: firstName\n    ... on User {\n      id\n    }\n  }\n}"
        );
    }

    #[test]
    fn test_print_fragment() {
        let store = compile_until_loaded(
            SCHEMA,
            &["fragment F on User { friendsList(limit: 2) { ...G @mask_disable } }", "fragment G on User { id }"],
        );
        let conn = store.connection().unwrap();
        let fragment = ir::find_document(&conn, "F", DocumentKind::Fragment).unwrap().unwrap();
        assert_eq!(
            print_document(&conn, fragment.id).unwrap(),
            "fragment F on User {\n  friendsList(limit: 2) {\n    ...G @mask_disable\n  }\n}"
        );
    }
}
