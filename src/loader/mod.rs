//! Document loader
//!
//! Parses every raw document and writes its operations and fragments into
//! the IR: documents, variables, selections, placements, arguments,
//! directives and argument value trees. Each raw document is loaded by one
//! worker on its own connection inside one transaction.

mod inline;

use anyhow::Result;
use graphql_parser::query::{
    parse_query, Definition, Directive, FragmentDefinition, OperationDefinition, Selection,
    SelectionSet, TypeCondition, VariableDefinition,
};
use graphql_parser::Pos;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::ARGUMENTS_DIRECTIVE;
use crate::db::ir::{self, TypeRef};
use crate::db::{self, StoredRawDocument, Store};
use crate::diagnostics::{Diagnostic, Diagnostics, ErrorKind, Location};
use crate::schema::{parse_field_type, type_string};
use crate::types::{DocumentKind, SelectionKind, ValueKind};
use crate::values::{check_value, ArgumentValue};
use crate::worker::run_pool;

pub use inline::{convert_inline_component_field, InlineError};

/// Load every raw document in the store with `width` workers
pub fn load_documents(store: &Store, width: usize, cancel: &CancellationToken) -> Result<Diagnostics> {
    let raw_documents = {
        let conn = store.connection()?;
        db::raw_documents(&conn)?
    };
    info!("Loading {} raw documents", raw_documents.len());

    let results = run_pool(raw_documents, width, cancel, |raw| {
        if cancel.is_cancelled() {
            return Diagnostics::new();
        }
        let loaded = store
            .connection()
            .and_then(|mut conn| db::transaction(&mut conn, |tx| load_raw_document(tx, raw)));
        match loaded {
            Ok(diagnostics) => diagnostics,
            Err(err) => {
                warn!("Failed to load {}: {:#}", raw.document.filepath, err);
                let mut diagnostics = Diagnostics::new();
                diagnostics.push(
                    Diagnostic::new(ErrorKind::Internal, format!("{:#}", err)).at(Location::new(
                        raw.document.filepath.clone(),
                        raw.document.offset_line,
                        raw.document.offset_column,
                    )),
                );
                diagnostics
            }
        }
    })?;

    let mut diagnostics = Diagnostics::new();
    for result in results {
        diagnostics.extend(result);
    }
    Ok(diagnostics)
}

/// Load one raw document. Parse and validation problems are returned as
/// diagnostics; store failures as errors.
pub fn load_raw_document(conn: &Connection, raw: &StoredRawDocument) -> Result<Diagnostics> {
    let mut loader = DocumentLoader {
        conn,
        raw,
        document: 0,
        diagnostics: Diagnostics::new(),
    };

    let parsed = match parse_query::<String>(&raw.document.content) {
        Ok(parsed) => parsed,
        Err(err) => {
            let message = err.to_string();
            let (line, column) = parse_error_position(&message).unwrap_or((1, 1));
            loader.diagnostics.push(Diagnostic::parse(
                clean_parse_error(&message),
                loader.location(Pos { line, column }),
            ));
            return Ok(loader.diagnostics);
        }
    };

    if raw.document.inline_component_field {
        match convert_inline_component_field(
            &parsed,
            raw.document.inline_component_field_prop.as_deref(),
        ) {
            Ok(fragment) => loader.load_fragment(&fragment)?,
            Err(err) => {
                let location = loader.location(err.position);
                loader
                    .diagnostics
                    .push(Diagnostic::validation(err.message, location));
            }
        }
        return Ok(loader.diagnostics);
    }

    for definition in &parsed.definitions {
        match definition {
            Definition::Operation(operation) => loader.load_operation(operation)?,
            Definition::Fragment(fragment) => loader.load_fragment(fragment)?,
        }
    }
    debug!("Loaded {}", raw.document.filepath);
    Ok(loader.diagnostics)
}

/// Pull `line:column` out of a parser message ("Parse error at 3:7")
pub fn parse_error_position(message: &str) -> Option<(usize, usize)> {
    let rest = &message[message.find("Parse error at ")? + "Parse error at ".len()..];
    let (line, rest) = rest.split_once(':')?;
    let column: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some((line.trim().parse().ok()?, column.parse().ok()?))
}

fn clean_parse_error(message: &str) -> String {
    let message = message.strip_prefix("query parse error: ").unwrap_or(message);
    message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert a parser position into stored (row, column)
fn position(pos: Pos) -> (i64, i64) {
    (pos.line as i64, pos.column as i64)
}

struct DocumentLoader<'a> {
    conn: &'a Connection,
    raw: &'a StoredRawDocument,
    document: i64,
    diagnostics: Diagnostics,
}

impl DocumentLoader<'_> {
    fn location(&self, pos: Pos) -> Location {
        Location::offset(
            self.raw.document.filepath.clone(),
            (self.raw.document.offset_line, self.raw.document.offset_column),
            (pos.line as u32, pos.column as u32),
        )
    }

    fn load_operation(&mut self, operation: &OperationDefinition<'_, String>) -> Result<()> {
        let (kind, name, pos, variables, directives, selection_set) = match operation {
            OperationDefinition::SelectionSet(set) => {
                (DocumentKind::Query, None, set.span.0, &[][..], &[][..], set)
            }
            OperationDefinition::Query(q) => (
                DocumentKind::Query,
                q.name.as_deref(),
                q.position,
                &q.variable_definitions[..],
                &q.directives[..],
                &q.selection_set,
            ),
            OperationDefinition::Mutation(m) => (
                DocumentKind::Mutation,
                m.name.as_deref(),
                m.position,
                &m.variable_definitions[..],
                &m.directives[..],
                &m.selection_set,
            ),
            OperationDefinition::Subscription(s) => (
                DocumentKind::Subscription,
                s.name.as_deref(),
                s.position,
                &s.variable_definitions[..],
                &s.directives[..],
                &s.selection_set,
            ),
        };

        let root = ir::root_type(self.conn, kind)?;
        if root.is_none() {
            self.diagnostics.push(Diagnostic::validation(
                format!("The schema has no {} type", kind.as_str()),
                self.location(pos),
            ));
        }

        self.document = ir::insert_document(
            self.conn,
            name.unwrap_or(""),
            self.raw.id,
            kind,
            root.as_deref(),
            position(pos),
        )?;

        for variable in variables {
            self.load_variable(variable)?;
        }
        self.load_document_directives(directives)?;
        self.load_selection_set(selection_set, root.as_deref(), None)
    }

    fn load_fragment(&mut self, fragment: &FragmentDefinition<'_, String>) -> Result<()> {
        let TypeCondition::On(type_condition) = &fragment.type_condition;
        self.document = ir::insert_document(
            self.conn,
            &fragment.name,
            self.raw.id,
            DocumentKind::Fragment,
            Some(type_condition),
            position(fragment.position),
        )?;

        self.load_document_directives(&fragment.directives)?;
        for directive in &fragment.directives {
            if directive.name == ARGUMENTS_DIRECTIVE {
                self.load_fragment_arguments(directive)?;
            }
        }
        self.load_selection_set(&fragment.selection_set, Some(type_condition), None)
    }

    fn load_variable(&mut self, variable: &VariableDefinition<'_, String>) -> Result<()> {
        let (name, modifiers) = parse_field_type(&type_string(&variable.var_type));
        let type_ref = TypeRef { name, modifiers };

        let mut default_id = None;
        if let Some(default) = &variable.default_value {
            let value = ArgumentValue::from_ast(default)?;
            if let Err(problem) = check_value(&value, &type_ref.modifiers) {
                self.diagnostics.push(Diagnostic::validation(
                    format!("Invalid default value for ${}: {}", variable.name, problem),
                    self.location(variable.position),
                ));
            }
            default_id = Some(ir::insert_value_tree(
                self.conn,
                &value,
                Some(&type_ref),
                Some(self.document),
                position(variable.position),
            )?);
        }

        ir::insert_document_variable(
            self.conn,
            self.document,
            &variable.name,
            &type_ref,
            default_id,
            position(variable.position),
        )?;
        Ok(())
    }

    /// `@arguments(name: { type: "T!", default: V })` declares fragment
    /// variables
    fn load_fragment_arguments(&mut self, directive: &Directive<'_, String>) -> Result<()> {
        for (name, value) in &directive.arguments {
            let declaration = ArgumentValue::from_ast(value)?;
            let type_string = match declaration.field("type") {
                Some(t) if declaration.kind == ValueKind::Object && t.kind == ValueKind::String => {
                    t.raw.clone()
                }
                _ => {
                    self.diagnostics.push(Diagnostic::validation(
                        format!(
                            "Fragment argument {} must be an object with a string type",
                            name
                        ),
                        self.location(directive.position),
                    ));
                    continue;
                }
            };
            let (base, modifiers) = parse_field_type(&type_string);
            let type_ref = TypeRef {
                name: base,
                modifiers,
            };

            let mut default_id = None;
            if let Some(default) = declaration.field("default") {
                if let Err(problem) = check_value(default, &type_ref.modifiers) {
                    self.diagnostics.push(Diagnostic::validation(
                        format!("Invalid default value for fragment argument {}: {}", name, problem),
                        self.location(directive.position),
                    ));
                }
                default_id = Some(ir::insert_value_tree(
                    self.conn,
                    default,
                    Some(&type_ref),
                    Some(self.document),
                    position(directive.position),
                )?);
            }

            ir::insert_document_variable(
                self.conn,
                self.document,
                name,
                &type_ref,
                default_id,
                position(directive.position),
            )?;
        }
        Ok(())
    }

    fn load_document_directives(&mut self, directives: &[Directive<'_, String>]) -> Result<()> {
        for directive in directives {
            let id = ir::insert_document_directive(
                self.conn,
                self.document,
                &directive.name,
                position(directive.position),
            )?;
            for (name, value) in &directive.arguments {
                let expected = ir::directive_argument(self.conn, &directive.name, name)?;
                let value_id = ir::insert_value_tree(
                    self.conn,
                    &ArgumentValue::from_ast(value)?,
                    expected.as_ref(),
                    Some(self.document),
                    position(directive.position),
                )?;
                ir::insert_document_directive_argument(
                    self.conn,
                    id,
                    name,
                    value_id,
                    position(directive.position),
                )?;
            }
        }
        Ok(())
    }

    fn load_selection_directives(
        &mut self,
        selection: i64,
        directives: &[Directive<'_, String>],
    ) -> Result<()> {
        for directive in directives {
            let id = ir::insert_selection_directive(
                self.conn,
                selection,
                &directive.name,
                position(directive.position),
            )?;
            for (name, value) in &directive.arguments {
                let expected = ir::directive_argument(self.conn, &directive.name, name)?;
                let value_id = ir::insert_value_tree(
                    self.conn,
                    &ArgumentValue::from_ast(value)?,
                    expected.as_ref(),
                    Some(self.document),
                    position(directive.position),
                )?;
                ir::insert_selection_directive_argument(
                    self.conn,
                    id,
                    name,
                    value_id,
                    position(directive.position),
                )?;
            }
        }
        Ok(())
    }

    /// Walk a selection set. `parent_type` is `None` below a field whose type
    /// did not resolve; such fields are still stored so later rules can
    /// report them.
    fn load_selection_set(
        &mut self,
        set: &SelectionSet<'_, String>,
        parent_type: Option<&str>,
        parent: Option<i64>,
    ) -> Result<()> {
        for (index, selection) in set.items.iter().enumerate() {
            match selection {
                Selection::Field(field) => {
                    let type_id = parent_type.map(|p| format!("{}.{}", p, field.name));
                    let resolved = match &type_id {
                        Some(id) => ir::type_field(self.conn, id)?,
                        None => None,
                    };

                    let id = ir::insert_selection(
                        self.conn,
                        &field.name,
                        field.alias.as_deref(),
                        SelectionKind::Field,
                        type_id.as_deref(),
                    )?;
                    ir::insert_selection_ref(
                        self.conn,
                        parent,
                        id,
                        self.document,
                        index as i64,
                        position(field.position),
                    )?;

                    for (name, value) in &field.arguments {
                        let argument_id = type_id.as_ref().map(|t| format!("{}.{}", t, name));
                        let expected = match &argument_id {
                            Some(arg) => ir::field_argument(self.conn, arg)?,
                            None => None,
                        };
                        let value_id = ir::insert_value_tree(
                            self.conn,
                            &ArgumentValue::from_ast(value)?,
                            expected.as_ref(),
                            Some(self.document),
                            position(field.position),
                        )?;
                        ir::insert_selection_argument(
                            self.conn,
                            id,
                            name,
                            value_id,
                            expected.as_ref().and(argument_id.as_deref()),
                            position(field.position),
                        )?;
                    }

                    self.load_selection_directives(id, &field.directives)?;
                    let child_type = resolved.map(|t| t.name);
                    self.load_selection_set(&field.selection_set, child_type.as_deref(), Some(id))?;
                }
                Selection::InlineFragment(inline) => {
                    let condition = match &inline.type_condition {
                        Some(TypeCondition::On(name)) => Some(name.as_str()),
                        None => parent_type,
                    };
                    let id = ir::insert_selection(
                        self.conn,
                        condition.unwrap_or(""),
                        None,
                        SelectionKind::InlineFragment,
                        None,
                    )?;
                    ir::insert_selection_ref(
                        self.conn,
                        parent,
                        id,
                        self.document,
                        index as i64,
                        position(inline.position),
                    )?;
                    self.load_selection_directives(id, &inline.directives)?;
                    self.load_selection_set(&inline.selection_set, condition, Some(id))?;
                }
                Selection::FragmentSpread(spread) => {
                    let id = ir::insert_selection(
                        self.conn,
                        &spread.fragment_name,
                        None,
                        SelectionKind::Fragment,
                        None,
                    )?;
                    ir::insert_selection_ref(
                        self.conn,
                        parent,
                        id,
                        self.document,
                        index as i64,
                        position(spread.position),
                    )?;
                    self.load_selection_directives(id, &spread.directives)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::load_schema;
    use crate::types::RawDocument;

    const SCHEMA: &str = r#"
        type User {
            id: ID!
            firstName: String
            friends(first: Int, filter: UserFilter): [User!]!
        }
        input UserFilter { names: [String!], active: Boolean }
        type Query { user(id: ID): User, users: [User!]! }
    "#;

    fn store_with(raw: RawDocument) -> Store {
        let store = Store::in_memory().unwrap();
        store.with_transaction(|tx| load_schema(tx, SCHEMA)).unwrap();
        store.insert_raw_documents(&[raw]).unwrap();
        store
    }

    fn load(store: &Store) -> Diagnostics {
        load_documents(store, 2, &CancellationToken::new()).unwrap()
    }

    fn count(store: &Store, sql: &str) -> i64 {
        store.connection().unwrap().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_parse_error_position() {
        assert_eq!(
            parse_error_position("query parse error: Parse error at 3:7\nUnexpected `}`"),
            Some((3, 7))
        );
        assert_eq!(parse_error_position("something else"), None);
    }

    #[test]
    fn test_load_query() {
        let store = store_with(RawDocument::new(
            "a.graphql",
            r#"query A($id: ID = "1") { user(id: $id) { id firstName ... on User { id } ...UserInfo } }
               fragment UserInfo on User { firstName }"#,
        ));
        let diagnostics = load(&store);
        assert!(diagnostics.is_empty(), "{}", diagnostics);

        let conn = store.connection().unwrap();
        let documents = ir::all_documents(&conn).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].name, "A");
        assert_eq!(documents[0].kind, DocumentKind::Query);
        assert_eq!(documents[1].type_condition.as_deref(), Some("User"));

        let tree = ir::selection_tree(&conn, documents[0].id).unwrap();
        let user = &tree[0];
        assert_eq!(user.type_id.as_deref(), Some("Query.user"));
        assert_eq!(user.arguments[0].0, "id");
        assert_eq!(user.arguments[0].1.kind, ValueKind::Variable);
        let kinds: Vec<SelectionKind> = user.children.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SelectionKind::Field,
                SelectionKind::Field,
                SelectionKind::InlineFragment,
                SelectionKind::Fragment
            ]
        );
        assert_eq!(user.children[3].field_name, "UserInfo");

        let variables = ir::document_variables(&conn, documents[0].id).unwrap();
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].type_name, "ID");
        assert!(variables[0].default_value.is_some());
    }

    #[test]
    fn test_nested_input_values() {
        let store = store_with(RawDocument::new(
            "a.graphql",
            r#"{ users { friends(filter: { names: ["a", "b"], active: true }) { id } } }"#,
        ));
        assert!(load(&store).is_empty());
        assert_eq!(count(&store, "SELECT COUNT(*) FROM argument_values WHERE kind = 'Object'"), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM argument_values WHERE kind = 'List'"), 1);
        let expected: String = store
            .connection()
            .unwrap()
            .query_row(
                "SELECT expected_type FROM argument_values WHERE kind = 'List'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(expected, "String");
        let field_argument: String = store
            .connection()
            .unwrap()
            .query_row(
                "SELECT field_argument FROM selection_arguments WHERE name = 'filter'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(field_argument, "User.friends.filter");
    }

    #[test]
    fn test_parse_error_is_offset() {
        let mut raw = RawDocument::new("src/App.svelte", "query {\n  user {\n}");
        raw.offset_line = 10;
        raw.offset_column = 4;
        let store = store_with(raw);
        let diagnostics = load(&store);
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = &diagnostics.as_slice()[0];
        assert_eq!(diagnostic.kind, ErrorKind::Parse);
        assert_eq!(diagnostic.locations[0].filepath, "src/App.svelte");
        assert!(diagnostic.locations[0].line > 10);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM documents"), 0);
    }

    #[test]
    fn test_fragment_arguments() {
        let store = store_with(RawDocument::new(
            "a.graphql",
            r#"fragment F on User @arguments(size: { type: "Int", default: 10 }, name: { type: "String!" }) { id }"#,
        ));
        assert!(load(&store).is_empty());

        let conn = store.connection().unwrap();
        let documents = ir::all_documents(&conn).unwrap();
        let variables = ir::document_variables(&conn, documents[0].id).unwrap();
        assert_eq!(variables.len(), 2);
        let size = variables.iter().find(|v| v.name == "size").unwrap();
        assert_eq!(size.type_name, "Int");
        assert_eq!(ir::load_value(&conn, size.default_value.unwrap()).unwrap().raw, "10");
        let name = variables.iter().find(|v| v.name == "name").unwrap();
        assert_eq!(name.modifiers, "!");
        assert!(name.default_value.is_none());
    }

    #[test]
    fn test_invalid_default_values() {
        let store = store_with(RawDocument::new(
            "a.graphql",
            r#"query Q($ids: [ID!]! = []) { users { id } }
               fragment F on User @arguments(size: { type: "Int!", default: null }) { id }"#,
        ));
        let diagnostics = load(&store);
        assert_eq!(diagnostics.count(ErrorKind::Validation), 2);
    }

    #[test]
    fn test_unresolved_field_is_stored() {
        let store = store_with(RawDocument::new("a.graphql", "{ user { nope { deeper } } }"));
        assert!(load(&store).is_empty());
        let conn = store.connection().unwrap();
        let types: Vec<Option<String>> = ir::query_all(
            &conn,
            "SELECT type FROM selections ORDER BY id",
            [],
            |row| row.get(0),
        )
        .unwrap();
        assert_eq!(
            types,
            vec![Some("Query.user".to_string()), Some("User.nope".to_string()), None]
        );
    }

    #[test]
    fn test_inline_component_field() {
        let mut raw = RawDocument::new(
            "src/Avatar.svelte",
            r#"{ ... on User @componentField(field: "Avatar") { firstName } }"#,
        );
        raw.inline_component_field = true;
        raw.inline_component_field_prop = Some("user".to_string());
        let store = store_with(raw);
        assert!(load(&store).is_empty());

        let conn = store.connection().unwrap();
        let fragment = ir::find_document(&conn, "__componentField__User_Avatar", DocumentKind::Fragment)
            .unwrap()
            .unwrap();
        let directives = ir::document_directives(&conn, fragment.id).unwrap();
        let component = directives.iter().find(|d| d.name == "componentField").unwrap();
        assert!(component
            .arguments
            .iter()
            .any(|(name, value)| name == "prop" && value.raw == "user"));
    }
}
