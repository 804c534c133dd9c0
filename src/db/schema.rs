//! Database schema definition
//!
//! Positions (`row`, `column`) are relative to the raw document; diagnostics
//! add the raw document's offset. Every foreign key is deferred so a pass can
//! insert rows in traversal order inside one transaction.

pub const SCHEMA: &str = r#"
-- Project configuration: default key fields as a JSON array
CREATE TABLE IF NOT EXISTS config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    default_keys TEXT NOT NULL DEFAULT '["id"]'
);

-- Per-type overrides: keys as a JSON array
CREATE TABLE IF NOT EXISTS type_configs (
    name TEXT PRIMARY KEY,
    keys TEXT,
    resolve_query TEXT
);

-- GraphQL texts harvested from the project
CREATE TABLE IF NOT EXISTS raw_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filepath TEXT NOT NULL,
    content TEXT NOT NULL,
    offset_line INTEGER NOT NULL DEFAULT 0,
    offset_column INTEGER NOT NULL DEFAULT 0,
    inline_component_field INTEGER NOT NULL DEFAULT 0,
    inline_component_field_prop TEXT
);

-- Schema
CREATE TABLE IF NOT EXISTS types (
    name TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('SCALAR', 'ENUM', 'OBJECT', 'INTERFACE', 'UNION', 'INPUT')),
    operation TEXT CHECK (operation IN ('query', 'mutation', 'subscription')),
    built_in INTEGER NOT NULL DEFAULT 0,
    internal INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS type_fields (
    id TEXT PRIMARY KEY,
    parent TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    type_modifiers TEXT NOT NULL DEFAULT '',
    default_value TEXT,
    description TEXT,
    internal INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (parent) REFERENCES types(name) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (type) REFERENCES types(name) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS type_field_arguments (
    id TEXT PRIMARY KEY,
    field TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    type_modifiers TEXT NOT NULL DEFAULT '',
    FOREIGN KEY (field) REFERENCES type_fields(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (type) REFERENCES types(name) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS possible_types (
    type TEXT NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (type, member),
    FOREIGN KEY (type) REFERENCES types(name) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (member) REFERENCES types(name) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS enum_values (
    parent TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (parent, value),
    FOREIGN KEY (parent) REFERENCES types(name) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS directives (
    name TEXT PRIMARY KEY,
    repeatable INTEGER NOT NULL DEFAULT 0,
    internal INTEGER NOT NULL DEFAULT 0,
    visible INTEGER NOT NULL DEFAULT 1,
    description TEXT
);

CREATE TABLE IF NOT EXISTS directive_locations (
    directive TEXT NOT NULL,
    location TEXT NOT NULL,
    PRIMARY KEY (directive, location),
    FOREIGN KEY (directive) REFERENCES directives(name) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS directive_arguments (
    parent TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    type_modifiers TEXT NOT NULL DEFAULT '',
    default_value TEXT,
    PRIMARY KEY (parent, name),
    FOREIGN KEY (parent) REFERENCES directives(name) DEFERRABLE INITIALLY DEFERRED
);

-- Documents
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    raw_document INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('query', 'mutation', 'subscription', 'fragment')),
    type_condition TEXT,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (raw_document) REFERENCES raw_documents(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS argument_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('Variable', 'Int', 'Float', 'String', 'Block', 'Boolean', 'Null', 'Enum', 'List', 'Object')),
    raw TEXT NOT NULL,
    expected_type TEXT,
    expected_type_modifiers TEXT,
    document INTEGER,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (document) REFERENCES documents(id) DEFERRABLE INITIALLY DEFERRED
);

-- name is NULL for list children, set for object fields
CREATE TABLE IF NOT EXISTS argument_value_children (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent INTEGER NOT NULL,
    value INTEGER NOT NULL,
    name TEXT,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (parent) REFERENCES argument_values(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (value) REFERENCES argument_values(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS document_variables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document INTEGER NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    type_modifiers TEXT NOT NULL DEFAULT '',
    default_value INTEGER,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (document) REFERENCES documents(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (default_value) REFERENCES argument_values(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS document_variable_directives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent INTEGER NOT NULL,
    directive TEXT NOT NULL,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (parent) REFERENCES document_variables(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS document_variable_directive_arguments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent INTEGER NOT NULL,
    name TEXT NOT NULL,
    value INTEGER NOT NULL,
    FOREIGN KEY (parent) REFERENCES document_variable_directives(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (value) REFERENCES argument_values(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS document_directives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document INTEGER NOT NULL,
    directive TEXT NOT NULL,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (document) REFERENCES documents(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS document_directive_arguments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent INTEGER NOT NULL,
    name TEXT NOT NULL,
    value INTEGER NOT NULL,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (parent) REFERENCES document_directives(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (value) REFERENCES argument_values(id) DEFERRABLE INITIALLY DEFERRED
);

-- Selections: field_name is the fragment name for spreads and the type
-- condition for inline fragments; type is '<Parent>.<field>' for fields
CREATE TABLE IF NOT EXISTS selections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    field_name TEXT NOT NULL,
    alias TEXT,
    kind TEXT NOT NULL CHECK (kind IN ('field', 'inline_fragment', 'fragment')),
    type TEXT
);

-- Placement of a selection in a document; root selections have no parent
CREATE TABLE IF NOT EXISTS selection_refs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER,
    child_id INTEGER NOT NULL,
    document INTEGER NOT NULL,
    path_index INTEGER NOT NULL DEFAULT 0,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (parent_id) REFERENCES selections(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (child_id) REFERENCES selections(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (document) REFERENCES documents(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS selection_arguments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    selection_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    value INTEGER NOT NULL,
    field_argument TEXT,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (selection_id) REFERENCES selections(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (value) REFERENCES argument_values(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS selection_directives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    selection_id INTEGER NOT NULL,
    directive TEXT NOT NULL,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (selection_id) REFERENCES selections(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS selection_directive_arguments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent INTEGER NOT NULL,
    name TEXT NOT NULL,
    value INTEGER NOT NULL,
    row INTEGER NOT NULL DEFAULT 0,
    column INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (parent) REFERENCES selection_directives(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (value) REFERENCES argument_values(id) DEFERRABLE INITIALLY DEFERRED
);

-- Lists tagged with @list or @paginate
CREATE TABLE IF NOT EXISTS discovered_lists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    node_type TEXT NOT NULL,
    edge_type TEXT,
    connection_type TEXT,
    raw_document INTEGER NOT NULL,
    document INTEGER NOT NULL,
    connection INTEGER NOT NULL DEFAULT 0,
    list_field INTEGER NOT NULL,
    paginate TEXT NOT NULL DEFAULT '' CHECK (paginate IN ('', 'forward', 'backward')),
    node INTEGER NOT NULL,
    page_size INTEGER,
    mode TEXT NOT NULL DEFAULT 'Infinite',
    embedded INTEGER NOT NULL DEFAULT 0,
    target_type TEXT NOT NULL,
    supports_forward INTEGER NOT NULL DEFAULT 0,
    supports_backward INTEGER NOT NULL DEFAULT 0,
    cursor_type TEXT,
    FOREIGN KEY (raw_document) REFERENCES raw_documents(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (document) REFERENCES documents(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (list_field) REFERENCES selections(id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (node) REFERENCES selections(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE IF NOT EXISTS component_fields (
    document INTEGER NOT NULL UNIQUE,
    prop TEXT NOT NULL,
    field TEXT NOT NULL,
    type TEXT NOT NULL,
    inline INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (document) REFERENCES documents(id) DEFERRABLE INITIALLY DEFERRED
);

-- Indexes for the joins the passes run
CREATE INDEX IF NOT EXISTS idx_type_fields_parent ON type_fields(parent);
CREATE INDEX IF NOT EXISTS idx_type_field_arguments_field ON type_field_arguments(field);
CREATE INDEX IF NOT EXISTS idx_possible_types_member ON possible_types(member);

CREATE INDEX IF NOT EXISTS idx_documents_name ON documents(name);
CREATE INDEX IF NOT EXISTS idx_documents_raw ON documents(raw_document);
CREATE INDEX IF NOT EXISTS idx_document_variables_document ON document_variables(document);
CREATE INDEX IF NOT EXISTS idx_document_directives_document ON document_directives(document);
CREATE INDEX IF NOT EXISTS idx_document_directive_arguments_parent ON document_directive_arguments(parent);

CREATE INDEX IF NOT EXISTS idx_selection_refs_document ON selection_refs(document);
CREATE INDEX IF NOT EXISTS idx_selection_refs_parent ON selection_refs(parent_id);
CREATE INDEX IF NOT EXISTS idx_selection_refs_child ON selection_refs(child_id);
CREATE INDEX IF NOT EXISTS idx_selections_type ON selections(type);
CREATE INDEX IF NOT EXISTS idx_selection_arguments_selection ON selection_arguments(selection_id);
CREATE INDEX IF NOT EXISTS idx_selection_arguments_value ON selection_arguments(value);
CREATE INDEX IF NOT EXISTS idx_selection_directives_selection ON selection_directives(selection_id);
CREATE INDEX IF NOT EXISTS idx_selection_directives_directive ON selection_directives(directive);
CREATE INDEX IF NOT EXISTS idx_selection_directive_arguments_parent ON selection_directive_arguments(parent);

CREATE INDEX IF NOT EXISTS idx_argument_values_document ON argument_values(document);
CREATE INDEX IF NOT EXISTS idx_argument_value_children_parent ON argument_value_children(parent);
CREATE INDEX IF NOT EXISTS idx_argument_value_children_value ON argument_value_children(value);

CREATE INDEX IF NOT EXISTS idx_discovered_lists_name ON discovered_lists(name);
"#;
