//! Schema writer
//!
//! Populates the schema tables from a parsed SDL document, then appends the
//! framework's internal definitions. All writes go through the caller's
//! connection so the whole schema lands in one transaction.

mod internal;

use anyhow::{anyhow, Context, Result};
use graphql_parser::schema::{
    parse_schema, Definition, Document, EnumValue, Field, InputValue, Type, TypeDefinition,
    TypeExtension,
};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::constants::{BUILT_IN_SCALARS, TYPENAME_FIELD};
use crate::types::{DocumentKind, TypeKind};
use crate::values::ArgumentValue;

pub use internal::INTERNAL_SCHEMA;

/// Directives every GraphQL server understands
const BUILT_IN_DIRECTIVES: &str = r#"
directive @skip(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT
directive @include(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT
directive @deprecated(reason: String) on FIELD_DEFINITION | ENUM_VALUE
"#;

/// Split a type string into base name and modifiers
///
/// `[User!]!` becomes `("User", "!]!")`: the leading run of `[`, `]` and `!`
/// is dropped, the base name is matched and the remainder kept verbatim.
pub fn parse_field_type(type_string: &str) -> (String, String) {
    let rest = type_string.trim_start_matches(['[', ']', '!']);
    let end = rest
        .char_indices()
        .find(|(i, c)| {
            let valid = c.is_ascii_alphanumeric() || *c == '_';
            !valid || (*i == 0 && c.is_ascii_digit())
        })
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    (rest[..end].to_string(), rest[end..].to_string())
}

/// Render an AST type as a type string (`[User!]!`)
pub fn type_string(ty: &Type<'_, String>) -> String {
    match ty {
        Type::NamedType(name) => name.clone(),
        Type::ListType(inner) => format!("[{}]", type_string(inner)),
        Type::NonNullType(inner) => format!("{}!", type_string(inner)),
    }
}

/// Parse SDL text and write it, followed by the internal definitions
pub fn load_schema(conn: &Connection, source: &str) -> Result<()> {
    let document = parse_schema::<String>(source)
        .map_err(|err| anyhow!("{}", err))
        .context("Could not parse the schema")?;
    write_schema(conn, &document)?;
    write_internal_schema(conn)?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM types", [], |row| row.get(0))?;
    info!("Wrote schema with {} types", count);
    Ok(())
}

/// Write a user schema
pub fn write_schema(conn: &Connection, document: &Document<'_, String>) -> Result<()> {
    let writer = SchemaWriter {
        conn,
        internal: false,
    };
    writer.write_built_ins()?;
    writer.write(document)?;
    writer.write_operation_roots(document)?;
    writer.write_typenames()
}

/// Write the framework's directives, scalars and enums
pub fn write_internal_schema(conn: &Connection) -> Result<()> {
    let source = format!(
        "{}\n{}",
        INTERNAL_SCHEMA,
        internal::runtime_scalar_directive()
    );
    let document = parse_schema::<String>(&source)
        .map_err(|err| anyhow!("{}", err))
        .context("Internal schema does not parse")?;
    let writer = SchemaWriter {
        conn,
        internal: true,
    };
    writer.write(&document)?;
    for name in internal::HIDDEN_DIRECTIVES {
        conn.execute(
            "UPDATE directives SET visible = 0 WHERE name = ?1",
            params![name],
        )?;
    }
    writer.write_typenames()
}

struct SchemaWriter<'a> {
    conn: &'a Connection,
    internal: bool,
}

impl SchemaWriter<'_> {
    fn write_built_ins(&self) -> Result<()> {
        for name in BUILT_IN_SCALARS {
            self.conn.execute(
                "INSERT OR IGNORE INTO types (name, kind, built_in) VALUES (?1, 'SCALAR', 1)",
                params![name],
            )?;
        }
        let directives = parse_schema::<String>(BUILT_IN_DIRECTIVES)
            .map_err(|err| anyhow!("{}", err))
            .context("Built-in directives do not parse")?;
        self.write(&directives)
    }

    fn write(&self, document: &Document<'_, String>) -> Result<()> {
        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(_) => {}
                Definition::TypeDefinition(def) => self.write_type(def)?,
                Definition::TypeExtension(ext) => self.write_extension(ext)?,
                Definition::DirectiveDefinition(def) => {
                    self.insert_directive(&def.name, def.repeatable, def.description.as_deref())?;
                    for location in &def.locations {
                        self.conn
                            .prepare_cached(
                                "INSERT OR IGNORE INTO directive_locations (directive, location) VALUES (?1, ?2)",
                            )?
                            .execute(params![def.name, location.as_str()])?;
                    }
                    for argument in &def.arguments {
                        self.insert_directive_argument(&def.name, argument)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_type(&self, definition: &TypeDefinition<'_, String>) -> Result<()> {
        match definition {
            TypeDefinition::Scalar(scalar) => {
                self.insert_type(&scalar.name, TypeKind::Scalar)?;
            }
            TypeDefinition::Object(object) => {
                self.insert_type(&object.name, TypeKind::Object)?;
                self.insert_fields(&object.name, &object.fields)?;
                for interface in &object.implements_interfaces {
                    self.insert_possible_type(interface, &object.name)?;
                }
            }
            TypeDefinition::Interface(interface) => {
                self.insert_type(&interface.name, TypeKind::Interface)?;
                self.insert_fields(&interface.name, &interface.fields)?;
            }
            TypeDefinition::Union(union) => {
                self.insert_type(&union.name, TypeKind::Union)?;
                for member in &union.types {
                    self.insert_possible_type(&union.name, member)?;
                }
            }
            TypeDefinition::Enum(enumeration) => {
                self.insert_type(&enumeration.name, TypeKind::Enum)?;
                self.insert_enum_values(&enumeration.name, &enumeration.values)?;
            }
            TypeDefinition::InputObject(input) => {
                self.insert_type(&input.name, TypeKind::Input)?;
                for field in &input.fields {
                    self.insert_input_field(&input.name, field)?;
                }
            }
        }
        Ok(())
    }

    fn write_extension(&self, extension: &TypeExtension<'_, String>) -> Result<()> {
        match extension {
            TypeExtension::Scalar(_) => {}
            TypeExtension::Object(object) => {
                self.insert_fields(&object.name, &object.fields)?;
                for interface in &object.implements_interfaces {
                    self.insert_possible_type(interface, &object.name)?;
                }
            }
            TypeExtension::Interface(interface) => {
                self.insert_fields(&interface.name, &interface.fields)?;
            }
            TypeExtension::Union(union) => {
                for member in &union.types {
                    self.insert_possible_type(&union.name, member)?;
                }
            }
            TypeExtension::Enum(enumeration) => {
                self.insert_enum_values(&enumeration.name, &enumeration.values)?;
            }
            TypeExtension::InputObject(input) => {
                for field in &input.fields {
                    self.insert_input_field(&input.name, field)?;
                }
            }
        }
        Ok(())
    }

    /// Mark the operation roots from the schema definition, falling back to
    /// the conventional names
    fn write_operation_roots(&self, document: &Document<'_, String>) -> Result<()> {
        let mut roots = vec![
            (DocumentKind::Query, "Query".to_string()),
            (DocumentKind::Mutation, "Mutation".to_string()),
            (DocumentKind::Subscription, "Subscription".to_string()),
        ];
        for definition in &document.definitions {
            if let Definition::SchemaDefinition(schema) = definition {
                let declared = [&schema.query, &schema.mutation, &schema.subscription];
                for ((_, root), name) in roots.iter_mut().zip(declared) {
                    if let Some(name) = name {
                        *root = name.clone();
                    }
                }
            }
        }
        for (kind, name) in roots {
            self.conn.execute(
                "UPDATE types SET operation = ?1 WHERE name = ?2 AND kind = 'OBJECT'",
                params![kind.as_str(), name],
            )?;
        }
        Ok(())
    }

    /// Give every composite type a `__typename: String!` field
    fn write_typenames(&self) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO type_fields (id, parent, name, type, type_modifiers, internal)
            SELECT name || '.' || ?1, name, ?1, 'String', '!', internal
            FROM types
            WHERE kind IN ('OBJECT', 'INTERFACE', 'UNION') AND built_in = 0
            "#,
            params![TYPENAME_FIELD],
        )?;
        Ok(())
    }

    fn insert_type(&self, name: &str, kind: TypeKind) -> Result<()> {
        self.conn
            .prepare_cached(
                r#"
                INSERT INTO types (name, kind, internal) VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET kind = excluded.kind, built_in = 0
                "#,
            )?
            .execute(params![name, kind.as_str(), self.internal])?;
        Ok(())
    }

    fn insert_fields(&self, parent: &str, fields: &[Field<'_, String>]) -> Result<()> {
        for field in fields {
            let id = format!("{}.{}", parent, field.name);
            let (base, modifiers) = parse_field_type(&type_string(&field.field_type));
            debug!("field {}: {}{}", id, base, modifiers);
            self.conn
                .prepare_cached(
                    r#"
                    INSERT OR REPLACE INTO type_fields
                        (id, parent, name, type, type_modifiers, description, internal)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )?
                .execute(params![
                    id,
                    parent,
                    field.name,
                    base,
                    modifiers,
                    field.description,
                    self.internal
                ])?;
            for argument in &field.arguments {
                let (base, modifiers) = parse_field_type(&type_string(&argument.value_type));
                self.conn
                    .prepare_cached(
                        r#"
                        INSERT OR REPLACE INTO type_field_arguments (id, field, name, type, type_modifiers)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                    )?
                    .execute(params![
                        format!("{}.{}", id, argument.name),
                        id,
                        argument.name,
                        base,
                        modifiers
                    ])?;
            }
        }
        Ok(())
    }

    fn insert_input_field(&self, parent: &str, field: &InputValue<'_, String>) -> Result<()> {
        let (base, modifiers) = parse_field_type(&type_string(&field.value_type));
        let default = field
            .default_value
            .as_ref()
            .map(|value| ArgumentValue::from_ast(value).map(|v| v.print()))
            .transpose()?;
        self.conn
            .prepare_cached(
                r#"
                INSERT OR REPLACE INTO type_fields
                    (id, parent, name, type, type_modifiers, default_value, description, internal)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?
            .execute(params![
                format!("{}.{}", parent, field.name),
                parent,
                field.name,
                base,
                modifiers,
                default,
                field.description,
                self.internal
            ])?;
        Ok(())
    }

    fn insert_possible_type(&self, abstract_type: &str, member: &str) -> Result<()> {
        self.conn
            .prepare_cached("INSERT OR IGNORE INTO possible_types (type, member) VALUES (?1, ?2)")?
            .execute(params![abstract_type, member])?;
        Ok(())
    }

    fn insert_enum_values(&self, parent: &str, values: &[EnumValue<'_, String>]) -> Result<()> {
        for value in values {
            self.conn
                .prepare_cached("INSERT OR IGNORE INTO enum_values (parent, value) VALUES (?1, ?2)")?
                .execute(params![parent, value.name])?;
        }
        Ok(())
    }

    fn insert_directive(&self, name: &str, repeatable: bool, description: Option<&str>) -> Result<()> {
        self.conn
            .prepare_cached(
                r#"
                INSERT OR REPLACE INTO directives (name, repeatable, internal, visible, description)
                VALUES (?1, ?2, ?3, 1, ?4)
                "#,
            )?
            .execute(params![name, repeatable, self.internal, description.map(str::trim)])?;
        Ok(())
    }

    fn insert_directive_argument(&self, directive: &str, argument: &InputValue<'_, String>) -> Result<()> {
        let (base, modifiers) = parse_field_type(&type_string(&argument.value_type));
        let default = argument
            .default_value
            .as_ref()
            .map(|value| ArgumentValue::from_ast(value).map(|v| v.print()))
            .transpose()?;
        self.conn
            .prepare_cached(
                r#"
                INSERT OR REPLACE INTO directive_arguments (parent, name, type, type_modifiers, default_value)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?
            .execute(params![directive, argument.name, base, modifiers, default])?;
        Ok(())
    }
}
