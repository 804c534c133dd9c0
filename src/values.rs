//! Argument values as trees
//!
//! The store keeps values as `argument_values` rows linked through
//! `argument_value_children`. Passes that need to reason about a whole value
//! (default checks, `@with` checks, printing) load it into an
//! [`ArgumentValue`].

use graphql_parser::query::Value;
use thiserror::Error;

use crate::types::ValueKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("integer literal does not fit in 64 bits")]
    IntOutOfRange,
}

/// A value and everything below it
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentValue {
    pub kind: ValueKind,
    pub raw: String,
    pub children: Vec<ValueChild>,
}

/// An entry of a list (no name) or a field of an object (named)
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChild {
    pub name: Option<String>,
    pub value: ArgumentValue,
}

impl ArgumentValue {
    pub fn scalar(kind: ValueKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            children: Vec::new(),
        }
    }

    pub fn null() -> Self {
        Self::scalar(ValueKind::Null, "null")
    }

    /// Convert a parsed value. Object fields come out sorted by name.
    ///
    /// The parser keeps floats as `f64`, so a float is written back with its
    /// debug form, which always keeps a fraction or an exponent (`1.0` stays
    /// `1.0` rather than turning into the integer `1`).
    pub fn from_ast(value: &Value<'_, String>) -> Result<Self, ValueError> {
        Ok(match value {
            Value::Variable(name) => Self::scalar(ValueKind::Variable, name.as_str()),
            Value::Int(number) => {
                let number = number.as_i64().ok_or(ValueError::IntOutOfRange)?;
                Self::scalar(ValueKind::Int, number.to_string())
            }
            Value::Float(number) => Self::scalar(ValueKind::Float, format!("{:?}", number)),
            Value::String(text) => Self::scalar(ValueKind::String, text.as_str()),
            Value::Boolean(flag) => Self::scalar(ValueKind::Boolean, flag.to_string()),
            Value::Null => Self::null(),
            Value::Enum(name) => Self::scalar(ValueKind::Enum, name.as_str()),
            Value::List(items) => {
                let children = items
                    .iter()
                    .map(|item| {
                        Ok(ValueChild {
                            name: None,
                            value: Self::from_ast(item)?,
                        })
                    })
                    .collect::<Result<_, ValueError>>()?;
                Self::composite(ValueKind::List, children)
            }
            Value::Object(fields) => {
                let children = fields
                    .iter()
                    .map(|(name, field)| {
                        Ok(ValueChild {
                            name: Some(name.clone()),
                            value: Self::from_ast(field)?,
                        })
                    })
                    .collect::<Result<_, ValueError>>()?;
                Self::composite(ValueKind::Object, children)
            }
        })
    }

    /// Build a list or object and derive its raw text from the children
    pub fn composite(kind: ValueKind, children: Vec<ValueChild>) -> Self {
        let mut value = Self {
            kind,
            raw: String::new(),
            children,
        };
        value.raw = value.print();
        value
    }

    /// Look up an object field
    pub fn field(&self, name: &str) -> Option<&ArgumentValue> {
        self.children
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
            .map(|c| &c.value)
    }

    /// Render as GraphQL text
    pub fn print(&self) -> String {
        match self.kind {
            ValueKind::Variable => format!("${}", self.raw),
            ValueKind::String => {
                serde_json::to_string(&self.raw).unwrap_or_else(|_| format!("\"{}\"", self.raw))
            }
            ValueKind::Block => format!("\"\"\"{}\"\"\"", self.raw),
            ValueKind::Int
            | ValueKind::Float
            | ValueKind::Boolean
            | ValueKind::Null
            | ValueKind::Enum => self.raw.clone(),
            ValueKind::List => {
                let items: Vec<String> = self.children.iter().map(|c| c.value.print()).collect();
                format!("[{}]", items.join(", "))
            }
            ValueKind::Object => {
                let fields: Vec<String> = self
                    .children
                    .iter()
                    .map(|c| format!("{}: {}", c.name.as_deref().unwrap_or(""), c.value.print()))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
        }
    }
}

/// Check that a value structurally fits a type with the given modifiers
///
/// Modifiers are read from the outside in: a trailing `!` is a non-null
/// wrapper, a trailing `]` a list whose items use the rest of the string.
/// Variables always fit; their type is checked where they are declared.
pub fn check_value(value: &ArgumentValue, modifiers: &str) -> Result<(), String> {
    if value.kind == ValueKind::Variable {
        return Ok(());
    }

    if let Some(inner) = modifiers.strip_suffix('!') {
        if value.kind == ValueKind::Null {
            return Err("expected a non-null value".to_string());
        }
        if inner.ends_with(']') && value.kind == ValueKind::List && value.children.is_empty() {
            return Err("expected a non-empty list".to_string());
        }
        return check_value(value, inner);
    }

    if let Some(inner) = modifiers.strip_suffix(']') {
        return match value.kind {
            ValueKind::Null => Ok(()),
            ValueKind::List => {
                for (index, child) in value.children.iter().enumerate() {
                    check_value(&child.value, inner)
                        .map_err(|err| format!("{} at index {}", err, index))?;
                }
                Ok(())
            }
            _ => Err(format!("expected a list, found {}", value.print())),
        };
    }

    match value.kind {
        ValueKind::List => Err(format!("expected a single value, found {}", value.print())),
        // Input objects: fields are checked by the server
        ValueKind::Object | ValueKind::Null => Ok(()),
        ValueKind::String | ValueKind::Block => Ok(()),
        _ if value.raw.is_empty() => Err("expected a value".to_string()),
        _ => Ok(()),
    }
}
