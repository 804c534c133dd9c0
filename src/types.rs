//! Core type definitions for gqlc
//!
//! The IR lives in SQLite where every kind column is text. The enums here are
//! the typed view of those columns:
//! - Schema: type kinds
//! - Documents: document, selection and argument value kinds
//! - Lists: pagination modes and directions

use serde::{Deserialize, Serialize};

/// Kind of a schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TypeKind {
    Scalar,
    Enum,
    Object,
    Interface,
    Union,
    Input,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Scalar => "SCALAR",
            TypeKind::Enum => "ENUM",
            TypeKind::Object => "OBJECT",
            TypeKind::Interface => "INTERFACE",
            TypeKind::Union => "UNION",
            TypeKind::Input => "INPUT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SCALAR" => Some(TypeKind::Scalar),
            "ENUM" => Some(TypeKind::Enum),
            "OBJECT" => Some(TypeKind::Object),
            "INTERFACE" => Some(TypeKind::Interface),
            "UNION" => Some(TypeKind::Union),
            "INPUT" => Some(TypeKind::Input),
            _ => None,
        }
    }

    /// Interfaces and unions can't back a component field or a concrete record
    pub fn is_abstract(&self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Union)
    }

    /// Types that get a `__typename` field
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }
}

/// Kind of a document in the IR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Query,
    Mutation,
    Subscription,
    Fragment,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Query => "query",
            DocumentKind::Mutation => "mutation",
            DocumentKind::Subscription => "subscription",
            DocumentKind::Fragment => "fragment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "query" => Some(DocumentKind::Query),
            "mutation" => Some(DocumentKind::Mutation),
            "subscription" => Some(DocumentKind::Subscription),
            "fragment" => Some(DocumentKind::Fragment),
            _ => None,
        }
    }

    pub fn is_operation(&self) -> bool {
        !matches!(self, DocumentKind::Fragment)
    }
}

/// Kind of a selection row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Field,
    InlineFragment,
    /// A fragment spread; `field_name` holds the fragment name
    Fragment,
}

impl SelectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionKind::Field => "field",
            SelectionKind::InlineFragment => "inline_fragment",
            SelectionKind::Fragment => "fragment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "field" => Some(SelectionKind::Field),
            "inline_fragment" => Some(SelectionKind::InlineFragment),
            "fragment" => Some(SelectionKind::Fragment),
            _ => None,
        }
    }
}

/// Kind of an argument value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Variable,
    Int,
    Float,
    String,
    Block,
    Boolean,
    Null,
    Enum,
    List,
    Object,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Variable => "Variable",
            ValueKind::Int => "Int",
            ValueKind::Float => "Float",
            ValueKind::String => "String",
            ValueKind::Block => "Block",
            ValueKind::Boolean => "Boolean",
            ValueKind::Null => "Null",
            ValueKind::Enum => "Enum",
            ValueKind::List => "List",
            ValueKind::Object => "Object",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Variable" => Some(ValueKind::Variable),
            "Int" => Some(ValueKind::Int),
            "Float" => Some(ValueKind::Float),
            "String" => Some(ValueKind::String),
            "Block" => Some(ValueKind::Block),
            "Boolean" => Some(ValueKind::Boolean),
            "Null" => Some(ValueKind::Null),
            "Enum" => Some(ValueKind::Enum),
            "List" => Some(ValueKind::List),
            "Object" => Some(ValueKind::Object),
            _ => None,
        }
    }

    /// Only lists and objects own child values
    pub fn has_children(&self) -> bool {
        matches!(self, ValueKind::List | ValueKind::Object)
    }
}

/// How a paginated list combines pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaginateMode {
    #[default]
    Infinite,
    SinglePage,
}

impl PaginateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaginateMode::Infinite => "Infinite",
            PaginateMode::SinglePage => "SinglePage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Infinite" => Some(PaginateMode::Infinite),
            "SinglePage" => Some(PaginateMode::SinglePage),
            _ => None,
        }
    }
}

/// Direction a paginated list walks, stored as `""`, `forward` or `backward`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationDirection {
    /// Not paginated
    #[default]
    None,
    Forward,
    Backward,
}

impl PaginationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaginationDirection::None => "",
            PaginationDirection::Forward => "forward",
            PaginationDirection::Backward => "backward",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "forward" => PaginationDirection::Forward,
            "backward" => PaginationDirection::Backward,
            _ => PaginationDirection::None,
        }
    }
}

/// Which lists an operation fragment targets when no `@parentID` is given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListTarget {
    All,
    /// Only the list whose parent matches
    #[default]
    #[serde(other)]
    Parent,
}

/// A GraphQL text harvested from a project file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDocument {
    pub filepath: String,
    pub content: String,
    /// Line of the document start inside the host file
    pub offset_line: u32,
    /// Column of the document start inside the host file
    pub offset_column: u32,
    /// The content is a single inline fragment declaring a component field
    pub inline_component_field: bool,
    pub inline_component_field_prop: Option<String>,
}

impl RawDocument {
    pub fn new(filepath: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// A field tagged with `@list` or `@paginate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredList {
    pub id: i64,
    pub name: String,
    pub node_type: String,
    pub edge_type: Option<String>,
    pub connection_type: Option<String>,
    pub raw_document: i64,
    pub document: i64,
    pub connection: bool,
    pub list_field: i64,
    pub paginate: PaginationDirection,
    pub node: i64,
    pub page_size: Option<i64>,
    pub mode: PaginateMode,
    pub embedded: bool,
    pub target_type: String,
    pub supports_forward: bool,
    pub supports_backward: bool,
    pub cursor_type: Option<String>,
}

/// Statistics from a compile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileStats {
    pub raw_documents: u64,
    pub documents: u64,
    pub selections: u64,
    pub lists: u64,
    pub fragment_clones: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_kind_roundtrip() {
        let kinds = [
            TypeKind::Scalar,
            TypeKind::Enum,
            TypeKind::Object,
            TypeKind::Interface,
            TypeKind::Union,
            TypeKind::Input,
        ];

        for kind in kinds {
            assert_eq!(TypeKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TypeKind::from_str("object"), None);
    }

    #[test]
    fn test_type_kind_abstract() {
        assert!(TypeKind::Union.is_abstract());
        assert!(TypeKind::Interface.is_abstract());
        assert!(!TypeKind::Object.is_abstract());
        assert!(TypeKind::Union.is_composite());
        assert!(!TypeKind::Input.is_composite());
    }

    #[test]
    fn test_document_kind() {
        assert_eq!(DocumentKind::from_str("mutation"), Some(DocumentKind::Mutation));
        assert_eq!(DocumentKind::from_str("fragment"), Some(DocumentKind::Fragment));
        assert_eq!(DocumentKind::from_str(""), None);
        assert!(DocumentKind::Subscription.is_operation());
        assert!(!DocumentKind::Fragment.is_operation());
    }

    #[test]
    fn test_selection_kind_as_str() {
        assert_eq!(SelectionKind::InlineFragment.as_str(), "inline_fragment");
        assert_eq!(
            SelectionKind::from_str("fragment"),
            Some(SelectionKind::Fragment)
        );
        assert_eq!(SelectionKind::from_str("spread"), None);
    }

    #[test]
    fn test_value_kind_children() {
        assert!(ValueKind::List.has_children());
        assert!(ValueKind::Object.has_children());
        assert!(!ValueKind::Variable.has_children());
        assert_eq!(ValueKind::from_str("Block"), Some(ValueKind::Block));
    }

    #[test]
    fn test_pagination_direction_empty_string() {
        assert_eq!(PaginationDirection::None.as_str(), "");
        assert_eq!(PaginationDirection::from_str(""), PaginationDirection::None);
        assert_eq!(
            PaginationDirection::from_str("backward"),
            PaginationDirection::Backward
        );
    }

    #[test]
    fn test_list_target_deserialize() {
        let all: ListTarget = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, ListTarget::All);
        let other: ListTarget = serde_json::from_str("\"first\"").unwrap();
        assert_eq!(other, ListTarget::Parent);
    }
}
