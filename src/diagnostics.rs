//! Diagnostics reported by the compiler passes
//!
//! Every pass appends to a [`Diagnostics`] collection and keeps going; only
//! store failures abort a pass. Locations are absolute positions in the host
//! file: the raw document's offset plus the parser position.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad category of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The GraphQL text could not be parsed
    Parse,
    /// A document breaks a rule of the framework
    Validation,
    /// The store failed or an integrity check didn't hold
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

/// A position in a project file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub filepath: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(filepath: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filepath: filepath.into(),
            line,
            column,
        }
    }

    /// Offset a document-relative position by where the raw document sits in
    /// its host file
    pub fn offset(filepath: impl Into<String>, offset: (u32, u32), node: (u32, u32)) -> Self {
        Self::new(filepath, offset.0 + node.0, offset.1 + node.1)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filepath, self.line, self.column)
    }
}

/// A single user-visible problem
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Diagnostic {
    pub message: String,
    pub kind: ErrorKind,
    pub locations: Vec<Location>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            locations: Vec::new(),
        }
    }

    pub fn parse(message: impl Into<String>, location: Location) -> Self {
        Self::new(ErrorKind::Parse, message).at(location)
    }

    pub fn validation(message: impl Into<String>, location: Location) -> Self {
        Self::new(ErrorKind::Validation, message).at(location)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach another location
    pub fn at(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }
}

impl From<anyhow::Error> for Diagnostic {
    fn from(err: anyhow::Error) -> Self {
        Diagnostic::internal(format!("{:#}", err))
    }
}

/// Append-only collection of diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, iter: impl IntoIterator<Item = Diagnostic>) {
        self.0.extend(iter);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Parse or validation problems (the ones that stop rewriting)
    pub fn has_errors(&self) -> bool {
        self.0
            .iter()
            .any(|d| matches!(d.kind, ErrorKind::Parse | ErrorKind::Validation))
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.0.iter().filter(|d| d.kind == kind).count()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.0 {
            if diagnostic.locations.is_empty() {
                writeln!(f, "{}: {}", diagnostic.kind.as_str(), diagnostic.message)?;
            }
            for location in &diagnostic.locations {
                writeln!(
                    f,
                    "{}: {}: {}",
                    location,
                    diagnostic.kind.as_str(),
                    diagnostic.message
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_offset() {
        let loc = Location::offset("src/App.svelte", (10, 4), (2, 3));
        assert_eq!(loc.line, 12);
        assert_eq!(loc.column, 7);
        assert_eq!(loc.to_string(), "src/App.svelte:12:7");
    }

    #[test]
    fn test_has_errors_ignores_internal() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::internal("disk full"));
        assert!(!diagnostics.has_errors());

        diagnostics.push(Diagnostic::validation(
            "bad",
            Location::new("a.graphql", 1, 1),
        ));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.count(ErrorKind::Validation), 1);
    }

    #[test]
    fn test_display_lists_every_location() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(
            Diagnostic::validation("duplicate list name", Location::new("a.graphql", 1, 2))
                .at(Location::new("b.graphql", 3, 4)),
        );
        let rendered = diagnostics.to_string();
        assert!(rendered.contains("a.graphql:1:2: validation: duplicate list name"));
        assert!(rendered.contains("b.graphql:3:4: validation: duplicate list name"));
    }
}
