// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for mapping compilation and evaluation

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use xmlmap_path::{PathError, XmlNode};

use crate::registry::CoercionError;

/// Result type for mapper operations
pub type MapperResult<T> = Result<T, MapperError>;

/// Structural problem in the mapping definitions, detected before any XML
/// is read
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingGrammarError {
    /// Mapping definitions were not supplied as a list
    #[error("mapping definitions must be a list, found {found}")]
    NotAList { found: &'static str },

    /// A definition node is not an object
    #[error("mapping definition {location} must be an object, found {found}")]
    NotAnObject { location: String, found: &'static str },

    /// `_type` directive absent
    #[error("missing required \"_type\" directive in mapping definition {location}")]
    MissingType { location: String },

    /// `_match` directive absent
    #[error("missing required \"_match\" directive for type \"{type_name}\"")]
    MissingMatch { type_name: String },

    /// A directive holds something other than a string
    #[error("\"{directive}\" must be a string in mapping definition {location}, found {found}")]
    DirectiveNotString {
        directive: &'static str,
        location: String,
        found: &'static str,
    },

    /// The same `_type` is declared twice
    #[error("duplicate mapping type \"{type_name}\"")]
    DuplicateType { type_name: String },

    /// `_type` shadows a built-in type or a registered filter
    #[error("mapping type \"{type_name}\" conflicts with a built-in type or filter of the same name")]
    TypeNameConflict { type_name: String },

    /// A field name uses the reserved `_` prefix
    #[error("field \"{field}\" in type \"{type_name}\" uses the reserved \"_\" prefix")]
    ReservedFieldName { type_name: String, field: String },

    /// Field value is neither a string, a mapping nor a one-mapping list
    #[error("invalid value for field \"{field}\" in type \"{type_name}\": expected a path string, a mapping or a one-element list of a mapping, found {found}")]
    InvalidFieldValue {
        type_name: String,
        field: String,
        found: String,
    },

    /// The `word:` prefix names nothing known and the text is not a path
    #[error("unknown value type \"{token}\" for field \"{field}\" in type \"{type_name}\"")]
    UnknownValueType {
        type_name: String,
        field: String,
        token: String,
    },

    /// A reference targets a type declared without `_id`
    #[error("invalid value type \"{target}\" for field \"{field}\" in type \"{type_name}\" (only types with \"_id\" can be referenced)")]
    UnreferenceableType {
        type_name: String,
        field: String,
        target: String,
    },

    /// `_id` carries a type prefix other than `string`
    #[error("\"_id\" of type \"{type_name}\" must be a string, found type \"{token}\"")]
    InvalidIdType { type_name: String, token: String },

    /// A path expression failed to compile
    #[error("invalid path \"{path}\" for field \"{field}\" in type \"{type_name}\": {source}")]
    InvalidPath {
        type_name: String,
        field: String,
        path: String,
        #[source]
        source: PathError,
    },
}

/// Position of the element being materialized when an error occurred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLocation {
    /// Tag name, or `#document` for the document node
    pub tag: String,
    /// 1-based line in the XML source
    pub line: u32,
}

impl ElementLocation {
    pub fn of(node: XmlNode<'_, '_>) -> Self {
        Self {
            tag: node.label(),
            line: node.line(),
        }
    }
}

impl fmt::Display for ElementLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" line {}", self.tag, self.line)
    }
}

/// Main error type of the mapper
#[derive(Error, Debug)]
pub enum MapperError {
    #[error(transparent)]
    Grammar(#[from] MappingGrammarError),

    /// Mapping definitions given as JSON text failed to parse
    #[error("failed to parse mapping definitions: {0}")]
    GrammarSource(#[from] serde_json::Error),

    /// A filter was registered under a built-in type name
    #[error("cannot register filter \"{name}\": the name is reserved for a built-in type")]
    ReservedFilterName { name: String },

    #[error("failed to parse XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("XML input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("failed to read \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `load_single` used with a mapper holding several top-level mappings
    #[error("expected exactly one top-level mapping, found {count}")]
    NotSingleMapping { count: usize },

    /// Extracted text could not be converted to the declared type
    #[error("invalid value \"{}\" for {type_token} field \"{field}\" of type \"{type_name}\" (path \"{path}\"): {source}. In element {location}.", .value.as_deref().unwrap_or("<none>"))]
    TypeCoercion {
        location: ElementLocation,
        type_name: String,
        field: String,
        type_token: String,
        value: Option<String>,
        path: String,
        #[source]
        source: CoercionError,
    },

    /// A single nested mapping matched more than one element
    #[error("nested mapping \"{field}\" of type \"{type_name}\" matched {count} elements (path \"{path}\") while at most one was expected. In element {location}.")]
    AmbiguousMatch {
        location: ElementLocation,
        type_name: String,
        field: String,
        path: String,
        count: usize,
    },

    /// A reference names an object that has not been registered
    #[error("field \"{field}\" of type \"{type_name}\" references undefined \"{target_type}\" object with id \"{identifier}\" (path \"{path}\"). In element {location}.")]
    UnresolvedReference {
        location: ElementLocation,
        type_name: String,
        field: String,
        target_type: String,
        identifier: String,
        path: String,
    },

    /// The object factory failed
    #[error("object factory failed to create \"{type_name}\": {source}. In element {location}.")]
    Factory {
        location: ElementLocation,
        type_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A path failed at evaluation time
    #[error("path \"{path}\" for field \"{field}\" of type \"{type_name}\" failed: {source}. In element {location}.")]
    Query {
        location: ElementLocation,
        type_name: String,
        field: String,
        path: String,
        #[source]
        source: PathError,
    },

    /// Two objects of one type share an identifier under the reject policy
    #[error("duplicate object with id \"{identifier}\" for type \"{type_name}\". In element {location}.")]
    DuplicateIdentifier {
        location: ElementLocation,
        type_name: String,
        identifier: String,
    },
}

impl MapperError {
    /// Whether the error was raised while compiling mapping definitions
    pub fn is_grammar_error(&self) -> bool {
        matches!(
            self,
            MapperError::Grammar(_)
                | MapperError::GrammarSource(_)
                | MapperError::ReservedFilterName { .. }
        )
    }

    /// Source location of the element being materialized, for evaluation
    /// errors
    pub fn location(&self) -> Option<&ElementLocation> {
        match self {
            MapperError::TypeCoercion { location, .. }
            | MapperError::AmbiguousMatch { location, .. }
            | MapperError::UnresolvedReference { location, .. }
            | MapperError::Factory { location, .. }
            | MapperError::Query { location, .. }
            | MapperError::DuplicateIdentifier { location, .. } => Some(location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grammar_error_messages() {
        let err = MappingGrammarError::MissingMatch {
            type_name: "a".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required \"_match\" directive for type \"a\""
        );

        let err = MappingGrammarError::UnreferenceableType {
            type_name: "c".to_string(),
            field: "a".to_string(),
            target: "a".to_string(),
        };
        assert!(err.to_string().contains("only types with \"_id\""));
    }

    #[test]
    fn test_evaluation_error_location() {
        let doc = roxmltree::Document::parse("<r>\n  <a/>\n</r>").unwrap();
        let a = doc.descendants().find(|n| n.has_tag_name("a")).unwrap();
        let location = ElementLocation::of(XmlNode::from(a));
        assert_eq!(location.to_string(), "\"a\" line 2");

        let err = MapperError::AmbiguousMatch {
            location: location.clone(),
            type_name: "a".to_string(),
            field: "b".to_string(),
            path: "b".to_string(),
            count: 2,
        };
        assert_eq!(err.location(), Some(&location));
        assert!(!err.is_grammar_error());
        assert!(err.to_string().ends_with("In element \"a\" line 2."));
    }

    #[test]
    fn test_grammar_errors_convert() {
        let err: MapperError = MappingGrammarError::DuplicateType {
            type_name: "a".to_string(),
        }
        .into();
        assert!(err.is_grammar_error());
        assert_eq!(err.to_string(), "duplicate mapping type \"a\"");
        assert!(err.location().is_none());
    }
}
