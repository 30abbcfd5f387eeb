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

//! Mapping compiler
//!
//! Turns the declarative grammar, given as JSON values, into
//! [`MappingDefinition`] trees. Compilation runs in two passes. The first
//! collects every declared `_type` so a reference field may name a type
//! declared anywhere in the list; the second classifies fields and compiles
//! their path expressions. Nothing here touches an XML document.

pub mod definition;

pub use definition::{AttributeSpec, MappingDefinition};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use xmlmap_path::CompiledPath;

use crate::error::MappingGrammarError;
use crate::registry::{BuiltinType, Coercion, CoercionRegistry};

pub const TYPE_KEY: &str = "_type";
pub const MATCH_KEY: &str = "_match";
pub const ID_KEY: &str = "_id";

/// `"type: path"`; the token only counts when it names a known type
static TYPED_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?s)(\w+)\s*:\s*(.*)$").expect("typed path pattern is valid"));

type CompileResult<T> = Result<T, MappingGrammarError>;

/// Compile a list of raw mapping definitions
pub fn compile(
    raw: &[Value],
    coercions: &CoercionRegistry,
) -> CompileResult<Vec<MappingDefinition>> {
    MappingCompiler::new(coercions).compile(raw)
}

/// A classified `"[type: ]path"` string
enum ValueSpec {
    Scalar(Coercion, CompiledPath),
    Reference(String, CompiledPath),
}

pub struct MappingCompiler<'r> {
    coercions: &'r CoercionRegistry,
    /// Declared type name to whether it carries `_id`
    types: FxHashMap<String, bool>,
}

impl<'r> MappingCompiler<'r> {
    pub fn new(coercions: &'r CoercionRegistry) -> Self {
        Self {
            coercions,
            types: FxHashMap::default(),
        }
    }

    pub fn compile(mut self, raw: &[Value]) -> CompileResult<Vec<MappingDefinition>> {
        for (index, node) in raw.iter().enumerate() {
            self.declare(node, &top_level_location(index))?;
        }
        let definitions = raw
            .iter()
            .enumerate()
            .map(|(index, node)| self.compile_definition(node, &top_level_location(index)))
            .collect::<CompileResult<Vec<_>>>()?;
        log::debug!(
            "compiled {} top-level mappings declaring {} types",
            definitions.len(),
            self.types.len()
        );
        Ok(definitions)
    }

    fn declare(&mut self, node: &Value, location: &str) -> CompileResult<()> {
        let object = as_definition(node, location)?;
        let type_name = declared_type(object, location)?;

        if self.coercions.resolve(type_name).is_some() {
            return Err(MappingGrammarError::TypeNameConflict {
                type_name: type_name.to_string(),
            });
        }
        if self
            .types
            .insert(type_name.to_string(), object.contains_key(ID_KEY))
            .is_some()
        {
            return Err(MappingGrammarError::DuplicateType {
                type_name: type_name.to_string(),
            });
        }

        for (field, value) in object {
            if field.starts_with('_') {
                continue;
            }
            match value {
                Value::Object(_) => self.declare(value, &nested_location(type_name, field))?,
                Value::Array(items) => {
                    if let [item @ Value::Object(_)] = items.as_slice() {
                        self.declare(item, &nested_location(type_name, field))?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn compile_definition(&self, node: &Value, location: &str) -> CompileResult<MappingDefinition> {
        let object = as_definition(node, location)?;
        let type_name = declared_type(object, location)?.to_string();

        let match_path = match object.get(MATCH_KEY) {
            Some(Value::String(source)) => compile_path(&type_name, MATCH_KEY, source)?,
            Some(other) => {
                return Err(MappingGrammarError::DirectiveNotString {
                    directive: MATCH_KEY,
                    location: format!("of type \"{type_name}\""),
                    found: value_kind(other),
                });
            }
            None => return Err(MappingGrammarError::MissingMatch { type_name }),
        };

        let id_path = match object.get(ID_KEY) {
            Some(Value::String(source)) => Some(self.compile_id(&type_name, source)?),
            Some(other) => {
                return Err(MappingGrammarError::DirectiveNotString {
                    directive: ID_KEY,
                    location: format!("of type \"{type_name}\""),
                    found: value_kind(other),
                });
            }
            None => None,
        };

        let mut fields = IndexMap::with_capacity(object.len());
        for (field, value) in object {
            match field.as_str() {
                TYPE_KEY | MATCH_KEY | ID_KEY => continue,
                name if name.starts_with('_') => {
                    return Err(MappingGrammarError::ReservedFieldName {
                        type_name,
                        field: field.clone(),
                    });
                }
                _ => {}
            }
            let spec = self.compile_field(&type_name, field, value)?;
            fields.insert(field.clone(), spec);
        }

        Ok(MappingDefinition {
            type_name,
            match_path,
            id_path,
            fields,
        })
    }

    fn compile_field(&self, type_name: &str, field: &str, value: &Value) -> CompileResult<AttributeSpec> {
        let invalid = |found: String| MappingGrammarError::InvalidFieldValue {
            type_name: type_name.to_string(),
            field: field.to_string(),
            found,
        };
        match value {
            Value::String(source) => Ok(match self.compile_value(type_name, field, source)? {
                ValueSpec::Scalar(coercion, path) => AttributeSpec::Scalar { coercion, path },
                ValueSpec::Reference(target_type, path) => {
                    AttributeSpec::Reference { target_type, path }
                }
            }),
            Value::Object(_) => {
                let nested = self.compile_definition(value, &nested_location(type_name, field))?;
                Ok(AttributeSpec::SingleNested(Box::new(nested)))
            }
            Value::Array(items) => match items.as_slice() {
                [item @ Value::Object(_)] => {
                    let nested = self.compile_definition(item, &nested_location(type_name, field))?;
                    Ok(AttributeSpec::ListNested(Box::new(nested)))
                }
                [] => Err(invalid("an empty list".to_string())),
                [other] => Err(invalid(format!("a list containing {}", value_kind(other)))),
                _ => Err(invalid(format!("a list of {} elements", items.len()))),
            },
            other => Err(invalid(value_kind(other).to_string())),
        }
    }

    /// Split `"[type: ]path"` and compile the path
    ///
    /// The prefix is only split off when it names a built-in type, a
    /// registered filter or a declared mapping type; otherwise the whole
    /// string is the path.
    fn compile_value(&self, type_name: &str, field: &str, source: &str) -> CompileResult<ValueSpec> {
        let Some(captures) = TYPED_PATH.captures(source) else {
            let path = compile_path(type_name, field, source)?;
            return Ok(ValueSpec::Scalar(Coercion::Builtin(BuiltinType::String), path));
        };
        let token = captures.get(1).map_or("", |m| m.as_str());
        let path_source = captures.get(2).map_or("", |m| m.as_str());

        if let Some(coercion) = self.coercions.resolve(token) {
            let path = compile_path(type_name, field, path_source)?;
            return Ok(ValueSpec::Scalar(coercion, path));
        }

        match self.types.get(token) {
            Some(true) => {
                let path = compile_path(type_name, field, path_source)?;
                Ok(ValueSpec::Reference(token.to_string(), path))
            }
            Some(false) => Err(MappingGrammarError::UnreferenceableType {
                type_name: type_name.to_string(),
                field: field.to_string(),
                target: token.to_string(),
            }),
            // e.g. `child::title`
            None => match CompiledPath::compile(source) {
                Ok(path) => Ok(ValueSpec::Scalar(Coercion::Builtin(BuiltinType::String), path)),
                Err(_) => Err(MappingGrammarError::UnknownValueType {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                    token: token.to_string(),
                }),
            },
        }
    }

    fn compile_id(&self, type_name: &str, source: &str) -> CompileResult<CompiledPath> {
        match self.compile_value(type_name, ID_KEY, source)? {
            ValueSpec::Scalar(Coercion::Builtin(BuiltinType::String), path) => Ok(path),
            ValueSpec::Scalar(coercion, _) => Err(MappingGrammarError::InvalidIdType {
                type_name: type_name.to_string(),
                token: coercion.token().to_string(),
            }),
            ValueSpec::Reference(target, _) => Err(MappingGrammarError::InvalidIdType {
                type_name: type_name.to_string(),
                token: target,
            }),
        }
    }
}

fn compile_path(type_name: &str, field: &str, source: &str) -> CompileResult<CompiledPath> {
    CompiledPath::compile(source).map_err(|source_error| MappingGrammarError::InvalidPath {
        type_name: type_name.to_string(),
        field: field.to_string(),
        path: source.to_string(),
        source: source_error,
    })
}

fn as_definition<'v>(node: &'v Value, location: &str) -> CompileResult<&'v Map<String, Value>> {
    node.as_object()
        .ok_or_else(|| MappingGrammarError::NotAnObject {
            location: location.to_string(),
            found: value_kind(node),
        })
}

fn declared_type<'v>(object: &'v Map<String, Value>, location: &str) -> CompileResult<&'v str> {
    match object.get(TYPE_KEY) {
        Some(Value::String(name)) => Ok(name),
        Some(other) => Err(MappingGrammarError::DirectiveNotString {
            directive: TYPE_KEY,
            location: location.to_string(),
            found: value_kind(other),
        }),
        None => Err(MappingGrammarError::MissingType {
            location: location.to_string(),
        }),
    }
}

fn top_level_location(index: usize) -> String {
    format!("#{}", index + 1)
}

fn nested_location(type_name: &str, field: &str) -> String {
    format!("for field \"{field}\" of type \"{type_name}\"")
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScalarValue;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn compile_one(raw: Value) -> CompileResult<MappingDefinition> {
        compile(&[raw], &CoercionRegistry::new()).map(|mut defs| defs.remove(0))
    }

    fn field_spec(raw: &str) -> CompileResult<AttributeSpec> {
        let definition = compile_one(json!({
            "_type": "t",
            "_match": "/r/t",
            "field": raw,
        }))?;
        Ok(definition.fields["field"].clone())
    }

    #[test]
    fn test_grammar_example() {
        let definitions = compile(
            &[
                json!({
                    "_type": "a",
                    "_match": "/r/a",
                    "_id": "@id",
                    "title": "title",
                    "b_list": [{
                        "_type": "b",
                        "_match": "b",
                        "id": "int: id/@value"
                    }]
                }),
                json!({
                    "_type": "c",
                    "_match": "/r/c",
                    "a": "a: @aid"
                }),
            ],
            &CoercionRegistry::new(),
        )
        .unwrap();

        assert_eq!(definitions.len(), 2);
        let a = &definitions[0];
        assert_eq!(a.type_name, "a");
        assert_eq!(a.match_path.source(), "/r/a");
        assert_eq!(a.id_path.as_ref().map(|p| p.source()), Some("@id"));
        assert_eq!(
            a.fields.keys().collect::<Vec<_>>(),
            vec!["title", "b_list"]
        );
        let AttributeSpec::ListNested(b) = &a.fields["b_list"] else {
            panic!("expected list mapping");
        };
        assert_eq!(b.type_name, "b");
        assert!(!b.is_referenceable());
        assert!(matches!(
            &b.fields["id"],
            AttributeSpec::Scalar { coercion: Coercion::Builtin(BuiltinType::Int), path }
                if path.source() == "id/@value"
        ));

        let c = &definitions[1];
        assert!(matches!(
            &c.fields["a"],
            AttributeSpec::Reference { target_type, path }
                if target_type == "a" && path.source() == "@aid"
        ));
        assert_eq!(c.referenced_types(), vec!["a"]);
        assert_eq!(
            a.walk().iter().map(|d| d.type_name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[rstest]
    #[case("title", "string", "title")]
    #[case("string: title", "string", "title")]
    #[case("int: id/@value", "int", "id/@value")]
    #[case("float:@price", "float", "@price")]
    #[case("bool: boolean(@price)", "bool", "boolean(@price)")]
    #[case("int: \"0\"", "int", "\"0\"")]
    #[case("child::title", "string", "child::title")]
    #[case("concat(@date, \" \", @time)", "string", "concat(@date, \" \", @time)")]
    fn test_scalar_classification(
        #[case] raw: &str,
        #[case] token: &str,
        #[case] path_source: &str,
    ) {
        match field_spec(raw).unwrap() {
            AttributeSpec::Scalar { coercion, path } => {
                assert_eq!(coercion.token(), token);
                assert_eq!(path.source(), path_source);
            }
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_prefix() {
        let mut coercions = CoercionRegistry::new();
        coercions
            .register("upper", |s: &str| Ok(ScalarValue::from(s.to_uppercase())))
            .unwrap();
        let definitions = compile(
            &[json!({"_type": "t", "_match": "t", "name": "upper: @name"})],
            &coercions,
        )
        .unwrap();
        assert!(matches!(
            &definitions[0].fields["name"],
            AttributeSpec::Scalar { coercion: Coercion::Filter(name), .. } if name == "upper"
        ));
    }

    #[test]
    fn test_unknown_prefix_that_is_not_a_path() {
        assert_eq!(
            field_spec("integer: @id"),
            Err(MappingGrammarError::UnknownValueType {
                type_name: "t".to_string(),
                field: "field".to_string(),
                token: "integer".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_path() {
        let err = field_spec("int: a[").unwrap_err();
        assert!(matches!(
            err,
            MappingGrammarError::InvalidPath { ref path, .. } if path == "a["
        ));
    }

    #[test]
    fn test_forward_reference_compiles() {
        let definitions = compile(
            &[
                json!({"_type": "c", "_match": "/r/c", "a": "a: @aid"}),
                json!({"_type": "a", "_match": "/r/a", "_id": "@id"}),
            ],
            &CoercionRegistry::new(),
        )
        .unwrap();
        assert!(matches!(
            &definitions[0].fields["a"],
            AttributeSpec::Reference { target_type, .. } if target_type == "a"
        ));
    }

    #[test]
    fn test_reference_to_nested_type() {
        let definitions = compile(
            &[
                json!({
                    "_type": "place",
                    "_match": "/r/place",
                    "persons": [{"_type": "person", "_match": "person", "_id": "@id"}]
                }),
                json!({"_type": "visit", "_match": "/r/visit", "who": "person: @pid"}),
            ],
            &CoercionRegistry::new(),
        )
        .unwrap();
        assert_eq!(definitions[1].referenced_types(), vec!["person"]);
    }

    #[test]
    fn test_reference_requires_id() {
        let err = compile(
            &[
                json!({"_type": "a", "_match": "/r/a"}),
                json!({"_type": "c", "_match": "/r/c", "a": "a: @aid"}),
            ],
            &CoercionRegistry::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MappingGrammarError::UnreferenceableType {
                type_name: "c".to_string(),
                field: "a".to_string(),
                target: "a".to_string(),
            }
        );
    }

    #[rstest]
    #[case(json!({"_match": "a"}), "MissingType")]
    #[case(json!({"_type": "a"}), "MissingMatch")]
    #[case(json!({"_type": 1, "_match": "a"}), "DirectiveNotString")]
    #[case(json!({"_type": "a", "_match": ["a"]}), "DirectiveNotString")]
    #[case(json!({"_type": "a", "_match": "a", "_id": 3}), "DirectiveNotString")]
    #[case(json!({"_type": "a", "_match": "a", "_private": "x"}), "ReservedFieldName")]
    #[case(json!({"_type": "a", "_match": "a", "n": 5}), "InvalidFieldValue")]
    #[case(json!({"_type": "a", "_match": "a", "n": null}), "InvalidFieldValue")]
    #[case(json!({"_type": "a", "_match": "a", "n": []}), "InvalidFieldValue")]
    #[case(json!({"_type": "a", "_match": "a", "n": ["x"]}), "InvalidFieldValue")]
    #[case(json!({"_type": "a", "_match": "a", "n": [{"_type": "b", "_match": "b"}, {"_type": "c", "_match": "c"}]}), "InvalidFieldValue")]
    #[case(json!({"_type": "a", "_match": "a", "_id": "int: @id"}), "InvalidIdType")]
    #[case(json!({"_type": "int", "_match": "a"}), "TypeNameConflict")]
    #[case(json!({"_type": "a", "_match": "a", "b": {"_type": "a", "_match": "b"}}), "DuplicateType")]
    #[case(json!({"_type": "a", "_match": "a", "b": {"_type": "b"}}), "MissingMatch")]
    #[case(json!("just a string"), "NotAnObject")]
    #[case(json!({"_type": "a", "_match": "a/"}), "InvalidPath")]
    fn test_grammar_errors(#[case] raw: Value, #[case] expected: &str) {
        let err = compile_one(raw).unwrap_err();
        let actual = format!("{err:?}");
        assert!(
            actual.starts_with(expected),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_explicit_string_id() {
        let definition =
            compile_one(json!({"_type": "a", "_match": "a", "_id": "string: @id"})).unwrap();
        assert_eq!(definition.id_path.map(|p| p.source().to_string()), Some("@id".to_string()));
    }

    #[test]
    fn test_type_conflicts_with_filter() {
        let mut coercions = CoercionRegistry::new();
        coercions.register("money", |s: &str| Ok(ScalarValue::from(s))).unwrap();
        let err = compile(&[json!({"_type": "money", "_match": "m"})], &coercions).unwrap_err();
        assert_eq!(
            err,
            MappingGrammarError::TypeNameConflict {
                type_name: "money".to_string()
            }
        );
    }

    #[test]
    fn test_single_nested() {
        let definition = compile_one(json!({
            "_type": "event",
            "_match": "/feed/event",
            "place": {"_type": "place", "_match": "place", "name": "name"}
        }))
        .unwrap();
        let AttributeSpec::SingleNested(place) = &definition.fields["place"] else {
            panic!("expected single nested mapping");
        };
        assert_eq!(place.match_path.source(), "place");
        assert_eq!(definition.fields["place"].path().source(), "place");
    }
}
