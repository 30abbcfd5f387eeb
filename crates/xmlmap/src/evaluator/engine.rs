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

//! Evaluation engine
//!
//! Walks compiled mappings against a document and materializes matched
//! elements depth first: nested objects are built before the object that
//! contains them, and an object is registered under its identifier only
//! after the factory has returned it. References resolve against objects
//! registered earlier in the same load, so mapping order matters.

use std::fmt;
use xmlmap_path::{CompiledPath, PathError, XmlNode};

use super::config::{DuplicateIdPolicy, MapperConfig};
use super::query::QueryAdapter;
use crate::compiler::{AttributeSpec, ID_KEY, MATCH_KEY, MappingDefinition};
use crate::error::{ElementLocation, MapperError, MapperResult};
use crate::factory::ObjectFactory;
use crate::model::{FieldMap, FieldValue};
use crate::registry::{CoercionRegistry, ObjectRegistry};

/// Counters collected during one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Factory calls that returned an object
    pub objects_created: usize,
    /// Objects stored in the registry, overwrites included
    pub objects_registered: usize,
    pub references_resolved: usize,
}

impl fmt::Display for LoadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} objects created, {} registered, {} references resolved",
            self.objects_created, self.objects_registered, self.references_resolved
        )
    }
}

/// State of a single load: the factory, the object registry and counters
pub struct Evaluator<'e, F: ObjectFactory> {
    coercions: &'e CoercionRegistry,
    duplicate_ids: DuplicateIdPolicy,
    query: QueryAdapter,
    factory: &'e mut F,
    registry: ObjectRegistry<F::Object>,
    stats: LoadStats,
}

impl<'e, F: ObjectFactory> Evaluator<'e, F> {
    pub fn new(coercions: &'e CoercionRegistry, config: &MapperConfig, factory: &'e mut F) -> Self {
        Self {
            coercions,
            duplicate_ids: config.duplicate_ids,
            query: QueryAdapter::new(config.trim_whitespace),
            factory,
            registry: ObjectRegistry::new(),
            stats: LoadStats::default(),
        }
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Objects registered so far
    pub fn registry(&self) -> &ObjectRegistry<F::Object> {
        &self.registry
    }

    /// Apply top-level mappings in order, each against the document node
    ///
    /// Returns one list of objects per mapping, in match order.
    pub fn run(
        &mut self,
        document: &roxmltree::Document<'_>,
        definitions: &[MappingDefinition],
    ) -> MapperResult<Vec<Vec<F::Object>>> {
        let root = XmlNode::from(document.root());
        let mut results = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let elements = self.select(root, definition, MATCH_KEY, &definition.match_path)?;
            log::trace!(
                "\"{}\" matched {} elements",
                definition.type_name,
                elements.len()
            );
            let objects = elements
                .into_iter()
                .map(|element| self.materialize(element, definition))
                .collect::<MapperResult<Vec<_>>>()?;
            results.push(objects);
        }
        Ok(results)
    }

    /// Build one object from `element`
    pub fn materialize(
        &mut self,
        element: XmlNode<'_, '_>,
        definition: &MappingDefinition,
    ) -> MapperResult<F::Object> {
        let mut fields = FieldMap::with_capacity(definition.fields.len());
        for (name, spec) in &definition.fields {
            let value = self.field_value(element, definition, name, spec)?;
            fields.insert(name.clone(), value);
        }

        let object = self
            .factory
            .create(&definition.type_name, fields)
            .map_err(|source| MapperError::Factory {
                location: ElementLocation::of(element),
                type_name: definition.type_name.clone(),
                source: Box::new(source),
            })?;
        self.stats.objects_created += 1;

        if let Some(id_path) = &definition.id_path {
            match self.select_string(element, definition, ID_KEY, id_path)? {
                Some(identifier) => self.register(element, definition, identifier, object.clone())?,
                None => log::debug!(
                    "\"{}\" object in element {} has no identifier, not registered",
                    definition.type_name,
                    ElementLocation::of(element)
                ),
            }
        }
        Ok(object)
    }

    fn field_value(
        &mut self,
        element: XmlNode<'_, '_>,
        definition: &MappingDefinition,
        field: &str,
        spec: &AttributeSpec,
    ) -> MapperResult<FieldValue<F::Object>> {
        match spec {
            AttributeSpec::Scalar { coercion, path } => {
                let raw = self.select_string(element, definition, field, path)?;
                let value = self
                    .coercions
                    .coerce(coercion, raw.as_deref())
                    .map_err(|source| MapperError::TypeCoercion {
                        location: ElementLocation::of(element),
                        type_name: definition.type_name.clone(),
                        field: field.to_string(),
                        type_token: coercion.token().to_string(),
                        value: raw.clone(),
                        path: path.source().to_string(),
                        source,
                    })?;
                Ok(value.into())
            }
            AttributeSpec::Reference { target_type, path } => {
                let Some(identifier) = self.select_string(element, definition, field, path)? else {
                    return Ok(FieldValue::Null);
                };
                match self.registry.lookup(target_type, &identifier) {
                    Some(object) => {
                        let object = object.clone();
                        self.stats.references_resolved += 1;
                        Ok(FieldValue::Object(object))
                    }
                    None => Err(MapperError::UnresolvedReference {
                        location: ElementLocation::of(element),
                        type_name: definition.type_name.clone(),
                        field: field.to_string(),
                        target_type: target_type.clone(),
                        identifier,
                        path: path.source().to_string(),
                    }),
                }
            }
            AttributeSpec::SingleNested(nested) => {
                let elements = self.select(element, definition, field, &nested.match_path)?;
                match elements.as_slice() {
                    [] => Ok(FieldValue::Null),
                    [single] => Ok(FieldValue::Object(self.materialize(*single, nested)?)),
                    _ => Err(MapperError::AmbiguousMatch {
                        location: ElementLocation::of(element),
                        type_name: definition.type_name.clone(),
                        field: field.to_string(),
                        path: nested.match_path.source().to_string(),
                        count: elements.len(),
                    }),
                }
            }
            AttributeSpec::ListNested(nested) => {
                let elements = self.select(element, definition, field, &nested.match_path)?;
                let objects = elements
                    .into_iter()
                    .map(|matched| self.materialize(matched, nested))
                    .collect::<MapperResult<Vec<_>>>()?;
                Ok(FieldValue::List(objects))
            }
        }
    }

    fn register(
        &mut self,
        element: XmlNode<'_, '_>,
        definition: &MappingDefinition,
        identifier: String,
        object: F::Object,
    ) -> MapperResult<()> {
        let type_name = &definition.type_name;
        if self.registry.contains(type_name, &identifier) {
            match self.duplicate_ids {
                DuplicateIdPolicy::Reject => {
                    return Err(MapperError::DuplicateIdentifier {
                        location: ElementLocation::of(element),
                        type_name: type_name.clone(),
                        identifier,
                    });
                }
                DuplicateIdPolicy::Overwrite => log::warn!(
                    "duplicate \"{type_name}\" object with id \"{identifier}\" in element {}, replacing the earlier one",
                    ElementLocation::of(element)
                ),
            }
        }
        self.registry.insert(type_name, &identifier, object);
        self.stats.objects_registered += 1;
        Ok(())
    }

    fn select<'a, 'input>(
        &self,
        context: XmlNode<'a, 'input>,
        definition: &MappingDefinition,
        field: &str,
        path: &CompiledPath,
    ) -> MapperResult<Vec<XmlNode<'a, 'input>>> {
        self.query
            .select_nodes(path, context)
            .map_err(|source| query_error(context, definition, field, path, source))
    }

    fn select_string(
        &self,
        context: XmlNode<'_, '_>,
        definition: &MappingDefinition,
        field: &str,
        path: &CompiledPath,
    ) -> MapperResult<Option<String>> {
        self.query
            .select_string(path, context)
            .map_err(|source| query_error(context, definition, field, path, source))
    }
}

fn query_error(
    context: XmlNode<'_, '_>,
    definition: &MappingDefinition,
    field: &str,
    path: &CompiledPath,
    source: PathError,
) -> MapperError {
    MapperError::Query {
        location: ElementLocation::of(context),
        type_name: definition.type_name.clone(),
        field: field.to_string(),
        path: path.source().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::factory::JsonObjectFactory;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn run(
        raw: &[Value],
        xml: &str,
        config: &MapperConfig,
    ) -> (MapperResult<Vec<Vec<Value>>>, LoadStats) {
        let coercions = CoercionRegistry::new();
        let definitions = compile(raw, &coercions).unwrap();
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut factory = JsonObjectFactory;
        let mut evaluator = Evaluator::new(&coercions, config, &mut factory);
        let result = evaluator.run(&doc, &definitions);
        (result, evaluator.stats())
    }

    #[test]
    fn test_stats_and_registration() {
        let (result, stats) = run(
            &[
                json!({"_type": "a", "_match": "/r/a", "_id": "@id", "n": "int: @n"}),
                json!({"_type": "c", "_match": "/r/c", "a": "a: @aid"}),
            ],
            r#"<r><a id="1" n="5"/><a n="6"/><c aid="1"/><c/></r>"#,
            &MapperConfig::default(),
        );
        let result = result.unwrap();
        assert_eq!(result[0].len(), 2);
        assert_eq!(result[1][0]["a"]["n"], json!(5));
        assert_eq!(result[1][1]["a"], Value::Null);
        assert_eq!(
            stats,
            LoadStats {
                objects_created: 4,
                objects_registered: 1,
                references_resolved: 1,
            }
        );
    }

    #[test]
    fn test_duplicate_overwrite_keeps_last() {
        let raw = [
            json!({"_type": "a", "_match": "/r/a", "_id": "@id", "v": "@v"}),
            json!({"_type": "c", "_match": "/r/c", "a": "a: @aid"}),
        ];
        let xml = r#"<r><a id="1" v="first"/><a id="1" v="second"/><c aid="1"/></r>"#;

        let (result, stats) = run(&raw, xml, &MapperConfig::default());
        assert_eq!(result.unwrap()[1][0]["a"]["v"], json!("second"));
        assert_eq!(stats.objects_registered, 2);

        let (result, _) = run(&raw, xml, &MapperConfig::strict());
        assert!(matches!(
            result,
            Err(MapperError::DuplicateIdentifier { ref identifier, ref location, .. })
                if identifier == "1" && location.tag == "a"
        ));
    }

    #[test]
    fn test_match_path_must_select_nodes() {
        let (result, _) = run(
            &[json!({"_type": "a", "_match": "count(/r)"})],
            "<r/>",
            &MapperConfig::default(),
        );
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            MapperError::Query { ref field, ref location, .. }
                if field == MATCH_KEY && location.tag == "#document"
        ));
    }

    #[test]
    fn test_coercion_error_context() {
        let (result, _) = run(
            &[json!({"_type": "a", "_match": "/r/a", "n": "int: @n"})],
            "<r>\n<a n=\"x\"/>\n</r>",
            &MapperConfig::default(),
        );
        match result.unwrap_err() {
            MapperError::TypeCoercion {
                location,
                type_name,
                field,
                type_token,
                value,
                path,
                ..
            } => {
                assert_eq!(location, ElementLocation { tag: "a".to_string(), line: 2 });
                assert_eq!(type_name, "a");
                assert_eq!(field, "n");
                assert_eq!(type_token, "int");
                assert_eq!(value.as_deref(), Some("x"));
                assert_eq!(path, "@n");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_whitespace_trimming() {
        let raw = [json!({"_type": "a", "_match": "/r/a", "n": "int: n", "s": "n"})];
        let xml = "<r><a><n>\n  42\n</n></a></r>";

        let (result, _) = run(&raw, xml, &MapperConfig::default());
        assert_eq!(
            result.unwrap()[0][0],
            json!({"_type": "a", "n": 42, "s": "42"})
        );

        let (result, _) = run(&raw, xml, &MapperConfig::default().with_trim_whitespace(false));
        assert!(matches!(result, Err(MapperError::TypeCoercion { .. })));
    }

    #[test]
    fn test_identifier_missing_skips_registration() {
        let (result, stats) = run(
            &[json!({"_type": "a", "_match": "/r/a", "_id": "@id"})],
            "<r><a/></r>",
            &MapperConfig::default(),
        );
        assert_eq!(result.unwrap()[0].len(), 1);
        assert_eq!(stats.objects_registered, 0);
    }
}
