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

//! The `XmlMapper` facade

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::compiler::{MappingDefinition, compile, value_kind};
use crate::error::{MapperError, MapperResult, MappingGrammarError};
use crate::evaluator::{Evaluator, MapperConfig};
use crate::factory::ObjectFactory;
use crate::model::ScalarValue;
use crate::registry::{CoercionError, CoercionRegistry};

/// Compiled mappings ready to load documents
///
/// Compilation happens once, in the constructor. Loading is read-only on
/// the mapper: every load gets its own object registry, so one mapper can
/// serve any number of loads, including from several threads.
#[derive(Debug, Clone)]
pub struct XmlMapper {
    definitions: Arc<[MappingDefinition]>,
    coercions: CoercionRegistry,
    config: MapperConfig,
}

impl XmlMapper {
    /// Compile mapping definitions with no filters and the default
    /// configuration
    pub fn new(definitions: &[Value]) -> MapperResult<Self> {
        Self::builder().build(definitions)
    }

    /// Compile mapping definitions given as a JSON list
    pub fn from_json(text: &str) -> MapperResult<Self> {
        Self::builder().build_from_json(text)
    }

    pub fn builder() -> XmlMapperBuilder {
        XmlMapperBuilder::default()
    }

    /// Compiled top-level definitions, in application order
    pub fn definitions(&self) -> &[MappingDefinition] {
        &self.definitions
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn coercions(&self) -> &CoercionRegistry {
        &self.coercions
    }

    /// Parse `xml` and load objects, one list per top-level mapping
    pub fn load<F: ObjectFactory>(
        &self,
        xml: &str,
        factory: &mut F,
    ) -> MapperResult<Vec<Vec<F::Object>>> {
        let document = roxmltree::Document::parse_with_options(xml, self.config.parsing_options())?;
        self.load_document(&document, factory)
    }

    /// Load from UTF-8 encoded bytes
    pub fn load_bytes<F: ObjectFactory>(
        &self,
        xml: &[u8],
        factory: &mut F,
    ) -> MapperResult<Vec<Vec<F::Object>>> {
        let text = std::str::from_utf8(xml)?;
        self.load(text.strip_prefix('\u{feff}').unwrap_or(text), factory)
    }

    /// Read and load an XML file
    pub fn load_file<F: ObjectFactory>(
        &self,
        path: impl AsRef<Path>,
        factory: &mut F,
    ) -> MapperResult<Vec<Vec<F::Object>>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| MapperError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("read {} bytes from {}", bytes.len(), path.display());
        self.load_bytes(&bytes, factory)
    }

    /// Load from a document parsed by the caller
    pub fn load_document<F: ObjectFactory>(
        &self,
        document: &roxmltree::Document<'_>,
        factory: &mut F,
    ) -> MapperResult<Vec<Vec<F::Object>>> {
        let mut evaluator = Evaluator::new(&self.coercions, &self.config, factory);
        let results = evaluator.run(document, &self.definitions)?;
        log::debug!("load finished: {}", evaluator.stats());
        Ok(results)
    }

    /// Load with a mapper holding exactly one top-level mapping and return
    /// its objects
    pub fn load_single<F: ObjectFactory>(
        &self,
        xml: &str,
        factory: &mut F,
    ) -> MapperResult<Vec<F::Object>> {
        if self.definitions.len() != 1 {
            return Err(MapperError::NotSingleMapping {
                count: self.definitions.len(),
            });
        }
        Ok(self
            .load(xml, factory)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }
}

/// Builder registering filters and configuration before compilation
///
/// ```
/// use xmlmap::{JsonObjectFactory, ScalarValue, XmlMapper};
/// use serde_json::json;
///
/// let mapper = XmlMapper::builder()
///     .filter("upper", |s| Ok(ScalarValue::from(s.to_uppercase())))
///     .build(&[json!({"_type": "t", "_match": "/t", "name": "upper: @name"})])
///     .unwrap();
/// let objects = mapper.load_single(r#"<t name="ann"/>"#, &mut JsonObjectFactory).unwrap();
/// assert_eq!(objects[0]["name"], json!("ANN"));
/// ```
#[derive(Debug, Default)]
pub struct XmlMapperBuilder {
    coercions: CoercionRegistry,
    config: MapperConfig,
    error: Option<MapperError>,
}

impl XmlMapperBuilder {
    /// Register a filter applied to present values
    pub fn filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&str) -> Result<ScalarValue, CoercionError> + Send + Sync + 'static,
    {
        let result = self.coercions.register(name, filter);
        self.keep_first_error(result);
        self
    }

    /// Register a filter that also receives `None` when nothing matched
    pub fn nullable_filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<Option<ScalarValue>, CoercionError> + Send + Sync + 'static,
    {
        let result = self.coercions.register_nullable(name, filter);
        self.keep_first_error(result);
        self
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    fn keep_first_error(&mut self, result: MapperResult<()>) {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
    }

    /// Compile the definitions
    pub fn build(self, definitions: &[Value]) -> MapperResult<XmlMapper> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for warning in self.config.validate() {
            log::warn!("{warning}");
        }
        let definitions = compile(definitions, &self.coercions)?;
        Ok(XmlMapper {
            definitions: definitions.into(),
            coercions: self.coercions,
            config: self.config,
        })
    }

    /// Compile definitions given as JSON text holding a list
    pub fn build_from_json(self, text: &str) -> MapperResult<XmlMapper> {
        match serde_json::from_str::<Value>(text)? {
            Value::Array(definitions) => self.build(&definitions),
            other => Err(MappingGrammarError::NotAList {
                found: value_kind(&other),
            }
            .into()),
        }
    }
}
