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

//! Declarative XML to object mapping
//!
//! A mapping is a JSON object describing how elements selected by a
//! location path become objects of a named type:
//!
//! - `_type`: type name passed to the [`ObjectFactory`]; also usable as a
//!   value type to reference objects of this type
//! - `_match`: path selecting the elements this mapping applies to; other
//!   paths are evaluated relative to each match
//! - `_id`: optional path yielding the identifier other mappings use to
//!   reference objects of this type
//!
//! Every other key is a field. Its value is either a `"[type: ]path"` string
//! (type is `string`, `bool`, `int`, `float`, a registered filter, or the
//! `_type` of a mapping with `_id`), a nested mapping producing at most one
//! object, or a one-element list holding a nested mapping producing a list.
//!
//! ```
//! use xmlmap::{JsonObjectFactory, XmlMapper};
//! use serde_json::json;
//!
//! let mapper = XmlMapper::new(&[
//!     json!({
//!         "_type": "a",
//!         "_match": "/r/a",
//!         "_id": "@id",
//!         "title": "title",
//!         "b_list": [{"_type": "b", "_match": "b", "id": "int: id/@value"}]
//!     }),
//!     json!({"_type": "c", "_match": "/r/c", "a": "a: @aid"}),
//! ])
//! .unwrap();
//!
//! let xml = r#"<r><a id="1"><title>a1</title><b><id value="42"/></b></a><c aid="1"/></r>"#;
//! let result = mapper.load(xml, &mut JsonObjectFactory).unwrap();
//! assert_eq!(result[1][0]["a"]["b_list"][0]["id"], json!(42));
//! ```

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod factory;
pub mod mapper;
pub mod model;
pub mod registry;

pub use compiler::{AttributeSpec, MappingDefinition, compile};
pub use error::{ElementLocation, MapperError, MapperResult, MappingGrammarError};
pub use evaluator::{DuplicateIdPolicy, LoadStats, MapperConfig};
pub use factory::{FnFactory, JsonObjectFactory, ObjectFactory, factory_fn};
pub use mapper::{XmlMapper, XmlMapperBuilder};
pub use model::{FieldMap, FieldValue, ScalarValue};
pub use registry::{BuiltinType, Coercion, CoercionError, CoercionRegistry, ObjectRegistry};

pub use xmlmap_path::{CompiledPath, PathError, XmlNode};
