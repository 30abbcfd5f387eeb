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

//! Object factories
//!
//! The mapper never builds domain objects itself. For every materialized
//! element it hands the type name and the computed fields to an
//! [`ObjectFactory`].

use serde_json::{Map, Value};
use std::convert::Infallible;
use std::marker::PhantomData;

use crate::model::{FieldMap, FieldValue};

/// Builds domain objects from a type name and ordered fields
pub trait ObjectFactory {
    /// Constructed object; cloned when it is registered for references
    type Object: Clone;
    type Error: std::error::Error + Send + Sync + 'static;

    fn create(
        &mut self,
        type_name: &str,
        fields: FieldMap<Self::Object>,
    ) -> Result<Self::Object, Self::Error>;
}

/// Factory producing JSON objects tagged with their type under `"_type"`
///
/// ```
/// use xmlmap::{JsonObjectFactory, XmlMapper};
/// use serde_json::json;
///
/// let mapper = XmlMapper::new(&[json!({
///     "_type": "item",
///     "_match": "/list/item",
///     "n": "int: @n",
/// })])
/// .unwrap();
/// let items = mapper
///     .load_single(r#"<list><item n="1"/><item n="2"/></list>"#, &mut JsonObjectFactory)
///     .unwrap();
/// assert_eq!(items, vec![json!({"_type": "item", "n": 1}), json!({"_type": "item", "n": 2})]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectFactory;

impl ObjectFactory for JsonObjectFactory {
    type Object = Value;
    type Error = Infallible;

    fn create(&mut self, type_name: &str, fields: FieldMap<Value>) -> Result<Value, Infallible> {
        let mut object = Map::with_capacity(fields.len() + 1);
        object.insert("_type".to_string(), Value::String(type_name.to_string()));
        for (name, value) in fields {
            let value = match value {
                FieldValue::Null => Value::Null,
                FieldValue::Scalar(scalar) => scalar.to_json(),
                FieldValue::Object(object) => object,
                FieldValue::List(items) => Value::Array(items),
            };
            object.insert(name, value);
        }
        Ok(Value::Object(object))
    }
}

/// Factory backed by a closure
pub struct FnFactory<F, T, E> {
    create: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

/// Wrap a closure as an [`ObjectFactory`]
pub fn factory_fn<F, T, E>(create: F) -> FnFactory<F, T, E>
where
    F: FnMut(&str, FieldMap<T>) -> Result<T, E>,
    T: Clone,
    E: std::error::Error + Send + Sync + 'static,
{
    FnFactory {
        create,
        _marker: PhantomData,
    }
}

impl<F, T, E> ObjectFactory for FnFactory<F, T, E>
where
    F: FnMut(&str, FieldMap<T>) -> Result<T, E>,
    T: Clone,
    E: std::error::Error + Send + Sync + 'static,
{
    type Object = T;
    type Error = E;

    fn create(&mut self, type_name: &str, fields: FieldMap<T>) -> Result<T, E> {
        (self.create)(type_name, fields)
    }
}
