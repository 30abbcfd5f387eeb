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

//! Typed field values
//!
//! Scalars come out of the coercion registry, objects and lists out of the
//! factory. [`FieldMap`] keeps fields in the order the mapping declares
//! them.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Ordered field name to value mapping passed to the object factory
pub type FieldMap<T> = IndexMap<String, FieldValue<T>>;

/// A coerced scalar value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    /// Arbitrary structured value produced by a filter
    Json(serde_json::Value),
}

impl ScalarValue {
    /// Type name used in messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::String(_) => "string",
            ScalarValue::Boolean(_) => "bool",
            ScalarValue::Integer(_) => "int",
            ScalarValue::Float(_) => "float",
            ScalarValue::Json(_) => "json",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers widen to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to a JSON value; non-finite floats become `null`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::String(s) => serde_json::Value::String(s.clone()),
            ScalarValue::Boolean(b) => serde_json::Value::Bool(*b),
            ScalarValue::Integer(i) => serde_json::Value::from(*i),
            ScalarValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ScalarValue::Json(value) => value.clone(),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::String(s) => f.write_str(s),
            ScalarValue::Boolean(b) => write!(f, "{b}"),
            ScalarValue::Integer(i) => write!(f, "{i}"),
            ScalarValue::Float(x) => write!(f, "{x}"),
            ScalarValue::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::String(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::String(value.to_string())
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Integer(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float(value)
    }
}

impl From<serde_json::Value> for ScalarValue {
    fn from(value: serde_json::Value) -> Self {
        ScalarValue::Json(value)
    }
}

/// Value of one field of an object under construction
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    /// Nothing matched
    Null,
    Scalar(ScalarValue),
    /// Nested or referenced object
    Object(T),
    List(Vec<T>),
}

impl<T> FieldValue<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&T> {
        match self {
            FieldValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[T]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Map the object type, keeping scalars and nulls as they are
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> FieldValue<U> {
        match self {
            FieldValue::Null => FieldValue::Null,
            FieldValue::Scalar(value) => FieldValue::Scalar(value),
            FieldValue::Object(object) => FieldValue::Object(f(object)),
            FieldValue::List(items) => FieldValue::List(items.into_iter().map(f).collect()),
        }
    }
}

impl<T> From<Option<ScalarValue>> for FieldValue<T> {
    fn from(value: Option<ScalarValue>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_to_json() {
        assert_eq!(ScalarValue::from("a").to_json(), json!("a"));
        assert_eq!(ScalarValue::from(42i64).to_json(), json!(42));
        assert_eq!(ScalarValue::from(true).to_json(), json!(true));
        assert_eq!(ScalarValue::from(1.5).to_json(), json!(1.5));
        assert_eq!(ScalarValue::Float(f64::NAN).to_json(), json!(null));
        assert_eq!(ScalarValue::from(json!([1, 2])).to_json(), json!([1, 2]));
    }

    #[test]
    fn test_scalar_serializes_untagged() {
        let value = serde_json::to_value(ScalarValue::Integer(7)).unwrap();
        assert_eq!(value, json!(7));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(ScalarValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(ScalarValue::Integer(3).as_str(), None);
        assert_eq!(ScalarValue::from("x").to_string(), "x");
    }

    #[test]
    fn test_field_value_from_option() {
        let null: FieldValue<()> = None.into();
        assert!(null.is_null());
        let scalar: FieldValue<()> = Some(ScalarValue::Boolean(false)).into();
        assert_eq!(scalar.as_scalar(), Some(&ScalarValue::Boolean(false)));
    }

    #[test]
    fn test_field_value_map() {
        let list = FieldValue::List(vec![1, 2]).map(|n| n * 10);
        assert_eq!(list.as_list(), Some(&[10, 20][..]));
        let scalar: FieldValue<i32> = FieldValue::Scalar(ScalarValue::from("s"));
        assert_eq!(scalar.map(|n| n + 1).as_scalar(), Some(&ScalarValue::from("s")));
    }
}
