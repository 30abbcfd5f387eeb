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

//! Type coercion registry
//!
//! Converts text extracted from the document into typed values. The four
//! built-in types (`string`, `bool`, `int`, `float`) are always present;
//! callers add named filters when the mapper is constructed.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{MapperError, MapperResult};
use crate::model::ScalarValue;

/// Failure to convert a string into a typed value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("invalid literal for {type_token}: \"{value}\"")]
    InvalidLiteral { type_token: String, value: String },

    #[error("value \"{value}\" is not a finite number")]
    NonFinite { value: String },

    #[error("unknown value type \"{type_token}\"")]
    UnknownType { type_token: String },

    /// Raised by a caller-supplied filter
    #[error("{message}")]
    Custom { message: String },
}

impl CoercionError {
    /// Error for use inside filters
    pub fn custom(message: impl Into<String>) -> Self {
        CoercionError::Custom {
            message: message.into(),
        }
    }
}

/// Built-in value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    String,
    Bool,
    Int,
    Float,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 4] = [
        BuiltinType::String,
        BuiltinType::Bool,
        BuiltinType::Int,
        BuiltinType::Float,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "string" => Some(BuiltinType::String),
            "bool" => Some(BuiltinType::Bool),
            "int" => Some(BuiltinType::Int),
            "float" => Some(BuiltinType::Float),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            BuiltinType::String => "string",
            BuiltinType::Bool => "bool",
            BuiltinType::Int => "int",
            BuiltinType::Float => "float",
        }
    }

    /// Convert a present value
    pub fn coerce(&self, raw: &str) -> Result<ScalarValue, CoercionError> {
        let invalid = || CoercionError::InvalidLiteral {
            type_token: self.token().to_string(),
            value: raw.to_string(),
        };
        match self {
            BuiltinType::String => Ok(ScalarValue::String(raw.to_string())),
            BuiltinType::Bool => {
                if raw.eq_ignore_ascii_case("true") || raw == "1" {
                    Ok(ScalarValue::Boolean(true))
                } else if raw.eq_ignore_ascii_case("false") || raw == "0" {
                    Ok(ScalarValue::Boolean(false))
                } else {
                    Err(invalid())
                }
            }
            BuiltinType::Int => raw
                .parse::<i64>()
                .map(ScalarValue::Integer)
                .map_err(|_| invalid()),
            BuiltinType::Float => {
                let value = raw.parse::<f64>().map_err(|_| invalid())?;
                if value.is_finite() {
                    Ok(ScalarValue::Float(value))
                } else {
                    Err(CoercionError::NonFinite {
                        value: raw.to_string(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Coercion selected for a scalar field at compile time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Coercion {
    Builtin(BuiltinType),
    /// Registered filter, by name
    Filter(String),
}

impl Coercion {
    pub fn token(&self) -> &str {
        match self {
            Coercion::Builtin(builtin) => builtin.token(),
            Coercion::Filter(name) => name,
        }
    }
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Filter over present values; absent values stay absent
pub type FilterFn = Arc<dyn Fn(&str) -> Result<ScalarValue, CoercionError> + Send + Sync>;

/// Filter that also sees absent values
pub type NullableFilterFn =
    Arc<dyn Fn(Option<&str>) -> Result<Option<ScalarValue>, CoercionError> + Send + Sync>;

#[derive(Clone)]
enum Filter {
    Present(FilterFn),
    Nullable(NullableFilterFn),
}

/// Built-in types plus caller-registered filters
#[derive(Clone, Default)]
pub struct CoercionRegistry {
    filters: FxHashMap<String, Filter>,
}

impl CoercionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter applied to present values
    ///
    /// Fails with [`MapperError::ReservedFilterName`] for built-in type
    /// names. Registering a name twice replaces the earlier filter.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F) -> MapperResult<()>
    where
        F: Fn(&str) -> Result<ScalarValue, CoercionError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Filter::Present(Arc::new(filter)))
    }

    /// Register a filter that also receives `None` when nothing matched
    pub fn register_nullable<F>(&mut self, name: impl Into<String>, filter: F) -> MapperResult<()>
    where
        F: Fn(Option<&str>) -> Result<Option<ScalarValue>, CoercionError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Filter::Nullable(Arc::new(filter)))
    }

    fn insert(&mut self, name: String, filter: Filter) -> MapperResult<()> {
        if BuiltinType::from_token(&name).is_some() {
            return Err(MapperError::ReservedFilterName { name });
        }
        if self.filters.insert(name.clone(), filter).is_some() {
            log::warn!("filter \"{name}\" registered twice, keeping the last registration");
        }
        Ok(())
    }

    pub fn is_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Resolve a type token to a built-in type or a registered filter
    pub fn resolve(&self, token: &str) -> Option<Coercion> {
        BuiltinType::from_token(token)
            .map(Coercion::Builtin)
            .or_else(|| {
                self.is_filter(token)
                    .then(|| Coercion::Filter(token.to_string()))
            })
    }

    /// Registered filter names, sorted
    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Convert an extracted value
    ///
    /// `None` stays `None` for built-ins and plain filters.
    pub fn coerce(
        &self,
        coercion: &Coercion,
        raw: Option<&str>,
    ) -> Result<Option<ScalarValue>, CoercionError> {
        match coercion {
            Coercion::Builtin(builtin) => raw.map(|value| builtin.coerce(value)).transpose(),
            Coercion::Filter(name) => match self.filters.get(name) {
                Some(Filter::Present(filter)) => raw.map(|value| filter(value)).transpose(),
                Some(Filter::Nullable(filter)) => filter(raw),
                None => Err(CoercionError::UnknownType {
                    type_token: name.clone(),
                }),
            },
        }
    }
}

impl fmt::Debug for CoercionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoercionRegistry")
            .field("filters", &self.filter_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_tokens() {
        for builtin in BuiltinType::ALL {
            assert_eq!(BuiltinType::from_token(builtin.token()), Some(builtin));
        }
        assert_eq!(BuiltinType::from_token("integer"), None);
    }

    #[test]
    fn test_bool_vocabulary() {
        for raw in ["true", "TRUE", "True", "1"] {
            assert_eq!(BuiltinType::Bool.coerce(raw), Ok(ScalarValue::Boolean(true)));
        }
        for raw in ["false", "False", "0"] {
            assert_eq!(BuiltinType::Bool.coerce(raw), Ok(ScalarValue::Boolean(false)));
        }
        assert_eq!(
            BuiltinType::Bool.coerce("yes"),
            Err(CoercionError::InvalidLiteral {
                type_token: "bool".to_string(),
                value: "yes".to_string()
            })
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(BuiltinType::Int.coerce("42"), Ok(ScalarValue::Integer(42)));
        assert_eq!(BuiltinType::Int.coerce("-7"), Ok(ScalarValue::Integer(-7)));
        assert!(BuiltinType::Int.coerce("4.2").is_err());
        assert!(BuiltinType::Int.coerce("").is_err());
        assert_eq!(BuiltinType::Float.coerce("2.5"), Ok(ScalarValue::Float(2.5)));
        assert_eq!(BuiltinType::Float.coerce("10"), Ok(ScalarValue::Float(10.0)));
        assert!(BuiltinType::Float.coerce("abc").is_err());
        assert!(matches!(
            BuiltinType::Float.coerce("inf"),
            Err(CoercionError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_null_passes_through_builtins_and_plain_filters() {
        let mut registry = CoercionRegistry::new();
        registry
            .register("upper", |s: &str| Ok(ScalarValue::String(s.to_uppercase())))
            .unwrap();
        for builtin in BuiltinType::ALL {
            assert_eq!(registry.coerce(&Coercion::Builtin(builtin), None), Ok(None));
        }
        let upper = registry.resolve("upper").unwrap();
        assert_eq!(registry.coerce(&upper, None), Ok(None));
        assert_eq!(
            registry.coerce(&upper, Some("abc")),
            Ok(Some(ScalarValue::from("ABC")))
        );
    }

    #[test]
    fn test_nullable_filter_sees_absent_values() {
        let mut registry = CoercionRegistry::new();
        registry
            .register_nullable("min_age", |s: Option<&str>| match s {
                None => Ok(Some(ScalarValue::Integer(0))),
                Some(v) => BuiltinType::Int.coerce(v).map(Some),
            })
            .unwrap();
        let min_age = registry.resolve("min_age").unwrap();
        assert_eq!(
            registry.coerce(&min_age, None),
            Ok(Some(ScalarValue::Integer(0)))
        );
        assert_eq!(
            registry.coerce(&min_age, Some("18")),
            Ok(Some(ScalarValue::Integer(18)))
        );
    }

    #[test]
    fn test_builtin_names_are_reserved() {
        let mut registry = CoercionRegistry::new();
        let err = registry
            .register("int", |s: &str| Ok(ScalarValue::from(s)))
            .unwrap_err();
        assert!(matches!(err, MapperError::ReservedFilterName { name } if name == "int"));
        assert!(!registry.is_filter("int"));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = CoercionRegistry::new();
        registry.register("f", |_: &str| Ok(ScalarValue::from("first"))).unwrap();
        registry.register("f", |_: &str| Ok(ScalarValue::from("second"))).unwrap();
        let f = registry.resolve("f").unwrap();
        assert_eq!(registry.coerce(&f, Some("x")), Ok(Some(ScalarValue::from("second"))));
        assert_eq!(registry.filter_names(), vec!["f"]);
    }

    #[test]
    fn test_resolve_prefers_builtins() {
        let registry = CoercionRegistry::new();
        assert_eq!(
            registry.resolve("float"),
            Some(Coercion::Builtin(BuiltinType::Float))
        );
        assert_eq!(registry.resolve("nope"), None);
        assert!(matches!(
            registry.coerce(&Coercion::Filter("nope".to_string()), Some("x")),
            Err(CoercionError::UnknownType { .. })
        ));
    }
}
