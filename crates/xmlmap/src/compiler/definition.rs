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

//! Compiled form of the mapping grammar

use indexmap::IndexMap;
use xmlmap_path::CompiledPath;

use crate::registry::Coercion;

/// One compiled mapping: how matching elements become objects of a type
#[derive(Debug, Clone, PartialEq)]
pub struct MappingDefinition {
    /// Type name handed to the object factory
    pub type_name: String,
    /// Elements this mapping applies to, relative to its context
    pub match_path: CompiledPath,
    /// Identifier of each constructed object, if it can be referenced
    pub id_path: Option<CompiledPath>,
    /// Fields in declared order
    pub fields: IndexMap<String, AttributeSpec>,
}

/// How a single field obtains its value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSpec {
    /// Text or attribute content converted by a built-in type or filter
    Scalar {
        coercion: Coercion,
        path: CompiledPath,
    },
    /// Identifier of an object registered earlier in the same load
    Reference {
        target_type: String,
        path: CompiledPath,
    },
    /// Mapping applied to at most one element
    SingleNested(Box<MappingDefinition>),
    /// Mapping applied to every matching element
    ListNested(Box<MappingDefinition>),
}

impl AttributeSpec {
    /// Path evaluated for this field
    pub fn path(&self) -> &CompiledPath {
        match self {
            AttributeSpec::Scalar { path, .. } | AttributeSpec::Reference { path, .. } => path,
            AttributeSpec::SingleNested(definition) | AttributeSpec::ListNested(definition) => {
                &definition.match_path
            }
        }
    }

    pub fn nested(&self) -> Option<&MappingDefinition> {
        match self {
            AttributeSpec::SingleNested(definition) | AttributeSpec::ListNested(definition) => {
                Some(definition)
            }
            _ => None,
        }
    }
}

impl MappingDefinition {
    /// Whether constructed objects are registered for references
    pub fn is_referenceable(&self) -> bool {
        self.id_path.is_some()
    }

    /// This definition and every nested one, depth first in declared order
    pub fn walk(&self) -> Vec<&MappingDefinition> {
        let mut definitions = vec![self];
        for spec in self.fields.values() {
            if let Some(nested) = spec.nested() {
                definitions.extend(nested.walk());
            }
        }
        definitions
    }

    /// Type names referenced by fields of this definition tree
    pub fn referenced_types(&self) -> Vec<&str> {
        self.walk()
            .into_iter()
            .flat_map(|definition| definition.fields.values())
            .filter_map(|spec| match spec {
                AttributeSpec::Reference { target_type, .. } => Some(target_type.as_str()),
                _ => None,
            })
            .collect()
    }
}
