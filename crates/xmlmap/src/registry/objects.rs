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

//! Per-load object registry keyed by type name and identifier

use rustc_hash::FxHashMap;

/// Objects constructed so far in one load, for reference resolution
///
/// Keys are `(type name, identifier)`. Entries are never removed; inserting
/// an existing key replaces the entry.
#[derive(Debug, Clone)]
pub struct ObjectRegistry<T> {
    objects: FxHashMap<String, FxHashMap<String, T>>,
    len: usize,
}

impl<T> Default for ObjectRegistry<T> {
    fn default() -> Self {
        Self {
            objects: FxHashMap::default(),
            len: 0,
        }
    }
}

impl<T> ObjectRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, returning the one it replaces
    pub fn insert(&mut self, type_name: &str, identifier: &str, object: T) -> Option<T> {
        let previous = self
            .objects
            .entry(type_name.to_string())
            .or_default()
            .insert(identifier.to_string(), object);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn lookup(&self, type_name: &str, identifier: &str) -> Option<&T> {
        self.objects.get(type_name)?.get(identifier)
    }

    pub fn contains(&self, type_name: &str, identifier: &str) -> bool {
        self.lookup(type_name, identifier).is_some()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
