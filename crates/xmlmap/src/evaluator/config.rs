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

//! Mapper configuration

use roxmltree::ParsingOptions;

/// What to do when two objects of one type share an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateIdPolicy {
    /// Keep the later object and log a warning
    #[default]
    Overwrite,
    /// Fail the load with [`crate::MapperError::DuplicateIdentifier`]
    Reject,
}

/// Mapper configuration
///
/// # Examples
///
/// ```rust
/// use xmlmap::{DuplicateIdPolicy, MapperConfig};
///
/// let config = MapperConfig::default()
///     .with_duplicate_ids(DuplicateIdPolicy::Reject)
///     .with_nodes_limit(100_000);
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// Handling of duplicate `(type, id)` registrations. Default: overwrite
    pub duplicate_ids: DuplicateIdPolicy,

    /// Strip surrounding whitespace from extracted strings. Default: true
    pub trim_whitespace: bool,

    /// Accept documents with a DTD. Default: false
    pub allow_dtd: bool,

    /// Maximum number of nodes the XML parser accepts. Default: no limit
    pub nodes_limit: u32,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicate_ids(mut self, policy: DuplicateIdPolicy) -> Self {
        self.duplicate_ids = policy;
        self
    }

    pub fn with_trim_whitespace(mut self, enabled: bool) -> Self {
        self.trim_whitespace = enabled;
        self
    }

    pub fn with_allow_dtd(mut self, enabled: bool) -> Self {
        self.allow_dtd = enabled;
        self
    }

    pub fn with_nodes_limit(mut self, limit: u32) -> Self {
        self.nodes_limit = limit;
        self
    }

    /// Strict configuration: duplicate identifiers are errors
    pub fn strict() -> Self {
        Self::default().with_duplicate_ids(DuplicateIdPolicy::Reject)
    }

    /// XML parser options derived from this configuration
    pub fn parsing_options(&self) -> ParsingOptions {
        ParsingOptions {
            allow_dtd: self.allow_dtd,
            nodes_limit: self.nodes_limit,
        }
    }

    /// Check for settings likely to cause surprising loads
    ///
    /// # Returns
    /// * `Vec<String>` - List of validation warnings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.nodes_limit < 16 {
            warnings.push(format!(
                "nodes_limit is very low ({}) - most documents will be rejected",
                self.nodes_limit
            ));
        }

        if self.allow_dtd {
            warnings.push("allow_dtd is enabled - entity declarations in input will be expanded".to_string());
        }

        if !self.trim_whitespace {
            warnings.push(
                "trim_whitespace is disabled - int, float and bool values with surrounding whitespace will fail to coerce"
                    .to_string(),
            );
        }

        warnings
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            duplicate_ids: DuplicateIdPolicy::Overwrite,
            trim_whitespace: true,
            allow_dtd: false,
            nodes_limit: u32::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MapperConfig::default();
        assert_eq!(config.duplicate_ids, DuplicateIdPolicy::Overwrite);
        assert!(config.trim_whitespace);
        assert!(!config.allow_dtd);
        assert_eq!(config.nodes_limit, u32::MAX);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let config = MapperConfig::new()
            .with_trim_whitespace(false)
            .with_allow_dtd(true)
            .with_nodes_limit(10);
        assert!(!config.trim_whitespace);
        assert_eq!(config.validate().len(), 3);

        let options = config.parsing_options();
        assert!(options.allow_dtd);
        assert_eq!(options.nodes_limit, 10);
    }

    #[test]
    fn test_strict() {
        assert_eq!(MapperConfig::strict().duplicate_ids, DuplicateIdPolicy::Reject);
    }
}
