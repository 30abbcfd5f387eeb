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

//! Error types for location-path compilation and evaluation

use thiserror::Error;

/// Result type alias for location-path operations
pub type PathResult<T> = std::result::Result<T, PathError>;

/// Errors raised while compiling or evaluating a location path
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    /// Syntax error in the expression text
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte offset in the expression where the error was detected
        position: usize,
        /// Human-readable error message
        message: String,
    },

    /// Call to a function outside the supported core library
    #[error("Unknown function: {name}")]
    UnknownFunction {
        /// Name of the unknown function
        name: String,
    },

    /// Function called with the wrong number of arguments
    #[error("Function '{name}' expects {expected} arguments, got {actual}")]
    InvalidArity {
        /// Function name
        name: String,
        /// Accepted argument count, e.g. `1`, `0..1` or `2+`
        expected: String,
        /// Number of arguments supplied
        actual: usize,
    },

    /// Axis name that is not part of the supported language
    #[error("Unknown axis: {name}")]
    UnknownAxis {
        /// Axis name as written
        name: String,
    },

    /// A node-set was required but the expression produced another type
    #[error("Expected a node-set, got {actual}")]
    NotANodeSet {
        /// Type name of the value actually produced
        actual: &'static str,
    },
}

impl PathError {
    /// Create a parse error at the given byte offset
    pub fn parse_error(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Whether the error was raised before any document was touched
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnknownFunction { .. }
                | Self::InvalidArity { .. }
                | Self::UnknownAxis { .. }
        )
    }
}
