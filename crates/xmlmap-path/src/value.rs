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

//! Values produced by location-path evaluation

use crate::node::XmlNode;

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum PathValue<'a, 'input> {
    /// Nodes in document order, without duplicates
    NodeSet(Vec<XmlNode<'a, 'input>>),
    /// String value
    String(String),
    /// IEEE 754 double
    Number(f64),
    /// Boolean value
    Boolean(bool),
}

impl<'a, 'input> PathValue<'a, 'input> {
    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PathValue::NodeSet(_) => "node-set",
            PathValue::String(_) => "string",
            PathValue::Number(_) => "number",
            PathValue::Boolean(_) => "boolean",
        }
    }

    /// `string()` conversion; a node-set yields the string-value of its
    /// first node, or the empty string
    pub fn to_xpath_string(&self) -> String {
        match self {
            PathValue::NodeSet(nodes) => nodes
                .first()
                .map(|node| node.string_value())
                .unwrap_or_default(),
            PathValue::String(s) => s.clone(),
            PathValue::Number(n) => format_number(*n),
            PathValue::Boolean(b) => b.to_string(),
        }
    }

    /// `number()` conversion
    pub fn to_number(&self) -> f64 {
        match self {
            PathValue::Number(n) => *n,
            PathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            PathValue::String(s) => parse_number(s),
            PathValue::NodeSet(_) => parse_number(&self.to_xpath_string()),
        }
    }

    /// `boolean()` conversion
    pub fn to_boolean(&self) -> bool {
        match self {
            PathValue::NodeSet(nodes) => !nodes.is_empty(),
            PathValue::String(s) => !s.is_empty(),
            PathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            PathValue::Boolean(b) => *b,
        }
    }

    /// Borrow the nodes of a node-set
    pub fn as_node_set(&self) -> Option<&[XmlNode<'a, 'input>]> {
        match self {
            PathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// Format a number the way `string()` does: integers without a fractional
/// part, `NaN` and `Infinity` spelled out
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        // also folds -0 into "0"
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Parse a string the way `number()` does: optional whitespace, optional
/// minus, digits with an optional fraction; anything else is NaN
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}
