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

//! Core function library
//!
//! Arity is validated when an expression is compiled, so evaluation only
//! deals with argument types.

use crate::error::{PathError, PathResult};
use crate::evaluator::EvalContext;
use crate::node::XmlNode;
use crate::value::{PathValue, parse_number};

/// Name and accepted argument count of a core function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature {
    /// Function name
    pub name: &'static str,
    /// Minimum number of arguments
    pub min_args: usize,
    /// Maximum number of arguments, `None` for variadic functions
    pub max_args: Option<usize>,
}

const fn sig(name: &'static str, min_args: usize, max_args: Option<usize>) -> FunctionSignature {
    FunctionSignature {
        name,
        min_args,
        max_args,
    }
}

const FUNCTIONS: &[FunctionSignature] = &[
    // node-set functions
    sig("last", 0, Some(0)),
    sig("position", 0, Some(0)),
    sig("count", 1, Some(1)),
    sig("name", 0, Some(1)),
    sig("local-name", 0, Some(1)),
    // string functions
    sig("string", 0, Some(1)),
    sig("concat", 2, None),
    sig("starts-with", 2, Some(2)),
    sig("contains", 2, Some(2)),
    sig("substring-before", 2, Some(2)),
    sig("substring-after", 2, Some(2)),
    sig("substring", 2, Some(3)),
    sig("string-length", 0, Some(1)),
    sig("normalize-space", 0, Some(1)),
    sig("translate", 3, Some(3)),
    // boolean functions
    sig("not", 1, Some(1)),
    sig("true", 0, Some(0)),
    sig("false", 0, Some(0)),
    sig("boolean", 1, Some(1)),
    // number functions
    sig("number", 0, Some(1)),
    sig("sum", 1, Some(1)),
    sig("floor", 1, Some(1)),
    sig("ceiling", 1, Some(1)),
    sig("round", 1, Some(1)),
];

impl FunctionSignature {
    /// Human-readable arity, e.g. `1`, `0..1`, `2+`
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{}..{}", self.min_args, max),
            None => format!("{}+", self.min_args),
        }
    }

    fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }
}

/// Look up a core function by name
pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Validate a call site at compile time
pub fn check_call(name: &str, arg_count: usize) -> PathResult<()> {
    let signature = lookup(name).ok_or_else(|| PathError::UnknownFunction {
        name: name.to_string(),
    })?;
    if signature.accepts(arg_count) {
        Ok(())
    } else {
        Err(PathError::InvalidArity {
            name: name.to_string(),
            expected: signature.arity(),
            actual: arg_count,
        })
    }
}

/// Invoke a core function with evaluated arguments
pub(crate) fn call<'a, 'input>(
    name: &str,
    args: Vec<PathValue<'a, 'input>>,
    context: &EvalContext<'a, 'input>,
) -> PathResult<PathValue<'a, 'input>> {
    let value = match name {
        "last" => PathValue::Number(context.size as f64),
        "position" => PathValue::Number(context.position as f64),
        "count" => PathValue::Number(node_set_arg(&args, 0)?.len() as f64),
        "name" | "local-name" => {
            let node = match args.first() {
                Some(_) => node_set_arg(&args, 0)?.first().copied(),
                None => Some(context.node),
            };
            PathValue::String(
                node.map(|n| n.local_name().to_string())
                    .unwrap_or_default(),
            )
        }
        "string" => PathValue::String(string_or_context(&args, context)),
        "concat" => PathValue::String(args.iter().map(|a| a.to_xpath_string()).collect()),
        "starts-with" => {
            PathValue::Boolean(string_arg(&args, 0).starts_with(&string_arg(&args, 1)))
        }
        "contains" => PathValue::Boolean(string_arg(&args, 0).contains(&string_arg(&args, 1))),
        "substring-before" => {
            let (s, pattern) = (string_arg(&args, 0), string_arg(&args, 1));
            PathValue::String(
                s.find(&pattern)
                    .map(|i| s[..i].to_string())
                    .unwrap_or_default(),
            )
        }
        "substring-after" => {
            let (s, pattern) = (string_arg(&args, 0), string_arg(&args, 1));
            PathValue::String(
                s.find(&pattern)
                    .map(|i| s[i + pattern.len()..].to_string())
                    .unwrap_or_default(),
            )
        }
        "substring" => {
            let length = args.get(2).map(|a| a.to_number());
            PathValue::String(substring(
                &string_arg(&args, 0),
                number_arg(&args, 1),
                length,
            ))
        }
        "string-length" => {
            PathValue::Number(string_or_context(&args, context).chars().count() as f64)
        }
        "normalize-space" => PathValue::String(
            string_or_context(&args, context)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        ),
        "translate" => PathValue::String(translate(
            &string_arg(&args, 0),
            &string_arg(&args, 1),
            &string_arg(&args, 2),
        )),
        "not" => PathValue::Boolean(!boolean_arg(&args, 0)),
        "true" => PathValue::Boolean(true),
        "false" => PathValue::Boolean(false),
        "boolean" => PathValue::Boolean(boolean_arg(&args, 0)),
        "number" => PathValue::Number(match args.first() {
            Some(arg) => arg.to_number(),
            None => parse_number(&context.node.string_value()),
        }),
        "sum" => PathValue::Number(
            node_set_arg(&args, 0)?
                .iter()
                .map(|n| parse_number(&n.string_value()))
                .sum(),
        ),
        "floor" => PathValue::Number(number_arg(&args, 0).floor()),
        "ceiling" => PathValue::Number(number_arg(&args, 0).ceil()),
        "round" => PathValue::Number(round(number_arg(&args, 0))),
        other => {
            return Err(PathError::UnknownFunction {
                name: other.to_string(),
            });
        }
    };
    Ok(value)
}

fn node_set_arg<'v, 'a, 'input>(
    args: &'v [PathValue<'a, 'input>],
    index: usize,
) -> PathResult<&'v [XmlNode<'a, 'input>]> {
    match args.get(index) {
        Some(PathValue::NodeSet(nodes)) => Ok(nodes),
        Some(other) => Err(PathError::NotANodeSet {
            actual: other.type_name(),
        }),
        None => Ok(&[]),
    }
}

fn string_arg(args: &[PathValue<'_, '_>], index: usize) -> String {
    args.get(index)
        .map(|a| a.to_xpath_string())
        .unwrap_or_default()
}

fn number_arg(args: &[PathValue<'_, '_>], index: usize) -> f64 {
    args.get(index).map(|a| a.to_number()).unwrap_or(f64::NAN)
}

fn boolean_arg(args: &[PathValue<'_, '_>], index: usize) -> bool {
    args.get(index).is_some_and(|a| a.to_boolean())
}

fn string_or_context(args: &[PathValue<'_, '_>], context: &EvalContext<'_, '_>) -> String {
    match args.first() {
        Some(arg) => arg.to_xpath_string(),
        None => context.node.string_value(),
    }
}

fn round(n: f64) -> f64 {
    if n.is_finite() { (n + 0.5).floor() } else { n }
}

fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = round(start);
    let end = match length {
        Some(length) => first + round(length),
        None => f64::INFINITY,
    };
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= first && position < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn translate(s: &str, from: &str, to: &str) -> String {
    let replacements: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.chars().position(|f| f == c) {
            Some(index) => replacements.get(index).copied(),
            None => Some(c),
        })
        .collect()
}
