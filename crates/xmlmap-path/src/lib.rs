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

//! Location-path expressions over roxmltree documents
//!
//! This crate implements the subset of XPath 1.0 that mapping definitions
//! use to select elements and extract text or attribute values: location
//! paths with all common axes and predicates, the comparison, arithmetic
//! and union operators, and the core function library.
//!
//! ```
//! use xmlmap_path::{CompiledPath, PathValue, XmlNode};
//!
//! let doc = roxmltree::Document::parse(r#"<r><a id="1"/><a id="2"/></r>"#).unwrap();
//! let root = XmlNode::from(doc.root());
//!
//! let path = CompiledPath::compile("/r/a[@id = '2']").unwrap();
//! assert_eq!(path.select(root).unwrap().len(), 1);
//!
//! let count = CompiledPath::compile("count(//a)").unwrap();
//! assert_eq!(count.evaluate(root).unwrap(), PathValue::Number(2.0));
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod node;
pub mod pratt;
pub mod tokenizer;
pub mod value;

pub use ast::{Axis, BinaryOperator, Expr, LocationPath, NodeTest, Step};
pub use error::{PathError, PathResult};
pub use node::XmlNode;
pub use pratt::parse_expression;
pub use value::PathValue;

use evaluator::EvalContext;
use std::fmt;

/// A parsed expression together with its source text
///
/// Compiled paths are immutable and can be shared across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPath {
    source: String,
    expr: Expr,
}

impl CompiledPath {
    /// Parse an expression
    pub fn compile(source: &str) -> PathResult<Self> {
        let expr = parse_expression(source)?;
        log::trace!("compiled path expression '{source}'");
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// The expression text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed syntax tree
    pub fn expression(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate with `context` as the context node
    pub fn evaluate<'a, 'input>(
        &self,
        context: XmlNode<'a, 'input>,
    ) -> PathResult<PathValue<'a, 'input>> {
        evaluator::evaluate(&self.expr, &EvalContext::new(context))
    }

    /// Evaluate and require a node-set, returned in document order
    pub fn select<'a, 'input>(
        &self,
        context: XmlNode<'a, 'input>,
    ) -> PathResult<Vec<XmlNode<'a, 'input>>> {
        match self.evaluate(context)? {
            PathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(PathError::NotANodeSet {
                actual: other.type_name(),
            }),
        }
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
