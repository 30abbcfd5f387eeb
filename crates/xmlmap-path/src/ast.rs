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

//! Abstract syntax tree for location-path expressions

use smallvec::SmallVec;
use std::fmt;

/// Predicates attached to a step; most steps carry none or one
pub type Predicates = SmallVec<[Expr; 1]>;

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String literal
    Literal(String),
    /// Numeric literal
    Number(f64),
    /// Location path, absolute or relative to the context node
    Path(LocationPath),
    /// Core library function call
    Function {
        /// Function name
        name: String,
        /// Argument expressions
        args: Vec<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOperator,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary minus
    Negate(Box<Expr>),
    /// Primary expression with predicates and/or a trailing relative path,
    /// e.g. `(a | b)[1]/c`
    Filter {
        /// Filtered primary expression
        primary: Box<Expr>,
        /// Predicates applied in document order
        predicates: Vec<Expr>,
        /// Steps evaluated from each selected node
        steps: Vec<Step>,
    },
}

/// Location path: a sequence of steps
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Whether the path starts at the document node
    pub absolute: bool,
    /// Steps in evaluation order
    pub steps: Vec<Step>,
}

/// One location step: `axis::node-test[predicate]*`
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Navigation axis
    pub axis: Axis,
    /// Node test applied to the nodes on the axis
    pub test: NodeTest,
    /// Predicates, evaluated with axis-order proximity positions
    pub predicates: Predicates,
}

impl Step {
    /// Create a step without predicates
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Predicates::new(),
        }
    }

    /// The `descendant-or-self::node()` step that `//` abbreviates
    pub fn descendant_or_self() -> Self {
        Self::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

/// Supported axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `child::` (default)
    Child,
    /// `descendant::`
    Descendant,
    /// `descendant-or-self::`
    DescendantOrSelf,
    /// `parent::` (`..`)
    Parent,
    /// `ancestor::`
    Ancestor,
    /// `ancestor-or-self::`
    AncestorOrSelf,
    /// `following-sibling::`
    FollowingSibling,
    /// `preceding-sibling::`
    PrecedingSibling,
    /// `attribute::` (`@`)
    Attribute,
    /// `self::` (`.`)
    SelfAxis,
}

impl Axis {
    /// Resolve an axis by its written name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            _ => return None,
        })
    }

    /// Reverse axes number their proximity positions nearest-first
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling
        )
    }
}

/// Node test of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Name test; only the local part is compared
    Name(String),
    /// `*`: any node of the axis' principal type
    Wildcard,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()`
    ProcessingInstruction,
    /// `node()`
    Node,
}

impl NodeTest {
    /// Resolve a node-type test name (the name before `()`)
    pub fn from_node_type(name: &str) -> Option<Self> {
        Some(match name {
            "text" => NodeTest::Text,
            "comment" => NodeTest::Comment,
            "processing-instruction" => NodeTest::ProcessingInstruction,
            "node" => NodeTest::Node,
            _ => return None,
        })
    }
}

/// Binary operators in ascending precedence groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `or`
    Or,
    /// `and`
    And,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `div`
    Divide,
    /// `mod`
    Modulo,
    /// `|`
    Union,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Or => "or",
            BinaryOperator::And => "and",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "div",
            BinaryOperator::Modulo => "mod",
            BinaryOperator::Union => "|",
        };
        f.write_str(symbol)
    }
}
