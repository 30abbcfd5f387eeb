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

//! Tree-walking evaluator for compiled expressions

use crate::ast::{Axis, BinaryOperator, Expr, LocationPath, NodeTest, Step};
use crate::error::{PathError, PathResult};
use crate::functions;
use crate::node::{XmlNode, sort_document_order};
use crate::value::PathValue;
use std::iter::successors;

/// Dynamic context: the context node with its proximity position and size
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a, 'input> {
    /// Context node
    pub node: XmlNode<'a, 'input>,
    /// 1-based proximity position
    pub position: usize,
    /// Size of the context node list
    pub size: usize,
}

impl<'a, 'input> EvalContext<'a, 'input> {
    /// Context for a single node (position 1 of 1)
    pub fn new(node: XmlNode<'a, 'input>) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
        }
    }
}

/// Evaluate an expression in the given context
pub fn evaluate<'a, 'input>(
    expr: &Expr,
    context: &EvalContext<'a, 'input>,
) -> PathResult<PathValue<'a, 'input>> {
    match expr {
        Expr::Literal(s) => Ok(PathValue::String(s.clone())),
        Expr::Number(n) => Ok(PathValue::Number(*n)),
        Expr::Path(path) => evaluate_path(path, context.node).map(PathValue::NodeSet),
        Expr::Function { name, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, context))
                .collect::<PathResult<Vec<_>>>()?;
            functions::call(name, values, context)
        }
        Expr::Negate(operand) => Ok(PathValue::Number(-evaluate(operand, context)?.to_number())),
        Expr::Binary { op, left, right } => evaluate_binary(*op, left, right, context),
        Expr::Filter {
            primary,
            predicates,
            steps,
        } => {
            let mut nodes = match evaluate(primary, context)? {
                PathValue::NodeSet(nodes) => nodes,
                other => {
                    return Err(PathError::NotANodeSet {
                        actual: other.type_name(),
                    });
                }
            };
            for predicate in predicates {
                nodes = apply_predicate(nodes, predicate)?;
            }
            if !steps.is_empty() {
                nodes = evaluate_steps(nodes, steps)?;
            }
            Ok(PathValue::NodeSet(nodes))
        }
    }
}

fn evaluate_path<'a, 'input>(
    path: &LocationPath,
    node: XmlNode<'a, 'input>,
) -> PathResult<Vec<XmlNode<'a, 'input>>> {
    let start = if path.absolute {
        node.document_root()
    } else {
        node
    };
    evaluate_steps(vec![start], &path.steps)
}

fn evaluate_steps<'a, 'input>(
    mut nodes: Vec<XmlNode<'a, 'input>>,
    steps: &[Step],
) -> PathResult<Vec<XmlNode<'a, 'input>>> {
    for step in steps {
        let mut selected = Vec::new();
        for node in &nodes {
            let mut candidates: Vec<_> = axis_nodes(*node, step.axis)
                .into_iter()
                .filter(|candidate| matches_test(candidate, step.axis, &step.test))
                .collect();
            for predicate in &step.predicates {
                candidates = apply_predicate(candidates, predicate)?;
            }
            selected.extend(candidates);
        }
        sort_document_order(&mut selected);
        nodes = selected;
    }
    Ok(nodes)
}

/// Filter nodes by a predicate; a numeric result selects by position
fn apply_predicate<'a, 'input>(
    nodes: Vec<XmlNode<'a, 'input>>,
    predicate: &Expr,
) -> PathResult<Vec<XmlNode<'a, 'input>>> {
    let size = nodes.len();
    let mut kept = Vec::with_capacity(size);
    for (index, node) in nodes.into_iter().enumerate() {
        let context = EvalContext {
            node,
            position: index + 1,
            size,
        };
        let keep = match evaluate(predicate, &context)? {
            PathValue::Number(n) => n == (index + 1) as f64,
            other => other.to_boolean(),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}

/// Nodes on an axis, in axis order (nearest first for reverse axes)
fn axis_nodes<'a, 'input>(node: XmlNode<'a, 'input>, axis: Axis) -> Vec<XmlNode<'a, 'input>> {
    match (axis, node) {
        (Axis::SelfAxis, _) => vec![node],
        (Axis::Parent, _) => node.parent().into_iter().collect(),
        (Axis::Ancestor, _) => successors(node.parent(), |n| n.parent()).collect(),
        (Axis::AncestorOrSelf, _) => successors(Some(node), |n| n.parent()).collect(),
        (Axis::DescendantOrSelf, XmlNode::Attribute { .. }) => vec![node],
        (_, XmlNode::Attribute { .. }) => Vec::new(),
        (Axis::Child, XmlNode::Tree(n)) => n.children().map(XmlNode::Tree).collect(),
        (Axis::Descendant, XmlNode::Tree(n)) => {
            n.descendants().skip(1).map(XmlNode::Tree).collect()
        }
        (Axis::DescendantOrSelf, XmlNode::Tree(n)) => n.descendants().map(XmlNode::Tree).collect(),
        (Axis::FollowingSibling, XmlNode::Tree(n)) => {
            n.next_siblings().skip(1).map(XmlNode::Tree).collect()
        }
        (Axis::PrecedingSibling, XmlNode::Tree(n)) => {
            n.prev_siblings().skip(1).map(XmlNode::Tree).collect()
        }
        (Axis::Attribute, XmlNode::Tree(n)) => {
            if n.is_element() {
                (0..n.attributes().len())
                    .map(|index| XmlNode::Attribute { owner: n, index })
                    .collect()
            } else {
                Vec::new()
            }
        }
    }
}

/// Whether the node has the principal node type of the axis
fn is_principal(node: &XmlNode<'_, '_>, axis: Axis) -> bool {
    if axis == Axis::Attribute {
        node.is_attribute()
    } else {
        node.is_element()
    }
}

fn matches_test(node: &XmlNode<'_, '_>, axis: Axis, test: &NodeTest) -> bool {
    match test {
        NodeTest::Name(name) => is_principal(node, axis) && node.local_name() == name,
        NodeTest::Wildcard => is_principal(node, axis),
        NodeTest::Text => matches!(node, XmlNode::Tree(n) if n.is_text()),
        NodeTest::Comment => matches!(node, XmlNode::Tree(n) if n.is_comment()),
        NodeTest::ProcessingInstruction => matches!(node, XmlNode::Tree(n) if n.is_pi()),
        NodeTest::Node => true,
    }
}

fn evaluate_binary<'a, 'input>(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    context: &EvalContext<'a, 'input>,
) -> PathResult<PathValue<'a, 'input>> {
    match op {
        BinaryOperator::Or => Ok(PathValue::Boolean(
            evaluate(left, context)?.to_boolean() || evaluate(right, context)?.to_boolean(),
        )),
        BinaryOperator::And => Ok(PathValue::Boolean(
            evaluate(left, context)?.to_boolean() && evaluate(right, context)?.to_boolean(),
        )),
        BinaryOperator::Union => {
            let (left, right) = (evaluate(left, context)?, evaluate(right, context)?);
            match (left, right) {
                (PathValue::NodeSet(mut nodes), PathValue::NodeSet(more)) => {
                    nodes.extend(more);
                    sort_document_order(&mut nodes);
                    Ok(PathValue::NodeSet(nodes))
                }
                (PathValue::NodeSet(_), other) | (other, _) => Err(PathError::NotANodeSet {
                    actual: other.type_name(),
                }),
            }
        }
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => {
            let (left, right) = (evaluate(left, context)?, evaluate(right, context)?);
            Ok(PathValue::Boolean(compare(op, &left, &right)))
        }
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => {
            let a = evaluate(left, context)?.to_number();
            let b = evaluate(right, context)?.to_number();
            Ok(PathValue::Number(match op {
                BinaryOperator::Add => a + b,
                BinaryOperator::Subtract => a - b,
                BinaryOperator::Multiply => a * b,
                BinaryOperator::Divide => a / b,
                _ => a % b,
            }))
        }
    }
}

/// Comparison with node-set existential semantics
fn compare(op: BinaryOperator, left: &PathValue<'_, '_>, right: &PathValue<'_, '_>) -> bool {
    match (left, right) {
        (PathValue::NodeSet(lhs), PathValue::NodeSet(rhs)) => {
            let rhs: Vec<PathValue<'_, '_>> = rhs
                .iter()
                .map(|n| PathValue::String(n.string_value()))
                .collect();
            lhs.iter().any(|a| {
                let a = PathValue::String(a.string_value());
                rhs.iter().any(|b| compare_atomic(op, &a, b))
            })
        }
        (PathValue::NodeSet(nodes), PathValue::Boolean(_)) => {
            compare_atomic(op, &PathValue::Boolean(!nodes.is_empty()), right)
        }
        (PathValue::Boolean(_), PathValue::NodeSet(nodes)) => {
            compare_atomic(op, left, &PathValue::Boolean(!nodes.is_empty()))
        }
        (PathValue::NodeSet(nodes), other) => nodes
            .iter()
            .any(|n| compare_atomic(op, &PathValue::String(n.string_value()), other)),
        (other, PathValue::NodeSet(nodes)) => nodes
            .iter()
            .any(|n| compare_atomic(op, other, &PathValue::String(n.string_value()))),
        _ => compare_atomic(op, left, right),
    }
}

fn compare_atomic(op: BinaryOperator, left: &PathValue<'_, '_>, right: &PathValue<'_, '_>) -> bool {
    match op {
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            let booleans =
                matches!(left, PathValue::Boolean(_)) || matches!(right, PathValue::Boolean(_));
            let numbers =
                matches!(left, PathValue::Number(_)) || matches!(right, PathValue::Number(_));
            let equal = if booleans {
                left.to_boolean() == right.to_boolean()
            } else if numbers {
                left.to_number() == right.to_number()
            } else {
                left.to_xpath_string() == right.to_xpath_string()
            };
            (op == BinaryOperator::Equal) == equal
        }
        _ => {
            let (a, b) = (left.to_number(), right.to_number());
            match op {
                BinaryOperator::LessThan => a < b,
                BinaryOperator::LessThanOrEqual => a <= b,
                BinaryOperator::GreaterThan => a > b,
                _ => a >= b,
            }
        }
    }
}
