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

//! Pratt parser for location-path expressions

use crate::ast::{Axis, BinaryOperator, Expr, LocationPath, NodeTest, Predicates, Step};
use crate::error::{PathError, PathResult};
use crate::functions;
use crate::tokenizer::{Spanned, Token, Tokenizer};

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence, used to start a full expression
    Lowest = 0,
    /// Logical OR
    Or = 1,
    /// Logical AND
    And = 2,
    /// Equality operators (=, !=)
    Equality = 3,
    /// Relational operators (<, <=, >, >=)
    Relational = 4,
    /// Additive operators (+, -)
    Additive = 5,
    /// Multiplicative operators (*, div, mod)
    Multiplicative = 6,
    /// Unary minus
    Unary = 7,
    /// Union operator (|)
    Union = 8,
}

impl Precedence {
    /// Convert precedence to raw u8 for fast comparison
    #[inline(always)]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

fn binary_operator(token: &Token<'_>) -> Option<(BinaryOperator, Precedence)> {
    Some(match token {
        Token::Or => (BinaryOperator::Or, Precedence::Or),
        Token::And => (BinaryOperator::And, Precedence::And),
        Token::Equal => (BinaryOperator::Equal, Precedence::Equality),
        Token::NotEqual => (BinaryOperator::NotEqual, Precedence::Equality),
        Token::LessThan => (BinaryOperator::LessThan, Precedence::Relational),
        Token::LessThanOrEqual => (BinaryOperator::LessThanOrEqual, Precedence::Relational),
        Token::GreaterThan => (BinaryOperator::GreaterThan, Precedence::Relational),
        Token::GreaterThanOrEqual => (BinaryOperator::GreaterThanOrEqual, Precedence::Relational),
        Token::Plus => (BinaryOperator::Add, Precedence::Additive),
        Token::Minus => (BinaryOperator::Subtract, Precedence::Additive),
        Token::Multiply => (BinaryOperator::Multiply, Precedence::Multiplicative),
        Token::Div => (BinaryOperator::Divide, Precedence::Multiplicative),
        Token::Mod => (BinaryOperator::Modulo, Precedence::Multiplicative),
        Token::Pipe => (BinaryOperator::Union, Precedence::Union),
        _ => return None,
    })
}

/// Parse an expression into its syntax tree
pub fn parse_expression(input: &str) -> PathResult<Expr> {
    let tokens = Tokenizer::new(input).tokenize_all()?;
    if tokens.is_empty() {
        return Err(PathError::parse_error(0, "Empty expression"));
    }
    let mut parser = Parser {
        tokens,
        position: 0,
        input_len: input.len(),
    };
    let expr = parser.parse_expr(Precedence::Lowest.as_u8())?;
    match parser.peek() {
        Some(token) => Err(PathError::parse_error(
            token.start,
            format!("Unexpected {}", token.value.describe()),
        )),
        None => Ok(expr),
    }
}

struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    position: usize,
    input_len: usize,
}

impl<'input> Parser<'input> {
    fn parse_expr(&mut self, min_precedence: u8) -> PathResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((op, precedence)) = self.peek().and_then(|t| binary_operator(&t.value)) {
            if precedence.as_u8() < min_precedence {
                break;
            }
            self.position += 1;
            // left associative: the right operand binds one level tighter
            let right = self.parse_expr(precedence.as_u8() + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PathResult<Expr> {
        if self.check(&Token::Minus) {
            self.position += 1;
            let operand = self.parse_expr(Precedence::Unary.as_u8())?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.parse_path_expr()
    }

    fn parse_path_expr(&mut self) -> PathResult<Expr> {
        let token = self.current()?;
        match token.value {
            Token::Slash => {
                self.position += 1;
                let steps = if self.at_step_start() {
                    self.parse_relative_steps()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path(LocationPath {
                    absolute: true,
                    steps,
                }))
            }
            Token::DoubleSlash => {
                self.position += 1;
                let mut steps = vec![Step::descendant_or_self()];
                steps.extend(self.parse_relative_steps()?);
                Ok(Expr::Path(LocationPath {
                    absolute: true,
                    steps,
                }))
            }
            Token::Literal(_) | Token::Number(_) | Token::LeftParen => self.parse_filter_expr(),
            Token::Name(name)
                if self.peek_at(1).map(|t| &t.value) == Some(&Token::LeftParen)
                    && NodeTest::from_node_type(name).is_none() =>
            {
                self.parse_filter_expr()
            }
            _ if self.at_step_start() => Ok(Expr::Path(LocationPath {
                absolute: false,
                steps: self.parse_relative_steps()?,
            })),
            other => Err(PathError::parse_error(
                token.start,
                format!("Unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_filter_expr(&mut self) -> PathResult<Expr> {
        let primary = self.parse_primary()?;
        let mut predicates = Vec::new();
        while self.check(&Token::LeftBracket) {
            predicates.push(self.parse_predicate()?);
        }
        let mut steps = Vec::new();
        self.parse_step_continuation(&mut steps)?;
        if predicates.is_empty() && steps.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            })
        }
    }

    fn parse_primary(&mut self) -> PathResult<Expr> {
        let token = self.current()?;
        self.position += 1;
        match token.value {
            Token::Literal(s) => Ok(Expr::Literal(s.to_string())),
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::LeftParen => {
                let expr = self.parse_expr(Precedence::Lowest.as_u8())?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Token::Name(name) => {
                self.expect(&Token::LeftParen)?;
                let mut args = Vec::new();
                if !self.check(&Token::RightParen) {
                    loop {
                        args.push(self.parse_expr(Precedence::Lowest.as_u8())?);
                        if self.check(&Token::Comma) {
                            self.position += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Token::RightParen)?;
                functions::check_call(name, args.len())?;
                Ok(Expr::Function {
                    name: name.to_string(),
                    args,
                })
            }
            other => Err(PathError::parse_error(
                token.start,
                format!("Unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_relative_steps(&mut self) -> PathResult<Vec<Step>> {
        let mut steps = vec![self.parse_step()?];
        self.parse_step_continuation(&mut steps)?;
        Ok(steps)
    }

    /// Parse any `/step` or `//step` suffixes
    fn parse_step_continuation(&mut self, steps: &mut Vec<Step>) -> PathResult<()> {
        loop {
            if self.check(&Token::Slash) {
                self.position += 1;
                steps.push(self.parse_step()?);
            } else if self.check(&Token::DoubleSlash) {
                self.position += 1;
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(());
            }
        }
    }

    fn parse_step(&mut self) -> PathResult<Step> {
        let token = self.current()?;
        let (axis, test) = match token.value {
            Token::Dot => {
                self.position += 1;
                (Axis::SelfAxis, NodeTest::Node)
            }
            Token::DotDot => {
                self.position += 1;
                (Axis::Parent, NodeTest::Node)
            }
            Token::At => {
                self.position += 1;
                (Axis::Attribute, self.parse_node_test()?)
            }
            Token::Name(name)
                if self.peek_at(1).map(|t| &t.value) == Some(&Token::ColonColon) =>
            {
                let axis = Axis::from_name(name).ok_or_else(|| PathError::UnknownAxis {
                    name: name.to_string(),
                })?;
                self.position += 2;
                (axis, self.parse_node_test()?)
            }
            _ => (Axis::Child, self.parse_node_test()?),
        };

        let mut predicates = Predicates::new();
        while self.check(&Token::LeftBracket) {
            predicates.push(self.parse_predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> PathResult<NodeTest> {
        let token = self.current()?;
        match token.value {
            Token::Star => {
                self.position += 1;
                Ok(NodeTest::Wildcard)
            }
            Token::Name(name) => {
                self.position += 1;
                let node_type = NodeTest::from_node_type(name)
                    .filter(|_| self.check(&Token::LeftParen));
                match node_type {
                    Some(test) => {
                        self.position += 1;
                        if test == NodeTest::ProcessingInstruction
                            && matches!(self.peek().map(|t| &t.value), Some(Token::Literal(_)))
                        {
                            self.position += 1;
                        }
                        self.expect(&Token::RightParen)?;
                        Ok(test)
                    }
                    // prefixes are not resolved; only the local part is compared
                    None => Ok(NodeTest::Name(
                        name.rsplit_once(':')
                            .map(|(_, local)| local)
                            .unwrap_or(name)
                            .to_string(),
                    )),
                }
            }
            other => Err(PathError::parse_error(
                token.start,
                format!("Expected a node test, found {}", other.describe()),
            )),
        }
    }

    fn parse_predicate(&mut self) -> PathResult<Expr> {
        self.expect(&Token::LeftBracket)?;
        let expr = self.parse_expr(Precedence::Lowest.as_u8())?;
        self.expect(&Token::RightBracket)?;
        Ok(expr)
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.value),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.position + offset)
    }

    /// Current token, or an error at end of input
    fn current(&self) -> PathResult<Spanned<Token<'input>>> {
        self.peek()
            .cloned()
            .ok_or_else(|| PathError::parse_error(self.input_len, "Unexpected end of expression"))
    }

    fn check(&self, expected: &Token<'_>) -> bool {
        self.peek().is_some_and(|t| &t.value == expected)
    }

    fn expect(&mut self, expected: &Token<'_>) -> PathResult<()> {
        match self.peek() {
            Some(token) if &token.value == expected => {
                self.position += 1;
                Ok(())
            }
            Some(token) => Err(PathError::parse_error(
                token.start,
                format!(
                    "Expected {}, found {}",
                    expected.describe(),
                    token.value.describe()
                ),
            )),
            None => Err(PathError::parse_error(
                self.input_len,
                format!("Expected {}, found end of expression", expected.describe()),
            )),
        }
    }
}
