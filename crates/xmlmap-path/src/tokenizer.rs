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

//! Tokenizer for location-path expressions
//!
//! Produces zero-copy tokens over the expression text. The lexical
//! disambiguation rule of XPath 1.0 is applied here: when the previous token
//! can end an operand, `*` is the multiplication operator and the names
//! `and`, `or`, `div` and `mod` are operators; otherwise they are name tests.

use super::error::{PathError, PathResult};

/// Token with zero-copy string slices
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    /// String literal without its quotes (e.g. `"image/jpeg"`)
    Literal(&'input str),
    /// Numeric literal
    Number(f64),
    /// Name, possibly prefixed (e.g. `title`, `xlink:href`, `count`)
    Name(&'input str),

    /// Path separator (/)
    Slash,
    /// Abbreviated descendant-or-self step (//)
    DoubleSlash,
    /// Abbreviated self step (.)
    Dot,
    /// Abbreviated parent step (..)
    DotDot,
    /// Abbreviated attribute axis (@)
    At,
    /// Argument separator (,)
    Comma,
    /// Axis separator (::)
    ColonColon,
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Union operator (|)
    Pipe,
    /// Addition operator (+)
    Plus,
    /// Subtraction or negation operator (-)
    Minus,
    /// Wildcard name test (*)
    Star,
    /// Multiplication operator (*)
    Multiply,
    /// Equality operator (=)
    Equal,
    /// Inequality operator (!=)
    NotEqual,
    /// Less than operator (<)
    LessThan,
    /// Less than or equal operator (<=)
    LessThanOrEqual,
    /// Greater than operator (>)
    GreaterThan,
    /// Greater than or equal operator (>=)
    GreaterThanOrEqual,
    /// Logical AND operator (and keyword)
    And,
    /// Logical OR operator (or keyword)
    Or,
    /// Division operator (div keyword)
    Div,
    /// Modulo operator (mod keyword)
    Mod,
}

impl<'input> Token<'input> {
    /// Get the name if this token is a name
    pub fn as_name(&self) -> Option<&'input str> {
        match self {
            Token::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Whether a `*` or operator name following this token is an operator
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Token::At
                | Token::ColonColon
                | Token::LeftParen
                | Token::LeftBracket
                | Token::Comma
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Multiply
                | Token::Equal
                | Token::NotEqual
                | Token::LessThan
                | Token::LessThanOrEqual
                | Token::GreaterThan
                | Token::GreaterThanOrEqual
                | Token::And
                | Token::Or
                | Token::Div
                | Token::Mod
        )
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Literal(s) => format!("literal \"{s}\""),
            Token::Number(n) => format!("number {n}"),
            Token::Name(n) => format!("name '{n}'"),
            Token::Slash => "'/'".to_string(),
            Token::DoubleSlash => "'//'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::DotDot => "'..'".to_string(),
            Token::At => "'@'".to_string(),
            Token::Comma => "','".to_string(),
            Token::ColonColon => "'::'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star | Token::Multiply => "'*'".to_string(),
            Token::Equal => "'='".to_string(),
            Token::NotEqual => "'!='".to_string(),
            Token::LessThan => "'<'".to_string(),
            Token::LessThanOrEqual => "'<='".to_string(),
            Token::GreaterThan => "'>'".to_string(),
            Token::GreaterThanOrEqual => "'>='".to_string(),
            Token::And => "'and'".to_string(),
            Token::Or => "'or'".to_string(),
            Token::Div => "'div'".to_string(),
            Token::Mod => "'mod'".to_string(),
        }
    }
}

/// Token with its byte span in the source expression
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The wrapped value
    pub value: T,
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl<T> Spanned<T> {
    /// Wrap a value with its span
    pub fn new(value: T, start: usize, end: usize) -> Self {
        Self { value, start, end }
    }
}

/// Streaming tokenizer over a location-path expression
pub struct Tokenizer<'input> {
    input: &'input str,
    position: usize,
    previous: Option<Token<'input>>,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer for the given expression text
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            position: 0,
            previous: None,
        }
    }

    /// Tokenize the whole input
    pub fn tokenize_all(mut self) -> PathResult<Vec<Spanned<Token<'input>>>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Read the next token, `None` at end of input
    pub fn next_token(&mut self) -> PathResult<Option<Spanned<Token<'input>>>> {
        self.skip_whitespace();
        let start = self.position;
        let Some(c) = self.peek_char(0) else {
            return Ok(None);
        };
        let operator_context = self
            .previous
            .as_ref()
            .is_some_and(|previous| previous.ends_operand());

        let token = match c {
            '/' => {
                if self.peek_char(1) == Some('/') {
                    self.position += 2;
                    Token::DoubleSlash
                } else {
                    self.position += 1;
                    Token::Slash
                }
            }
            '.' => match self.peek_char(1) {
                Some('.') => {
                    self.position += 2;
                    Token::DotDot
                }
                Some(d) if d.is_ascii_digit() => self.read_number()?,
                _ => {
                    self.position += 1;
                    Token::Dot
                }
            },
            ':' => {
                if self.peek_char(1) == Some(':') {
                    self.position += 2;
                    Token::ColonColon
                } else {
                    return Err(PathError::parse_error(start, "Unexpected ':'"));
                }
            }
            '!' => {
                if self.peek_char(1) == Some('=') {
                    self.position += 2;
                    Token::NotEqual
                } else {
                    return Err(PathError::parse_error(start, "Expected '=' after '!'"));
                }
            }
            '<' | '>' => {
                let or_equal = self.peek_char(1) == Some('=');
                self.position += if or_equal { 2 } else { 1 };
                match (c, or_equal) {
                    ('<', false) => Token::LessThan,
                    ('<', true) => Token::LessThanOrEqual,
                    (_, false) => Token::GreaterThan,
                    (_, true) => Token::GreaterThanOrEqual,
                }
            }
            '*' => {
                self.position += 1;
                if operator_context {
                    Token::Multiply
                } else {
                    Token::Star
                }
            }
            '"' | '\'' => self.read_literal(c)?,
            '@' | ',' | '(' | ')' | '[' | ']' | '|' | '+' | '-' | '=' => {
                self.position += 1;
                match c {
                    '@' => Token::At,
                    ',' => Token::Comma,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    '[' => Token::LeftBracket,
                    ']' => Token::RightBracket,
                    '|' => Token::Pipe,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    _ => Token::Equal,
                }
            }
            c if c.is_ascii_digit() => self.read_number()?,
            c if is_name_start(c) => {
                let name = self.read_name();
                match name {
                    "and" if operator_context => Token::And,
                    "or" if operator_context => Token::Or,
                    "div" if operator_context => Token::Div,
                    "mod" if operator_context => Token::Mod,
                    _ => Token::Name(name),
                }
            }
            other => {
                return Err(PathError::parse_error(
                    start,
                    format!("Unexpected character '{other}'"),
                ));
            }
        };

        self.previous = Some(token.clone());
        Ok(Some(Spanned::new(token, start, self.position)))
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input[self.position..].chars().nth(offset)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char(0) {
            if matches!(c, ' ' | '\t' | '\r' | '\n') {
                self.position += 1;
            } else {
                break;
            }
        }
    }

    fn read_literal(&mut self, quote: char) -> PathResult<Token<'input>> {
        let start = self.position;
        let body_start = start + 1;
        match self.input[body_start..].find(quote) {
            Some(length) => {
                self.position = body_start + length + 1;
                Ok(Token::Literal(&self.input[body_start..body_start + length]))
            }
            None => Err(PathError::parse_error(start, "Unterminated string literal")),
        }
    }

    fn read_number(&mut self) -> PathResult<Token<'input>> {
        let start = self.position;
        let mut seen_dot = false;
        while let Some(c) = self.peek_char(0) {
            if c.is_ascii_digit() {
                self.position += 1;
            } else if c == '.' && !seen_dot && self.peek_char(1) != Some('.') {
                seen_dot = true;
                self.position += 1;
            } else {
                break;
            }
        }
        let text = &self.input[start..self.position];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| PathError::parse_error(start, format!("Invalid number '{text}'")))
    }

    fn read_name(&mut self) -> &'input str {
        let start = self.position;
        self.consume_ncname();
        // QName prefix: `prefix:local`, but never the `::` axis separator
        if self.peek_char(0) == Some(':')
            && self.peek_char(1).is_some_and(is_name_start)
        {
            self.position += 1;
            self.consume_ncname();
        }
        &self.input[start..self.position]
    }

    fn consume_ncname(&mut self) {
        while let Some(c) = self.peek_char(0) {
            if is_name_char(c) {
                self.position += c.len_utf8();
            } else {
                break;
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        Tokenizer::new(input)
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_tokenizer_basic() {
        assert_eq!(
            tokens("/r/a"),
            vec![Token::Slash, Token::Name("r"), Token::Slash, Token::Name("a")]
        );
    }

    #[test]
    fn test_attribute_and_parent_steps() {
        assert_eq!(
            tokens("../../@id"),
            vec![
                Token::DotDot,
                Token::Slash,
                Token::DotDot,
                Token::Slash,
                Token::At,
                Token::Name("id")
            ]
        );
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(tokens("@*"), vec![Token::At, Token::Star]);
        assert_eq!(
            tokens("2 * 3"),
            vec![Token::Number(2.0), Token::Multiply, Token::Number(3.0)]
        );
        assert_eq!(
            tokens("a/*"),
            vec![Token::Name("a"), Token::Slash, Token::Star]
        );
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(
            tokens("and and or"),
            vec![Token::Name("and"), Token::And, Token::Name("or")]
        );
        assert_eq!(
            tokens("6 div 2 mod 4"),
            vec![
                Token::Number(6.0),
                Token::Div,
                Token::Number(2.0),
                Token::Mod,
                Token::Number(4.0)
            ]
        );
    }

    #[test]
    fn test_literals_and_numbers() {
        assert_eq!(
            tokens(r#"concat(@date, " ", 'x') .5 12.25"#),
            vec![
                Token::Name("concat"),
                Token::LeftParen,
                Token::At,
                Token::Name("date"),
                Token::Comma,
                Token::Literal(" "),
                Token::Comma,
                Token::Literal("x"),
                Token::RightParen,
                Token::Number(0.5),
                Token::Number(12.25)
            ]
        );
    }

    #[test]
    fn test_axis_and_qname() {
        assert_eq!(
            tokens("child::xlink:href"),
            vec![
                Token::Name("child"),
                Token::ColonColon,
                Token::Name("xlink:href")
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            tokens("= != < <= > >="),
            vec![
                Token::Equal,
                Token::NotEqual,
                Token::LessThan,
                Token::LessThanOrEqual,
                Token::GreaterThan,
                Token::GreaterThanOrEqual
            ]
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let err = Tokenizer::new("a: @aid").tokenize_all().unwrap_err();
        assert_eq!(err, PathError::parse_error(1, "Unexpected ':'"));

        let err = Tokenizer::new("'open").tokenize_all().unwrap_err();
        assert!(matches!(err, PathError::Parse { position: 0, .. }));
    }
}
