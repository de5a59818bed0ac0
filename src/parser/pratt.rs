//! Pratt parser for FHIRPath expressions
//!
//! Precedence climbing over the token stream. Every node records the byte
//! span it covers so callers can map diagnostics back to the document.

use super::error::{ParseResult, SyntaxError};
use super::span::{Span, Spanned};
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{
    BinaryOperator, ExpressionKind, ExpressionNode, LiteralValue, TypeOperator, UnaryOperator,
};

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence - implies (right associative)
    Implies = 1,
    /// Logical OR and XOR
    Or = 2,
    /// Logical AND
    And = 3,
    /// Membership operators (in, contains)
    Membership = 4,
    /// Equality operators (=, !=, ~, !~)
    Equality = 5,
    /// Inequality operators (<, >, <=, >=)
    Inequality = 6,
    /// Union operator (|)
    Union = 7,
    /// Type operators (is, as)
    Type = 8,
    /// Additive operators (+, -, &)
    Additive = 9,
    /// Multiplicative operators (*, /, div, mod)
    Multiplicative = 10,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Implies => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Membership,
            Precedence::Membership => Precedence::Equality,
            Precedence::Equality => Precedence::Inequality,
            Precedence::Inequality => Precedence::Union,
            Precedence::Union => Precedence::Type,
            Precedence::Type => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Multiplicative,
        }
    }

    /// Check if this precedence is right associative
    pub const fn is_right_associative(self) -> bool {
        matches!(self, Precedence::Implies)
    }
}

#[derive(Debug, Clone, Copy)]
enum InfixOperator {
    Binary(BinaryOperator),
    Type(TypeOperator),
}

fn infix_operator(token: &Token<'_>) -> Option<(InfixOperator, Precedence)> {
    use BinaryOperator as B;
    let (op, precedence) = match token {
        Token::Implies => (B::Implies, Precedence::Implies),
        Token::Or => (B::Or, Precedence::Or),
        Token::Xor => (B::Xor, Precedence::Or),
        Token::And => (B::And, Precedence::And),
        Token::In => (B::In, Precedence::Membership),
        Token::Contains => (B::Contains, Precedence::Membership),
        Token::Equal => (B::Equal, Precedence::Equality),
        Token::NotEqual => (B::NotEqual, Precedence::Equality),
        Token::Equivalent => (B::Equivalent, Precedence::Equality),
        Token::NotEquivalent => (B::NotEquivalent, Precedence::Equality),
        Token::LessThan => (B::LessThan, Precedence::Inequality),
        Token::LessThanOrEqual => (B::LessThanOrEqual, Precedence::Inequality),
        Token::GreaterThan => (B::GreaterThan, Precedence::Inequality),
        Token::GreaterThanOrEqual => (B::GreaterThanOrEqual, Precedence::Inequality),
        Token::Pipe => (B::Union, Precedence::Union),
        Token::Plus => (B::Add, Precedence::Additive),
        Token::Minus => (B::Subtract, Precedence::Additive),
        Token::Ampersand => (B::Concatenate, Precedence::Additive),
        Token::Multiply => (B::Multiply, Precedence::Multiplicative),
        Token::Divide => (B::Divide, Precedence::Multiplicative),
        Token::Div => (B::IntegerDivide, Precedence::Multiplicative),
        Token::Mod => (B::Modulo, Precedence::Multiplicative),
        Token::Is => return Some((InfixOperator::Type(TypeOperator::Is), Precedence::Type)),
        Token::As => return Some((InfixOperator::Type(TypeOperator::As), Precedence::Type)),
        _ => return None,
    };
    Some((InfixOperator::Binary(op), precedence))
}

const CALENDAR_UNITS: &[&str] = &[
    "year",
    "years",
    "month",
    "months",
    "week",
    "weeks",
    "day",
    "days",
    "hour",
    "hours",
    "minute",
    "minutes",
    "second",
    "seconds",
    "millisecond",
    "milliseconds",
];

/// Deepest syntax tree the parser builds
///
/// Nested parentheses, unary chains and long member chains all count, so
/// walking or dropping a parsed tree stays within a small, fixed stack.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parse a complete expression
pub fn parse_expression(input: &str) -> ParseResult<ExpressionNode> {
    let tokens = Tokenizer::new(input).tokenize()?;
    if tokens.is_empty() {
        return Err(SyntaxError::new("Empty expression", 0, 0));
    }
    let mut parser = PrattParser {
        tokens,
        position: 0,
        input_len: input.len(),
        depth: 0,
    };
    let expression = parser.parse_binary(Precedence::Implies)?;
    if let Some(extra) = parser.peek() {
        return Err(SyntaxError::new(
            format!("Unexpected token {}", extra.value.describe()),
            extra.span.start,
            extra.span.len(),
        ));
    }
    Ok(expression)
}

struct PrattParser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    position: usize,
    input_len: usize,
    /// Depth of the node under construction
    depth: usize,
}

impl<'input> PrattParser<'input> {
    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.position)
    }

    fn peek_token(&self) -> Option<&Token<'input>> {
        self.peek().map(|t| &t.value)
    }

    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        match self.peek() {
            Some(token) => SyntaxError::new(message, token.span.start, token.span.len()),
            None => SyntaxError::new(message, self.input_len, 0),
        }
    }

    /// Account for one more level of nesting
    fn nest(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_here("Expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn expect(&mut self, expected: Token<'static>, what: &str) -> ParseResult<Span> {
        match self.peek() {
            Some(token) if token.value == expected => {
                let span = token.span;
                self.position += 1;
                Ok(span)
            }
            _ => Err(self.error_here(format!("Expected {what}"))),
        }
    }

    fn parse_binary(&mut self, min: Precedence) -> ParseResult<ExpressionNode> {
        let outer = self.depth;
        let node = self.parse_binary_at(min);
        self.depth = outer;
        node
    }

    fn parse_binary_at(&mut self, min: Precedence) -> ParseResult<ExpressionNode> {
        self.nest()?;
        let mut left = self.parse_unary()?;

        while let Some((op, precedence)) = self.peek_token().and_then(infix_operator) {
            if precedence < min {
                break;
            }
            self.position += 1;
            self.nest()?;

            left = match op {
                InfixOperator::Type(op) => {
                    let (type_name, type_span) = self.parse_type_specifier()?;
                    let span = left.span.merge(type_span);
                    ExpressionNode::new(
                        ExpressionKind::TypeOp {
                            op,
                            expression: Box::new(left),
                            type_name,
                        },
                        span,
                    )
                }
                InfixOperator::Binary(op) => {
                    let next = if precedence.is_right_associative() {
                        precedence
                    } else {
                        precedence.next_level()
                    };
                    // Multiplicative is the top level; bump past it so `a * b * c`
                    // stays left-associative.
                    let right = if precedence == Precedence::Multiplicative {
                        self.parse_unary()?
                    } else {
                        self.parse_binary(next)?
                    };
                    let span = left.span.merge(right.span);
                    ExpressionNode::new(
                        ExpressionKind::BinaryOp {
                            op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        span,
                    )
                }
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<ExpressionNode> {
        let op = match self.peek_token() {
            Some(Token::Plus) => UnaryOperator::Positive,
            Some(Token::Minus) => UnaryOperator::Negate,
            _ => return self.parse_postfix(),
        };
        self.nest()?;
        let start = self.advance().map(|t| t.span.start).unwrap_or(self.input_len);
        let operand = self.parse_unary();
        self.depth -= 1;
        let operand = operand?;
        let span = Span::new(start, operand.span.end);
        Ok(ExpressionNode::new(
            ExpressionKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<ExpressionNode> {
        let outer = self.depth;
        let node = self.parse_postfix_at();
        self.depth = outer;
        node
    }

    fn parse_postfix_at(&mut self) -> ParseResult<ExpressionNode> {
        let mut node = self.parse_primary()?;

        loop {
            if matches!(self.peek_token(), Some(Token::Dot | Token::LeftBracket)) {
                self.nest()?;
            }
            match self.peek_token() {
                Some(Token::Dot) => {
                    let dot = self.advance().map(|t| t.span).unwrap_or_default();
                    let (name, name_span) = self
                        .member_name()
                        .ok_or_else(|| SyntaxError::new("Expected identifier after '.'", dot.start, 1))?;
                    if self.peek_token() == Some(&Token::LeftParen) {
                        let (args, close) = self.parse_arguments()?;
                        let span = node.span.merge(close);
                        node = ExpressionNode::new(
                            ExpressionKind::MethodCall {
                                base: Box::new(node),
                                name,
                                name_span,
                                args,
                            },
                            span,
                        );
                    } else {
                        let span = node.span.merge(name_span);
                        node = ExpressionNode::new(
                            ExpressionKind::Path {
                                base: Box::new(node),
                                name,
                                name_span,
                            },
                            span,
                        );
                    }
                }
                Some(Token::LeftBracket) => {
                    self.position += 1;
                    let index = self.parse_binary(Precedence::Implies)?;
                    let close = self.expect(Token::RightBracket, "']'")?;
                    let span = node.span.merge(close);
                    node = ExpressionNode::new(
                        ExpressionKind::Index {
                            base: Box::new(node),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(node),
            }
        }
    }

    /// Identifier after a dot; keywords are valid member and function names there
    fn member_name(&mut self) -> Option<(String, Span)> {
        let token = self.peek()?;
        let name = match &token.value {
            Token::Identifier(name) | Token::DelimitedIdentifier(name) => name.to_string(),
            other => other.keyword_text()?.to_string(),
        };
        let span = token.span;
        self.position += 1;
        Some((name, span))
    }

    fn parse_arguments(&mut self) -> ParseResult<(Vec<ExpressionNode>, Span)> {
        self.expect(Token::LeftParen, "'('")?;
        let mut args = Vec::new();
        if let Some(Token::RightParen) = self.peek_token() {
            let close = self.advance().map(|t| t.span).unwrap_or_default();
            return Ok((args, close));
        }
        loop {
            args.push(self.parse_binary(Precedence::Implies)?);
            match self.peek_token() {
                Some(Token::Comma) => {
                    self.position += 1;
                }
                Some(Token::RightParen) => {
                    let close = self.advance().map(|t| t.span).unwrap_or_default();
                    return Ok((args, close));
                }
                _ => return Err(self.error_here("Expected ',' or ')'")),
            }
        }
    }

    fn parse_type_specifier(&mut self) -> ParseResult<(String, Span)> {
        let (mut name, mut span) = self
            .member_name()
            .ok_or_else(|| self.error_here("Expected type name"))?;
        while self.peek_token() == Some(&Token::Dot) {
            let next = self.tokens.get(self.position + 1);
            let Some(Token::Identifier(part)) = next.map(|t| &t.value) else {
                break;
            };
            name.push('.');
            name.push_str(part);
            span = span.merge(next.map(|t| t.span).unwrap_or(span));
            self.position += 2;
        }
        Ok((name, span))
    }

    fn parse_primary(&mut self) -> ParseResult<ExpressionNode> {
        let Some(token) = self.advance() else {
            return Err(SyntaxError::unexpected_eof(self.input_len));
        };
        let span = token.span;
        let literal = |value: LiteralValue| ExpressionNode::new(ExpressionKind::Literal(value), span);

        let node = match token.value {
            Token::Integer(value) => self.maybe_quantity(value.to_string(), span, LiteralValue::Integer(value)),
            Token::Decimal(text) => {
                self.maybe_quantity(text.to_string(), span, LiteralValue::Decimal(text.to_string()))
            }
            Token::String(value) => literal(LiteralValue::String(value)),
            Token::True => literal(LiteralValue::Boolean(true)),
            Token::False => literal(LiteralValue::Boolean(false)),
            Token::Date(text) => literal(LiteralValue::Date(text.to_string())),
            Token::DateTime(text) => literal(LiteralValue::DateTime(text.to_string())),
            Token::Time(text) => literal(LiteralValue::Time(text.to_string())),
            Token::Dollar(name) => ExpressionNode::new(
                ExpressionKind::Variable {
                    name: name.to_string(),
                    sigil: '$',
                },
                span,
            ),
            Token::Percent(name) => ExpressionNode::new(
                ExpressionKind::Variable {
                    name: name.to_string(),
                    sigil: '%',
                },
                span,
            ),
            Token::Identifier(name) | Token::DelimitedIdentifier(name) => {
                self.identifier_or_call(name.to_string(), span)?
            }
            Token::LeftParen => {
                let inner = self.parse_binary(Precedence::Implies)?;
                let close = self.expect(Token::RightParen, "')'")?;
                ExpressionNode::new(
                    ExpressionKind::Parenthesized(Box::new(inner)),
                    span.merge(close),
                )
            }
            Token::LeftBrace => {
                let close = self.expect(Token::RightBrace, "'}'")?;
                ExpressionNode::new(ExpressionKind::Literal(LiteralValue::Empty), span.merge(close))
            }
            ref other => match other.keyword_text() {
                Some(keyword) if self.peek_token() == Some(&Token::LeftParen) => {
                    self.identifier_or_call(keyword.to_string(), span)?
                }
                _ => {
                    return Err(SyntaxError::new(
                        format!("Unexpected token {}", other.describe()),
                        span.start,
                        span.len(),
                    ));
                }
            },
        };
        Ok(node)
    }

    fn identifier_or_call(&mut self, name: String, span: Span) -> ParseResult<ExpressionNode> {
        if self.peek_token() == Some(&Token::LeftParen) {
            let (args, close) = self.parse_arguments()?;
            return Ok(ExpressionNode::new(
                ExpressionKind::FunctionCall { name, args },
                span.merge(close),
            ));
        }
        Ok(ExpressionNode::new(ExpressionKind::Identifier(name), span))
    }

    fn maybe_quantity(&mut self, value: String, span: Span, number: LiteralValue) -> ExpressionNode {
        let unit = match self.peek() {
            Some(Spanned {
                value: Token::String(unit),
                span: unit_span,
            }) => Some((unit.clone(), *unit_span)),
            Some(Spanned {
                value: Token::Identifier(word),
                span: unit_span,
            }) if CALENDAR_UNITS.contains(word) => Some((word.to_string(), *unit_span)),
            _ => None,
        };
        match unit {
            Some((unit, unit_span)) => {
                self.position += 1;
                ExpressionNode::new(
                    ExpressionKind::Literal(LiteralValue::Quantity { value, unit }),
                    span.merge(unit_span),
                )
            }
            None => ExpressionNode::new(ExpressionKind::Literal(number), span),
        }
    }
}
