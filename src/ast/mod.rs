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

//! Abstract Syntax Tree (AST) definitions for FHIRPath expressions
//!
//! Every node carries the byte span it was parsed from so diagnostics and
//! symbols can point back into the document.

mod visitor;

pub use visitor::{Visitor, walk};

use crate::parser::span::Span;
use std::fmt;

/// A parsed expression with its location
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionNode {
    /// Node payload
    pub kind: ExpressionKind,
    /// Location of the whole node
    pub span: Span,
}

/// AST representation of FHIRPath expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Literal value
    Literal(LiteralValue),

    /// Leading identifier such as `Patient` or `name`
    Identifier(String),

    /// `$this` style or `%resource` style variable
    Variable {
        /// Variable name without sigil
        name: String,
        /// `$` for environment-provided iteration variables, `%` for external constants
        sigil: char,
    },

    /// Member access (`base.name`)
    Path {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Member name
        name: String,
        /// Location of the member name
        name_span: Span,
    },

    /// Method invocation (`base.name(args)`)
    MethodCall {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Function name
        name: String,
        /// Location of the function name
        name_span: Span,
        /// Arguments
        args: Vec<ExpressionNode>,
    },

    /// Function invocation without a base (`where(...)`)
    FunctionCall {
        /// Function name
        name: String,
        /// Arguments
        args: Vec<ExpressionNode>,
    },

    /// Index access (`base[index]`)
    Index {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Index expression
        index: Box<ExpressionNode>,
    },

    /// Binary operation
    BinaryOp {
        /// The operator
        op: BinaryOperator,
        /// Left operand
        left: Box<ExpressionNode>,
        /// Right operand
        right: Box<ExpressionNode>,
    },

    /// Unary operation
    UnaryOp {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Type test or cast (`expr is Type`, `expr as Type`)
    TypeOp {
        /// The operator
        op: TypeOperator,
        /// Tested expression
        expression: Box<ExpressionNode>,
        /// Type specifier as written
        type_name: String,
    },

    /// Parenthesized expression
    Parenthesized(Box<ExpressionNode>),
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Empty collection `{}`
    Empty,
    /// Boolean literal
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Decimal literal as written
    Decimal(String),
    /// String literal, unescaped
    String(String),
    /// `@2020-01-01`
    Date(String),
    /// `@2020-01-01T10:00:00`
    DateTime(String),
    /// `@T10:00:00`
    Time(String),
    /// Number with a unit
    Quantity {
        /// Numeric part as written
        value: String,
        /// Unit string or calendar word
        unit: String,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `div`
    IntegerDivide,
    /// `mod`
    Modulo,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `&`
    Concatenate,
    /// `|`
    Union,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `~`
    Equivalent,
    /// `!~`
    NotEquivalent,
    /// `in`
    In,
    /// `contains`
    Contains,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
    /// `implies`
    Implies,
}

impl BinaryOperator {
    /// Operator as written in source
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::IntegerDivide => "div",
            Self::Modulo => "mod",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Concatenate => "&",
            Self::Union => "|",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Equivalent => "~",
            Self::NotEquivalent => "!~",
            Self::In => "in",
            Self::Contains => "contains",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Implies => "implies",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// `+expr`
    Positive,
    /// `-expr`
    Negate,
}

/// Type operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeOperator {
    /// `is`
    Is,
    /// `as`
    As,
}

/// One step of a flattened member chain
#[derive(Debug, Clone, Copy)]
pub enum ChainStep<'a> {
    /// `.name`
    Member {
        /// Member name
        name: &'a str,
        /// Location of the member name
        span: Span,
    },
    /// `.name(args)`
    Call {
        /// Function name
        name: &'a str,
        /// Location of the function name
        span: Span,
        /// Arguments
        args: &'a [ExpressionNode],
    },
    /// `[index]`
    Index {
        /// Index expression
        index: &'a ExpressionNode,
    },
}

/// A member chain flattened left to right
#[derive(Debug, Clone)]
pub struct PathChain<'a> {
    /// Innermost base: identifier, variable, function call or other expression
    pub root: &'a ExpressionNode,
    /// Steps applied to the root in source order
    pub steps: Vec<ChainStep<'a>>,
}

impl<'a> PathChain<'a> {
    /// Name of the root when it is a plain identifier
    pub fn root_identifier(&self) -> Option<&'a str> {
        match &self.root.kind {
            ExpressionKind::Identifier(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl ExpressionNode {
    /// Create a node
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this node continues a member chain
    pub fn is_chain_step(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Path { .. }
                | ExpressionKind::MethodCall { .. }
                | ExpressionKind::Index { .. }
        )
    }

    /// Flatten nested member accesses, method calls and indexers
    pub fn chain(&self) -> PathChain<'_> {
        let mut steps = Vec::new();
        let mut current = self;
        loop {
            match &current.kind {
                ExpressionKind::Path {
                    base,
                    name,
                    name_span,
                } => {
                    steps.push(ChainStep::Member {
                        name,
                        span: *name_span,
                    });
                    current = base;
                }
                ExpressionKind::MethodCall {
                    base,
                    name,
                    name_span,
                    args,
                } => {
                    steps.push(ChainStep::Call {
                        name,
                        span: *name_span,
                        args,
                    });
                    current = base;
                }
                ExpressionKind::Index { base, index } => {
                    steps.push(ChainStep::Index { index });
                    current = base;
                }
                _ => break,
            }
        }
        steps.reverse();
        PathChain {
            root: current,
            steps,
        }
    }

    /// Direct children in source order
    pub fn children(&self) -> Vec<&ExpressionNode> {
        match &self.kind {
            ExpressionKind::Literal(_)
            | ExpressionKind::Identifier(_)
            | ExpressionKind::Variable { .. } => Vec::new(),
            ExpressionKind::Path { base, .. } => vec![base],
            ExpressionKind::MethodCall { base, args, .. } => {
                let mut children = vec![base.as_ref()];
                children.extend(args.iter());
                children
            }
            ExpressionKind::FunctionCall { args, .. } => args.iter().collect(),
            ExpressionKind::Index { base, index } => vec![base, index],
            ExpressionKind::BinaryOp { left, right, .. } => vec![left, right],
            ExpressionKind::UnaryOp { operand, .. } => vec![operand],
            ExpressionKind::TypeOp { expression, .. } => vec![expression],
            ExpressionKind::Parenthesized(inner) => vec![inner],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: usize) -> ExpressionNode {
        ExpressionNode::new(
            ExpressionKind::Identifier(name.to_string()),
            Span::new(start, start + name.len()),
        )
    }

    #[test]
    fn test_chain_flattens_in_source_order() {
        // Patient.name[0].given
        let patient = ident("Patient", 0);
        let name = ExpressionNode::new(
            ExpressionKind::Path {
                base: Box::new(patient),
                name: "name".to_string(),
                name_span: Span::new(8, 12),
            },
            Span::new(0, 12),
        );
        let indexed = ExpressionNode::new(
            ExpressionKind::Index {
                base: Box::new(name),
                index: Box::new(ExpressionNode::new(
                    ExpressionKind::Literal(LiteralValue::Integer(0)),
                    Span::new(13, 14),
                )),
            },
            Span::new(0, 15),
        );
        let given = ExpressionNode::new(
            ExpressionKind::Path {
                base: Box::new(indexed),
                name: "given".to_string(),
                name_span: Span::new(16, 21),
            },
            Span::new(0, 21),
        );

        let chain = given.chain();
        assert_eq!(chain.root_identifier(), Some("Patient"));
        assert_eq!(chain.steps.len(), 3);
        assert!(matches!(chain.steps[0], ChainStep::Member { name: "name", .. }));
        assert!(matches!(chain.steps[1], ChainStep::Index { .. }));
        assert!(matches!(chain.steps[2], ChainStep::Member { name: "given", .. }));
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(BinaryOperator::NotEquivalent.to_string(), "!~");
        assert_eq!(BinaryOperator::IntegerDivide.symbol(), "div");
    }
}
