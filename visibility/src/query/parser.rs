//! Recursive-descent parser for visibility queries.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! query      := [or_expr] [ORDER BY sort_key (',' sort_key)*]
//! or_expr    := and_expr (OR and_expr)*
//! and_expr   := not_expr (AND not_expr)*
//! not_expr   := NOT not_expr | primary
//! primary    := '(' or_expr ')' | predicate
//! predicate  := operand ( cmp operand
//!                       | IS [NOT] NULL
//!                       | [NOT] IN '(' literal (',' literal)* ')'
//!                       | [NOT] STARTS_WITH literal
//!                       | [NOT] BETWEEN literal AND literal )
//! operand    := identifier | literal
//! sort_key   := identifier [ASC | DESC]
//! ```
//!
//! Comparisons between two literals are folded into `Expr::Constant`, so
//! `1 = 1` is the always-true filter.
//!
//! Nesting is capped at `MAX_DEPTH` and the number of predicates at
//! `MAX_TERMS`, which bounds the depth of every tree this parser returns.

use std::cmp::Ordering;

use super::ast::{Expr, Literal, Operator, ParsedQuery};
use super::error::ParseError;
use super::lexer::{Spanned, Token, tokenize};
use crate::types::SortKey;

/// Maximum nesting depth of parentheses and NOTs.
const MAX_DEPTH: usize = 64;

/// Maximum number of predicates in one query. AND/OR chains build a tree as
/// deep as they are long, and later passes walk it recursively.
pub const MAX_TERMS: usize = 256;

/// Parses raw query text into a `ParsedQuery`.
///
/// This is the seam to the query language: the listing service only depends
/// on this trait, so another grammar can be plugged in without touching the
/// converter.
pub trait QueryParser: Send + Sync {
    /// Parse non-blank query text.
    fn parse(&self, text: &str) -> Result<ParsedQuery, ParseError>;
}

/// The built-in SQL-like filter grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterParser;

impl QueryParser for FilterParser {
    fn parse(&self, text: &str) -> Result<ParsedQuery, ParseError> {
        parse_query(text)
    }
}

/// Parse query text with the built-in grammar.
///
/// Blank text parses to an empty `ParsedQuery` (no filter, default order).
pub fn parse_query(text: &str) -> Result<ParsedQuery, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        terms: 0,
    };
    parser.parse_query()
}

/// One side of a predicate before we know which side is the attribute.
enum Side {
    Attribute(String),
    Literal(Literal),
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    terms: usize,
}

impl Parser {
    fn parse_query(&mut self) -> Result<ParsedQuery, ParseError> {
        let filter = if matches!(self.peek(), Token::Order | Token::Eof) {
            None
        } else {
            Some(self.parse_or_expr()?)
        };

        let order_by = if self.match_token(&Token::Order) {
            self.expect(&Token::By, "expected BY after ORDER")?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        if !matches!(self.peek(), Token::Eof) {
            return Err(self.unexpected());
        }

        Ok(ParsedQuery { filter, order_by })
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.match_token(&Token::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::or(left, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expr()?;
        while self.match_token(&Token::And) {
            let right = self.parse_not_expr()?;
            left = Expr::and(left, right);
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&Token::Not) {
            self.enter()?;
            let inner = self.parse_not_expr()?;
            self.depth -= 1;
            Ok(Expr::negate(inner))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&Token::LParen) {
            self.enter()?;
            let inner = self.parse_or_expr()?;
            self.expect(&Token::RParen, "expected ')'")?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr, ParseError> {
        let start = self.position();
        self.terms += 1;
        if self.terms > MAX_TERMS {
            return Err(ParseError::new(
                format!("query has more than {MAX_TERMS} predicates"),
                start,
            ));
        }
        let left = self.parse_side()?;

        // IS [NOT] NULL
        if self.match_token(&Token::Is) {
            let negated = self.match_token(&Token::Not);
            self.expect(&Token::Null, "expected NULL after IS")?;
            let Side::Attribute(attribute) = left else {
                return Err(ParseError::new("IS NULL requires a search attribute", start));
            };
            return Ok(if negated {
                Expr::is_not_null(attribute)
            } else {
                Expr::is_null(attribute)
            });
        }

        let negated = self.match_token(&Token::Not);

        if self.match_token(&Token::In) {
            let attribute = Self::require_attribute(left, "IN", start)?;
            let values = self.parse_literal_list()?;
            return Ok(negate_if(negated, Expr::in_list(attribute, values)));
        }

        if self.match_token(&Token::StartsWith) {
            let attribute = Self::require_attribute(left, "STARTS_WITH", start)?;
            let prefix = self.parse_literal()?;
            return Ok(negate_if(
                negated,
                Expr::compare(attribute, Operator::StartsWith, prefix),
            ));
        }

        if self.match_token(&Token::Between) {
            let attribute = Self::require_attribute(left, "BETWEEN", start)?;
            let low = self.parse_literal()?;
            self.expect(&Token::And, "expected AND in BETWEEN")?;
            let high = self.parse_literal()?;
            let range = Expr::and(
                Expr::compare(attribute.as_str(), Operator::GtEq, low),
                Expr::compare(attribute, Operator::LtEq, high),
            );
            return Ok(negate_if(negated, range));
        }

        if negated {
            return Err(ParseError::new(
                "expected IN, STARTS_WITH or BETWEEN after NOT",
                self.position(),
            ));
        }

        let operator = match self.peek() {
            Token::Eq => Operator::Eq,
            Token::NotEq => Operator::NotEq,
            Token::Lt => Operator::Lt,
            Token::LtEq => Operator::LtEq,
            Token::Gt => Operator::Gt,
            Token::GtEq => Operator::GtEq,
            _ => return Err(self.unexpected()),
        };
        self.advance();
        let right = self.parse_side()?;

        match (left, right) {
            (Side::Attribute(attribute), Side::Literal(value)) => {
                Ok(Expr::compare(attribute, operator, value))
            }
            (Side::Literal(value), Side::Attribute(attribute)) => {
                // `5 < x` reads as `x > 5`; every comparison operator flips
                let operator = operator.flipped().unwrap_or(operator);
                Ok(Expr::compare(attribute, operator, value))
            }
            (Side::Literal(left), Side::Literal(right)) => {
                fold_constant(&left, operator, &right)
                    .map(Expr::Constant)
                    .ok_or_else(|| {
                        ParseError::new(format!("cannot compare {left} {operator} {right}"), start)
                    })
            }
            (Side::Attribute(_), Side::Attribute(_)) => Err(ParseError::new(
                "comparing two search attributes is not supported",
                start,
            )),
        }
    }

    fn require_attribute(side: Side, construct: &str, position: usize) -> Result<String, ParseError> {
        match side {
            Side::Attribute(attribute) => Ok(attribute),
            Side::Literal(_) => Err(ParseError::new(
                format!("{construct} requires a search attribute on the left"),
                position,
            )),
        }
    }

    fn parse_side(&mut self) -> Result<Side, ParseError> {
        if let Token::Ident(name) = self.peek() {
            let name = name.as_str().to_owned();
            self.advance();
            return Ok(Side::Attribute(name));
        }
        self.parse_literal().map(Side::Literal)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let literal = match self.peek() {
            Token::Str(s) => Literal::String(s.as_str().to_owned()),
            Token::Int(n) => Literal::Int(*n),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(literal)
    }

    fn parse_literal_list(&mut self) -> Result<Vec<Literal>, ParseError> {
        self.expect(&Token::LParen, "expected '(' after IN")?;
        let mut values = vec![self.parse_literal()?];
        while self.match_token(&Token::Comma) {
            values.push(self.parse_literal()?);
        }
        self.expect(&Token::RParen, "expected ')' to close IN list")?;
        Ok(values)
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<SortKey>, ParseError> {
        let mut keys = Vec::new();
        loop {
            let Token::Ident(name) = self.peek() else {
                return Err(ParseError::new(
                    "expected search attribute in ORDER BY",
                    self.position(),
                ));
            };
            let name = name.as_str().to_owned();
            self.advance();

            let key = if self.match_token(&Token::Desc) {
                SortKey::desc(name)
            } else {
                self.match_token(&Token::Asc);
                SortKey::asc(name)
            };
            keys.push(key);

            if !self.match_token(&Token::Comma) {
                return Ok(keys);
            }
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new(
                format!("expression nesting exceeds {MAX_DEPTH} levels"),
                self.position(),
            ));
        }
        Ok(())
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map_or(&Token::Eof, |spanned| &spanned.token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |spanned| spanned.position)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, message: &str) -> Result<(), ParseError> {
        if self.match_token(expected) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("{message}, found {}", self.peek()),
                self.position(),
            ))
        }
    }

    fn unexpected(&self) -> ParseError {
        ParseError::new(format!("unexpected {}", self.peek()), self.position())
    }
}

fn negate_if(negated: bool, expr: Expr) -> Expr {
    if negated { Expr::negate(expr) } else { expr }
}

/// Evaluate a comparison between two literals.
///
/// Returns `None` when the literals cannot be compared with `operator`.
fn fold_constant(left: &Literal, operator: Operator, right: &Literal) -> Option<bool> {
    let ordering = match (left, right) {
        (Literal::Int(a), Literal::Int(b)) => a.cmp(b),
        (Literal::String(a), Literal::String(b)) => a.cmp(b),
        (Literal::Bool(a), Literal::Bool(b)) if !operator.is_range() => a.cmp(b),
        _ => return None,
    };
    let result = match operator {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::NotEq => ordering != Ordering::Equal,
        Operator::Lt => ordering == Ordering::Less,
        Operator::LtEq => ordering != Ordering::Greater,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::GtEq => ordering != Ordering::Less,
        Operator::In | Operator::StartsWith => return None,
    };
    Some(result)
}
