//! Query lexer.
//!
//! Converts query text into a stream of tokens. Keywords are matched without
//! regard to ASCII case; identifiers keep their case.

use std::iter::Peekable;
use std::str::CharIndices;

use super::error::ParseError;

/// Token kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Str(String),
    Int(i64),

    // Keywords
    And,
    Or,
    Not,
    Is,
    Null,
    In,
    StartsWith,
    Between,
    Order,
    By,
    Asc,
    Desc,
    True,
    False,

    // Punctuation
    LParen,
    RParen,
    Comma,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Int(n) => write!(f, "integer {n}"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Is => f.write_str("IS"),
            Self::Null => f.write_str("NULL"),
            Self::In => f.write_str("IN"),
            Self::StartsWith => f.write_str("STARTS_WITH"),
            Self::Between => f.write_str("BETWEEN"),
            Self::Order => f.write_str("ORDER"),
            Self::By => f.write_str("BY"),
            Self::Asc => f.write_str("ASC"),
            Self::Desc => f.write_str("DESC"),
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
            Self::Eq => f.write_str("'='"),
            Self::NotEq => f.write_str("'!='"),
            Self::Lt => f.write_str("'<'"),
            Self::LtEq => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::GtEq => f.write_str("'>='"),
            Self::Eof => f.write_str("end of query"),
        }
    }
}

/// A token and its byte offset in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Tokenize `input`. The returned vector always ends with `Token::Eof`.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Spanned>, ParseError> {
        while let Some(&(position, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }

            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                ',' => self.single(Token::Comma),
                '=' => {
                    self.chars.next();
                    // Accept `==` as a synonym
                    self.eat('=');
                    Token::Eq
                }
                '!' => {
                    self.chars.next();
                    if !self.eat('=') {
                        return Err(ParseError::new("expected '=' after '!'", position));
                    }
                    Token::NotEq
                }
                '<' => {
                    self.chars.next();
                    if self.eat('=') {
                        Token::LtEq
                    } else if self.eat('>') {
                        Token::NotEq
                    } else {
                        Token::Lt
                    }
                }
                '>' => {
                    self.chars.next();
                    if self.eat('=') { Token::GtEq } else { Token::Gt }
                }
                '\'' | '"' => self.string(position, c)?,
                '`' => self.quoted_ident(position)?,
                '-' | '0'..='9' => self.number(position)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(position),
                other => {
                    return Err(ParseError::new(
                        format!("unexpected character '{other}'"),
                        position,
                    ));
                }
            };

            self.tokens.push(Spanned { token, position });
        }

        self.tokens.push(Spanned {
            token: Token::Eof,
            position: self.input.len(),
        });
        Ok(self.tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().is_some_and(|&(_, c)| c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token, ParseError> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                Some((_, c)) if c == quote => return Ok(Token::Str(value)),
                Some((_, c)) => value.push(c),
                None => break,
            }
        }
        Err(ParseError::new("unterminated string literal", start))
    }

    fn quoted_ident(&mut self, start: usize) -> Result<Token, ParseError> {
        self.chars.next();
        let mut name = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == '`' {
                if name.is_empty() {
                    return Err(ParseError::new("empty quoted identifier", start));
                }
                return Ok(Token::Ident(name));
            }
            name.push(c);
        }
        Err(ParseError::new("unterminated quoted identifier", start))
    }

    fn number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut end = start;
        if let Some(&(i, '-')) = self.chars.peek() {
            self.chars.next();
            end = i + 1;
        }
        while let Some(&(i, c)) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.chars.next();
            end = i + 1;
        }

        let text = &self.input[start..end];
        if text == "-" {
            return Err(ParseError::new("expected digits after '-'", start));
        }
        if self.chars.peek().is_some_and(|&(_, c)| c.is_ascii_alphabetic() || c == '.') {
            return Err(ParseError::new(format!("malformed number near '{text}'"), start));
        }
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ParseError::new(format!("integer out of range: {text}"), start))
    }

    fn word(&mut self, start: usize) -> Token {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                break;
            }
            self.chars.next();
            end = i + c.len_utf8();
        }

        let word = &self.input[start..end];
        keyword(word).unwrap_or_else(|| Token::Ident(word.to_owned()))
    }
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "IS" => Token::Is,
        "NULL" => Token::Null,
        "IN" => Token::In,
        "STARTS_WITH" => Token::StartsWith,
        "BETWEEN" => Token::Between,
        "ORDER" => Token::Order,
        "BY" => Token::By,
        "ASC" => Token::Asc,
        "DESC" => Token::Desc,
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        _ => return None,
    };
    Some(token)
}
