//! Boolean queries over annotation key/value pairs.
//!
//! Textual form:
//!
//! ```text
//! type:Process AND (name:bash OR name:sh) AND NOT uid:0
//! path:"/tmp/with space"  cmdline~ssh  *
//! ```
//!
//! `key:value` is exact equality, `key~word` matches when `word` is one of the
//! alphanumeric tokens of the value (case-insensitive), `*` matches anything.
//! Juxtaposed terms are joined with AND.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Annotations, Vertex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Any,
    Eq { key: String, value: String },
    Contains { key: String, word: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Lowercased alphanumeric tokens of a value; the unit `Contains` matches on.
pub fn tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

impl Predicate {
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn contains(key: impl Into<String>, word: impl Into<String>) -> Self {
        Predicate::Contains {
            key: key.into(),
            word: word.into().to_lowercase(),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Exact match on every annotation of `vertex`.
    pub fn from_vertex(vertex: &Vertex) -> Self {
        Predicate::And(
            vertex
                .annotations()
                .iter()
                .map(|(k, v)| Predicate::eq(k, v))
                .collect(),
        )
    }

    pub fn matches(&self, annotations: &Annotations) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Eq { key, value } => annotations.get(key) == Some(value.as_str()),
            Predicate::Contains { key, word } => annotations
                .get(key)
                .map(|v| tokens(v).any(|t| t == *word))
                .unwrap_or(false),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(annotations)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(annotations)),
            Predicate::Not(inner) => !inner.matches(annotations),
        }
    }

    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let tokens = lex(input)?;
        if tokens.is_empty() {
            return Ok(Predicate::Any);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let predicate = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(CoreError::Parse(format!(
                "unexpected trailing input in predicate: {input}"
            )));
        }
        Ok(predicate)
    }
}

impl FromStr for Predicate {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::parse(s)
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | '\\'))
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if needs_quotes(value) {
        write!(f, "\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        f.write_str(value)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{p}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Any => f.write_str("*"),
            Predicate::Eq { key, value } => {
                write!(f, "{key}:")?;
                write_value(f, value)
            }
            Predicate::Contains { key, word } => {
                write!(f, "{key}~")?;
                write_value(f, word)
            }
            Predicate::And(parts) if parts.is_empty() => f.write_str("*"),
            Predicate::Or(parts) if parts.is_empty() => f.write_str("NOT *"),
            Predicate::And(parts) => write_joined(f, parts, "AND"),
            Predicate::Or(parts) => write_joined(f, parts, "OR"),
            Predicate::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Any,
    Cond(Predicate),
}

fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, CoreError> {
    // opening quote already consumed
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some(c) => out.push(c),
                None => break,
            },
            Some(c) => out.push(c),
            None => break,
        }
    }
    Err(CoreError::Parse("unterminated quoted value".into()))
}

fn lex(input: &str) -> Result<Vec<Token>, CoreError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' {
            chars.next();
            tokens.push(Token::LParen);
            continue;
        }
        if c == ')' {
            chars.next();
            tokens.push(Token::RParen);
            continue;
        }

        let mut key = String::new();
        let mut op = None;
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            chars.next();
            if c == ':' || c == '~' {
                op = Some(c);
                break;
            }
            key.push(c);
        }

        let Some(op) = op else {
            tokens.push(match key.to_ascii_uppercase().as_str() {
                "AND" | "&&" => Token::And,
                "OR" | "||" => Token::Or,
                "NOT" | "!" => Token::Not,
                "*" => Token::Any,
                _ => {
                    return Err(CoreError::Parse(format!(
                        "expected key:value, key~word, or operator, got '{key}'"
                    )))
                }
            });
            continue;
        };

        if key.is_empty() {
            return Err(CoreError::Parse(format!("missing key before '{op}'")));
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            read_quoted(&mut chars)?
        } else {
            let mut value = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value
        };

        tokens.push(Token::Cond(if op == ':' {
            Predicate::eq(key, value)
        } else {
            Predicate::contains(key, value)
        }));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<Predicate, CoreError> {
        let mut parts = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            parts.push(self.and_expr()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Or(parts)
        })
    }

    fn and_expr(&mut self) -> Result<Predicate, CoreError> {
        let mut parts = vec![self.unary()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    parts.push(self.unary()?);
                }
                Some(Token::Cond(_) | Token::Not | Token::LParen | Token::Any) => {
                    parts.push(self.unary()?);
                }
                _ => break,
            }
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        })
    }

    fn unary(&mut self) -> Result<Predicate, CoreError> {
        match self.next() {
            Some(Token::Not) => Ok(Predicate::Not(Box::new(self.unary()?))),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(CoreError::Parse("missing closing parenthesis".into())),
                }
            }
            Some(Token::Cond(p)) => Ok(p),
            Some(Token::Any) => Ok(Predicate::Any),
            Some(other) => Err(CoreError::Parse(format!("unexpected token {other:?}"))),
            None => Err(CoreError::Parse("unexpected end of predicate".into())),
        }
    }
}
