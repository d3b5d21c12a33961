//! Path expression parser.
//!
//! Bracket contents are scanned with balanced-depth and quote tracking, so
//! quoted values may contain `]`, `.` and escape sequences. Escapes inside
//! quoted strings are preserved verbatim.

use crate::segment::{Literal, ParamValue, Segment, INDEX_PARAM_KEY};
use crate::{Path, Vars};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unclosed '[' at offset {0}")]
    UnclosedBracket(usize),
    #[error("unclosed string literal at offset {0}")]
    UnclosedString(usize),
    #[error("empty segment at offset {0}")]
    EmptySegment(usize),
    #[error("invalid index '{0}'")]
    InvalidIndex(String),
    #[error("empty parameter key in '[{0}]'")]
    EmptyParamKey(String),
}

/// Parse-time options.
///
/// `vars` resolves `$name` placeholders while tokenizing. `wildcard_dynamic`
/// controls what happens to a placeholder with no matching variable: widened
/// to the appropriate wildcard when `true`, kept in place when `false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseOptions<'a> {
    pub vars: Option<&'a Vars>,
    pub wildcard_dynamic: bool,
}

pub(crate) struct PathParser<'a> {
    input: &'a str,
    pos: usize,
    opts: ParseOptions<'a>,
}

impl<'a> PathParser<'a> {
    pub(crate) fn parse(input: &'a str, opts: ParseOptions<'a>) -> Result<Path, ParseError> {
        let mut parser = Self { input, pos: 0, opts };
        parser.parse_path()
    }

    fn parse_path(&mut self) -> Result<Path, ParseError> {
        let mut segments = Vec::new();
        if self.input.is_empty() {
            return Ok(Path { segments });
        }

        let mut expect_dot = false;
        while !self.is_at_end() {
            match self.peek() {
                Some('[') => {
                    self.parse_bracket(&mut segments)?;
                    expect_dot = true;
                }
                Some('.') if expect_dot => {
                    self.advance();
                    // '.' must introduce a dot-segment: '..', '.[' and a
                    // trailing '.' all leave it empty.
                    if matches!(self.peek(), Some('[') | Some('.')) || self.is_at_end() {
                        return Err(ParseError::EmptySegment(self.pos));
                    }
                }
                _ => {
                    self.parse_dot_segment(&mut segments)?;
                    expect_dot = true;
                }
            }
        }

        // A trailing key wildcard is deep.
        if let Some(Segment::Wildcard { as_index: false, deep }) = segments.last_mut() {
            *deep = true;
        }
        Ok(Path { segments })
    }

    fn parse_dot_segment(&mut self, segments: &mut Vec<Segment>) -> Result<(), ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' {
                break;
            }
            self.advance();
        }
        let word = &self.input[start..self.pos];
        if word.is_empty() {
            return Err(ParseError::EmptySegment(start));
        }
        if word == "*" {
            segments.push(Segment::key_wildcard());
            return Ok(());
        }
        if let Some(name) = word.strip_prefix('$') {
            match self.lookup(name) {
                Some(value) => segments.push(Segment::Key(value_as_key(&value))),
                None if self.opts.wildcard_dynamic => segments.push(Segment::key_wildcard()),
                // Dangling placeholder: kept as a literal key; data-adapter
                // reads rebase through it via their own vars.
                None => segments.push(Segment::Key(word.to_string())),
            }
            return Ok(());
        }
        segments.push(Segment::Key(word.to_string()));
        Ok(())
    }

    fn parse_bracket(&mut self, segments: &mut Vec<Segment>) -> Result<(), ParseError> {
        let open = self.pos;
        self.advance(); // consume '['
        let inner_start = self.pos;
        let mut depth = 1usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        while let Some(c) = self.peek() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                self.advance();
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &self.input[inner_start..self.pos];
                        self.advance(); // consume ']'
                        let seg = self.parse_inner(inner)?;
                        segments.push(seg);
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.advance();
        }
        if quote.is_some() {
            return Err(ParseError::UnclosedString(open));
        }
        Err(ParseError::UnclosedBracket(open))
    }

    /// Parse the text between a balanced `[` `]` pair.
    fn parse_inner(&self, inner: &str) -> Result<Segment, ParseError> {
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptySegment(self.pos));
        }
        if trimmed == "*" {
            return Ok(Segment::index_wildcard());
        }
        if let Some(eq) = split_on_eq(trimmed) {
            let (key, raw) = eq;
            if key.is_empty() {
                return Err(ParseError::EmptyParamKey(trimmed.to_string()));
            }
            return Ok(self.parse_param(key, raw));
        }
        if let Some(name) = trimmed.strip_prefix('$') {
            return Ok(match self.lookup(name) {
                Some(value) => match value_as_index(&value) {
                    Some(i) => Segment::Index(i),
                    None => Segment::index_wildcard(),
                },
                None if self.opts.wildcard_dynamic => Segment::index_wildcard(),
                None => Segment::Param {
                    key: INDEX_PARAM_KEY.to_string(),
                    value: ParamValue::Placeholder(name.to_string()),
                },
            });
        }
        let idx: usize = trimmed
            .parse()
            .map_err(|_| ParseError::InvalidIndex(trimmed.to_string()))?;
        Ok(Segment::Index(idx))
    }

    fn parse_param(&self, key: &str, raw: &str) -> Segment {
        let key = key.trim().to_string();
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix('$') {
            return match self.lookup(name).as_ref().and_then(Literal::from_value) {
                Some(lit) => Segment::Param { key, value: ParamValue::Literal(lit) },
                None if self.opts.wildcard_dynamic => Segment::index_wildcard(),
                None => Segment::Param {
                    key,
                    value: ParamValue::Placeholder(name.to_string()),
                },
            };
        }
        Segment::Param { key, value: ParamValue::Literal(parse_literal(raw)) }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.opts.vars.and_then(|vars| vars.get(name)).cloned()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}

/// Split `key=value` on the first `=` outside quotes. Returns `None` when
/// there is no unquoted `=` (the inner is then an index or placeholder).
fn split_on_eq(inner: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '=' => return Some((&inner[..i], &inner[i + 1..])),
            _ => {}
        }
    }
    None
}

/// Parse a parameter literal: digits, quoted string, boolean bareword, or a
/// plain bareword (kept as a string).
fn parse_literal(raw: &str) -> Literal {
    if (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2)
        || (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2)
    {
        return Literal::Str(raw[1..raw.len() - 1].to_string());
    }
    if raw == "true" {
        return Literal::Bool(true);
    }
    if raw == "false" {
        return Literal::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Literal::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Literal::Float(f);
    }
    Literal::Str(raw.to_string())
}

fn value_as_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn value_as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
