//! Extension header grammar: parsing and serialization.
//!
//! The negotiation surface is a comma-separated list of offers, each an
//! extension name followed by optional `; key` or `; key=value` fragments
//! (the `Sec-WebSocket-Extensions` shape from RFC 6455 Section 9.1).
//! Parsing is strict: any byte outside the token/quoted-string grammar
//! rejects the whole header, so a caller can fail the handshake instead of
//! guessing at peer intent.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A single extension parameter value.
///
/// Duplicate keys within one offer collapse into [`Value::Multi`] in
/// source order; a single occurrence stays scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Bare key with no `=value` part.
    Flag,
    /// Unquoted value consisting only of decimal digits.
    Int(u64),
    /// Any other value, quoted or unquoted.
    Text(String),
    /// All values seen for a repeated key, in appearance order.
    Multi(Vec<Value>),
}

impl Value {
    /// Create a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

/// Insertion-ordered extension parameters.
///
/// Keys serialize in the order they were first inserted. Inserting a key
/// twice collapses the existing entry into a [`Value::Multi`] list, which
/// mirrors how repeated `key=value` fragments decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Create an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, collapsing duplicate keys into [`Value::Multi`].
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            match existing {
                Value::Multi(items) => items.push(value),
                _ => {
                    let prev = std::mem::replace(existing, Value::Flag);
                    *existing = Value::Multi(vec![prev, value]);
                }
            }
        } else {
            self.entries.push((key, value));
        }
    }

    /// Get the value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the map has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered, duplicate-preserving decoded form of an extension header.
///
/// Entries keep header order, including repeated offers for the same
/// extension name. [`ParsedOffers::by_name`] gives a secondary view of all
/// params offered under one name, again in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOffers {
    entries: Vec<(String, Params)>,
    by_name: HashMap<String, Vec<usize>>,
}

impl ParsedOffers {
    /// Create an empty offer list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an offer, preserving duplicates.
    pub fn push(&mut self, name: impl Into<String>, params: Params) {
        let name = name.into();
        self.by_name
            .entry(name.clone())
            .or_default()
            .push(self.entries.len());
        self.entries.push((name, params));
    }

    /// Iterate over `(name, params)` entries in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Params)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// All params offered under `name`, in header order. Possibly empty.
    pub fn by_name(&self, name: &str) -> Vec<&Params> {
        self.by_name
            .get(name)
            .map(|indices| indices.iter().map(|&i| &self.entries[i].1).collect())
            .unwrap_or_default()
    }

    /// Number of offers, counting duplicates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no offers were present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check whether a byte is a valid HTTP `tchar`.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

/// Check whether a string is a non-empty HTTP token.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_byte)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.bump();
        }
    }

    /// Consume a run of token bytes. Returns `None` on an empty run.
    fn take_token(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(is_token_byte) {
            self.bump();
        }
        if self.pos == start {
            return None;
        }
        // Token bytes are ASCII, so the slice is valid UTF-8.
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    /// Consume a quoted string. The cursor must sit on the opening quote.
    ///
    /// `\x` unescapes to the literal `x`; unescaped control bytes other
    /// than HTAB terminate parsing with an error.
    fn take_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut unescaped = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Error::Parse(format!(
                        "unterminated quoted string starting at byte {start}"
                    )));
                }
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    match self.peek() {
                        Some(b) => {
                            unescaped.push(b);
                            self.bump();
                        }
                        None => {
                            return Err(Error::Parse(format!(
                                "unterminated quoted string starting at byte {start}"
                            )));
                        }
                    }
                }
                Some(b) if b < 0x20 && b != b'\t' || b == 0x7f => {
                    return Err(Error::Parse(format!(
                        "control byte {b:#04x} in quoted string at byte {}",
                        self.pos
                    )));
                }
                Some(b) => {
                    unescaped.push(b);
                    self.bump();
                }
            }
        }
        String::from_utf8(unescaped)
            .map_err(|_| Error::Parse("invalid UTF-8 in quoted string".to_string()))
    }
}

/// Decode an unquoted value token: all-decimal runs become integers.
fn decode_unquoted(token: &str) -> Value {
    if token.bytes().all(|b| b.is_ascii_digit()) {
        // Digit runs too long for u64 stay textual.
        token
            .parse::<u64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(token.to_string()))
    } else {
        Value::Text(token.to_string())
    }
}

fn expected(what: &str, cursor: &Cursor<'_>) -> Error {
    Error::Parse(format!("expected {what} at byte {}", cursor.pos))
}

/// Parse an extension header into its ordered offer list.
///
/// An empty header yields an empty [`ParsedOffers`]; callers holding an
/// absent header should pass `""`. Whitespace around commas and semicolons
/// is insignificant.
///
/// # Errors
///
/// Returns [`Error::Parse`] on a trailing comma, empty offer, malformed
/// token, unterminated quoted string, or any byte the grammar disallows.
pub fn parse_header(header: &str) -> Result<ParsedOffers> {
    let mut offers = ParsedOffers::new();
    if header.is_empty() {
        return Ok(offers);
    }

    let mut cursor = Cursor::new(header);
    loop {
        cursor.skip_ws();
        let name = cursor
            .take_token()
            .ok_or_else(|| expected("extension name", &cursor))?;

        let mut params = Params::new();
        cursor.skip_ws();
        while cursor.peek() == Some(b';') {
            cursor.bump();
            cursor.skip_ws();
            let key = cursor
                .take_token()
                .ok_or_else(|| expected("parameter name", &cursor))?;
            let value = if cursor.peek() == Some(b'=') {
                cursor.bump();
                if cursor.peek() == Some(b'"') {
                    Value::Text(cursor.take_quoted()?)
                } else {
                    let token = cursor
                        .take_token()
                        .ok_or_else(|| expected("parameter value", &cursor))?;
                    decode_unquoted(token)
                }
            } else {
                Value::Flag
            };
            params.insert(key, value);
            cursor.skip_ws();
        }
        offers.push(name, params);

        match cursor.peek() {
            None => break,
            Some(b',') => cursor.bump(),
            Some(_) => return Err(expected("',' or ';'", &cursor)),
        }
    }

    Ok(offers)
}

fn escape_quoted(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_fragments(key: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Multi(items) => {
            for item in items {
                push_fragments(key, item, out);
            }
        }
        Value::Flag => out.push(key.to_string()),
        Value::Int(n) => out.push(format!("{key}={n}")),
        Value::Text(s) if is_token(s) => out.push(format!("{key}={s}")),
        Value::Text(s) => out.push(format!("{key}=\"{}\"", escape_quoted(s))),
    }
}

/// Serialize one offer as a header fragment.
///
/// Keys are emitted in insertion order; [`Value::Multi`] entries expand to
/// one fragment per element, adjacent to their key's group. The caller
/// joins per-extension fragments with `", "` to assemble the full header.
pub fn serialize_params(name: &str, params: &Params) -> String {
    let mut fragments = Vec::with_capacity(params.len() + 1);
    fragments.push(name.to_string());
    for (key, value) in params.iter() {
        push_fragments(key, value, &mut fragments);
    }
    fragments.join("; ")
}
