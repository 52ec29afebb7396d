//! Parser for parameterised header values such as `Content-Type`.
//!
//! Grammar: `token ; key1=value1 ; key2="quoted value"`. Quoted strings honour
//! `\"` and `\\`, parenthesised comments are kept as opaque tokens, and a `;`
//! or `=` inside either never splits.

use std::collections::BTreeMap;

/// A parsed header value: the primary token plus its `key=value` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderValue {
    /// The first bare token, e.g. `text/html`. Empty if there is none.
    pub value: String,
    /// Parameters keyed by lowercased name. A repeated key keeps the last value.
    pub params: BTreeMap<String, String>,
    /// Bare tokens after the first, and fragments that are not `key=value`.
    pub others: Vec<String>,
}

impl HeaderValue {
    /// Look up a parameter by name, ignoring ASCII case.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Quoted(&'a str),
    Comment(&'a str),
    Equals,
    Semicolon,
}

impl<'a> Token<'a> {
    fn as_str(&self) -> &'a str {
        match self {
            Token::Text(s) | Token::Quoted(s) | Token::Comment(s) => s,
            Token::Equals => "=",
            Token::Semicolon => ";",
        }
    }
}

/// Parse a header value like `text/html; charset="utf-8"`.
///
/// Never fails: malformed input degrades into `others`.
pub fn parse_header_value(input: &str) -> HeaderValue {
    let tokens = tokenize(input);
    let mut alone: Vec<String> = Vec::new();
    let mut params = BTreeMap::new();

    for group in tokens.split(|t| *t == Token::Semicolon).filter(|g| !g.is_empty()) {
        match group {
            [Token::Text(key), Token::Equals, value] => {
                params.insert(key.to_ascii_lowercase(), unquote(value.as_str()));
            }
            [Token::Text(key), Token::Equals] => {
                params.insert(key.to_ascii_lowercase(), String::new());
            }
            [single] => alone.push(single.as_str().to_string()),
            fragments => alone.extend(fragments.iter().map(|t| t.as_str().to_string())),
        }
    }

    let mut alone = alone.into_iter();
    HeaderValue {
        value: alone.next().unwrap_or_default(),
        params,
        others: alone.collect(),
    }
}

/// Split `input` into trimmed, non-empty tokens in a single pass.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            b'=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            open @ (b'"' | b'(') => {
                let close = if open == b'"' { b'"' } else { b')' };
                let end = scan_enclosed(bytes, i + 1, close);
                let raw = &input[i..end];
                tokens.push(if open == b'"' { Token::Quoted(raw) } else { Token::Comment(raw) });
                i = end;
            }
            _ => {
                let start = i;
                while i < bytes.len() && !matches!(bytes[i], b';' | b'=' | b'"' | b'(') {
                    i += 1;
                }
                let text = input[start..i].trim();
                if !text.is_empty() {
                    tokens.push(Token::Text(text));
                }
            }
        }
    }
    tokens
}

/// Return the index just past the closing delimiter, or the end of input if
/// the enclosure is never closed. A backslash escapes the next byte.
fn scan_enclosed(bytes: &[u8], mut i: usize, close: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == close => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Strip surrounding quotes and resolve `\"` and `\\`.
fn unquote(raw: &str) -> String {
    let inner = match raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if raw.len() > 1 => inner,
        _ => return raw.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
