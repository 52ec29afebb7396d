//! Route path patterns and their compilation into regular expressions.
//!
//! The pattern mini-language:
//!
//! | Syntax | Matches |
//! |---|---|
//! | literal text | itself, escaped |
//! | `*` | exactly one non-empty path segment |
//! | `<name>` | one non-empty path segment, captured as `name` |
//! | `<name:sub>` | the regex `sub`, captured as `name`; `\>` is a literal `>` |
//! | `^...` | the whole spec is a raw regex, used verbatim |
//!
//! Standard patterns get one implicit leading `/`, collapse repeated `/` in
//! literal text, and are anchored at both ends.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::routing::error::PatternError;

/// Marker that selects raw-regex mode. It stays part of the regex.
pub const RAW_MARKER: char = '^';

/// Regex fragment for one non-empty path segment.
const SEGMENT: &str = "[^/]+";

/// A compiled route pattern.
#[derive(Clone)]
pub struct RoutePattern {
    spec: String,
    regex: Regex,
}

impl RoutePattern {
    /// Compile a path specification.
    pub fn compile(spec: &str) -> Result<Self, PatternError> {
        let source = translate(spec);
        let regex = Regex::new(&source).map_err(|source| PatternError::Invalid {
            spec: spec.to_string(),
            source,
        })?;
        Ok(Self {
            spec: spec.to_string(),
            regex,
        })
    }

    /// The specification this pattern was compiled from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// The generated regular expression.
    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path`, returning the named captures on success.
    ///
    /// Optional groups of raw patterns that did not participate are omitted.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.regex
                .capture_names()
                .flatten()
                .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
                .collect(),
        )
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePattern")
            .field("spec", &self.spec)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Translate a path specification into regex source.
///
/// Pure: the same spec always yields the same source.
pub fn translate(spec: &str) -> String {
    if spec.starts_with(RAW_MARKER) {
        return spec.to_string();
    }

    let mut out = String::with_capacity(spec.len() + 8);
    out.push('^');
    let mut literal = String::from("/");
    let mut rest = spec;

    while let Some(pos) = rest.find(['*', '<']) {
        let (before, at) = rest.split_at(pos);
        literal.push_str(before);

        if let Some(after) = at.strip_prefix('*') {
            flush_literal(&mut out, &mut literal);
            out.push_str(SEGMENT);
            rest = after;
            continue;
        }

        match parse_capture(at) {
            Some((name, sub, consumed)) => {
                flush_literal(&mut out, &mut literal);
                out.push_str("(?P<");
                out.push_str(name);
                out.push('>');
                out.push_str(if sub.is_empty() { SEGMENT } else { &sub });
                out.push(')');
                rest = &at[consumed..];
            }
            None => {
                literal.push('<');
                rest = &at[1..];
            }
        }
    }
    literal.push_str(rest);
    flush_literal(&mut out, &mut literal);
    out.push('$');
    out
}

/// Escape the pending literal run into `out`, collapsing repeated `/`.
fn flush_literal(out: &mut String, literal: &mut String) {
    let mut collapsed = String::with_capacity(literal.len());
    let mut prev_slash = false;
    for c in literal.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        collapsed.push(c);
    }
    out.push_str(&regex::escape(&collapsed));
    literal.clear();
}

/// Parse `<name>` or `<name:sub>` at the start of `input`.
///
/// Returns the name, the translated sub-pattern (empty for `<name>`) and the
/// number of bytes consumed, or `None` if `input` does not start a capture.
fn parse_capture(input: &str) -> Option<(&str, String, usize)> {
    let body = input.strip_prefix('<')?;
    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(body.len());
    if name_len == 0 {
        return None;
    }
    let name = &body[..name_len];
    let tail = &body[name_len..];

    if tail.starts_with('>') {
        return Some((name, String::new(), 1 + name_len + 1));
    }
    let sub_src = tail.strip_prefix(':')?;

    let mut sub = String::new();
    let mut chars = sub_src.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '>' => return Some((name, sub, 1 + name_len + 1 + i + 1)),
            '\\' => match chars.next() {
                // `\>` is a word-boundary assertion in `regex`; the escape
                // here only means "literal `>`".
                Some((_, '>')) => sub.push('>'),
                Some((_, escaped)) => {
                    sub.push('\\');
                    sub.push(escaped);
                }
                None => sub.push('\\'),
            },
            _ => sub.push(c),
        }
    }
    None
}
