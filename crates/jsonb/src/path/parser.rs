//! Property path parser for state tree addressing.
//!
//! Supports the dot-and-bracket convention:
//! - `a.b.c` - object field access
//! - `a[1]` or `a.1` - array index access (both parse to segment `1`)
//! - `a['x-y']` or `a["x.y"]` - quoted field access
//! - `@@GLOBAL` / `@@STATE` - the entire state tree
//!
//! Paths are parsed once into a segment sequence and carry a canonical string
//! form that is used as the key in every registry.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;
use strata_core::Error;

/// Canonical key of the path denoting the entire state tree.
pub const GLOBAL_SELECTOR: &str = "@@GLOBAL";

/// Selector literal requesting the entire state tree.
pub const FULL_STATE_SELECTOR: &str = "@@STATE";

/// A parsed, normalized property path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyPath {
    segments: Vec<String>,
    canonical: String,
}

/// Error type for property path parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub input: String,
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(input: &str, message: impl Into<String>, position: usize) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in `{}` at position {}",
            self.message, self.input, self.position
        )
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::invalid_path(err.input, err.position, err.message)
    }
}

/// Parser state.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.input, message, self.pos)
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            Some(c) => Err(self.error(format!("Expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("Expected '{}', found end of input", expected))),
        }
    }

    /// Reads a bare property name: everything up to the next `.`, `[` or `]`.
    fn parse_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' || c == ']' {
                break;
            }
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("Expected property name"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_index(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        // kept verbatim: `[007]` is the same path as `.007`, which is not an index
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_string_literal(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("Expected string literal")),
        };
        self.advance();

        let start = self.pos;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == quote {
                self.advance();
                return Ok(out);
            }
            if c == '\\' {
                self.advance();
                match self.peek() {
                    Some(escaped) => out.push(escaped),
                    None => break,
                }
            } else {
                out.push(c);
            }
            self.advance();
        }
        Err(ParseError::new(self.input, "Unterminated string", start))
    }

    fn parse_bracket(&mut self) -> Result<String, ParseError> {
        self.expect('[')?;
        let segment = match self.peek() {
            Some(c) if c.is_ascii_digit() => self.parse_index()?,
            Some('\'') | Some('"') => self.parse_string_literal()?,
            _ => return Err(self.error("Invalid bracket expression")),
        };
        self.expect(']')?;
        Ok(segment)
    }
}

/// Returns the array index a segment denotes.
///
/// Only canonical integers index arrays: `"0"`, `"7"`, `"12"`. A segment with
/// a leading zero such as `"07"` is a plain key and never aliases element 7,
/// so every array element has exactly one path.
pub fn array_index(segment: &str) -> Option<usize> {
    let bytes = segment.as_bytes();
    match bytes {
        [] => None,
        [b'0'] => Some(0),
        [b'0', ..] => None,
        _ if bytes.iter().all(u8::is_ascii_digit) => segment.parse().ok(),
        _ => None,
    }
}

impl PropertyPath {
    /// Returns the path denoting the entire state tree.
    pub fn global() -> Self {
        Self {
            segments: Vec::new(),
            canonical: GLOBAL_SELECTOR.to_string(),
        }
    }

    /// Parses a property path from a string.
    ///
    /// The reserved literals `@@GLOBAL` and `@@STATE` parse to
    /// [`PropertyPath::global`].
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if trimmed == GLOBAL_SELECTOR || trimmed == FULL_STATE_SELECTOR {
            return Ok(Self::global());
        }
        if trimmed.is_empty() {
            return Err(ParseError::new(input, "Empty property path", 0));
        }

        let mut parser = Parser::new(trimmed);
        let mut segments = Vec::new();

        match parser.peek() {
            Some('[') => segments.push(parser.parse_bracket()?),
            _ => segments.push(parser.parse_name()?),
        }

        loop {
            match parser.peek() {
                Some('.') => {
                    parser.advance();
                    segments.push(parser.parse_name()?);
                }
                Some('[') => segments.push(parser.parse_bracket()?),
                Some(c) => {
                    return Err(parser.error(format!("Unexpected '{}'", c)));
                }
                None => break,
            }
        }

        Ok(Self::from_segments(segments))
    }

    /// Builds a path from already-normalized segments.
    ///
    /// An empty segment list yields the global path.
    pub fn from_segments(segments: Vec<String>) -> Self {
        if segments.is_empty() {
            return Self::global();
        }
        let canonical = canonicalize(&segments);
        Self {
            segments,
            canonical,
        }
    }

    /// Returns true if this path denotes the entire state tree.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the normalized segments.
    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the canonical string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Returns the number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if this is the global path.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new path extended by one segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::from_segments(segments)
    }

    /// Returns the parent path, or `None` for the global path.
    pub fn parent(&self) -> Option<Self> {
        if self.is_global() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self::from_segments(segments))
    }

    /// Returns every ancestor, from the global path down to the parent.
    pub fn ancestors(&self) -> impl Iterator<Item = PropertyPath> + '_ {
        (0..self.segments.len()).map(move |n| Self::from_segments(self.segments[..n].to_vec()))
    }

    /// Returns true if `self` is equal to `other` or an ancestor of it.
    pub fn is_prefix_of(&self, other: &PropertyPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// Returns true if one path is a prefix of the other.
    #[inline]
    pub fn intersects(&self, other: &PropertyPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

fn canonicalize(segments: &[String]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let needs_quotes = segment.is_empty()
            || segment.contains(|c| matches!(c, '.' | '[' | ']'))
            || segment.starts_with("@@");
        if needs_quotes {
            out.push_str("['");
            for c in segment.chars() {
                if c == '\'' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push_str("']");
        } else {
            if i > 0 {
                out.push('.');
            }
            out.push_str(segment);
        }
    }
    out
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for PropertyPath {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyPath::parse(s)
    }
}
