//! Token scanner for PHP and Blade source text.
//!
//! This is not a PHP lexer. It classifies the handful of spans the rest of
//! the crate needs to reason about (string literals, comments, identifiers
//! and bracket delimiters) and treats everything else as inert filler, so
//! that bracket counting stays correct even inside constructs we never model.
//!
//! Editor buffers are routinely mid-edit, so nothing here can fail: an
//! unterminated string or comment simply extends to the end of the text.

/// A classified span of source text. Offsets are byte offsets into the
/// scanned string; `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A single- or double-quoted string, including its quotes. Backslash
    /// escapes are honored, so an escaped quote does not terminate the span.
    Str {
        start: usize,
        end: usize,
        quote: char,
    },
    /// A `//`, `#` or `/* ... */` comment.
    Comment { start: usize, end: usize },
    /// An identifier, optionally `@`-prefixed (Blade directives are matched
    /// as callables, e.g. `@extends('layouts.app')`).
    Ident {
        start: usize,
        end: usize,
        name: &'a str,
    },
    /// One of `( ) [ ] { } ,`, the delimiters nesting and argument
    /// splitting care about.
    Delim { pos: usize, ch: char },
    /// A maximal run of anything else (whitespace, operators, variables,
    /// numbers). Kept in the stream so consumers can inspect the raw text
    /// between interesting tokens.
    Other { start: usize, end: usize },
}

impl Token<'_> {
    /// Byte range covered by this token.
    pub fn span(&self) -> (usize, usize) {
        match *self {
            Token::Str { start, end, .. }
            | Token::Comment { start, end }
            | Token::Ident { start, end, .. }
            | Token::Other { start, end } => (start, end),
            Token::Delim { pos, .. } => (pos, pos + 1),
        }
    }
}

/// Returns how a delimiter changes nesting depth: `+1` for openers, `-1`
/// for closers, `0` for `,`.
pub(crate) fn depth_delta(ch: char) -> i32 {
    match ch {
        '(' | '[' | '{' => 1,
        ')' | ']' | '}' => -1,
        _ => 0,
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Scan `text` into a token stream.
pub fn scan(text: &str) -> Scanner<'_> {
    Scanner { text, pos: 0 }
}

/// Iterator produced by [`scan`].
pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes().get(self.pos + ahead).copied()
    }

    /// Consume a quoted string starting at `self.pos` (which holds the
    /// opening quote). A backslash escapes the following byte, so `\'` and
    /// `\\` never terminate the literal early.
    fn take_string(&mut self, quote: u8) -> Token<'a> {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            self.pos += 1;
            if b == b'\\' {
                if self.peek(0).is_some() {
                    self.pos += 1;
                }
            } else if b == quote {
                break;
            }
        }
        Token::Str {
            start,
            end: self.pos,
            quote: quote as char,
        }
    }

    fn take_line_comment(&mut self) -> Token<'a> {
        let start = self.pos;
        while let Some(b) = self.peek(0) {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        Token::Comment {
            start,
            end: self.pos,
        }
    }

    fn take_block_comment(&mut self) -> Token<'a> {
        let start = self.pos;
        self.pos += 2;
        while let Some(b) = self.peek(0) {
            if b == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                break;
            }
            self.pos += 1;
        }
        Token::Comment {
            start,
            end: self.pos,
        }
    }

    fn take_ident(&mut self, start: usize) -> Token<'a> {
        while let Some(b) = self.peek(0) {
            if !is_ident_continue(b) {
                break;
            }
            self.pos += 1;
        }
        Token::Ident {
            start,
            end: self.pos,
            name: &self.text[start..self.pos],
        }
    }

    /// True when the byte at `pos` begins a token we classify (as opposed
    /// to filler).
    fn at_token_start(&self) -> bool {
        let Some(b) = self.peek(0) else {
            return false;
        };
        match b {
            b'\'' | b'"' => true,
            b'/' => matches!(self.peek(1), Some(b'/') | Some(b'*')),
            // `#` opens a line comment, but `#[` is a PHP attribute whose
            // brackets must still be counted.
            b'#' => self.peek(1) != Some(b'['),
            b'(' | b')' | b'[' | b']' | b'{' | b'}' | b',' => true,
            b'@' => self.peek(1).is_some_and(is_ident_start),
            _ => is_ident_start(b),
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let b = self.peek(0)?;
        match b {
            b'\'' | b'"' => Some(self.take_string(b)),
            b'/' if self.peek(1) == Some(b'/') => Some(self.take_line_comment()),
            b'/' if self.peek(1) == Some(b'*') => Some(self.take_block_comment()),
            b'#' if self.peek(1) != Some(b'[') => Some(self.take_line_comment()),
            b'(' | b')' | b'[' | b']' | b'{' | b'}' | b',' => {
                let pos = self.pos;
                self.pos += 1;
                Some(Token::Delim {
                    pos,
                    ch: b as char,
                })
            }
            b'@' if self.peek(1).is_some_and(is_ident_start) => {
                let start = self.pos;
                self.pos += 2;
                Some(self.take_ident(start))
            }
            _ if is_ident_start(b) => {
                let start = self.pos;
                self.pos += 1;
                Some(self.take_ident(start))
            }
            _ => {
                let start = self.pos;
                self.pos += 1;
                while self.peek(0).is_some() && !self.at_token_start() {
                    self.pos += 1;
                }
                Some(Token::Other {
                    start,
                    end: self.pos,
                })
            }
        }
    }
}
