//! Extraction of dotted keys from PHP files that `return` an array.
//!
//! Config and translation files follow the same shape: a single returned
//! array with string keys, nested arbitrarily deep. This walks the token
//! stream of such a file and flattens the string-keyed structure into
//! dotted paths, without evaluating any PHP. Keys it cannot read (numeric
//! keys, constant keys, concatenations) are skipped along with their
//! values; a truncated file just yields the keys seen so far.

use crate::autocomplete::string_value;
use crate::scanner::{self, depth_delta, Token};

/// One key of the returned array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayKey {
    /// Dotted path, e.g. `session.cookie`.
    pub key: String,
    /// Byte offset of the key's string literal.
    pub offset: usize,
    /// Source text of the value for scalar values; `None` when the value
    /// is itself an array.
    pub value: Option<String>,
}

struct Cursor<'a> {
    content: &'a str,
    toks: Vec<Token<'a>>,
    i: usize,
}

impl<'a> Cursor<'a> {
    fn new(content: &'a str) -> Cursor<'a> {
        Cursor {
            content,
            toks: scanner::scan(content).collect(),
            i: 0,
        }
    }

    fn text(&self, tok: &Token<'a>) -> &'a str {
        let (start, end) = tok.span();
        &self.content[start..end]
    }

    fn significant(&self, tok: &Token<'a>) -> bool {
        match tok {
            Token::Comment { .. } => false,
            Token::Other { start, end } => !self.content[*start..*end].trim().is_empty(),
            _ => true,
        }
    }

    /// Next significant token without consuming it. Insignificant tokens
    /// before it are dropped for good.
    fn peek(&mut self) -> Option<Token<'a>> {
        while let Some(tok) = self.toks.get(self.i) {
            if self.significant(tok) {
                return Some(tok.clone());
            }
            self.i += 1;
        }
        None
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let tok = self.peek()?;
        self.i += 1;
        Some(tok)
    }

    /// Significant token after the next one, without consuming either.
    fn peek2(&mut self) -> Option<Token<'a>> {
        let saved = self.i;
        self.next()?;
        let tok = self.peek();
        self.i = saved;
        tok
    }
}

/// Collect the string keys of the array `content` returns. Nested arrays
/// contribute dotted paths; the key holding a nested array is reported as
/// well, since code can reference whole sections.
pub fn keys(content: &str) -> Vec<ArrayKey> {
    let mut cur = Cursor::new(content);
    let mut out = Vec::new();

    // Find `return [` or `return array(`.
    while let Some(tok) = cur.next() {
        let Token::Ident { name, .. } = tok else {
            continue;
        };
        if name != "return" {
            continue;
        }
        match cur.peek() {
            Some(Token::Delim { ch: '[', .. }) => {
                cur.next();
                parse_array(&mut cur, "", ']', &mut out);
                break;
            }
            Some(Token::Ident { name: "array", .. }) => {
                cur.next();
                if matches!(cur.peek(), Some(Token::Delim { ch: '(', .. })) {
                    cur.next();
                    parse_array(&mut cur, "", ')', &mut out);
                    break;
                }
            }
            _ => {}
        }
    }
    out
}

/// Parse one array level. The cursor sits right after the opening
/// delimiter on entry and is consumed through the matching `closer`.
fn parse_array(cur: &mut Cursor<'_>, prefix: &str, closer: char, out: &mut Vec<ArrayKey>) {
    loop {
        let Some(tok) = cur.peek() else {
            return;
        };
        if matches!(tok, Token::Delim { ch, .. } if ch == closer) {
            cur.next();
            return;
        }
        cur.next();

        let Token::Str { start, end, .. } = tok else {
            // Not a string-keyed element; drain it.
            let depth = match tok {
                Token::Delim { ch: ',', .. } => continue,
                Token::Delim { ch, .. } => depth_delta(ch),
                _ => 0,
            };
            skip_element(cur, closer, depth);
            continue;
        };

        // A string: only a key if `=>` follows.
        let arrow = match cur.peek() {
            Some(t @ Token::Other { .. }) if cur.text(&t).trim().starts_with("=>") => {
                cur.next();
                t
            }
            _ => {
                skip_element(cur, closer, 0);
                continue;
            }
        };
        let Some(key) = string_value(&cur.content[start..end]) else {
            skip_element(cur, closer, 0);
            continue;
        };
        let full_key = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };

        // A scalar value can share the arrow's token, e.g. ` => 42`.
        let inline_value = cur.text(&arrow).trim().trim_start_matches("=>").trim();

        let nested_closer = if inline_value.is_empty() {
            match cur.peek() {
                Some(Token::Delim { ch: '[', .. }) => {
                    cur.next();
                    Some(']')
                }
                Some(Token::Ident { name: "array", .. })
                    if matches!(cur.peek2(), Some(Token::Delim { ch: '(', .. })) =>
                {
                    cur.next();
                    cur.next();
                    Some(')')
                }
                _ => None,
            }
        } else {
            None
        };

        if let Some(nested) = nested_closer {
            out.push(ArrayKey {
                key: full_key.clone(),
                offset: start,
                value: None,
            });
            parse_array(cur, &full_key, nested, out);
            if matches!(cur.peek(), Some(Token::Delim { ch: ',', .. })) {
                cur.next();
            }
        } else {
            let value_start = if inline_value.is_empty() {
                cur.peek().map(|t| t.span().0).unwrap_or(arrow.span().1)
            } else {
                let (astart, aend) = arrow.span();
                cur.content[astart..aend]
                    .find("=>")
                    .map(|p| astart + p + 2)
                    .unwrap_or(aend)
            };
            let consumed_end = skip_element(cur, closer, 0);
            let value_end = consumed_end.max(arrow.span().1).max(value_start);
            out.push(ArrayKey {
                key: full_key,
                offset: start,
                value: Some(preview(&cur.content[value_start..value_end])),
            });
        }
    }
}

/// Drain the remainder of one array element: everything up to a top-level
/// comma (consumed) or the level's closer (left for the caller). Returns
/// the end offset of the last token consumed.
fn skip_element(cur: &mut Cursor<'_>, closer: char, mut depth: i32) -> usize {
    let mut end = 0;
    loop {
        let Some(tok) = cur.peek() else {
            return end;
        };
        if depth <= 0 {
            if let Token::Delim { pos, ch } = tok {
                if ch == ',' {
                    cur.next();
                    return end.max(pos);
                }
                if ch == closer {
                    return end;
                }
            }
        }
        cur.next();
        if let Token::Delim { ch, .. } = tok {
            depth += depth_delta(ch);
        }
        end = end.max(tok.span().1);
    }
}

/// Single-line, length-capped rendering of value source text.
fn preview(text: &str) -> String {
    let collapsed: Vec<&str> = text.split_whitespace().collect();
    let mut line = collapsed.join(" ");
    if line.len() > 60 {
        let cut = line
            .char_indices()
            .take_while(|(i, _)| *i <= 57)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        line.truncate(cut);
        line.push_str("...");
    }
    line
}
