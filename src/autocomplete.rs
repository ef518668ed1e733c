//! Argument splitting and cursor-to-argument resolution.
//!
//! Once a call site is located, the span between its parentheses is split
//! into argument expressions and the cursor is mapped to an argument index.
//! All spans are byte offsets into the original document.

use crate::scanner::{self, depth_delta, Token};

/// One argument expression of a call, with surrounding whitespace trimmed
/// off the recorded span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub is_array: bool,
}

/// Positions of commas separating top-level arguments in
/// `doc[start..end]`. Commas nested in brackets, strings or comments do
/// not separate arguments.
fn top_level_commas(doc: &str, start: usize, end: usize) -> Vec<usize> {
    let mut commas = Vec::new();
    let mut depth: i32 = 0;
    for tok in scanner::scan(&doc[start..end]) {
        if let Token::Delim { pos, ch } = tok {
            if ch == ',' && depth == 0 {
                commas.push(start + pos);
            } else {
                depth += depth_delta(ch);
            }
        }
    }
    commas
}

fn is_array_literal(text: &str) -> bool {
    if text.starts_with('[') {
        return true;
    }
    match text.get(..5) {
        Some(head) if head.eq_ignore_ascii_case("array") => {
            text[5..].trim_start().starts_with('(')
        }
        _ => false,
    }
}

fn build_arguments(doc: &str, start: usize, end: usize, commas: &[usize]) -> Vec<Argument> {
    let mut bounds = Vec::with_capacity(commas.len() + 2);
    bounds.push(start);
    bounds.extend(commas.iter().map(|&c| c));
    bounds.push(end);

    let mut args = Vec::with_capacity(bounds.len() - 1);
    for (index, pair) in bounds.windows(2).enumerate() {
        let seg_start = if index == 0 { pair[0] } else { pair[0] + 1 };
        let seg_end = pair[1];
        let seg = &doc[seg_start..seg_end];
        let trimmed = seg.trim_start();
        let tstart = seg_start + (seg.len() - trimmed.len());
        let text = trimmed.trim_end();
        args.push(Argument {
            index,
            start: tstart,
            end: tstart + text.len(),
            is_array: is_array_literal(text),
            text: text.to_string(),
        });
    }

    // A bare `f()` has no arguments rather than one empty one.
    if args.len() == 1 && args[0].text.is_empty() {
        args.clear();
    }
    args
}

/// Split the argument list spanning `doc[start..end]` (the text between a
/// call's parentheses) into arguments.
pub fn split_arguments(doc: &str, start: usize, end: usize) -> Vec<Argument> {
    let commas = top_level_commas(doc, start, end);
    build_arguments(doc, start, end, &commas)
}

/// The argument index a cursor falls in, given the top-level comma
/// positions. A cursor immediately after a comma counts toward the
/// argument that follows it.
fn param_index_at(commas: &[usize], cursor: usize) -> usize {
    commas.iter().filter(|&&pos| pos < cursor).count()
}

/// A located call with the cursor inside its argument list.
///
/// This is the unit every completion and diagnostic feature consumes: which
/// callable is being invoked, on which class (for static calls), the parsed
/// arguments, and which of them holds the cursor.
#[derive(Debug, Clone)]
pub struct AutocompleteResult {
    callee: String,
    class: Option<String>,
    args: Vec<Argument>,
    current: usize,
    cursor: usize,
}

impl AutocompleteResult {
    /// Resolve the cursor against a call's argument span. Returns `None`
    /// when the cursor is outside `[args_start, args_end]`; a cursor right
    /// before the closing parenthesis still counts as inside.
    pub fn resolve(
        doc: &str,
        callee: &str,
        class: Option<String>,
        args_start: usize,
        args_end: usize,
        cursor: usize,
    ) -> Option<AutocompleteResult> {
        if cursor < args_start || cursor > args_end {
            return None;
        }
        let commas = top_level_commas(doc, args_start, args_end);
        let current = param_index_at(&commas, cursor);
        let args = build_arguments(doc, args_start, args_end, &commas);
        Some(AutocompleteResult {
            callee: callee.to_string(),
            class,
            args,
            current,
            cursor,
        })
    }

    /// Name of the function or method being called, without any class
    /// qualifier.
    pub fn func(&self) -> &str {
        &self.callee
    }

    /// Fully resolved class for static calls, `None` for plain function
    /// calls.
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.args
    }

    /// Index of the argument the cursor is in. Valid even when the list is
    /// still empty, in which case it is 0.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True when the cursor sits in argument `index`.
    pub fn is_param_index(&self, index: usize) -> bool {
        self.current == index
    }

    pub fn param(&self, index: usize) -> Option<&Argument> {
        self.args.get(index)
    }

    pub fn current_param(&self) -> Option<&Argument> {
        self.args.get(self.current)
    }

    /// True when the argument under the cursor is an array literal, either
    /// `[...]` or `array(...)`.
    pub fn current_param_is_array(&self) -> bool {
        self.current_param().is_some_and(|arg| arg.is_array)
    }

    /// The literal contents of argument `index`, if it is a simple string
    /// literal.
    pub fn param_value(&self, index: usize) -> Option<String> {
        string_value(&self.param(index)?.text)
    }

    pub fn current_param_value(&self) -> Option<String> {
        string_value(&self.current_param()?.text)
    }
}

/// Extract the unescaped contents of a string literal.
///
/// Returns `None` unless `text` is wrapped in a matching pair of quotes
/// with no unescaped quote of the same kind inside, so concatenations and
/// interpolation-heavy expressions are left alone. Escapes follow PHP:
/// the quote and `\\` unescape in both styles, `\n`, `\t` and `\r` only
/// in double quotes, and any other backslash sequence keeps its
/// backslash, so `'App\Http\Controllers\...'` round-trips.
pub fn string_value(text: &str) -> Option<String> {
    if text.len() < 2 {
        return None;
    }
    let quote = match text.as_bytes()[0] {
        b'\'' => '\'',
        b'"' => '"',
        _ => return None,
    };
    if !text.ends_with(quote) {
        return None;
    }
    let inner = &text[1..text.len() - 1];

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') if quote == '"' => out.push('\n'),
                Some('t') if quote == '"' => out.push('\t'),
                Some('r') if quote == '"' => out.push('\r'),
                Some(esc) if esc == quote || esc == '\\' => out.push(esc),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return None,
            }
        } else if c == quote {
            return None;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Byte range of the contents between an argument's quotes, when the
/// argument is a simple string literal. Used to place links and
/// diagnostics on the value rather than the quotes.
pub fn value_range(arg: &Argument) -> Option<(usize, usize)> {
    string_value(&arg.text)?;
    Some((arg.start + 1, arg.end - 1))
}
