//! Call-site location and detection of tagged calls.
//!
//! The locator walks the token stream once, tracking bracket depth, and
//! records every `name(...)` invocation whose parentheses balance. Sites
//! whose argument list never closes are discarded rather than reported, so
//! a document that is mid-edit yields fewer results, never errors.
//!
//! On top of that, [`detect_at`] and [`detect_in_doc`] match located sites
//! against a feature's [`Tags`] and hand back resolved results. Everything
//! is recomputed from the document text per request; no detection state
//! survives between edits.

use tokio_util::sync::CancellationToken;

use crate::autocomplete::{split_arguments, string_value, Argument, AutocompleteResult};
use crate::facades::{UseMap, FACADE_NAMESPACE};
use crate::scanner::{self, Token};

/// What a detection feature is looking for: static calls on any of
/// `classes`, and plain or instance calls of any of `functions`.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    pub classes: Vec<String>,
    /// Method names matched only behind a `classes` receiver. When empty,
    /// `functions` gates static calls too.
    pub methods: Vec<String>,
    pub functions: Vec<String>,
}

impl Tags {
    /// Tags for plain function calls only.
    pub fn functions(names: &[&str]) -> Tags {
        Tags {
            classes: Vec::new(),
            methods: Vec::new(),
            functions: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Tags for a facade class, listed both by its short name and its
    /// canonical `Illuminate\Support\Facades\*` name.
    pub fn facade(name: &str) -> Tags {
        Tags {
            classes: vec![name.to_string(), format!("{FACADE_NAMESPACE}{name}")],
            methods: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Extends a class tag set with names matched on any receiver.
    pub fn with_functions(mut self, names: &[&str]) -> Tags {
        self.functions
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Extends a class tag set with static-only method names.
    pub fn with_methods(mut self, names: &[&str]) -> Tags {
        self.methods.extend(names.iter().map(|n| n.to_string()));
        self
    }

    fn class_matches(&self, written: &str, resolved: &str) -> bool {
        let last = resolved.rsplit('\\').next().unwrap_or(resolved);
        self.classes
            .iter()
            .any(|tag| resolved == tag || written == tag || last == tag)
    }
}

/// How the callee of a call site is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// `name(...)`
    Free,
    /// `Class::name(...)`, carrying the class reference as written.
    Static(String),
    /// `$obj->name(...)` or `$obj?->name(...)`.
    Instance,
}

/// A located invocation with a balanced argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Function or method name as written.
    pub callee: String,
    pub receiver: Receiver,
    /// Byte offset where the site begins (the class reference for static
    /// calls, the callee otherwise).
    pub start: usize,
    /// First byte after the opening parenthesis.
    pub args_start: usize,
    /// Byte offset of the closing parenthesis.
    pub args_end: usize,
}

impl CallSite {
    fn span_len(&self) -> usize {
        self.args_end + 1 - self.start
    }
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_class_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'\\' || b >= 0x80
}

/// Classify how the identifier starting at `ident_start` is invoked by
/// looking backwards through the raw text. Returns the receiver and the
/// byte offset the site starts at, or `None` for variable invocations like
/// `$fn(...)`, which no feature targets.
fn classify_receiver(doc: &str, ident_start: usize) -> Option<(Receiver, usize)> {
    let bytes = doc.as_bytes();
    let mut i = ident_start;
    while i > 0 && is_ws(bytes[i - 1]) {
        i -= 1;
    }
    if i >= 2 && &bytes[i - 2..i] == b"::" {
        let mut end = i - 2;
        while end > 0 && is_ws(bytes[end - 1]) {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && is_class_byte(bytes[start - 1]) {
            start -= 1;
        }
        if start == end || (start > 0 && bytes[start - 1] == b'$') {
            // `$obj::method()` resolves through a value we cannot see.
            return Some((Receiver::Instance, ident_start));
        }
        return Some((Receiver::Static(doc[start..end].to_string()), start));
    }
    if i >= 2 && &bytes[i - 2..i] == b"->" {
        return Some((Receiver::Instance, ident_start));
    }
    if i >= 1 && bytes[i - 1] == b'$' {
        return None;
    }
    Some((Receiver::Free, ident_start))
}

struct Frame {
    callee: String,
    receiver: Receiver,
    start: usize,
    args_start: usize,
    /// Bracket depth in effect before this frame's `(`.
    open_depth: i32,
}

/// Locate every balanced call site in `doc`, in document order.
///
/// Bracket depth is tracked across the whole text. A frame opened by
/// `name(` completes only when a `)` returns depth to the frame's opening
/// level; a `]` or `}` doing so instead abandons the frame, as does end of
/// input. Stray closers may drive the depth negative, which keeps sites
/// after unbalanced markup detectable.
pub fn find_call_sites(doc: &str) -> Vec<CallSite> {
    let mut sites = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut depth: i32 = 0;
    // Identifier waiting to become a callee if `(` follows.
    let mut pending: Option<(usize, usize, &str)> = None;

    for tok in scanner::scan(doc) {
        match tok {
            Token::Ident { start, end, name } => {
                pending = Some((start, end, name));
            }
            Token::Other { start, end } => {
                if !doc[start..end].bytes().all(is_ws) {
                    pending = None;
                }
            }
            Token::Delim { pos, ch } => {
                match ch {
                    '(' => {
                        if let Some((istart, _, name)) = pending.take() {
                            if let Some((receiver, start)) = classify_receiver(doc, istart) {
                                frames.push(Frame {
                                    callee: name.to_string(),
                                    receiver,
                                    start,
                                    args_start: pos + 1,
                                    open_depth: depth,
                                });
                            }
                        }
                        depth += 1;
                    }
                    ')' => {
                        depth -= 1;
                        while frames.last().is_some_and(|top| top.open_depth >= depth) {
                            if let Some(frame) = frames.pop() {
                                if frame.open_depth == depth {
                                    sites.push(CallSite {
                                        callee: frame.callee,
                                        receiver: frame.receiver,
                                        start: frame.start,
                                        args_start: frame.args_start,
                                        args_end: pos,
                                    });
                                }
                            }
                        }
                        pending = None;
                    }
                    ']' | '}' => {
                        depth -= 1;
                        while frames.last().is_some_and(|top| top.open_depth >= depth) {
                            frames.pop();
                        }
                        pending = None;
                    }
                    '[' | '{' => {
                        depth += 1;
                        pending = None;
                    }
                    _ => {
                        pending = None;
                    }
                }
            }
            Token::Str { .. } | Token::Comment { .. } => {
                pending = None;
            }
        }
    }

    // Frames still open at end of input never balanced; drop them.
    sites.sort_by_key(|site| site.start);
    sites
}

/// Source of project data a feature consumes. Detection in a document is
/// skipped until the backing scan has produced data, so features never
/// flag values against a half-built index.
pub trait DataProvider {
    fn is_loaded(&self) -> bool;
}

/// A matched call site plus one of its arguments, as handed to
/// [`detect_in_doc`] callbacks.
pub struct DetectMatch<'a> {
    pub site: &'a CallSite,
    /// Resolved class for static calls.
    pub class: Option<String>,
    pub args: &'a [Argument],
    /// Index of the argument this match reports.
    pub index: usize,
}

impl DetectMatch<'_> {
    pub fn param(&self) -> &Argument {
        &self.args[self.index]
    }

    /// Unescaped string contents of the reported argument, when it is a
    /// simple literal.
    pub fn value(&self) -> Option<String> {
        string_value(&self.param().text)
    }
}

/// Check a located site against `tags`, resolving the written class
/// reference through the document's imports. `Some(None)` means a match
/// on a plain or instance call, `Some(Some(class))` a static match.
fn match_site(site: &CallSite, tags: &Tags, uses: &UseMap) -> Option<Option<String>> {
    match &site.receiver {
        Receiver::Free | Receiver::Instance => {
            if tags.functions.iter().any(|f| f == &site.callee) {
                Some(None)
            } else {
                None
            }
        }
        Receiver::Static(written) => {
            if tags.classes.is_empty() {
                return None;
            }
            let resolved = uses.resolve(written);
            if !tags.class_matches(written, &resolved) {
                return None;
            }
            let names = if tags.methods.is_empty() {
                &tags.functions
            } else {
                &tags.methods
            };
            if !names.is_empty() && !names.iter().any(|f| f == &site.callee) {
                return None;
            }
            Some(Some(resolved))
        }
    }
}

/// Resolve the call the cursor is inside of, if it matches `tags`.
///
/// When call sites nest, the innermost argument list containing the offset
/// wins. Returns `None` when the cursor is not inside any matching site's
/// parentheses.
pub fn detect_at(
    doc: &str,
    offset: usize,
    tags: &Tags,
    cancel: &CancellationToken,
) -> Option<AutocompleteResult> {
    let uses = UseMap::parse(doc);
    let mut best: Option<(CallSite, Option<String>)> = None;

    for site in find_call_sites(doc) {
        if cancel.is_cancelled() {
            return None;
        }
        if offset < site.args_start || offset > site.args_end {
            continue;
        }
        let Some(class) = match_site(&site, tags, &uses) else {
            continue;
        };
        if best
            .as_ref()
            .is_none_or(|(b, _)| site.span_len() < b.span_len())
        {
            best = Some((site, class));
        }
    }

    let (site, class) = best?;
    AutocompleteResult::resolve(
        doc,
        &site.callee,
        class,
        site.args_start,
        site.args_end,
        offset,
    )
}

/// Run `on_match` for every argument of every call in `doc` matching
/// `tags`, in document order, collecting the values it returns.
///
/// Used by whole-document passes such as diagnostics and document links.
/// Does nothing until `provider` has loaded, and stops between sites once
/// `cancel` fires.
pub fn detect_in_doc<R>(
    doc: &str,
    tags: &Tags,
    provider: &dyn DataProvider,
    cancel: &CancellationToken,
    mut on_match: impl FnMut(&DetectMatch<'_>) -> Option<R>,
) -> Vec<R> {
    let mut results = Vec::new();
    if !provider.is_loaded() {
        return results;
    }
    let uses = UseMap::parse(doc);

    for site in find_call_sites(doc) {
        if cancel.is_cancelled() {
            break;
        }
        let Some(class) = match_site(&site, tags, &uses) else {
            continue;
        };
        let args = split_arguments(doc, site.args_start, site.args_end);
        for index in 0..args.len() {
            let found = on_match(&DetectMatch {
                site: &site,
                class: class.clone(),
                args: &args,
                index,
            });
            results.extend(found);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Loaded;
    impl DataProvider for Loaded {
        fn is_loaded(&self) -> bool {
            true
        }
    }

    struct NotLoaded;
    impl DataProvider for NotLoaded {
        fn is_loaded(&self) -> bool {
            false
        }
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn locates_simple_call() {
        let sites = find_call_sites("view('home')");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].callee, "view");
        assert_eq!(sites[0].receiver, Receiver::Free);
        assert_eq!(sites[0].args_start, 5);
        assert_eq!(sites[0].args_end, 11);
    }

    #[test]
    fn locates_nested_calls() {
        let sites = find_call_sites("f(g(x), y)");
        let names: Vec<_> = sites.iter().map(|s| s.callee.as_str()).collect();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn static_call_records_written_class() {
        let sites = find_call_sites("Route::get('/', fn () => 1)");
        assert_eq!(sites[0].callee, "get");
        assert_eq!(
            sites[0].receiver,
            Receiver::Static("Route".to_string())
        );
        assert_eq!(sites[0].start, 0);
    }

    #[test]
    fn qualified_static_call() {
        let doc = "\\Illuminate\\Support\\Facades\\Route::get('/')";
        let sites = find_call_sites(doc);
        assert_eq!(
            sites[0].receiver,
            Receiver::Static("\\Illuminate\\Support\\Facades\\Route".to_string())
        );
    }

    #[test]
    fn instance_call_has_no_class() {
        let sites = find_call_sites("$request->route('id')");
        assert_eq!(sites[0].receiver, Receiver::Instance);
        assert_eq!(sites[0].callee, "route");
    }

    #[test]
    fn nullsafe_call_is_instance() {
        let sites = find_call_sites("$request?->user('web')");
        assert_eq!(sites[0].receiver, Receiver::Instance);
    }

    #[test]
    fn variable_invocation_is_not_a_site() {
        assert!(find_call_sites("$callback('x')").is_empty());
    }

    #[test]
    fn unbalanced_call_is_discarded() {
        assert!(find_call_sites("view('home', ").is_empty());
    }

    #[test]
    fn inner_site_survives_unbalanced_outer() {
        let sites = find_call_sites("outer(view('home')");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].callee, "view");
    }

    #[test]
    fn call_in_comment_or_string_is_ignored() {
        assert!(find_call_sites("// view('home')").is_empty());
        assert!(find_call_sites("'view(\\'home\\')'").is_empty());
    }

    #[test]
    fn mismatched_bracket_abandons_frame() {
        assert!(find_call_sites("f(a]").is_empty());
    }

    #[test]
    fn stray_closer_before_call_is_harmless() {
        let sites = find_call_sites("<p>:-)</p> @include('partials.nav')");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].callee, "@include");
    }

    #[test]
    fn closure_argument_keeps_outer_site() {
        let doc = "Route::get('/', function () { return view('home'); })";
        let sites = find_call_sites(doc);
        let names: Vec<_> = sites.iter().map(|s| s.callee.as_str()).collect();
        assert!(names.contains(&"get"), "{names:?}");
        assert!(names.contains(&"view"), "{names:?}");
    }

    #[test]
    fn detect_at_matches_function_tag() {
        let doc = "$x = view('home');";
        let offset = doc.find("home").unwrap();
        let result =
            detect_at(doc, offset, &Tags::functions(&["view"]), &token()).unwrap();
        assert_eq!(result.func(), "view");
        assert_eq!(result.class(), None);
        assert_eq!(result.param_value(0).as_deref(), Some("home"));
    }

    #[test]
    fn detect_at_prefers_innermost_site() {
        let doc = "view(route('home'), [])";
        let tags = Tags::functions(&["view", "route"]);
        let offset = doc.find("home").unwrap();
        let result = detect_at(doc, offset, &tags, &token()).unwrap();
        assert_eq!(result.func(), "route");

        let offset = doc.find('[').unwrap();
        let result = detect_at(doc, offset, &tags, &token()).unwrap();
        assert_eq!(result.func(), "view");
    }

    #[test]
    fn detect_at_resolves_facade_alias() {
        let doc = "<?php\nuse Illuminate\\Support\\Facades\\Route as R;\nR::get('/home', 'HomeController@index');";
        let tags = Tags::facade("Route").with_functions(&["get"]);
        let offset = doc.find("/home").unwrap();
        let result = detect_at(doc, offset, &tags, &token()).unwrap();
        assert_eq!(result.func(), "get");
        assert_eq!(
            result.class(),
            Some("Illuminate\\Support\\Facades\\Route")
        );
    }

    #[test]
    fn detect_at_rejects_unrelated_class() {
        let doc = "Cache::get('key')";
        let tags = Tags::facade("Route").with_functions(&["get"]);
        let offset = doc.find("key").unwrap();
        assert!(detect_at(doc, offset, &tags, &token()).is_none());
    }

    #[test]
    fn methods_match_only_static_receivers() {
        let tags = Tags::facade("Route").with_methods(&["get"]);
        assert!(detect_at("Route::get('/x')", 12, &tags, &token()).is_some());
        assert!(detect_at("get('/x')", 5, &tags, &token()).is_none());
        assert!(detect_at("$bag->get('/x')", 11, &tags, &token()).is_none());
    }

    #[test]
    fn detect_at_outside_parens_is_none() {
        let doc = "view('home')";
        let tags = Tags::functions(&["view"]);
        assert!(detect_at(doc, 2, &tags, &token()).is_none());
        assert!(detect_at(doc, doc.len(), &tags, &token()).is_none());
    }

    #[test]
    fn detect_at_cancelled_returns_none() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let doc = "view('home')";
        assert!(detect_at(doc, 6, &Tags::functions(&["view"]), &cancel).is_none());
    }

    #[test]
    fn detect_in_doc_visits_every_argument() {
        let doc = "view('a'); view('b', ['x' => 1]);";
        let visited = detect_in_doc(
            doc,
            &Tags::functions(&["view"]),
            &Loaded,
            &token(),
            |m| Some((m.index, m.param().text.clone())),
        );
        assert_eq!(
            visited,
            vec![
                (0, "'a'".to_string()),
                (0, "'b'".to_string()),
                (1, "['x' => 1]".to_string()),
            ]
        );
    }

    #[test]
    fn detect_in_doc_requires_loaded_provider() {
        let doc = "view('a');";
        let visited = detect_in_doc(
            doc,
            &Tags::functions(&["view"]),
            &NotLoaded,
            &token(),
            |m| Some(m.index),
        );
        assert!(visited.is_empty());
    }

    #[test]
    fn detect_in_doc_reports_sites_in_document_order() {
        let doc = "config('a'); config('b');";
        let values = detect_in_doc(
            doc,
            &Tags::functions(&["config"]),
            &Loaded,
            &token(),
            |m| m.value(),
        );
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }
}
