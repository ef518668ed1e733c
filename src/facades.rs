//! Resolution of class references through `use` imports and aliases.
//!
//! A static call like `Route::get(...)` names whatever `Route` means in the
//! current file: an explicit import, an alias, or (absent both) the Laravel
//! facade of that name. Resolution is recomputed from the document text on
//! every request, so stale imports can never leak between edits.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

/// Namespace assumed for bare class references with no matching import.
pub const FACADE_NAMESPACE: &str = "Illuminate\\Support\\Facades\\";

lazy_static! {
    /// `use Foo\Bar;` and `use Foo\Bar as Baz;`
    static ref USE_RE: Regex = Regex::new(
        r"(?m)^\s*use\s+(function\s+|const\s+)?\\?([A-Za-z_][A-Za-z0-9_\\]*)\s*(?:as\s+([A-Za-z_][A-Za-z0-9_]*)\s*)?;"
    )
    .unwrap();
    /// `use Foo\{Bar, Baz as Qux};`
    static ref GROUP_USE_RE: Regex = Regex::new(
        r"(?m)^\s*use\s+\\?([A-Za-z_][A-Za-z0-9_\\]*)\\\{([^}]*)\}\s*;"
    )
    .unwrap();
    static ref GROUP_ITEM_RE: Regex = Regex::new(
        r"([A-Za-z_][A-Za-z0-9_\\]*)\s*(?:as\s+([A-Za-z_][A-Za-z0-9_]*))?"
    )
    .unwrap();
}

/// Imports visible in one document, keyed by the short name a call site
/// would write.
#[derive(Debug, Default)]
pub struct UseMap {
    imports: HashMap<String, String>,
}

impl UseMap {
    /// Collect `use` statements from `doc`. Function and constant imports
    /// are skipped since they can never satisfy a `Class::method` reference.
    pub fn parse(doc: &str) -> Self {
        let mut imports = HashMap::new();

        for cap in USE_RE.captures_iter(doc) {
            if cap.get(1).is_some() {
                continue;
            }
            let path = &cap[2];
            let short = match cap.get(3) {
                Some(alias) => alias.as_str(),
                None => path.rsplit('\\').next().unwrap_or(path),
            };
            imports.insert(short.to_string(), path.to_string());
        }

        for cap in GROUP_USE_RE.captures_iter(doc) {
            let prefix = &cap[1];
            for item in cap[2].split(',') {
                let Some(icap) = GROUP_ITEM_RE.captures(item.trim()) else {
                    continue;
                };
                let path = format!("{prefix}\\{}", &icap[1]);
                let short = match icap.get(2) {
                    Some(alias) => alias.as_str().to_string(),
                    None => icap[1]
                        .rsplit('\\')
                        .next()
                        .unwrap_or(&icap[1])
                        .to_string(),
                };
                imports.insert(short, path);
            }
        }

        UseMap { imports }
    }

    /// Resolve a class reference as written at a call site to a fully
    /// qualified name (no leading backslash).
    ///
    /// Already-qualified references are returned as-is, except that the
    /// first segment of a relative path still goes through the import map,
    /// matching PHP's own name resolution.
    pub fn resolve(&self, reference: &str) -> String {
        if let Some(stripped) = reference.strip_prefix('\\') {
            return stripped.to_string();
        }
        if let Some((first, rest)) = reference.split_once('\\') {
            let base = self
                .imports
                .get(first)
                .cloned()
                .unwrap_or_else(|| first.to_string());
            return format!("{base}\\{rest}");
        }
        match self.imports.get(reference) {
            Some(path) => path.clone(),
            None => format!("{FACADE_NAMESPACE}{reference}"),
        }
    }
}

/// One-shot resolution without keeping the map around.
pub fn resolve_alias(doc: &str, reference: &str) -> String {
    UseMap::parse(doc).resolve(reference)
}
