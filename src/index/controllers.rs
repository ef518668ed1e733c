//! Scanner for controller actions.
//!
//! Route definitions reference actions as `Controller@method`, optionally
//! prefixed with the namespace relative to App\Http\Controllers. This
//! walks app/Http/Controllers/, pairing each class with its public
//! methods.

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use super::{line_at, read_source, Entry, EntrySet};

lazy_static! {
    static ref CLASS_RE: Regex =
        Regex::new(r"(?m)^\s*(?:final\s+|abstract\s+)*class\s+(\w+)").unwrap();
    static ref METHOD_RE: Regex =
        Regex::new(r"(?m)^\s*public\s+(?:static\s+)?function\s+(\w+)\s*\(").unwrap();
}

pub fn scan(root: &Path) -> EntrySet {
    let mut entries = HashMap::new();
    let controllers_dir = root.join("app/Http/Controllers");

    for entry in WalkDir::new(&controllers_dir)
        .max_depth(6)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "php") {
            continue;
        }
        let content = match read_source(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };

        let Some(class) = CLASS_RE
            .captures(&content)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str())
        else {
            continue;
        };
        let prefix = namespace_prefix(&controllers_dir, path);

        for cap in METHOD_RE.captures_iter(&content) {
            let Some(method) = cap.get(1) else {
                continue;
            };
            if method.as_str().starts_with("__") {
                continue;
            }
            let action = match &prefix {
                Some(prefix) => format!("{prefix}\\{class}@{}", method.as_str()),
                None => format!("{class}@{}", method.as_str()),
            };
            entries.insert(
                action,
                Entry::at(path.to_path_buf(), line_at(&content, method.start())),
            );
        }
    }

    EntrySet::from_entries(entries)
}

/// Namespace segments between app/Http/Controllers and the file, e.g.
/// `Admin` for app/Http/Controllers/Admin/UserController.php.
fn namespace_prefix(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?.parent()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(rel.to_string_lossy().replace(['/', '\\'], "\\"))
}
