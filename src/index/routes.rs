//! Scanner for named routes.
//!
//! Route names are whatever `->name('...')` registers in the files under
//! routes/. This reads the route files as text, so names composed at
//! runtime (group prefixes, variables) are not seen.

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use super::{line_at, read_source, Entry, EntrySet};

lazy_static! {
    static ref ROUTE_NAME_RE: Regex =
        Regex::new(r#"->\s*name\s*\(\s*['"]([^'"]+)['"]"#).unwrap();
}

pub fn scan(root: &Path) -> EntrySet {
    let mut entries = HashMap::new();
    let routes_dir = root.join("routes");

    for entry in WalkDir::new(&routes_dir)
        .max_depth(3)
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
        for cap in ROUTE_NAME_RE.captures_iter(&content) {
            if let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) {
                entries.insert(
                    name.as_str().to_string(),
                    Entry::at(path.to_path_buf(), line_at(&content, whole.start())),
                );
            }
        }
    }

    EntrySet::from_entries(entries)
}
