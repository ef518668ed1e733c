//! Scanner for config keys.
//!
//! Every file under config/ contributes keys prefixed with its path:
//! config/app.php yields `app.*`, config/services/github.php yields
//! `services.github.*`. Values are read straight from the source text,
//! so a key set to `env('APP_NAME')` shows that call, not its runtime
//! value.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use super::{line_at, php_array, read_source, Entry, EntrySet};

pub fn scan(root: &Path) -> EntrySet {
    let mut entries = HashMap::new();
    let config_dir = root.join("config");

    for entry in WalkDir::new(&config_dir)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "php") {
            continue;
        }
        let Some(prefix) = file_prefix(&config_dir, path) else {
            continue;
        };
        let content = match read_source(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };

        entries.insert(prefix.clone(), Entry::at(path.to_path_buf(), 0));
        for key in php_array::keys(&content) {
            let line = line_at(&content, key.offset);
            let entry = match key.value {
                Some(value) => Entry::with_value(path.to_path_buf(), line, value),
                None => Entry::at(path.to_path_buf(), line),
            };
            entries.insert(format!("{prefix}.{}", key.key), entry);
        }
    }

    EntrySet::from_entries(entries)
}

/// Dotted key prefix for a config file: its path relative to config/,
/// without the extension.
fn file_prefix(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?.with_extension("");
    let rel = rel.to_str()?;
    Some(rel.replace(['/', '\\'], "."))
}
