//! Scanner for translation keys.
//!
//! Group-based translations live in lang/<locale>/group.php (or the older
//! resources/lang/) and are referenced as `group.key`. JSON translations
//! in lang/<locale>.json are referenced by their literal source string.
//! Package translations published to lang/vendor/<package>/ are referenced
//! as `package::group.key`. One locale is indexed, preferring `en`; keys
//! are assumed consistent across locales.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use super::{line_at, php_array, read_source, Entry, EntrySet};

pub fn scan(root: &Path) -> EntrySet {
    let mut entries = HashMap::new();
    let Some(lang_dir) = lang_dir(root) else {
        return EntrySet::from_entries(entries);
    };

    if let Some(locale_dir) = pick_locale(&lang_dir) {
        collect_groups(&locale_dir, None, &mut entries);
    }
    if let Some(json_path) = pick_json(&lang_dir) {
        collect_json(&json_path, &mut entries);
    }

    let vendor_dir = lang_dir.join("vendor");
    if vendor_dir.is_dir() {
        if let Ok(packages) = std::fs::read_dir(&vendor_dir) {
            for package in packages.filter_map(|e| e.ok()) {
                let package_path = package.path();
                if !package_path.is_dir() {
                    continue;
                }
                let Some(namespace) = package_path.file_name().and_then(|n| n.to_str())
                else {
                    continue;
                };
                let namespace = namespace.to_string();
                if let Some(locale_dir) = pick_locale(&package_path) {
                    collect_groups(&locale_dir, Some(&namespace), &mut entries);
                }
            }
        }
    }

    EntrySet::from_entries(entries)
}

fn lang_dir(root: &Path) -> Option<PathBuf> {
    [root.join("lang"), root.join("resources/lang")]
        .into_iter()
        .find(|candidate| candidate.is_dir())
}

/// The locale directory to index: `en` when present, otherwise the first
/// alphabetically.
fn pick_locale(dir: &Path) -> Option<PathBuf> {
    let en = dir.join("en");
    if en.is_dir() {
        return Some(en);
    }
    let mut locales: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.file_name().is_none_or(|n| n != "vendor"))
        .collect();
    locales.sort();
    locales.into_iter().next()
}

fn pick_json(dir: &Path) -> Option<PathBuf> {
    let en = dir.join("en.json");
    if en.is_file() {
        return Some(en);
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files.into_iter().next()
}

fn collect_groups(
    locale_dir: &Path,
    namespace: Option<&str>,
    out: &mut HashMap<String, Entry>,
) {
    for entry in WalkDir::new(locale_dir)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "php") {
            continue;
        }
        let Some(group) = group_name(locale_dir, path) else {
            continue;
        };
        let content = match read_source(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };
        for key in php_array::keys(&content) {
            let full = match namespace {
                Some(ns) => format!("{ns}::{group}.{}", key.key),
                None => format!("{group}.{}", key.key),
            };
            let line = line_at(&content, key.offset);
            let entry = match key.value {
                Some(value) => Entry::with_value(path.to_path_buf(), line, value),
                None => Entry::at(path.to_path_buf(), line),
            };
            out.insert(full, entry);
        }
    }
}

/// Group name for a translation file: path relative to the locale
/// directory without the extension. Subdirectories keep `/` separators,
/// matching how such groups are referenced.
fn group_name(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?.with_extension("");
    Some(rel.to_str()?.replace('\\', "/"))
}

fn collect_json(path: &Path, out: &mut HashMap<String, Entry>) {
    let content = match read_source(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("{err}");
            return;
        }
    };
    let parsed: HashMap<String, serde_json::Value> = match serde_json::from_str(&content) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("Ignoring malformed translation file {:?}: {err}", path);
            return;
        }
    };
    for (key, value) in parsed {
        let entry = match value.as_str() {
            Some(text) => Entry::with_value(path.to_path_buf(), 0, text.to_string()),
            None => Entry::at(path.to_path_buf(), 0),
        };
        out.insert(key, entry);
    }
}
