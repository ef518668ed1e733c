//! Scanner for Blade view names.
//!
//! Views live under resources/views/ and are referenced with dots in place
//! of directory separators: `admin/users/index.blade.php` is
//! `admin.users.index`. Published vendor views under
//! resources/views/vendor/<namespace>/ are registered under
//! `namespace::name`, each pointing at its own file.

use std::collections::HashMap;
use std::path::Path;

use walkdir::WalkDir;

use super::{Entry, EntrySet};

pub fn scan(root: &Path) -> EntrySet {
    let views_root = root.join("resources/views");
    let mut entries = HashMap::new();

    collect(&views_root, None, &mut entries);

    let vendor_root = views_root.join("vendor");
    if vendor_root.is_dir() {
        if let Ok(namespaces) = std::fs::read_dir(&vendor_root) {
            for dir in namespaces.filter_map(|e| e.ok()) {
                let path = dir.path();
                if !path.is_dir() {
                    continue;
                }
                if let Some(namespace) = path.file_name().and_then(|n| n.to_str()) {
                    collect(&path, Some(namespace), &mut entries);
                }
            }
        }
    }

    EntrySet::from_entries(entries)
}

fn collect(base: &Path, namespace: Option<&str>, out: &mut HashMap<String, Entry>) {
    // The top-level pass leaves vendor/ to the namespaced passes, so
    // published views never show up twice under two names.
    for entry in WalkDir::new(base)
        .max_depth(10)
        .into_iter()
        .filter_entry(|e| namespace.is_some() || e.depth() != 1 || e.file_name() != "vendor")
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = view_name(base, path) else {
            continue;
        };
        let name = match namespace {
            Some(ns) => format!("{ns}::{name}"),
            None => name,
        };
        out.insert(name, Entry::at(path.to_path_buf(), 0));
    }
}

fn view_name(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?.to_str()?;
    let rel = rel.replace('\\', "/");
    let stem = rel.strip_suffix(".blade.php")?;
    Some(stem.replace('/', "."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_view(root: &Path, rel: &str) {
        let path = root.join("resources/views").join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "<div></div>\n").unwrap();
    }

    #[test]
    fn names_use_dots_for_directories() {
        let dir = TempDir::new().unwrap();
        make_view(dir.path(), "home.blade.php");
        make_view(dir.path(), "admin/users/index.blade.php");

        let set = scan(dir.path());
        assert!(set.is_loaded());
        assert!(set.contains("home"));
        assert!(set.contains("admin.users.index"));
        assert_eq!(
            set.get("home").unwrap().path,
            dir.path().join("resources/views/home.blade.php")
        );
    }

    #[test]
    fn non_blade_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        make_view(dir.path(), "home.blade.php");
        fs::write(
            dir.path().join("resources/views/plain.php"),
            "<?php\n",
        )
        .unwrap();

        let set = scan(dir.path());
        assert!(set.contains("home"));
        assert!(!set.contains("plain"));
    }

    #[test]
    fn namespaced_views_map_to_their_own_files() {
        let dir = TempDir::new().unwrap();
        make_view(dir.path(), "vendor/mail/layout.blade.php");
        make_view(dir.path(), "vendor/mail/button.blade.php");
        make_view(dir.path(), "vendor/pagination/simple.blade.php");

        let set = scan(dir.path());
        let vendor = dir.path().join("resources/views/vendor");

        // Every namespaced name points at its own file, not a shared one.
        assert_eq!(
            set.get("mail::layout").unwrap().path,
            vendor.join("mail/layout.blade.php")
        );
        assert_eq!(
            set.get("mail::button").unwrap().path,
            vendor.join("mail/button.blade.php")
        );
        assert_eq!(
            set.get("pagination::simple").unwrap().path,
            vendor.join("pagination/simple.blade.php")
        );
    }

    #[test]
    fn missing_views_directory_yields_loaded_empty_set() {
        let dir = TempDir::new().unwrap();
        let set = scan(dir.path());
        assert!(set.is_loaded());
        assert!(set.is_empty());
    }
}
