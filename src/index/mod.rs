//! Project-wide indexes of referenceable names.
//!
//! Each scanner walks part of a Laravel project and produces an
//! [`EntrySet`] mapping names (view names, route names, config keys, ...)
//! to where they are defined. The whole [`ProjectIndex`] is rebuilt off the
//! filesystem and swapped in as one snapshot; detection requests only ever
//! see a complete index or the previous one, never a half-updated state.

pub mod config_keys;
pub mod controllers;
pub mod env;
pub mod php_array;
pub mod routes;
pub mod translations;
pub mod views;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::detect::DataProvider;

/// Error raised while scanning project files.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Read a file that is part of a scan, attaching the path to the error.
pub(crate) fn read_source(path: &Path) -> Result<String, ScanError> {
    std::fs::read_to_string(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Zero-based line containing `offset` in `text`.
pub(crate) fn line_at(text: &str, offset: usize) -> u32 {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u32
}

/// Where one indexed name is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    /// Zero-based line of the definition.
    pub line: u32,
    /// Source-level value shown as completion detail, when the name has
    /// one (config values, env values, translation text).
    pub value: Option<String>,
}

impl Entry {
    pub fn at(path: PathBuf, line: u32) -> Entry {
        Entry {
            path,
            line,
            value: None,
        }
    }

    pub fn with_value(path: PathBuf, line: u32, value: String) -> Entry {
        Entry {
            path,
            line,
            value: Some(value),
        }
    }
}

/// One scanned name space, e.g. all view names or all config keys.
///
/// A set starts out unloaded; features skip detection against it until the
/// first scan completes, so nothing gets flagged as missing just because
/// the scan has not run yet.
#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    entries: HashMap<String, Entry>,
    loaded: bool,
}

impl EntrySet {
    pub fn empty() -> EntrySet {
        EntrySet::default()
    }

    pub fn from_entries(entries: HashMap<String, Entry>) -> EntrySet {
        EntrySet {
            entries,
            loaded: true,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl DataProvider for EntrySet {
    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Project areas that are rescanned when watched files change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RescanKind {
    /// resources/views/ and published vendor view namespaces
    Views,
    /// Named routes in routes/*.php
    Routes,
    /// Controller actions under app/Http/Controllers/
    Controllers,
    /// Keys in config/*.php
    Config,
    /// Translation groups in lang/ or resources/lang/
    Translations,
    /// .env files
    Env,
}

impl RescanKind {
    pub const ALL: [RescanKind; 6] = [
        RescanKind::Views,
        RescanKind::Routes,
        RescanKind::Controllers,
        RescanKind::Config,
        RescanKind::Translations,
        RescanKind::Env,
    ];

    /// Which area a changed file belongs to, if any.
    pub fn for_path(root: &Path, path: &Path) -> Option<RescanKind> {
        use glob::Pattern;
        use once_cell::sync::Lazy;

        static WATCH_PATTERNS: Lazy<Vec<(RescanKind, Pattern)>> = Lazy::new(|| {
            [
                (RescanKind::Routes, "routes/**/*.php"),
                (RescanKind::Controllers, "app/Http/Controllers/**/*.php"),
                (RescanKind::Config, "config/**/*.php"),
                (RescanKind::Translations, "lang/**/*"),
                (RescanKind::Translations, "resources/lang/**/*"),
                (RescanKind::Views, "resources/views/**/*"),
                (RescanKind::Views, "**/*.blade.php"),
                (RescanKind::Env, ".env*"),
            ]
            .into_iter()
            .filter_map(|(kind, pattern)| Some((kind, Pattern::new(pattern).ok()?)))
            .collect()
        });

        let rel = path.strip_prefix(root).ok()?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        WATCH_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.matches(&rel))
            .map(|(kind, _)| *kind)
    }
}

/// One snapshot of everything scanned out of a project.
#[derive(Debug, Clone)]
pub struct ProjectIndex {
    pub root: PathBuf,
    pub views: EntrySet,
    pub routes: EntrySet,
    pub actions: EntrySet,
    pub config: EntrySet,
    pub translations: EntrySet,
    pub env: EntrySet,
}

impl ProjectIndex {
    /// An index with no data, used before the first scan completes.
    pub fn empty(root: PathBuf) -> ProjectIndex {
        ProjectIndex {
            root,
            views: EntrySet::empty(),
            routes: EntrySet::empty(),
            actions: EntrySet::empty(),
            config: EntrySet::empty(),
            translations: EntrySet::empty(),
            env: EntrySet::empty(),
        }
    }

    /// Scan every area of the project rooted at `root`.
    pub fn scan(root: &Path) -> ProjectIndex {
        Self::empty(root.to_path_buf()).rescan(&RescanKind::ALL.into_iter().collect())
    }

    /// Produce a new snapshot with the given areas rescanned and the rest
    /// carried over unchanged.
    pub fn rescan(&self, kinds: &HashSet<RescanKind>) -> ProjectIndex {
        let started = Instant::now();
        let scan = |kind: RescanKind, current: &EntrySet, fresh: fn(&Path) -> EntrySet| {
            if kinds.contains(&kind) {
                fresh(&self.root)
            } else {
                current.clone()
            }
        };

        let index = ProjectIndex {
            root: self.root.clone(),
            views: scan(RescanKind::Views, &self.views, views::scan),
            routes: scan(RescanKind::Routes, &self.routes, routes::scan),
            actions: scan(RescanKind::Controllers, &self.actions, controllers::scan),
            config: scan(RescanKind::Config, &self.config, config_keys::scan),
            translations: scan(
                RescanKind::Translations,
                &self.translations,
                translations::scan,
            ),
            env: scan(RescanKind::Env, &self.env, env::scan),
        };

        info!(
            "📦 Indexed {} area(s) in {:?}: {} views, {} routes, {} actions, {} config keys, {} translations, {} env vars",
            kinds.len(),
            started.elapsed(),
            index.views.len(),
            index.routes.len(),
            index.actions.len(),
            index.config.len(),
            index.translations.len(),
            index.env.len(),
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_set_starts_unloaded() {
        let set = EntrySet::empty();
        assert!(!set.is_loaded());
        assert!(!set.contains("anything"));
    }

    #[test]
    fn entry_set_from_entries_is_loaded() {
        let mut entries = HashMap::new();
        entries.insert(
            "home".to_string(),
            Entry::at(PathBuf::from("/p/home.blade.php"), 0),
        );
        let set = EntrySet::from_entries(entries);
        assert!(set.is_loaded());
        assert!(set.contains("home"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn line_at_counts_newlines() {
        let text = "a\nbb\nccc";
        assert_eq!(line_at(text, 0), 0);
        assert_eq!(line_at(text, 2), 1);
        assert_eq!(line_at(text, 7), 2);
        assert_eq!(line_at(text, 999), 2);
    }

    #[test]
    fn rescan_kind_for_watched_paths() {
        let root = Path::new("/proj");
        let kind = |p: &str| RescanKind::for_path(root, &root.join(p));

        assert_eq!(kind("routes/web.php"), Some(RescanKind::Routes));
        assert_eq!(kind("routes/api/v1.php"), Some(RescanKind::Routes));
        assert_eq!(
            kind("app/Http/Controllers/HomeController.php"),
            Some(RescanKind::Controllers)
        );
        assert_eq!(kind("config/app.php"), Some(RescanKind::Config));
        assert_eq!(kind("lang/en/auth.php"), Some(RescanKind::Translations));
        assert_eq!(
            kind("resources/lang/en.json"),
            Some(RescanKind::Translations)
        );
        assert_eq!(
            kind("resources/views/home.blade.php"),
            Some(RescanKind::Views)
        );
        assert_eq!(kind(".env"), Some(RescanKind::Env));
        assert_eq!(kind(".env.example"), Some(RescanKind::Env));
        assert_eq!(kind("app/Models/User.php"), None);
    }

    #[test]
    fn paths_outside_root_are_ignored() {
        let root = Path::new("/proj");
        assert_eq!(
            RescanKind::for_path(root, Path::new("/other/routes/web.php")),
            None
        );
    }
}
