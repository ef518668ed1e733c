//! Blade template support: a content cache for template files and
//! completion of `@section` / `@push` names against the slots a template's
//! layout chain declares.

use std::collections::HashSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use lru::LruCache;
use lsp_types::{CompletionItem, CompletionItemKind};

use crate::autocomplete::{split_arguments, string_value, AutocompleteResult};
use crate::detect::{find_call_sites, Tags};
use crate::index::ProjectIndex;

use super::{Feature, FeatureContext};

struct CachedTemplate {
    modified: SystemTime,
    content: Arc<String>,
}

/// Template file contents keyed by path, reread when the mtime moves.
///
/// Bounded so a large project cannot pin every Blade file in memory; the
/// handful of layouts a chain walk touches stays hot.
pub struct TemplateCache {
    templates: Mutex<LruCache<PathBuf, CachedTemplate>>,
}

impl TemplateCache {
    pub fn new() -> TemplateCache {
        let capacity = NonZeroUsize::new(64).unwrap_or(NonZeroUsize::MIN);
        TemplateCache {
            templates: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Read one template through the cache. `None` when the file cannot
    /// be statted or read.
    pub fn read(&self, path: &Path) -> Option<Arc<String>> {
        let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
        // Entries stay mtime-validated, so the cache is usable even after
        // a panicked writer poisoned the lock.
        let mut templates = self.templates.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = templates.get(path) {
            if cached.modified == modified {
                return Some(cached.content.clone());
            }
        }
        let content = Arc::new(fs::read_to_string(path).ok()?);
        templates.put(
            path.to_path_buf(),
            CachedTemplate {
                modified,
                content: content.clone(),
            },
        );
        Some(content)
    }
}

impl Default for TemplateCache {
    fn default() -> TemplateCache {
        TemplateCache::new()
    }
}

/// Directive names pulled out of one template.
#[derive(Debug, Default)]
struct DirectiveScan {
    /// Views named by `@extends(...)`.
    extends: Vec<String>,
    /// Section slots: `@yield(...)` plus overridable `@section(...)`.
    sections: Vec<String>,
    /// Stack slots named by `@stack(...)`.
    stacks: Vec<String>,
}

fn collect_directives(content: &str) -> DirectiveScan {
    let mut scan = DirectiveScan::default();
    for site in find_call_sites(content) {
        let bucket = match site.callee.as_str() {
            "@extends" => &mut scan.extends,
            "@yield" | "@section" => &mut scan.sections,
            "@stack" => &mut scan.stacks,
            _ => continue,
        };
        let args = split_arguments(content, site.args_start, site.args_end);
        let Some(first) = args.first() else { continue };
        if let Some(name) = string_value(&first.text) {
            bucket.push(name);
        }
    }
    scan
}

/// Slots a template may fill, gathered from its layout chain.
#[derive(Debug, Default)]
pub struct SectionTargets {
    pub sections: Vec<String>,
    pub stacks: Vec<String>,
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.iter().any(|existing| existing == &name) {
        names.push(name);
    }
}

/// Walk the `@extends` chain of `doc` and collect every `@yield`,
/// `@section` and `@stack` slot the ancestors declare.
///
/// Layouts that extend each other would loop forever, so each view name is
/// visited once; a cycle simply ends the walk with whatever was collected
/// up to that point.
pub fn section_targets(
    doc: &str,
    index: &ProjectIndex,
    templates: &TemplateCache,
) -> SectionTargets {
    let mut targets = SectionTargets::default();
    let mut queue: Vec<String> = collect_directives(doc).extends;
    let mut visited: HashSet<String> = HashSet::new();

    while let Some(name) = queue.pop() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let Some(entry) = index.views.get(&name) else {
            continue;
        };
        let Some(content) = templates.read(&entry.path) else {
            continue;
        };
        let scan = collect_directives(&content);
        for section in scan.sections {
            push_unique(&mut targets.sections, section);
        }
        for stack in scan.stacks {
            push_unique(&mut targets.stacks, stack);
        }
        queue.extend(scan.extends);
    }
    targets
}

/// Completes the first argument of `@section` and `@push` with the slots
/// declared by the layouts the current template extends.
pub struct SectionsFeature;

impl Feature for SectionsFeature {
    fn name(&self) -> &'static str {
        "blade-sections"
    }

    fn tags(&self) -> Tags {
        Tags::functions(&["@section", "@push", "@prepend"])
    }

    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        if !result.is_param_index(0) || !ctx.index.views.is_loaded() {
            return Vec::new();
        }
        let targets = section_targets(ctx.doc, ctx.index, ctx.templates);
        let names = match result.func() {
            "@section" => targets.sections,
            _ => targets.stacks,
        };
        names
            .into_iter()
            .map(|name| CompletionItem {
                label: name,
                kind: Some(CompletionItemKind::VALUE),
                ..Default::default()
            })
            .collect()
    }
}
