//! View name assistance: completion, links and missing-file diagnostics
//! for every call and Blade directive that names a template.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use lsp_types::{CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentLink};
use regex::Regex;

use crate::autocomplete::{value_range, AutocompleteResult};
use crate::detect::{detect_in_doc, Tags};
use crate::facades::FACADE_NAMESPACE;

use super::{entry_link_target, Feature, FeatureContext, SOURCE};

lazy_static! {
    static ref VARIABLE_RE: Regex = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Which argument positions of a matched call name a view.
///
/// `Route::view('/url', 'name')` takes the template second; `@each` names
/// a second, fallback template in its fourth argument.
fn view_arg_indices(callee: &str, class: Option<&str>) -> &'static [usize] {
    let on_route = class.is_some_and(|c| c.rsplit('\\').next() == Some("Route"));
    match callee {
        "view" if on_route => &[1],
        "@each" => &[0, 3],
        _ => &[0],
    }
}

/// Where a view name would live on disk, for the not-found message.
fn expected_view_path(root: &Path, name: &str) -> PathBuf {
    let (mut path, rest) = match name.split_once("::") {
        Some((namespace, rest)) => (root.join("resources/views/vendor").join(namespace), rest),
        None => (root.join("resources/views"), name),
    };
    for part in rest.split('.') {
        path.push(part);
    }
    path.with_extension("blade.php")
}

pub struct ViewsFeature;

impl ViewsFeature {
    fn view_names(&self, ctx: &FeatureContext<'_>) -> Vec<CompletionItem> {
        ctx.index
            .views
            .names()
            .map(|name| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::CONSTANT),
                ..Default::default()
            })
            .collect()
    }

    /// Variables referenced by the template in the first argument, offered
    /// as key names for the data array.
    fn view_variables(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        let Some(view_name) = result.param_value(0) else {
            return Vec::new();
        };
        let Some(entry) = ctx.index.views.get(&view_name) else {
            return Vec::new();
        };
        let Some(content) = ctx.templates.read(&entry.path) else {
            return Vec::new();
        };
        let variables: BTreeSet<&str> = VARIABLE_RE
            .captures_iter(&content)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str())
            .collect();
        variables
            .into_iter()
            .map(|name| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: Some(format!("${name} in {view_name}")),
                ..Default::default()
            })
            .collect()
    }
}

impl Feature for ViewsFeature {
    fn name(&self) -> &'static str {
        "views"
    }

    fn tags(&self) -> Tags {
        let mut tags = Tags::facade("View");
        tags.classes.push("Route".to_string());
        tags.classes.push(format!("{FACADE_NAMESPACE}Route"));
        tags.with_methods(&["view", "markdown"]).with_functions(&[
            "view",
            "markdown",
            "links",
            "@extends",
            "@component",
            "@include",
            "@each",
        ])
    }

    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        if !ctx.index.views.is_loaded() {
            return Vec::new();
        }
        let indices = view_arg_indices(result.func(), result.class());
        if indices.contains(&result.current_index()) {
            return self.view_names(ctx);
        }
        if result.current_index() >= 1
            && result.class().is_none()
            && matches!(result.func(), "view" | "markdown")
        {
            return self.view_variables(ctx, result);
        }
        Vec::new()
    }

    fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        detect_in_doc(
            ctx.doc,
            &self.tags(),
            &ctx.index.views,
            ctx.cancel,
            |m| {
                let indices = view_arg_indices(&m.site.callee, m.class.as_deref());
                if !indices.contains(&m.index) {
                    return None;
                }
                let name = m.value()?;
                let entry = ctx.index.views.get(&name)?;
                let (start, end) = value_range(m.param())?;
                Some(DocumentLink {
                    range: ctx.lines.range_of(start, end),
                    target: entry_link_target(entry),
                    tooltip: None,
                    data: None,
                })
            },
        )
    }

    fn diagnostics(&self, ctx: &FeatureContext<'_>) -> Vec<Diagnostic> {
        detect_in_doc(
            ctx.doc,
            &self.tags(),
            &ctx.index.views,
            ctx.cancel,
            |m| {
                let indices = view_arg_indices(&m.site.callee, m.class.as_deref());
                if !indices.contains(&m.index) {
                    return None;
                }
                let name = m.value()?;
                if ctx.index.views.contains(&name) {
                    return None;
                }
                let expected = expected_view_path(&ctx.index.root, &name);
                let (start, end) = value_range(m.param())?;
                // A broken template behind Route::view breaks the route
                // itself, not just the render.
                let severity = if m.class.is_some() && m.site.callee == "view" {
                    DiagnosticSeverity::ERROR
                } else {
                    DiagnosticSeverity::WARNING
                };
                Some(Diagnostic {
                    range: ctx.lines.range_of(start, end),
                    severity: Some(severity),
                    code: None,
                    code_description: None,
                    source: Some(SOURCE.to_string()),
                    message: format!(
                        "View file not found: '{}'\nExpected at: {}",
                        name,
                        expected.display()
                    ),
                    related_information: None,
                    tags: None,
                    data: None,
                })
            },
        )
    }
}
