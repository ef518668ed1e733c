//! Route assistance: controller actions behind `Route::` registrations,
//! and route names used by `route()` and friends.

use lsp_types::{CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentLink};

use crate::autocomplete::{value_range, AutocompleteResult};
use crate::detect::{detect_in_doc, Tags};

use super::{entry_link_target, Feature, FeatureContext, SOURCE};

const ROUTE_METHODS: &[&str] = &[
    "get", "post", "patch", "put", "delete", "options", "any", "match", "fallback", "addRoute",
    "newRoute",
];

/// Which argument of a `Route::` registration carries the action.
/// `match` and the router internals take (methods, uri, action);
/// `fallback` takes the action first.
fn action_arg_index(method: &str) -> usize {
    match method {
        "fallback" => 0,
        "match" | "addRoute" | "newRoute" => 2,
        _ => 1,
    }
}

/// `'Controller@method'` values as they appear in the actions index:
/// relative to the controllers namespace, with no leading separator.
fn normalize_action(action: &str) -> &str {
    let action = action.trim_start_matches('\\');
    action
        .strip_prefix("App\\Http\\Controllers\\")
        .unwrap_or(action)
}

/// Whether a missing action is worth reporting. Bare names and names
/// written under the app controllers namespace resolve against the index;
/// anything else lives in a namespace the scan never visits.
fn is_app_action(action: &str) -> bool {
    let trimmed = action.trim_start_matches('\\');
    trimmed.starts_with("App\\Http\\Controllers\\") || !trimmed.contains('\\')
}

pub struct ActionsFeature;

impl Feature for ActionsFeature {
    fn name(&self) -> &'static str {
        "controller-actions"
    }

    fn tags(&self) -> Tags {
        Tags::facade("Route").with_methods(ROUTE_METHODS)
    }

    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        if !ctx.index.actions.is_loaded() {
            return Vec::new();
        }
        if !result.is_param_index(action_arg_index(result.func())) {
            return Vec::new();
        }
        // `[Controller::class, 'method']` callables are typed PHP that the
        // PHP language server already understands.
        if result.current_param_is_array() {
            return Vec::new();
        }
        ctx.index
            .actions
            .names()
            .map(|name| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::METHOD),
                ..Default::default()
            })
            .collect()
    }

    fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        detect_in_doc(
            ctx.doc,
            &self.tags(),
            &ctx.index.actions,
            ctx.cancel,
            |m| {
                if m.index != action_arg_index(&m.site.callee) {
                    return None;
                }
                let action = m.value()?;
                let entry = ctx.index.actions.get(normalize_action(&action))?;
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
            &ctx.index.actions,
            ctx.cancel,
            |m| {
                if m.index != action_arg_index(&m.site.callee) {
                    return None;
                }
                let action = m.value()?;
                // Closures, [Class::class, 'method'] pairs and bare class
                // names are not ours to judge.
                if !action.contains('@') {
                    return None;
                }
                if ctx.index.actions.contains(normalize_action(&action)) {
                    return None;
                }
                if !is_app_action(&action) {
                    return None;
                }
                let (start, end) = value_range(m.param())?;
                Some(Diagnostic {
                    range: ctx.lines.range_of(start, end),
                    severity: Some(DiagnosticSeverity::ERROR),
                    code: None,
                    code_description: None,
                    source: Some(SOURCE.to_string()),
                    message: format!("Controller action not found: '{}'", action),
                    related_information: None,
                    tags: None,
                    data: None,
                })
            },
        )
    }
}

pub struct RouteNamesFeature;

impl Feature for RouteNamesFeature {
    fn name(&self) -> &'static str {
        "route-names"
    }

    fn tags(&self) -> Tags {
        Tags::facade("Route")
            .with_methods(&["has"])
            .with_functions(&["route", "to_route", "signedRoute"])
    }

    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        if !ctx.index.routes.is_loaded() || !result.is_param_index(0) {
            return Vec::new();
        }
        ctx.index
            .routes
            .names()
            .map(|name| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::VALUE),
                ..Default::default()
            })
            .collect()
    }

    fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        detect_in_doc(
            ctx.doc,
            &self.tags(),
            &ctx.index.routes,
            ctx.cancel,
            |m| {
                if m.index != 0 {
                    return None;
                }
                let name = m.value()?;
                let entry = ctx.index.routes.get(&name)?;
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
            &ctx.index.routes,
            ctx.cancel,
            |m| {
                if m.index != 0 {
                    return None;
                }
                let name = m.value()?;
                if ctx.index.routes.contains(&name) {
                    return None;
                }
                let (start, end) = value_range(m.param())?;
                // Warning, not error: names minted by Route::resource and
                // route groups never appear in a ->name() scan.
                Some(Diagnostic {
                    range: ctx.lines.range_of(start, end),
                    severity: Some(DiagnosticSeverity::WARNING),
                    code: None,
                    code_description: None,
                    source: Some(SOURCE.to_string()),
                    message: format!("Route name not found: '{}'", name),
                    related_information: None,
                    tags: None,
                    data: None,
                })
            },
        )
    }
}
