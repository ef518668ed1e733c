//! Config key assistance for `config()` and the `Config` facade.

use lsp_types::{CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentLink};

use crate::autocomplete::{value_range, AutocompleteResult};
use crate::detect::{detect_in_doc, Tags};

use super::{entry_link_target, Feature, FeatureContext, SOURCE};

pub struct ConfigFeature;

impl Feature for ConfigFeature {
    fn name(&self) -> &'static str {
        "config-keys"
    }

    fn tags(&self) -> Tags {
        Tags::facade("Config")
            .with_methods(&["get", "has", "set"])
            .with_functions(&["config"])
    }

    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        if !ctx.index.config.is_loaded() || !result.is_param_index(0) {
            return Vec::new();
        }
        ctx.index
            .config
            .iter()
            .map(|(name, entry)| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::PROPERTY),
                detail: entry.value.clone(),
                ..Default::default()
            })
            .collect()
    }

    fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        detect_in_doc(
            ctx.doc,
            &self.tags(),
            &ctx.index.config,
            ctx.cancel,
            |m| {
                if m.index != 0 {
                    return None;
                }
                let key = m.value()?;
                let entry = ctx.index.config.get(&key)?;
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
            &ctx.index.config,
            ctx.cancel,
            |m| {
                if m.index != 0 {
                    return None;
                }
                // Writing through `Config::set` may well mint a new key.
                if m.site.callee == "set" {
                    return None;
                }
                let key = m.value()?;
                if ctx.index.config.contains(&key) {
                    return None;
                }
                let (start, end) = value_range(m.param())?;
                Some(Diagnostic {
                    range: ctx.lines.range_of(start, end),
                    severity: Some(DiagnosticSeverity::WARNING),
                    code: None,
                    code_description: None,
                    source: Some(SOURCE.to_string()),
                    message: format!("Config key not found: '{}'", key),
                    related_information: None,
                    tags: None,
                    data: None,
                })
            },
        )
    }
}
