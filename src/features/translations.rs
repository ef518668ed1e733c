//! Translation key assistance for `__()`, `trans()`, the `Lang` facade
//! and the Blade `@lang` directives.

use lsp_types::{CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentLink};

use crate::autocomplete::{value_range, AutocompleteResult};
use crate::detect::{detect_in_doc, Tags};

use super::{entry_link_target, Feature, FeatureContext, SOURCE};

/// Whether a key can be checked against the scanned groups. JSON-style
/// translation calls pass the source text itself (`__('Welcome back')`),
/// which renders as-is when untranslated, so only dotted group keys and
/// namespaced keys are worth flagging.
fn is_group_key(key: &str) -> bool {
    key.contains("::") || (key.contains('.') && !key.contains(' '))
}

pub struct TranslationsFeature;

impl Feature for TranslationsFeature {
    fn name(&self) -> &'static str {
        "translations"
    }

    fn tags(&self) -> Tags {
        Tags::facade("Lang")
            .with_methods(&["get", "has", "choice"])
            .with_functions(&["__", "trans", "trans_choice", "@lang", "@choice"])
    }

    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        if !ctx.index.translations.is_loaded() || !result.is_param_index(0) {
            return Vec::new();
        }
        ctx.index
            .translations
            .iter()
            .map(|(name, entry)| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::TEXT),
                detail: entry.value.clone(),
                ..Default::default()
            })
            .collect()
    }

    fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        detect_in_doc(
            ctx.doc,
            &self.tags(),
            &ctx.index.translations,
            ctx.cancel,
            |m| {
                if m.index != 0 {
                    return None;
                }
                let key = m.value()?;
                let entry = ctx.index.translations.get(&key)?;
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
            &ctx.index.translations,
            ctx.cancel,
            |m| {
                if m.index != 0 {
                    return None;
                }
                let key = m.value()?;
                if !is_group_key(&key) || ctx.index.translations.contains(&key) {
                    return None;
                }
                let (start, end) = value_range(m.param())?;
                Some(Diagnostic {
                    range: ctx.lines.range_of(start, end),
                    severity: Some(DiagnosticSeverity::WARNING),
                    code: None,
                    code_description: None,
                    source: Some(SOURCE.to_string()),
                    message: format!("Translation key not found: '{}'", key),
                    related_information: None,
                    tags: None,
                    data: None,
                })
            },
        )
    }
}
