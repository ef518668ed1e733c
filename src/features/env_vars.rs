//! Environment variable assistance for `env()` and `Env::get` reads.

use lsp_types::{CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentLink};

use crate::autocomplete::{value_range, AutocompleteResult};
use crate::detect::{detect_in_doc, Tags};

use super::{entry_link_target, Feature, FeatureContext, SOURCE};

pub struct EnvFeature;

impl Feature for EnvFeature {
    fn name(&self) -> &'static str {
        "env-vars"
    }

    fn tags(&self) -> Tags {
        Tags::facade("Env")
            .with_methods(&["get"])
            .with_functions(&["env"])
    }

    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        if !ctx.index.env.is_loaded() || !result.is_param_index(0) {
            return Vec::new();
        }
        ctx.index
            .env
            .iter()
            .map(|(name, entry)| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: entry.value.clone(),
                ..Default::default()
            })
            .collect()
    }

    fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        detect_in_doc(ctx.doc, &self.tags(), &ctx.index.env, ctx.cancel, |m| {
            if m.index != 0 {
                return None;
            }
            let name = m.value()?;
            let entry = ctx.index.env.get(&name)?;
            let (start, end) = value_range(m.param())?;
            Some(DocumentLink {
                range: ctx.lines.range_of(start, end),
                target: entry_link_target(entry),
                tooltip: None,
                data: None,
            })
        })
    }

    fn diagnostics(&self, ctx: &FeatureContext<'_>) -> Vec<Diagnostic> {
        detect_in_doc(ctx.doc, &self.tags(), &ctx.index.env, ctx.cancel, |m| {
            if m.index != 0 {
                return None;
            }
            let name = m.value()?;
            if ctx.index.env.contains(&name) {
                return None;
            }
            let (start, end) = value_range(m.param())?;
            let has_fallback = m.args.len() >= 2;
            let (severity, message) = if has_fallback {
                (
                    DiagnosticSeverity::INFORMATION,
                    format!(
                        "Environment variable '{}' not found in .env files (using fallback value)",
                        name
                    ),
                )
            } else {
                (
                    DiagnosticSeverity::WARNING,
                    format!(
                        "Environment variable '{}' not found in .env files and has no fallback\nDefine it in .env, .env.example, or .env.local",
                        name
                    ),
                )
            };
            Some(Diagnostic {
                range: ctx.lines.range_of(start, end),
                severity: Some(severity),
                code: None,
                code_description: None,
                source: Some(SOURCE.to_string()),
                message,
                related_information: None,
                tags: None,
                data: None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_at;
    use crate::features::blade::TemplateCache;
    use crate::index::ProjectIndex;
    use lsp_types::Url;
    use std::fs;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn project() -> (TempDir, ProjectIndex) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env"),
            "APP_NAME=Laravel\nDB_HOST=127.0.0.1\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(".env.example"),
            "APP_NAME=\nMAIL_PORT=25\n",
        )
        .unwrap();
        let index = ProjectIndex::scan(dir.path());
        (dir, index)
    }

    #[test]
    fn completes_env_names_with_values() {
        let (dir, index) = project();
        let templates = TemplateCache::new();
        let cancel = CancellationToken::new();
        let uri = Url::from_file_path(dir.path().join("config/app.php")).unwrap();

        let doc = "env('')";
        let ctx = FeatureContext::new(doc, &uri, &index, &templates, &cancel);
        let result = detect_at(doc, 5, &EnvFeature.tags(), &cancel).unwrap();
        let items = EnvFeature.completions(&ctx, &result);
        let app_name = items.iter().find(|i| i.label == "APP_NAME").unwrap();
        assert_eq!(app_name.detail.as_deref(), Some("Laravel"));
        assert!(items.iter().any(|i| i.label == "MAIL_PORT"));
    }

    #[test]
    fn missing_with_fallback_is_information() {
        let (dir, index) = project();
        let templates = TemplateCache::new();
        let cancel = CancellationToken::new();
        let uri = Url::from_file_path(dir.path().join("config/app.php")).unwrap();

        let doc = "env('MISSING', 'default')";
        let ctx = FeatureContext::new(doc, &uri, &index, &templates, &cancel);
        let diagnostics = EnvFeature.diagnostics(&ctx);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].severity,
            Some(DiagnosticSeverity::INFORMATION)
        );
        assert_eq!(
            diagnostics[0].message,
            "Environment variable 'MISSING' not found in .env files (using fallback value)"
        );
    }

    #[test]
    fn missing_without_fallback_is_a_warning() {
        let (dir, index) = project();
        let templates = TemplateCache::new();
        let cancel = CancellationToken::new();
        let uri = Url::from_file_path(dir.path().join("config/app.php")).unwrap();

        let doc = "env('MISSING')";
        let ctx = FeatureContext::new(doc, &uri, &index, &templates, &cancel);
        let diagnostics = EnvFeature.diagnostics(&ctx);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(
            diagnostics[0].message,
            "Environment variable 'MISSING' not found in .env files and has no fallback\nDefine it in .env, .env.example, or .env.local"
        );
    }

    #[test]
    fn known_variable_is_clean_and_linked() {
        let (dir, index) = project();
        let templates = TemplateCache::new();
        let cancel = CancellationToken::new();
        let uri = Url::from_file_path(dir.path().join("config/database.php")).unwrap();

        let doc = "env('DB_HOST', '127.0.0.1')";
        let ctx = FeatureContext::new(doc, &uri, &index, &templates, &cancel);
        assert!(EnvFeature.diagnostics(&ctx).is_empty());
        let links = EnvFeature.links(&ctx);
        assert_eq!(links.len(), 1);
        let target = links[0].target.as_ref().unwrap();
        assert!(target.path().ends_with(".env"));
        assert_eq!(target.fragment(), Some("L2"));
    }

    #[test]
    fn example_only_variables_count_as_defined() {
        let (dir, index) = project();
        let templates = TemplateCache::new();
        let cancel = CancellationToken::new();
        let uri = Url::from_file_path(dir.path().join("config/mail.php")).unwrap();

        let doc = "env('MAIL_PORT')";
        let ctx = FeatureContext::new(doc, &uri, &index, &templates, &cancel);
        assert!(EnvFeature.diagnostics(&ctx).is_empty());
    }
}
