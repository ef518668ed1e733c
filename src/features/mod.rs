//! Detection features: the calls each completion, link and diagnostic
//! domain looks for, and what it does with a match.
//!
//! A feature contributes its [`Tags`] and consumes detected calls; the
//! registry owns the shared plumbing of running detection per document.
//! Features are stateless, so every request sees only the current document
//! text and the current index snapshot.

pub mod blade;
pub mod config_keys;
pub mod env_vars;
pub mod routes;
pub mod translations;
pub mod views;

use lsp_types::{CompletionItem, Diagnostic, DocumentLink, Url};
use tokio_util::sync::CancellationToken;

use crate::autocomplete::AutocompleteResult;
use crate::detect::{detect_at, Tags};
use crate::index::{Entry, ProjectIndex};
use crate::text::LineIndex;
use blade::TemplateCache;

/// Diagnostic source name reported to the client.
pub const SOURCE: &str = "laravel-assist";

/// Link target for an index entry: the defining file, with the one-based
/// line carried in the fragment so the editor opens at the definition.
pub(crate) fn entry_link_target(entry: &Entry) -> Option<Url> {
    let mut url = Url::from_file_path(&entry.path).ok()?;
    url.set_fragment(Some(&format!("L{}", entry.line + 1)));
    Some(url)
}

/// Everything a feature sees while serving one request on one document.
pub struct FeatureContext<'a> {
    pub doc: &'a str,
    pub uri: &'a Url,
    pub lines: LineIndex<'a>,
    pub index: &'a ProjectIndex,
    pub templates: &'a TemplateCache,
    pub cancel: &'a CancellationToken,
}

impl<'a> FeatureContext<'a> {
    pub fn new(
        doc: &'a str,
        uri: &'a Url,
        index: &'a ProjectIndex,
        templates: &'a TemplateCache,
        cancel: &'a CancellationToken,
    ) -> FeatureContext<'a> {
        FeatureContext {
            doc,
            uri,
            lines: LineIndex::new(doc),
            index,
            templates,
            cancel,
        }
    }
}

/// One assistance domain: views, route names, config keys, and so on.
pub trait Feature: Send + Sync {
    fn name(&self) -> &'static str;

    /// Calls this feature reacts to.
    fn tags(&self) -> Tags;

    /// Items offered with the cursor inside a matching call.
    fn completions(
        &self,
        ctx: &FeatureContext<'_>,
        result: &AutocompleteResult,
    ) -> Vec<CompletionItem> {
        let _ = (ctx, result);
        Vec::new()
    }

    /// Clickable links for a whole document.
    fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        let _ = ctx;
        Vec::new()
    }

    /// Problems found in a whole document.
    fn diagnostics(&self, ctx: &FeatureContext<'_>) -> Vec<Diagnostic> {
        let _ = ctx;
        Vec::new()
    }
}

/// The feature set the server runs. Order only affects the order of
/// merged results.
pub struct Registry {
    features: Vec<Box<dyn Feature>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            features: Vec::new(),
        }
    }

    pub fn with_default_features() -> Registry {
        let mut registry = Registry::new();
        registry.register(Box::new(views::ViewsFeature));
        registry.register(Box::new(routes::ActionsFeature));
        registry.register(Box::new(routes::RouteNamesFeature));
        registry.register(Box::new(config_keys::ConfigFeature));
        registry.register(Box::new(translations::TranslationsFeature));
        registry.register(Box::new(env_vars::EnvFeature));
        registry.register(Box::new(blade::SectionsFeature));
        registry
    }

    /// The default set minus the features named in `disabled`, matched
    /// against [`Feature::name`]. Unknown names are ignored.
    pub fn with_default_features_except(disabled: &[String]) -> Registry {
        let mut registry = Registry::with_default_features();
        registry
            .features
            .retain(|feature| !disabled.iter().any(|name| name == feature.name()));
        registry
    }

    pub fn register(&mut self, feature: Box<dyn Feature>) {
        self.features.push(feature);
    }

    pub fn feature_names(&self) -> Vec<&'static str> {
        self.features.iter().map(|feature| feature.name()).collect()
    }

    /// Completions at a byte offset: every feature whose tags match the
    /// call under the cursor contributes items.
    pub fn completions_at(
        &self,
        ctx: &FeatureContext<'_>,
        offset: usize,
    ) -> Vec<CompletionItem> {
        let mut items = Vec::new();
        for feature in &self.features {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if let Some(result) = detect_at(ctx.doc, offset, &feature.tags(), ctx.cancel) {
                items.extend(feature.completions(ctx, &result));
            }
        }
        items
    }

    pub fn links(&self, ctx: &FeatureContext<'_>) -> Vec<DocumentLink> {
        let mut links = Vec::new();
        for feature in &self.features {
            if ctx.cancel.is_cancelled() {
                break;
            }
            links.extend(feature.links(ctx));
        }
        links
    }

    pub fn diagnostics(&self, ctx: &FeatureContext<'_>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for feature in &self.features {
            if ctx.cancel.is_cancelled() {
                break;
            }
            diagnostics.extend(feature.diagnostics(ctx));
        }
        diagnostics
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::with_default_features()
    }
}
