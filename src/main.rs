use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

use laravel_assist::features::blade::TemplateCache;
use laravel_assist::features::{FeatureContext, Registry};
use laravel_assist::index::{ProjectIndex, RescanKind};
use laravel_assist::project::find_project_root;

/// Default debounce delay for diagnostics in milliseconds
const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Settings structure for server configuration
/// Configured via: { "lsp": { "laravel-assist": { "settings": { "laravel": { ... } } } } }
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaravelSettings {
    /// Debounce delay for diagnostics in milliseconds (default: 200)
    /// Lower values = faster feedback but more CPU usage during typing
    #[serde(default = "default_debounce_ms")]
    debounce_ms: u64,
    /// Feature names to turn off, e.g. ["env-vars", "blade-sections"]
    #[serde(default)]
    disabled_features: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for LaravelSettings {
    fn default() -> LaravelSettings {
        LaravelSettings {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            disabled_features: Vec::new(),
        }
    }
}

/// Wrapper for the full settings object sent by the client
#[derive(Debug, Clone, serde::Deserialize, Default)]
struct LspSettings {
    #[serde(default)]
    laravel: LaravelSettings,
}

/// The Laravel assistance language server.
///
/// Request handlers only read the current [`ProjectIndex`] snapshot; scans
/// build a fresh snapshot on a blocking thread and swap it in whole, so a
/// request never observes a half-updated index.
#[derive(Clone)]
struct LaravelAssistServer {
    /// LSP client for sending messages to the editor
    client: Client,
    /// Open document contents and versions (content, version)
    documents: Arc<RwLock<HashMap<Url, (String, i32)>>>,
    /// The root path of the Laravel project
    root_path: Arc<RwLock<Option<PathBuf>>>,
    /// Current index snapshot, replaced wholesale after each scan
    index: Arc<ArcSwap<ProjectIndex>>,
    /// Feature set serving completions, links and diagnostics
    registry: Arc<ArcSwap<Registry>>,
    /// Bounded cache of Blade template contents for inheritance walks
    templates: Arc<TemplateCache>,
    /// Pending debounced diagnostic tasks (uri -> task handle)
    pending_diagnostics: Arc<RwLock<HashMap<Url, tokio::task::JoinHandle<()>>>>,
    /// Cancellation token of the in-flight diagnostics pass per document
    active_passes: Arc<RwLock<HashMap<Url, CancellationToken>>>,
    /// Pending background rescans (debounced)
    pending_rescans: Arc<RwLock<HashSet<RescanKind>>>,
    /// Handle for the rescan debounce timer
    rescan_debounce_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
    /// Which root the index was last built for
    initialized_root: Arc<RwLock<Option<PathBuf>>>,
    /// Debounce delay for diagnostics in milliseconds
    debounce_ms: Arc<RwLock<u64>>,
}

impl LaravelAssistServer {
    fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            root_path: Arc::new(RwLock::new(None)),
            index: Arc::new(ArcSwap::from_pointee(ProjectIndex::empty(PathBuf::new()))),
            registry: Arc::new(ArcSwap::from_pointee(Registry::with_default_features())),
            templates: Arc::new(TemplateCache::new()),
            pending_diagnostics: Arc::new(RwLock::new(HashMap::new())),
            active_passes: Arc::new(RwLock::new(HashMap::new())),
            pending_rescans: Arc::new(RwLock::new(HashSet::new())),
            rescan_debounce_handle: Arc::new(RwLock::new(None)),
            initialized_root: Arc::new(RwLock::new(None)),
            debounce_ms: Arc::new(RwLock::new(DEFAULT_DEBOUNCE_MS)),
        }
    }

    /// Update settings from LSP configuration
    async fn update_settings(&self, settings: &LspSettings) {
        let new_debounce = settings.laravel.debounce_ms;
        let old_debounce = *self.debounce_ms.read().await;

        if new_debounce != old_debounce {
            info!(
                "⚙️  Updating diagnostics debounce: {}ms → {}ms",
                old_debounce, new_debounce
            );
            *self.debounce_ms.write().await = new_debounce;
        }

        let registry = Registry::with_default_features_except(&settings.laravel.disabled_features);
        if !settings.laravel.disabled_features.is_empty() {
            info!("⚙️  Active features: {:?}", registry.feature_names());
        }
        self.registry.store(Arc::new(registry));
    }

    /// Adopt a project root from an opened file when the client did not
    /// provide one in initialize().
    async fn try_discover_from_file(&self, file_path: &Path) {
        if self.root_path.read().await.is_some() {
            return;
        }
        let Some(root) = find_project_root(file_path) else {
            return;
        };
        info!("✅ Discovered project root {:?} from opened file", root);
        *self.root_path.write().await = Some(root.clone());

        let server = self.clone();
        tokio::spawn(async move {
            server.ensure_index_for_root(root).await;
        });
    }

    /// Build the first index snapshot for `root` and swap it in. A repeat
    /// call for the root the index was already built for is a no-op.
    async fn ensure_index_for_root(&self, root: PathBuf) {
        if self.initialized_root.read().await.as_deref() == Some(root.as_path()) {
            return;
        }

        let scanned = tokio::task::spawn_blocking({
            let root = root.clone();
            move || ProjectIndex::scan(&root)
        })
        .await;

        match scanned {
            Ok(index) => {
                self.index.store(Arc::new(index));
                *self.initialized_root.write().await = Some(root);
                self.revalidate_open_documents().await;
            }
            Err(e) => warn!("Project scan task failed: {}", e),
        }
    }

    /// Run every feature's diagnostics over one document and publish the
    /// result. A pass superseded by a newer edit publishes nothing; the
    /// newer pass does.
    async fn validate_and_publish_diagnostics(&self, uri: &Url, text: &str) {
        let cancel = CancellationToken::new();
        if let Some(previous) = self
            .active_passes
            .write()
            .await
            .insert(uri.clone(), cancel.clone())
        {
            previous.cancel();
        }

        let index = self.index.load_full();
        let registry = self.registry.load_full();
        let templates = self.templates.clone();
        let uri_for_task = uri.clone();
        let text = text.to_string();

        let outcome = tokio::task::spawn_blocking(move || {
            let ctx = FeatureContext::new(&text, &uri_for_task, &index, &templates, &cancel);
            let diagnostics = registry.diagnostics(&ctx);
            (diagnostics, cancel.is_cancelled())
        })
        .await;

        let diagnostics = match outcome {
            Ok((diagnostics, false)) => diagnostics,
            Ok((_, true)) => return,
            Err(e) => {
                warn!("Diagnostics task failed for {}: {}", uri, e);
                return;
            }
        };

        debug!("📊 {} diagnostic(s) for {}", diagnostics.len(), uri);
        self.client
            .publish_diagnostics(uri.clone(), diagnostics, None)
            .await;
    }

    /// Schedule debounced diagnostics for a file
    ///
    /// Cancels any pending diagnostics for the file and schedules a new
    /// task to run after the debounce delay, so diagnostics update as you
    /// type (after a pause) rather than on every keystroke.
    async fn schedule_debounced_diagnostics(&self, uri: &Url, text: &str) {
        let debounce_delay = Duration::from_millis(*self.debounce_ms.read().await);

        if let Some(handle) = self.pending_diagnostics.write().await.remove(uri) {
            handle.abort();
        }

        let uri_for_spawn = uri.clone();
        let text_for_spawn = text.to_string();
        let server = self.clone();

        let handle = tokio::spawn(async move {
            sleep(debounce_delay).await;
            debug!("⏰ Debounce expired for {} - running diagnostics", uri_for_spawn);
            server
                .validate_and_publish_diagnostics(&uri_for_spawn, &text_for_spawn)
                .await;
        });

        self.pending_diagnostics
            .write()
            .await
            .insert(uri.clone(), handle);
    }

    /// Queue a background rescan of one project area (debounced)
    async fn queue_background_rescan(&self, kind: RescanKind) {
        self.pending_rescans.write().await.insert(kind);

        if let Some(handle) = self.rescan_debounce_handle.write().await.take() {
            handle.abort();
        }

        // Burst of file events collapses into one rebuild 500ms later
        let server = self.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            server.execute_pending_rescans().await;
        });

        *self.rescan_debounce_handle.write().await = Some(handle);
    }

    /// Rebuild all queued areas into a fresh snapshot and swap it in
    async fn execute_pending_rescans(&self) {
        let pending: HashSet<RescanKind> = self.pending_rescans.write().await.drain().collect();
        if pending.is_empty() {
            return;
        }
        if self.initialized_root.read().await.is_none() {
            warn!("Cannot execute rescans: no project root");
            return;
        }

        info!("🔄 Executing pending rescans: {:?}", pending);
        let current = self.index.load_full();
        let rebuilt = tokio::task::spawn_blocking(move || current.rescan(&pending)).await;

        match rebuilt {
            Ok(index) => {
                self.index.store(Arc::new(index));
                self.revalidate_open_documents().await;
            }
            Err(e) => warn!("Rescan task failed: {}", e),
        }
    }

    /// Re-run diagnostics for every open document against the current index
    async fn revalidate_open_documents(&self) {
        let open: Vec<(Url, String)> = self
            .documents
            .read()
            .await
            .iter()
            .map(|(uri, (text, _version))| (uri.clone(), text.clone()))
            .collect();

        for (uri, text) in open {
            self.validate_and_publish_diagnostics(&uri, &text).await;
        }
    }

    /// Ask the client to watch the project areas the index is built from,
    /// so edits made outside the editor still trigger rescans.
    async fn register_file_watchers(&self) {
        let watchers = [
            "**/routes/**/*.php",
            "**/app/Http/Controllers/**/*.php",
            "**/config/**/*.php",
            "**/lang/**",
            "**/resources/lang/**",
            "**/resources/views/**",
            "**/.env*",
        ]
        .into_iter()
        .map(|pattern| FileSystemWatcher {
            glob_pattern: GlobPattern::String(pattern.to_string()),
            kind: None,
        })
        .collect();

        let options = DidChangeWatchedFilesRegistrationOptions { watchers };
        let register_options = match serde_json::to_value(options) {
            Ok(value) => value,
            Err(e) => {
                debug!("Could not serialize watcher registration: {}", e);
                return;
            }
        };

        let registration = Registration {
            id: "laravel-assist/watched-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: Some(register_options),
        };

        if let Err(e) = self.client.register_capability(vec![registration]).await {
            debug!("Client declined file watcher registration: {}", e);
        }
    }
}

/// Workspace root sent by the client. Older clients send `rootUri` only.
#[allow(deprecated)]
fn root_from_params(params: &InitializeParams) -> Option<Url> {
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| folder.uri.clone())
        .or_else(|| params.root_uri.clone())
}

#[tower_lsp::async_trait]
impl LanguageServer for LaravelAssistServer {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        info!("Laravel assist: INITIALIZE");

        if let Some(root_uri) = root_from_params(&params) {
            if let Ok(path) = root_uri.to_file_path() {
                info!("✅ Root path set to {:?}", path);
                *self.root_path.write().await = Some(path);
            }
        }

        // Initial settings from initialization_options (if provided);
        // can be overridden at runtime via did_change_configuration
        if let Some(init_options) = params.initialization_options {
            match serde_json::from_value::<LspSettings>(init_options) {
                Ok(settings) => {
                    info!(
                        "⚙️  Initial settings: debounceMs={}ms",
                        settings.laravel.debounce_ms
                    );
                    self.update_settings(&settings).await;
                }
                Err(e) => {
                    debug!("Could not parse initialization_options: {}", e);
                }
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["'".to_string(), "\"".to_string()]),
                    ..Default::default()
                }),

                document_link_provider: Some(DocumentLinkOptions {
                    resolve_provider: Some(false),
                    work_done_progress_options: Default::default(),
                }),

                // Full document sync; save notifications without text, the
                // content is already in the documents map from did_change
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        will_save: None,
                        will_save_wait_until: None,
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(false),
                        })),
                    },
                )),

                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "laravel-assist".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("🚀 Laravel assist: INITIALIZED - spawning background scan");

        self.register_file_watchers().await;

        let root = match self.root_path.read().await.clone() {
            Some(root) => root,
            None => {
                info!("No root path yet; waiting for the first opened file");
                return;
            }
        };

        // The initial walk of a large project takes a while; requests served
        // meanwhile see unloaded entry sets and stay quiet instead of
        // flagging everything as missing.
        let server = self.clone();
        tokio::spawn(async move {
            server.ensure_index_for_root(root).await;
        });
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        info!("Laravel assist: shutting down - cleaning up resources");

        {
            let mut pending = self.pending_diagnostics.write().await;
            for (_uri, handle) in pending.drain() {
                handle.abort();
            }
        }
        if let Some(handle) = self.rescan_debounce_handle.write().await.take() {
            handle.abort();
        }
        for (_uri, cancel) in self.active_passes.write().await.drain() {
            cancel.cancel();
        }
        self.documents.write().await.clear();

        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = params.text_document.text;
        let version = params.text_document.version;
        debug!("📂 did_open: {}", uri);

        self.documents
            .write()
            .await
            .insert(uri.clone(), (text.clone(), version));

        if let Ok(file_path) = uri.to_file_path() {
            self.try_discover_from_file(&file_path).await;
        }

        self.validate_and_publish_diagnostics(&uri, &text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Full sync: the first change carries the whole document
        if let Some(change) = params.content_changes.into_iter().next() {
            debug!("Document changed: {} (version {})", uri, version);
            self.documents
                .write()
                .await
                .insert(uri.clone(), (change.text.clone(), version));
            self.schedule_debounced_diagnostics(&uri, &change.text).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!("🔔 did_save: {}", uri);

        // A saved file may redefine indexed names; queue its area
        if let Ok(path) = uri.to_file_path() {
            let root = self.root_path.read().await.clone();
            if let Some(root) = root {
                if let Some(kind) = RescanKind::for_path(&root, &path) {
                    info!("📦 {:?} area changed, queuing rescan", kind);
                    self.queue_background_rescan(kind).await;
                }
            }
        }

        // Run diagnostics immediately on save instead of waiting out a
        // pending debounce
        if let Some(handle) = self.pending_diagnostics.write().await.remove(&uri) {
            handle.abort();
        }
        if let Some((text, _version)) = self.documents.read().await.get(&uri).cloned() {
            self.validate_and_publish_diagnostics(&uri, &text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!("Document closed: {}", uri);

        if let Some(handle) = self.pending_diagnostics.write().await.remove(&uri) {
            handle.abort();
        }
        if let Some(cancel) = self.active_passes.write().await.remove(&uri) {
            cancel.cancel();
        }
        self.documents.write().await.remove(&uri);

        // Clear any remaining squiggles on the client
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        debug!("🔧 Configuration changed: {:?}", params.settings);

        match serde_json::from_value::<LspSettings>(params.settings) {
            Ok(settings) => {
                info!(
                    "⚙️  Configuration updated: debounceMs={}ms",
                    settings.laravel.debounce_ms
                );
                self.update_settings(&settings).await;
            }
            Err(e) => {
                debug!("Could not parse configuration settings: {}", e);
            }
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let root = self.root_path.read().await.clone();
        let Some(root) = root else {
            return;
        };

        for event in params.changes {
            let Ok(path) = event.uri.to_file_path() else {
                continue;
            };
            if let Some(kind) = RescanKind::for_path(&root, &path) {
                debug!("Watched file {:?} maps to {:?}", path, kind);
                self.queue_background_rescan(kind).await;
            }
        }
    }

    async fn completion(
        &self,
        params: CompletionParams,
    ) -> jsonrpc::Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        if !uri.path().ends_with(".php") {
            return Ok(None);
        }
        let Some((text, _version)) = self.documents.read().await.get(&uri).cloned() else {
            return Ok(None);
        };

        let index = self.index.load_full();
        let registry = self.registry.load_full();
        let templates = self.templates.clone();
        let cancel = CancellationToken::new();

        let items = tokio::task::spawn_blocking(move || {
            let ctx = FeatureContext::new(&text, &uri, &index, &templates, &cancel);
            let offset = ctx.lines.offset_of(position);
            registry.completions_at(&ctx, offset)
        })
        .await
        .unwrap_or_default();

        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(CompletionResponse::Array(items)))
        }
    }

    async fn document_link(
        &self,
        params: DocumentLinkParams,
    ) -> jsonrpc::Result<Option<Vec<DocumentLink>>> {
        let uri = params.text_document.uri;

        if !uri.path().ends_with(".php") {
            return Ok(None);
        }
        let Some((text, _version)) = self.documents.read().await.get(&uri).cloned() else {
            return Ok(None);
        };

        let index = self.index.load_full();
        let registry = self.registry.load_full();
        let templates = self.templates.clone();
        let cancel = CancellationToken::new();

        let links = tokio::task::spawn_blocking(move || {
            let ctx = FeatureContext::new(&text, &uri, &index, &templates, &cancel);
            registry.links(&ctx)
        })
        .await
        .unwrap_or_default();

        if links.is_empty() {
            Ok(None)
        } else {
            Ok(Some(links))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Default to INFO level, override with RUST_LOG (e.g. RUST_LOG=debug)
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("🚀 Laravel assist language server starting");

    let (service, socket) = LspService::new(LaravelAssistServer::new);

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    Server::new(stdin, stdout, socket).serve(service).await;

    info!("Laravel assist language server stopped");
    Ok(())
}
