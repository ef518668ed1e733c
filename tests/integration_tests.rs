//! End-to-end tests over a synthesized Laravel project.
//!
//! A complete project is written into a temp directory, scanned into a
//! `ProjectIndex`, and the default feature registry is driven the way the
//! server drives it:
//! - completion items at a byte offset inside a call argument
//! - document links across a whole document
//! - diagnostics across a whole document
//!
//! The fixture touches every indexed area at once: named routes,
//! controllers with a namespaced subdirectory, a Blade layout chain,
//! published vendor views and translations, nested config files and
//! layered env files.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use lsp_types::{
    CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentLink, Url,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use laravel_assist::features::blade::TemplateCache;
use laravel_assist::features::{FeatureContext, Registry, SOURCE};
use laravel_assist::index::{ProjectIndex, RescanKind};
use laravel_assist::project::find_project_root;

/// Write one file under `root`, creating parent directories as needed.
fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A small but complete project covering every scanned area.
fn laravel_project() -> (TempDir, ProjectIndex) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write_file(root, "composer.json", "{\"require\": {\"laravel/framework\": \"^11.0\"}}\n");
    write_file(root, "artisan", "#!/usr/bin/env php\n<?php\n");

    write_file(
        root,
        "routes/web.php",
        r#"<?php

use Illuminate\Support\Facades\Route;

Route::get('/', 'HomeController@index')->name('home');
Route::get('/users/{id}', 'UserController@show')->name('users.show');
Route::view('/about', 'pages.about')->name('about');
"#,
    );

    write_file(
        root,
        "app/Http/Controllers/HomeController.php",
        r#"<?php

namespace App\Http\Controllers;

class HomeController extends Controller
{
    public function __construct()
    {
    }

    public function index()
    {
        return view('welcome');
    }

    protected function helper()
    {
    }
}
"#,
    );
    write_file(
        root,
        "app/Http/Controllers/UserController.php",
        r#"<?php

namespace App\Http\Controllers;

class UserController extends Controller
{
    public function show(string $id)
    {
        return view('users.show');
    }
}
"#,
    );
    write_file(
        root,
        "app/Http/Controllers/Admin/ReportController.php",
        r#"<?php

namespace App\Http\Controllers\Admin;

class ReportController extends Controller
{
    public function index()
    {
    }
}
"#,
    );

    write_file(root, "resources/views/welcome.blade.php", "<h1>Welcome</h1>\n");
    write_file(root, "resources/views/users/show.blade.php", "<p>{{ $user }}</p>\n");
    write_file(
        root,
        "resources/views/pages/about.blade.php",
        "@extends('layouts.app')\n\n@section('content')\n    <p>About</p>\n@endsection\n",
    );
    write_file(
        root,
        "resources/views/layouts/app.blade.php",
        "@extends('layouts.base')\n\n@section('body')\n    @yield('title')\n    @yield('content')\n    @stack('scripts')\n@endsection\n",
    );
    write_file(
        root,
        "resources/views/layouts/base.blade.php",
        "<html>\n<body>\n@yield('body')\n@stack('head')\n</body>\n</html>\n",
    );
    write_file(
        root,
        "resources/views/vendor/mail/button.blade.php",
        "<a href=\"{{ $url }}\"></a>\n",
    );

    write_file(
        root,
        "config/app.php",
        r#"<?php

return [
    'name' => env('APP_NAME', 'Laravel'),
    'debug' => env('APP_DEBUG', false),
    'providers' => [
        'cache' => 'array',
    ],
];
"#,
    );
    write_file(
        root,
        "config/services/github.php",
        "<?php return ['token' => 'abc123'];\n",
    );

    write_file(
        root,
        "lang/en/messages.php",
        r#"<?php

return [
    'welcome' => 'Welcome!',
    'greeting' => [
        'morning' => 'Good morning',
    ],
];
"#,
    );
    write_file(
        root,
        "lang/en.json",
        "{\"I love programming.\": \"Me encanta programar.\"}\n",
    );
    write_file(
        root,
        "lang/vendor/courier/en/messages.php",
        "<?php return ['sent' => 'Message sent.'];\n",
    );

    write_file(root, ".env", "APP_NAME=Fixture\nAPP_DEBUG=true\n# MAIL_PORT=2525\n");
    write_file(
        root,
        ".env.example",
        "APP_NAME=Example\nAPP_DEBUG=false\nMAIL_PORT=1025\nEXAMPLE_ONLY=yes\n",
    );

    let index = ProjectIndex::scan(root);
    (dir, index)
}

/// Completions from the default registry with the cursor at `offset`.
fn completions(index: &ProjectIndex, doc: &str, offset: usize) -> Vec<CompletionItem> {
    let templates = TemplateCache::new();
    let cancel = CancellationToken::new();
    let uri = Url::from_file_path(index.root.join("routes/web.php")).unwrap();
    let ctx = FeatureContext::new(doc, &uri, index, &templates, &cancel);
    Registry::with_default_features().completions_at(&ctx, offset)
}

fn links(index: &ProjectIndex, doc: &str) -> Vec<DocumentLink> {
    let templates = TemplateCache::new();
    let cancel = CancellationToken::new();
    let uri = Url::from_file_path(index.root.join("routes/web.php")).unwrap();
    let ctx = FeatureContext::new(doc, &uri, index, &templates, &cancel);
    Registry::with_default_features().links(&ctx)
}

fn diagnostics(index: &ProjectIndex, doc: &str) -> Vec<Diagnostic> {
    let templates = TemplateCache::new();
    let cancel = CancellationToken::new();
    let uri = Url::from_file_path(index.root.join("routes/web.php")).unwrap();
    let ctx = FeatureContext::new(doc, &uri, index, &templates, &cancel);
    Registry::with_default_features().diagnostics(&ctx)
}

fn labels(items: &[CompletionItem]) -> Vec<&str> {
    items.iter().map(|i| i.label.as_str()).collect()
}

// ============================================================================
// Project Discovery
// ============================================================================

mod discovery {
    use super::*;

    #[test]
    fn root_is_found_from_a_nested_source_file() {
        let (dir, _index) = laravel_project();
        let file = dir.path().join("app/Http/Controllers/HomeController.php");
        assert_eq!(find_project_root(&file), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn root_is_found_from_a_directory() {
        let (dir, _index) = laravel_project();
        let inner = dir.path().join("resources/views/layouts");
        assert_eq!(find_project_root(&inner), Some(dir.path().to_path_buf()));
    }
}

// ============================================================================
// Index Contents
// ============================================================================

mod indexing {
    use super::*;

    #[test]
    fn views_are_indexed_by_dotted_name() {
        let (dir, index) = laravel_project();
        assert!(index.views.contains("welcome"));
        assert!(index.views.contains("users.show"));
        assert!(index.views.contains("pages.about"));
        assert!(index.views.contains("layouts.app"));
        assert_eq!(
            index.views.get("welcome").unwrap().path,
            dir.path().join("resources/views/welcome.blade.php")
        );
    }

    #[test]
    fn vendor_views_appear_only_under_their_namespace() {
        let (dir, index) = laravel_project();
        assert!(index.views.contains("mail::button"));
        assert!(!index.views.contains("vendor.mail.button"));
        assert_eq!(
            index.views.get("mail::button").unwrap().path,
            dir.path().join("resources/views/vendor/mail/button.blade.php")
        );
    }

    #[test]
    fn route_names_come_from_name_calls() {
        let (_dir, index) = laravel_project();
        assert!(index.routes.contains("home"));
        assert!(index.routes.contains("users.show"));
        assert!(index.routes.contains("about"));
        assert!(!index.routes.contains("/"));
    }

    #[test]
    fn actions_pair_classes_with_public_methods() {
        let (_dir, index) = laravel_project();
        assert!(index.actions.contains("HomeController@index"));
        assert!(index.actions.contains("UserController@show"));
        assert!(index.actions.contains(r"Admin\ReportController@index"));
        assert!(!index.actions.contains("HomeController@__construct"));
        assert!(!index.actions.contains("HomeController@helper"));
    }

    #[test]
    fn config_keys_are_dotted_through_nesting() {
        let (_dir, index) = laravel_project();
        assert!(index.config.contains("app"));
        assert!(index.config.contains("app.name"));
        assert!(index.config.contains("app.providers.cache"));
        assert!(index.config.contains("services.github.token"));
        assert_eq!(
            index.config.get("app.name").unwrap().value.as_deref(),
            Some("env('APP_NAME', 'Laravel')")
        );
    }

    #[test]
    fn translations_cover_groups_json_and_vendor_packages() {
        let (_dir, index) = laravel_project();
        assert!(index.translations.contains("messages.welcome"));
        assert!(index.translations.contains("messages.greeting.morning"));
        assert!(index.translations.contains("I love programming."));
        assert!(index.translations.contains("courier::messages.sent"));
    }

    #[test]
    fn env_files_merge_by_priority() {
        let (_dir, index) = laravel_project();
        assert_eq!(
            index.env.get("APP_NAME").unwrap().value.as_deref(),
            Some("Fixture")
        );
        // Only defined in .env.example, so that definition fills the gap.
        assert!(index.env.contains("EXAMPLE_ONLY"));
        // Commented out in .env, which shadows the .env.example definition.
        assert!(!index.env.contains("MAIL_PORT"));
    }
}

// ============================================================================
// Rescans
// ============================================================================

mod rescans {
    use super::*;

    #[test]
    fn kinds_derive_from_project_relative_paths() {
        let (dir, _index) = laravel_project();
        let root = dir.path();
        let kind = |rel: &str| RescanKind::for_path(root, &root.join(rel));

        assert_eq!(kind("routes/api.php"), Some(RescanKind::Routes));
        assert_eq!(
            kind("app/Http/Controllers/OrderController.php"),
            Some(RescanKind::Controllers)
        );
        assert_eq!(kind("config/cache.php"), Some(RescanKind::Config));
        assert_eq!(kind("lang/en/auth.php"), Some(RescanKind::Translations));
        assert_eq!(
            kind("resources/views/nav.blade.php"),
            Some(RescanKind::Views)
        );
        assert_eq!(kind(".env.local"), Some(RescanKind::Env));
        assert_eq!(kind("app/Models/User.php"), None);
    }

    #[test]
    fn rescan_refreshes_only_the_requested_kinds() {
        let (dir, index) = laravel_project();
        write_file(dir.path(), "resources/views/fresh.blade.php", "<div></div>\n");
        write_file(
            dir.path(),
            "routes/api.php",
            "<?php Route::get('/ping', fn () => 1)->name('ping');\n",
        );

        let views_only: HashSet<RescanKind> = [RescanKind::Views].into_iter().collect();
        let refreshed = index.rescan(&views_only);
        assert!(refreshed.views.contains("fresh"));
        assert!(refreshed.routes.contains("home"));
        assert!(!refreshed.routes.contains("ping"));

        let routes_too: HashSet<RescanKind> = [RescanKind::Routes].into_iter().collect();
        let refreshed = refreshed.rescan(&routes_too);
        assert!(refreshed.routes.contains("ping"));
    }
}

// ============================================================================
// Completions
// ============================================================================

mod completions {
    use super::*;

    #[test]
    fn view_call_offers_template_names() {
        let (_dir, index) = laravel_project();
        let doc = "view('')";
        let items = completions(&index, doc, doc.len() - 2);
        let names = labels(&items);
        assert!(names.contains(&"welcome"));
        assert!(names.contains(&"pages.about"));
        assert!(names.contains(&"mail::button"));
        assert!(!names.contains(&"home"));
        let welcome = items.iter().find(|i| i.label == "welcome").unwrap();
        assert_eq!(welcome.kind, Some(CompletionItemKind::CONSTANT));
    }

    #[test]
    fn route_handlers_complete_in_the_action_argument() {
        let (_dir, index) = laravel_project();
        let doc = "Route::get('/new', '')";
        let items = completions(&index, doc, doc.len() - 2);
        let names = labels(&items);
        assert!(names.contains(&"HomeController@index"));
        assert!(names.contains(&r"Admin\ReportController@index"));
        assert!(!names.contains(&"welcome"));
        assert_eq!(items[0].kind, Some(CompletionItemKind::METHOD));
    }

    #[test]
    fn match_takes_the_action_in_argument_two() {
        let (_dir, index) = laravel_project();
        let doc = "Route::match(['get', 'post'], '/m', '')";
        let items = completions(&index, doc, doc.len() - 2);
        assert!(labels(&items).contains(&"HomeController@index"));
    }

    #[test]
    fn array_callables_are_left_to_the_php_server() {
        let (_dir, index) = laravel_project();
        let doc = "Route::post('/y', [HomeController::class, ''])";
        let items = completions(&index, doc, doc.len() - 3);
        assert!(items.is_empty());
    }

    #[test]
    fn route_helper_offers_route_names() {
        let (_dir, index) = laravel_project();
        let doc = "route('')";
        let items = completions(&index, doc, doc.len() - 2);
        let names = labels(&items);
        assert!(names.contains(&"home"));
        assert!(names.contains(&"users.show"));
        assert!(names.contains(&"about"));
        let home = items.iter().find(|i| i.label == "home").unwrap();
        assert_eq!(home.kind, Some(CompletionItemKind::VALUE));
    }

    #[test]
    fn config_keys_complete_with_their_values() {
        let (_dir, index) = laravel_project();
        let doc = "config('')";
        let items = completions(&index, doc, doc.len() - 2);
        let name = items.iter().find(|i| i.label == "app.name").unwrap();
        assert_eq!(name.kind, Some(CompletionItemKind::PROPERTY));
        assert_eq!(name.detail.as_deref(), Some("env('APP_NAME', 'Laravel')"));
        assert!(labels(&items).contains(&"services.github.token"));
    }

    #[test]
    fn env_vars_complete_with_their_current_values() {
        let (_dir, index) = laravel_project();
        let doc = "env('')";
        let items = completions(&index, doc, doc.len() - 2);
        let app_name = items.iter().find(|i| i.label == "APP_NAME").unwrap();
        assert_eq!(app_name.detail.as_deref(), Some("Fixture"));
        let names = labels(&items);
        assert!(names.contains(&"EXAMPLE_ONLY"));
        assert!(!names.contains(&"MAIL_PORT"));
    }

    #[test]
    fn translation_keys_complete() {
        let (_dir, index) = laravel_project();
        let doc = "__('')";
        let items = completions(&index, doc, doc.len() - 2);
        let names = labels(&items);
        assert!(names.contains(&"messages.welcome"));
        assert!(names.contains(&"courier::messages.sent"));
        assert!(names.contains(&"I love programming."));
    }

    #[test]
    fn neighboring_calls_resolve_independently() {
        let (_dir, index) = laravel_project();
        let doc = "view(''); route('');";
        let in_view = doc.find("view('").unwrap() + 6;
        let in_route = doc.find("route('").unwrap() + 7;

        let items = completions(&index, doc, in_view);
        let names = labels(&items);
        assert!(names.contains(&"welcome"));
        assert!(!names.contains(&"home"));

        let items = completions(&index, doc, in_route);
        let names = labels(&items);
        assert!(names.contains(&"home"));
        assert!(!names.contains(&"welcome"));
    }

    #[test]
    fn section_names_come_from_the_whole_layout_chain() {
        let (_dir, index) = laravel_project();
        let doc = "@extends('layouts.app')\n\n@section('')\n";
        let offset = doc.find("@section('").unwrap() + 10;
        let items = completions(&index, doc, offset);
        let names = labels(&items);
        assert!(names.contains(&"title"));
        assert!(names.contains(&"content"));
        // Inherited through layouts.app from layouts.base.
        assert!(names.contains(&"body"));
    }

    #[test]
    fn push_completes_stack_names() {
        let (_dir, index) = laravel_project();
        let doc = "@extends('layouts.app')\n\n@push('')\n";
        let offset = doc.find("@push('").unwrap() + 7;
        let items = completions(&index, doc, offset);
        let names = labels(&items);
        assert!(names.contains(&"scripts"));
        assert!(names.contains(&"head"));
        assert!(!names.contains(&"content"));
    }
}

// ============================================================================
// Document Links
// ============================================================================

mod document_links {
    use super::*;

    #[test]
    fn views_link_to_their_blade_files() {
        let (_dir, index) = laravel_project();
        let found = links(&index, "view('welcome'); view('missing');");
        assert_eq!(found.len(), 1);
        let target = found[0].target.as_ref().unwrap();
        assert!(target.path().ends_with("resources/views/welcome.blade.php"));
        assert_eq!(target.fragment(), Some("L1"));
    }

    #[test]
    fn actions_link_to_their_controller_files() {
        let (_dir, index) = laravel_project();
        let found = links(&index, "Route::get('/', 'HomeController@index');");
        assert_eq!(found.len(), 1);
        let target = found[0].target.as_ref().unwrap();
        assert!(target
            .path()
            .ends_with("app/Http/Controllers/HomeController.php"));
        // Opens at the method, not the top of the class.
        assert_eq!(target.fragment(), Some("L11"));
    }

    #[test]
    fn route_names_link_to_their_declaration() {
        let (_dir, index) = laravel_project();
        let found = links(&index, "route('home');");
        assert_eq!(found.len(), 1);
        let target = found[0].target.as_ref().unwrap();
        assert!(target.path().ends_with("routes/web.php"));
        // 'home' is declared on zero-based line 4 of routes/web.php.
        assert_eq!(target.fragment(), Some("L5"));
    }

    #[test]
    fn every_feature_contributes_links() {
        let (_dir, index) = laravel_project();
        let doc = "view('welcome'); route('home'); config('app.name'); __('messages.welcome'); env('APP_NAME');";
        assert_eq!(links(&index, doc).len(), 5);
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

mod diagnostics {
    use super::*;

    #[test]
    fn well_referenced_documents_are_quiet() {
        let (_dir, index) = laravel_project();
        let doc = r#"<?php
Route::get('/new', 'HomeController@index')->name('home.new');
view('welcome');
route('home');
config('app.name');
__('messages.welcome');
env('APP_NAME');
"#;
        assert!(diagnostics(&index, doc).is_empty());
    }

    #[test]
    fn missing_view_warns_with_the_expected_path() {
        let (_dir, index) = laravel_project();
        let found = diagnostics(&index, "view('missing.page');");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(found[0].source.as_deref(), Some(SOURCE));
        assert!(found[0].message.contains("View file not found: 'missing.page'"));
        assert!(found[0].message.contains("missing/page.blade.php"));
    }

    #[test]
    fn route_view_with_missing_template_is_an_error() {
        let (_dir, index) = laravel_project();
        let found = diagnostics(&index, "Route::view('/x', 'nope');");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Some(DiagnosticSeverity::ERROR));
    }

    #[test]
    fn unknown_controller_action_is_an_error() {
        let (_dir, index) = laravel_project();
        let found = diagnostics(&index, "Route::get('/x', 'NopeController@index');");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            found[0].message,
            "Controller action not found: 'NopeController@index'"
        );
    }

    #[test]
    fn closures_and_array_callables_pass() {
        let (_dir, index) = laravel_project();
        let doc = "Route::get('/a', fn () => 1); Route::post('/b', [HomeController::class, 'index']);";
        assert!(diagnostics(&index, doc).is_empty());
    }

    #[test]
    fn unknown_route_name_warns() {
        let (_dir, index) = laravel_project();
        let found = diagnostics(&index, "route('nope');");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(found[0].message, "Route name not found: 'nope'");
    }

    #[test]
    fn unknown_config_key_warns_but_set_may_mint_one() {
        let (_dir, index) = laravel_project();
        let doc = "config('app.missing'); Config::set('app.fresh', 1);";
        let found = diagnostics(&index, doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "Config key not found: 'app.missing'");
    }

    #[test]
    fn unknown_translation_group_warns_but_prose_passes() {
        let (_dir, index) = laravel_project();
        let doc = "__('messages.missing'); __('Just some text');";
        let found = diagnostics(&index, doc);
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].message,
            "Translation key not found: 'messages.missing'"
        );
    }

    #[test]
    fn env_severity_depends_on_the_fallback_argument() {
        let (_dir, index) = laravel_project();
        let found = diagnostics(&index, "env('NOPE'); env('ALSO_NOPE', 'fallback');");
        assert_eq!(found.len(), 2);
        let bare = found
            .iter()
            .find(|d| d.message.contains("'NOPE'"))
            .unwrap();
        assert_eq!(bare.severity, Some(DiagnosticSeverity::WARNING));
        assert!(bare.message.contains("has no fallback"));
        let with_fallback = found
            .iter()
            .find(|d| d.message.contains("'ALSO_NOPE'"))
            .unwrap();
        assert_eq!(with_fallback.severity, Some(DiagnosticSeverity::INFORMATION));
        assert!(with_fallback.message.contains("using fallback value"));
    }

    #[test]
    fn nothing_is_reported_before_the_first_scan() {
        let (dir, _index) = laravel_project();
        let unloaded = ProjectIndex::empty(dir.path().to_path_buf());
        let doc = "view('nope'); route('nope'); env('NOPE');";
        assert!(diagnostics(&unloaded, doc).is_empty());
    }

    #[test]
    fn disabled_features_stay_silent() {
        let (_dir, index) = laravel_project();
        let templates = TemplateCache::new();
        let cancel = CancellationToken::new();
        let uri = Url::from_file_path(index.root.join("routes/web.php")).unwrap();
        let doc = "view('nope'); route('nope');";
        let ctx = FeatureContext::new(doc, &uri, &index, &templates, &cancel);

        let registry = Registry::with_default_features_except(&["views".to_string()]);
        let found = registry.diagnostics(&ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "Route name not found: 'nope'");
    }
}

// ============================================================================
// Cancellation
// ============================================================================

mod cancellation {
    use super::*;

    #[test]
    fn cancelled_requests_report_nothing() {
        let (_dir, index) = laravel_project();
        let templates = TemplateCache::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let uri = Url::from_file_path(index.root.join("routes/web.php")).unwrap();
        let doc = "view('nope'); route('')";
        let ctx = FeatureContext::new(doc, &uri, &index, &templates, &cancel);

        let registry = Registry::with_default_features();
        assert!(registry.completions_at(&ctx, doc.len() - 2).is_empty());
        assert!(registry.diagnostics(&ctx).is_empty());
        assert!(registry.links(&ctx).is_empty());
    }
}
