//! `unbundle dev` command implementation.
//!
//! Serves the project as individual ES modules, building each on request:
//!
//! ```text
//! Browser requests GET /_dist_/index.js
//!   → map the URL back to src/index.ts through the mount table
//!   → load + transform (plugins)
//!   → scan + rewrite imports (bare → /_unbundle/pkg/..., ./a → ./a.js)
//!   → serve as application/javascript
//! ```
//!
//! Builds are cached per file. A file watcher invalidates the cache when
//! sources change, so the next request rebuilds.

use super::load_project;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use miette::{miette, IntoDiagnostic, Result};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use unbundle_core::rewrite::PROXY_SUFFIX;
use unbundle_core::{BuildError, BuildOptions, BuildPipeline, Mode};

/// Quiet period before a batch of file events is applied.
const DEBOUNCE: Duration = Duration::from_millis(50);

/// Dev server action.
#[derive(Debug, Clone, Default)]
pub struct DevAction {
    /// Port to listen on; falls back to `dev.port`.
    pub port: Option<u16>,
    /// Host to bind to; falls back to `dev.host`.
    pub host: Option<String>,
}

/// Shared server state.
struct DevState {
    pipeline: BuildPipeline,
    options: BuildOptions,
}

/// A debounced batch of file events.
#[derive(Debug, Default)]
struct ChangeBatch {
    paths: HashSet<PathBuf>,
    /// A file was created, removed or renamed: cached rewrites may point at the wrong file.
    structural: bool,
}

/// Run the dev server until Ctrl+C.
pub async fn run(config: &unbundle_core::Config, action: DevAction) -> Result<()> {
    let project = load_project(config)?;
    let plugins = project
        .plugins()
        .map_err(|e| miette!(code = e.code(), "{e}"))?;
    let pipeline = project.build_pipeline(plugins);
    pipeline
        .start()
        .await
        .map_err(|e| miette!("{e}"))?;

    let state = Arc::new(DevState {
        pipeline: pipeline.clone(),
        options: project.build_options(Mode::Development),
    });

    // Watch mounts and the package cache
    let roots = watch_roots(
        project
            .mounts
            .rules()
            .iter()
            .map(|rule| rule.source_dir.clone())
            .chain(std::iter::once(project.cache_dir.clone())),
    );
    let ignore = IgnoreRules {
        roots: roots.clone(),
        build_out: project.build.out.clone(),
        cache_dir: project.cache_dir.clone(),
    };
    let (change_tx, mut change_rx) = mpsc::channel::<ChangeBatch>(64);
    std::thread::spawn(move || {
        if let Err(e) = watch_files(&roots, &ignore, &change_tx) {
            tracing::warn!(error = %e, "file watcher stopped");
        }
    });

    let change_pipeline = pipeline.clone();
    let cache_dir = project.cache_dir.clone();
    tokio::spawn(async move {
        while let Some(batch) = change_rx.recv().await {
            handle_file_change(&change_pipeline, &cache_dir, &batch);
        }
    });

    let app = router(state);

    let port = action.port.unwrap_or(project.dev.port);
    let host = action.host.unwrap_or_else(|| project.dev.host.clone());
    let host_ip = if host == "localhost" {
        "127.0.0.1".to_string()
    } else {
        host.clone()
    };
    let addr: SocketAddr = format!("{host_ip}:{port}").parse().into_diagnostic()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;

    println!();
    println!("  Dev server running at http://{host}:{port}");
    for rule in project.mounts.rules() {
        println!(
            "  {} → {}{}",
            rule.url_prefix,
            rule.source_dir
                .strip_prefix(&project.root)
                .unwrap_or(&rule.source_dir)
                .display(),
            if rule.is_static { " (static)" } else { "" }
        );
    }
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    pipeline.stop().await.map_err(|e| miette!("{e}"))?;
    Ok(())
}

fn router(state: Arc<DevState>) -> Router {
    Router::new()
        .route("/", get(serve_url))
        .route("/*path", get(serve_url))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Serve any URL: proxies, package files, static files and built modules.
async fn serve_url(State(state): State<Arc<DevState>>, uri: Uri) -> Response {
    let mut url = uri.path().to_string();
    if url.ends_with('/') {
        url.push_str("index.html");
    }
    let pipeline = &state.pipeline;

    if url.ends_with(PROXY_SUFFIX) {
        let Some(target) = pipeline.file_for_proxy_url(&url) else {
            return not_found(&url);
        };
        return match pipeline
            .build_proxy(&target.file, &target.ext, &state.options)
            .await
        {
            Ok(code) => module_response(code, content_type(".js")),
            Err(e) => build_error(&e),
        };
    }

    let Some(target) = pipeline.file_for_url(&url) else {
        return not_found(&url);
    };

    if target.raw {
        let immutable = pipeline.packages().is_package_url(&url);
        return match tokio::fs::read(&target.file).await {
            Ok(bytes) => raw_response(bytes, content_type(&target.ext), immutable),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found(&url),
            Err(e) => build_error(&BuildError::io(&target.file, &e)),
        };
    }

    match pipeline
        .build_output(&target.file, &target.ext, &state.options)
        .await
    {
        Ok(result) => module_response(result.contents, content_type(&target.ext)),
        Err(e) => build_error(&e),
    }
}

fn module_response(code: String, content_type: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        code,
    )
        .into_response()
}

fn raw_response(bytes: Vec<u8>, content_type: &'static str, immutable: bool) -> Response {
    let cache = if immutable {
        "max-age=31536000, immutable"
    } else {
        "no-cache"
    };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, cache),
        ],
        bytes,
    )
        .into_response()
}

fn not_found(url: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("Not found: {url}")).into_response()
}

/// A failed build replaces the module; the server keeps running.
fn build_error(error: &BuildError) -> Response {
    if let BuildError::NotFound { url } = error {
        return not_found(url);
    }
    tracing::error!(code = error.code(), "{error}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("{}: {error}", error.code()),
    )
        .into_response()
}

/// Content type for an output extension (with leading dot).
fn content_type(ext: &str) -> &'static str {
    match ext {
        ".js" | ".mjs" => "application/javascript",
        ".css" => "text/css",
        ".json" | ".map" => "application/json",
        ".html" | ".htm" => "text/html; charset=utf-8",
        ".svg" => "image/svg+xml",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".ico" => "image/x-icon",
        ".woff" => "font/woff",
        ".woff2" => "font/woff2",
        ".wasm" => "application/wasm",
        ".txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// File Watching
// ============================================================================

struct IgnoreRules {
    roots: Vec<PathBuf>,
    build_out: PathBuf,
    cache_dir: PathBuf,
}

impl IgnoreRules {
    /// Check if a path should be ignored by the file watcher.
    fn should_ignore(&self, path: &Path) -> bool {
        if path.starts_with(&self.cache_dir) {
            return false;
        }
        if path.starts_with(&self.build_out) {
            return true;
        }
        let relative = self
            .roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        relative.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            name == "node_modules" || name.starts_with('.')
        })
    }
}

/// Existing directories to watch, without any that another root already covers.
fn watch_roots(dirs: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = dirs.into_iter().filter(|d| d.is_dir()).collect();
    dirs.sort();
    dirs.dedup();
    let mut roots: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !roots.iter().any(|root| dir.starts_with(root)) {
            roots.push(dir);
        }
    }
    roots
}

/// Watch files for changes, sending debounced batches until the receiver is gone.
fn watch_files(
    roots: &[PathBuf],
    ignore: &IgnoreRules,
    change_tx: &mpsc::Sender<ChangeBatch>,
) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(tx, Config::default()).into_diagnostic()?;
    for root in roots {
        watcher
            .watch(root, RecursiveMode::Recursive)
            .into_diagnostic()?;
        tracing::debug!(root = %root.display(), "watching");
    }

    let mut batch = ChangeBatch::default();
    loop {
        let timeout = if batch.paths.is_empty() {
            Duration::from_secs(3600)
        } else {
            DEBOUNCE
        };
        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                let paths: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| !ignore.should_ignore(p))
                    .collect();
                if paths.is_empty() {
                    continue;
                }
                if matches!(
                    event.kind,
                    EventKind::Create(_)
                        | EventKind::Remove(_)
                        | EventKind::Modify(notify::event::ModifyKind::Name(_))
                ) {
                    batch.structural = true;
                }
                batch.paths.extend(paths);
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "watch error");
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                if batch.paths.is_empty() {
                    continue;
                }
                if change_tx.blocking_send(std::mem::take(&mut batch)).is_err() {
                    break;
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

/// Invalidate the cached builds a batch of changes affects.
fn handle_file_change(pipeline: &BuildPipeline, cache_dir: &Path, batch: &ChangeBatch) {
    let packages_changed = batch.paths.iter().any(|p| p.starts_with(cache_dir));
    if batch.structural || packages_changed {
        let count = pipeline.invalidate_all();
        tracing::info!(
            files = batch.paths.len(),
            invalidated = count,
            "files added or removed, cleared build cache"
        );
        return;
    }
    for path in &batch.paths {
        let count = pipeline.invalidate_path(path);
        tracing::info!(file = %path.display(), invalidated = count, "file changed");
    }
}
