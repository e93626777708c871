//! End-to-end build of one source file: load, transform, scan, rewrite.

use super::cache::SingleFlight;
use super::options::{BuildKey, BuildOptions};
use super::proxy::proxy_module;
use crate::alias::AliasTable;
use crate::error::{BuildError, BuildWarning, Error, ResolutionError};
use crate::extensions::{extension_of, path_extension, replace_extension};
use crate::imports::{scan, SourceKind};
use crate::mount::{strip_query, MountTable};
use crate::packages::PackageResolver;
use crate::plugin::{LoadedOutput, PluginPipeline};
use crate::rewrite::{rewrite, ResolvedSpecifier, RewriteContext, SourceEdit, PROXY_SUFFIX};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unbundle_util::fs::normalize_path;
use unbundle_util::hash::blake3_file;

/// One built output of a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub contents: String,
    pub source_map: Option<String>,
    /// One entry per import, in source order.
    pub resolved_imports: Vec<ResolvedSpecifier>,
    /// Spans replaced by the rewriter, for shifting a source map.
    pub edits: Vec<SourceEdit>,
    pub warnings: Vec<BuildWarning>,
}

impl BuildResult {
    fn unresolved(contents: String, source_map: Option<String>) -> Self {
        Self {
            contents,
            source_map,
            ..Self::default()
        }
    }
}

/// Every output of one source file, keyed by output extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuild {
    pub file: PathBuf,
    /// Hash of the file as it was when the build started. `None` if it was unreadable.
    pub content_hash: Option<String>,
    pub outputs: BTreeMap<String, BuildResult>,
}

/// Where a requested URL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTarget {
    pub file: PathBuf,
    /// Output extension the URL asks for.
    pub ext: String,
    /// The file is served as-is (static mount, package cache, unknown extension).
    pub raw: bool,
}

struct Context {
    mounts: MountTable,
    packages: PackageResolver,
    aliases: AliasTable,
    plugins: PluginPipeline,
}

/// Builds source files on demand behind a single-flight cache.
#[derive(Clone)]
pub struct BuildPipeline {
    ctx: Arc<Context>,
    cache: SingleFlight<BuildKey, Arc<SourceBuild>>,
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("mounts", &self.ctx.mounts)
            .field("packages", &self.ctx.packages)
            .field("plugins", &self.ctx.plugins)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl BuildPipeline {
    #[must_use]
    pub fn new(
        mounts: MountTable,
        packages: PackageResolver,
        aliases: AliasTable,
        plugins: PluginPipeline,
    ) -> Self {
        Self {
            ctx: Arc::new(Context {
                mounts,
                packages,
                aliases,
                plugins,
            }),
            cache: SingleFlight::new(),
        }
    }

    #[must_use]
    pub fn mounts(&self) -> &MountTable {
        &self.ctx.mounts
    }

    #[must_use]
    pub fn packages(&self) -> &PackageResolver {
        &self.ctx.packages
    }

    #[must_use]
    pub fn plugins(&self) -> &PluginPipeline {
        &self.ctx.plugins
    }

    pub async fn start(&self) -> Result<(), Error> {
        self.ctx.plugins.start().await
    }

    pub async fn stop(&self) -> Result<(), Error> {
        self.ctx.plugins.stop().await
    }

    /// Build every output of `path`, reusing a cached or in-flight build.
    pub async fn build_file(
        &self,
        path: &Path,
        options: &BuildOptions,
    ) -> Result<Arc<SourceBuild>, BuildError> {
        let path = normalize_path(path);
        let key = BuildKey::new(path.clone(), options);
        let ctx = Arc::clone(&self.ctx);
        let options = options.clone();
        self.cache
            .get_or_build(key, move || async move {
                ctx.build(path, options).await.map(Arc::new)
            })
            .await
    }

    /// One output (`.js`, `.css`) of `path`.
    pub async fn build_output(
        &self,
        path: &Path,
        ext: &str,
        options: &BuildOptions,
    ) -> Result<BuildResult, BuildError> {
        let build = self.build_file(path, options).await?;
        build
            .outputs
            .get(ext)
            .cloned()
            .ok_or_else(|| self.not_found(path, ext))
    }

    /// The `.proxy.js` module standing in for output `ext` of `path`.
    ///
    /// Files served as-is (package cache, static mounts) are wrapped from
    /// their contents on disk.
    pub async fn build_proxy(
        &self,
        path: &Path,
        ext: &str,
        options: &BuildOptions,
    ) -> Result<String, BuildError> {
        let Some(url) = self.public_url(path, ext) else {
            return Err(self.not_found(path, ext));
        };
        if self.is_buildable(path) {
            let output = self.build_output(path, ext, options).await?;
            return Ok(proxy_module(ext, Some(&output.contents), &url));
        }
        if !path.is_file() {
            return Err(BuildError::NotFound { url });
        }
        let contents = match ext {
            ".css" | ".json" => Some(
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| BuildError::io(path, &e))?,
            ),
            _ => None,
        };
        Ok(proxy_module(ext, contents.as_deref(), &url))
    }

    /// Forget every cached build of `path`, across all options. Returns how many were dropped.
    ///
    /// Builds whose file still hashes the same are kept, so a touch or a save
    /// without edits does not rebuild.
    pub fn invalidate_path(&self, path: &Path) -> usize {
        let path = normalize_path(path);
        let current = blake3_file(&path).ok();
        let count = self.cache.invalidate_where_changed(
            |key| key.path == path,
            |build| current.is_some() && build.content_hash == current,
        );
        if count > 0 {
            tracing::debug!(file = %path.display(), count, "invalidated");
        }
        count
    }

    /// Invalidate everything, e.g. after files were added or removed.
    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_where(|_| true)
    }

    /// Whether `path` goes through the build (as opposed to being served raw).
    ///
    /// Package cache files never do, even when the cache sits inside a mount.
    #[must_use]
    pub fn is_buildable(&self, path: &Path) -> bool {
        let known = path_extension(path).is_some_and(|ext| self.ctx.plugins.extensions().contains(&ext));
        known
            && !normalize_path(path).starts_with(self.ctx.packages.cache_dir())
            && self
                .ctx
                .mounts
                .resolve_mount(path)
                .is_some_and(|m| !m.rule.is_static)
    }

    /// Public URL of the primary output of a file.
    #[must_use]
    pub fn resolve_url_for_file(&self, path: &Path) -> Option<String> {
        let url = self.ctx.mounts.url_for_path(path)?;
        if self.ctx.mounts.resolve_mount(path)?.rule.is_static {
            return Some(url);
        }
        Some(match path_extension(path) {
            Some(ext) => {
                let output = self.ctx.plugins.extensions().output_ext(&ext);
                if output == ext {
                    url
                } else {
                    replace_extension(&url, output)
                }
            }
            None => url,
        })
    }

    /// Public URL of a package specifier.
    pub fn get_url_for_package(&self, specifier: &str) -> Result<String, ResolutionError> {
        self.ctx
            .packages
            .resolve_specifier(specifier)
            .map(|entry| entry.public_url)
    }

    /// Map a request URL to the file and output that serve it.
    ///
    /// A `.proxy.js` suffix must be stripped by the caller first.
    #[must_use]
    pub fn file_for_url(&self, url: &str) -> Option<UrlTarget> {
        let url = strip_query(url);
        let ext = extension_of(url).unwrap_or_default().to_string();

        if self.ctx.packages.is_package_url(url) {
            let file = self.ctx.packages.file_for_url(url)?;
            return Some(UrlTarget {
                file,
                ext,
                raw: true,
            });
        }

        let matched = self.ctx.mounts.resolve_mount_by_url(url)?;
        let requested = matched.path()?;
        if matched.rule.is_static {
            return requested.is_file().then(|| UrlTarget {
                file: requested,
                ext,
                raw: true,
            });
        }

        if requested.is_file() {
            let raw = !self.is_buildable(&requested);
            let ext = if raw {
                ext
            } else {
                let source = path_extension(&requested).unwrap_or_default();
                self.ctx.plugins.extensions().output_ext(&source).to_string()
            };
            return Some(UrlTarget {
                file: requested,
                ext,
                raw,
            });
        }

        let extensions = self.ctx.plugins.extensions();
        extensions
            .sources_for_output(&ext)
            .into_iter()
            .skip(1)
            .map(|source| requested.with_extension(&source[1..]))
            .find(|candidate| candidate.is_file())
            .map(|file| UrlTarget {
                file,
                ext: ext.clone(),
                raw: false,
            })
    }

    /// Map a `.proxy.js` URL to the file and output it wraps.
    #[must_use]
    pub fn file_for_proxy_url(&self, url: &str) -> Option<UrlTarget> {
        let inner = strip_query(url).strip_suffix(PROXY_SUFFIX)?;
        self.file_for_url(inner)
    }

    /// URL of output `ext` of `path`, through the package cache or a mount.
    #[must_use]
    pub fn public_url(&self, path: &Path, ext: &str) -> Option<String> {
        let path = normalize_path(path);
        if path.starts_with(self.ctx.packages.cache_dir()) {
            return self.ctx.packages.url_for_file(&path);
        }
        let url = self.ctx.mounts.url_for_path(&path)?;
        Some(replace_extension(&url, ext))
    }

    /// Not-found error naming the public URL, or only the file name when there is none.
    fn not_found(&self, path: &Path, ext: &str) -> BuildError {
        let url = self.public_url(path, ext).unwrap_or_else(|| {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            replace_extension(&name.unwrap_or_default(), ext)
        });
        BuildError::NotFound { url }
    }
}

impl Context {
    async fn build(
        self: Arc<Self>,
        path: PathBuf,
        options: BuildOptions,
    ) -> Result<SourceBuild, BuildError> {
        let content_hash = blake3_file(&path).ok();
        let loaded = self.plugins.load(&path, options.mode).await?;
        let mut transformed = BTreeMap::new();
        for (ext, output) in loaded {
            let code = self
                .plugins
                .transform(&path, &ext, output.code, options.mode)
                .await?;
            transformed.insert(
                ext,
                LoadedOutput {
                    code,
                    map: output.map.filter(|_| options.source_maps),
                },
            );
        }

        let resolve = self
            .mounts
            .resolve_mount(&path)
            .map_or(true, |m| m.rule.resolve);
        if !resolve {
            let outputs = transformed
                .into_iter()
                .map(|(ext, out)| (ext, BuildResult::unresolved(out.code, out.map)))
                .collect();
            return Ok(SourceBuild {
                file: path,
                content_hash,
                outputs,
            });
        }

        // Resolution reads the package cache and checks the filesystem
        let file = path.clone();
        tokio::task::spawn_blocking(move || {
            let mut outputs = BTreeMap::new();
            for (ext, out) in transformed {
                let result = self.resolve_output(&path, &ext, out)?;
                outputs.insert(ext, result);
            }
            Ok(SourceBuild {
                file: path,
                content_hash,
                outputs,
            })
        })
        .await
        .map_err(|e| BuildError::Cancelled {
            file,
            message: e.to_string(),
        })?
    }

    fn resolve_output(
        &self,
        path: &Path,
        ext: &str,
        output: LoadedOutput,
    ) -> Result<BuildResult, BuildError> {
        let Some(kind) = SourceKind::from_extension(ext) else {
            return Ok(BuildResult::unresolved(output.code, output.map));
        };
        let records = scan(&output.code, kind).map_err(|e| BuildError::parse(path, e))?;
        let ctx = RewriteContext {
            importer: path,
            kind,
            mounts: &self.mounts,
            packages: &self.packages,
            aliases: &self.aliases,
            extensions: self.plugins.extensions(),
        };
        let rewritten = rewrite(&output.code, &records, &ctx);
        for warning in &rewritten.warnings {
            tracing::warn!(file = %path.display(), code = warning.code(), "{warning}");
        }
        Ok(BuildResult {
            contents: rewritten.code,
            source_map: output.map,
            resolved_imports: rewritten.resolutions,
            edits: rewritten.edits,
            warnings: rewritten.warnings,
        })
    }
}
