//! Package entry resolution against the on-disk package cache.
//!
//! Lookup order: configured remote origin, then the `import-map.json`
//! lockfile, then the deterministic `<name>.v<version>.js` filename scheme.
//! The resolver never installs anything; a miss is `PackageNotInstalled`.

use super::import_map::{ImportMap, ImportMapCache, IMPORT_MAP_FILE};
use crate::error::ResolutionError;
use crate::extensions::extension_of;
use crate::mount::{join_url, strip_query, url_segments};
use crate::specifier::split_package_specifier;
use regex_lite::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use unbundle_util::fs::slash_path;
use url::Url;

/// How package URLs are derived from on-disk file names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlScheme {
    /// Drop `.v<version>` from the URL: `/pkg/react.js`.
    #[default]
    Plain,
    /// Mirror the file name: `/pkg/react.v17.0.2.js`.
    Versioned,
}

/// A resolved package entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    /// File in the package cache. `None` for remote packages.
    pub on_disk_entry: Option<PathBuf>,
    /// URL the browser loads.
    pub public_url: String,
    /// Resolved version, when known.
    pub version: Option<String>,
}

impl PackageEntry {
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.on_disk_entry.is_none()
    }
}

/// Resolves package specifiers to cache files and public URLs.
#[derive(Debug)]
pub struct PackageResolver {
    cache_dir: PathBuf,
    url_prefix: String,
    url_scheme: UrlScheme,
    remote: BTreeMap<String, Url>,
    import_map: ImportMapCache,
}

impl PackageResolver {
    /// Create a resolver for `cache_dir`, served under `url_prefix` (e.g. `/_unbundle/pkg`).
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        let trimmed = url_prefix.trim_matches('/');
        Self {
            cache_dir: cache_dir.into(),
            url_prefix: format!("/{trimmed}"),
            url_scheme: UrlScheme::default(),
            remote: BTreeMap::new(),
            import_map: ImportMapCache::new(),
        }
    }

    #[must_use]
    pub fn with_url_scheme(mut self, url_scheme: UrlScheme) -> Self {
        self.url_scheme = url_scheme;
        self
    }

    /// Serve `package` from a remote origin instead of the local cache.
    #[must_use]
    pub fn with_remote(mut self, package: impl Into<String>, mut origin: Url) -> Self {
        if !origin.path().ends_with('/') {
            let path = format!("{}/", origin.path());
            origin.set_path(&path);
        }
        self.remote.insert(package.into(), origin);
        self
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Whether a URL path points into the package cache.
    #[must_use]
    pub fn is_package_url(&self, url: &str) -> bool {
        let url = strip_query(url);
        url.strip_prefix(self.url_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Resolve a full package specifier such as `@scope/name/sub`.
    pub fn resolve_specifier(&self, spec: &str) -> Result<PackageEntry, ResolutionError> {
        if spec.is_empty() {
            return Err(ResolutionError::EmptySpecifier);
        }
        let (name, subpath) = split_package_specifier(spec);
        self.resolve_package(&name, &subpath)
    }

    /// Resolve a package name and subpath (`.` for the package root).
    pub fn resolve_package(
        &self,
        name: &str,
        subpath: &str,
    ) -> Result<PackageEntry, ResolutionError> {
        if name.is_empty() {
            return Err(ResolutionError::EmptySpecifier);
        }
        let specifier = if subpath == "." || subpath.is_empty() {
            name.to_string()
        } else {
            format!("{name}/{subpath}")
        };

        let import_map = self.import_map.load(&self.cache_dir)?;
        let locked = import_map.as_deref().and_then(|m| m.version(name));

        if let Some(origin) = self.remote.get(name) {
            return Ok(remote_entry(origin, name, subpath, locked));
        }

        if let Some(entry) = import_map
            .as_deref()
            .and_then(|m| self.from_import_map(m, &specifier, locked))
        {
            tracing::trace!(specifier = %specifier, url = %entry.public_url, "resolved from import map");
            return Ok(entry);
        }

        let logical = logical_path(name, subpath);
        match locate(&self.cache_dir, &logical, locked) {
            Some((rel, version)) => {
                let public_url = self.public_url(&rel);
                tracing::trace!(specifier = %specifier, url = %public_url, "resolved from package cache");
                Ok(PackageEntry {
                    on_disk_entry: Some(join_relative(&self.cache_dir, &rel)),
                    public_url,
                    version: version.or_else(|| locked.map(str::to_string)),
                })
            }
            None => Err(ResolutionError::PackageNotInstalled { specifier }),
        }
    }

    /// Map a package URL back to its cache file.
    pub fn file_for_url(&self, url: &str) -> Option<PathBuf> {
        let url = strip_query(url);
        let rest = url
            .strip_prefix(self.url_prefix.as_str())?
            .strip_prefix('/')?;
        if url_segments(rest)?.is_empty() {
            return None;
        }

        if let Ok(Some(map)) = self.import_map.load(&self.cache_dir) {
            if let Some(rel) = map
                .imports
                .values()
                .map(|p| p.trim_start_matches("./"))
                .find(|rel| self.public_url(rel) == url)
            {
                let path = join_relative(&self.cache_dir, rel);
                if path.is_file() {
                    return Some(path);
                }
            }
        }

        let (rel, _) = match self.url_scheme {
            UrlScheme::Versioned => {
                let path = join_relative(&self.cache_dir, rest);
                return path.is_file().then_some(path);
            }
            UrlScheme::Plain => locate(&self.cache_dir, rest, None)?,
        };
        Some(join_relative(&self.cache_dir, &rel))
    }

    /// Public URL of a file in the package cache, if it is the file that URL serves.
    ///
    /// Under the plain scheme several versions share one URL; only the
    /// version resolution would pick gets it.
    pub fn url_for_file(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.cache_dir).ok()?;
        let rel = slash_path(rel);
        if rel.is_empty() || rel == IMPORT_MAP_FILE {
            return None;
        }
        let url = self.public_url(&rel);
        (self.file_for_url(&url)?.as_path() == path).then_some(url)
    }

    fn from_import_map(
        &self,
        map: &ImportMap,
        specifier: &str,
        locked: Option<&str>,
    ) -> Option<PackageEntry> {
        let rel = map.lookup(specifier)?;
        let on_disk = join_relative(&self.cache_dir, rel);
        if !on_disk.is_file() {
            tracing::debug!(specifier, path = %on_disk.display(), "import map entry missing on disk");
            return None;
        }
        Some(PackageEntry {
            on_disk_entry: Some(on_disk),
            public_url: self.public_url(rel),
            version: locked.map(str::to_string),
        })
    }

    fn public_url(&self, rel: &str) -> String {
        match self.url_scheme {
            UrlScheme::Versioned => join_url(&self.url_prefix, rel),
            UrlScheme::Plain => join_url(&self.url_prefix, &strip_versions(rel)),
        }
    }
}

fn remote_entry(origin: &Url, name: &str, subpath: &str, version: Option<&str>) -> PackageEntry {
    let mut path = name.to_string();
    if let Some(version) = version {
        path.push('@');
        path.push_str(version);
    }
    if subpath != "." && !subpath.is_empty() {
        path.push('/');
        path.push_str(subpath);
    }
    PackageEntry {
        on_disk_entry: None,
        public_url: format!("{}{path}", origin.as_str()),
        version: version.map(str::to_string),
    }
}

/// Unversioned cache-relative path for a package entry: `name.js` or `name/sub.js`.
fn logical_path(name: &str, subpath: &str) -> String {
    if subpath == "." || subpath.is_empty() {
        format!("{name}.js")
    } else if extension_of(subpath).is_some() {
        format!("{name}/{subpath}")
    } else {
        format!("{name}/{subpath}.js")
    }
}

fn join_relative(base: &Path, rel: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in rel.split('/').filter(|s| !matches!(*s, "" | "." | "..")) {
        path.push(segment);
    }
    path
}

fn versioned_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+)\.v(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)$").ok())
        .as_ref()
}

/// Split `name.v1.2.3.js` into `(name.js, 1.2.3)`. Directories work too.
fn split_versioned(segment: &str) -> Option<(String, Version)> {
    let parse = |body: &str, ext: &str| -> Option<(String, Version)> {
        let caps = versioned_re()?.captures(body)?;
        let version = Version::parse(&caps[2]).ok()?;
        Some((format!("{}{ext}", &caps[1]), version))
    };
    match extension_of(segment) {
        Some(ext) if ext.chars().any(|c| c.is_ascii_alphabetic()) => {
            parse(&segment[..segment.len() - ext.len()], ext).or_else(|| parse(segment, ""))
        }
        _ => parse(segment, ""),
    }
}

fn strip_versions(rel: &str) -> String {
    rel.split('/')
        .map(|segment| split_versioned(segment).map_or_else(|| segment.to_string(), |(s, _)| s))
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `logical` segment by segment, accepting exact names or versioned variants.
///
/// Returns the on-disk relative path and the version picked, if any. The
/// locked version wins when present; otherwise the highest one on disk.
fn locate(cache_dir: &Path, logical: &str, locked: Option<&str>) -> Option<(String, Option<String>)> {
    let locked = locked.and_then(|v| Version::parse(v).ok());
    let segments = url_segments(logical)?;
    let mut dir = cache_dir.to_path_buf();
    let mut rel = Vec::with_capacity(segments.len());
    let mut picked = None;

    for (i, segment) in segments.iter().enumerate() {
        let want_file = i + 1 == segments.len();
        let exact = dir.join(segment);
        let found = if (want_file && exact.is_file()) || (!want_file && exact.is_dir()) {
            (*segment).to_string()
        } else {
            let (name, version) = pick_versioned(&dir, segment, want_file, locked.as_ref())?;
            picked = Some(version.to_string());
            name
        };
        dir.push(&found);
        rel.push(found);
    }
    Some((rel.join("/"), picked))
}

fn pick_versioned(
    dir: &Path,
    segment: &str,
    want_file: bool,
    locked: Option<&Version>,
) -> Option<(String, Version)> {
    let mut candidates: Vec<(String, Version)> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_type()
                .is_ok_and(|t| if want_file { t.is_file() } else { t.is_dir() })
        })
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let (unversioned, version) = split_versioned(&name)?;
            (unversioned == segment).then_some((name, version))
        })
        .collect();

    if let Some(locked) = locked {
        if let Some(pos) = candidates.iter().position(|(_, v)| v == locked) {
            return Some(candidates.swap_remove(pos));
        }
    }
    candidates.into_iter().max_by(|a, b| a.1.cmp(&b.1))
}
