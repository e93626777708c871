//! Project config file (`unbundle.config.json`).
//!
//! ```json
//! {
//!   "mount": { "src": "/_dist_", "public": { "url": "/", "static": true, "resolve": false } },
//!   "alias": { "@app": "./src/app", "react": "preact/compat" },
//!   "define": { "__VERSION__": "\"1.0.0\"" },
//!   "packages": { "cache_dir": ".unbundle/pkg", "url_scheme": "plain" },
//!   "build": { "out": "build", "meta_url_path": "_unbundle", "source_maps": false },
//!   "dev": { "port": 8080, "host": "localhost" }
//! }
//! ```
//!
//! Every section is optional. Relative paths are resolved against the
//! directory holding the config file.

use crate::alias::AliasTable;
use crate::build::{BuildOptions, BuildPipeline, Mode, DEFAULT_TARGET};
use crate::error::ConfigError;
use crate::mount::{MountRule, MountTable};
use crate::packages::{PackageResolver, UrlScheme};
use crate::plugin::{BannerPlugin, JsonPlugin, PluginPipeline, ReplacePlugin};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use unbundle_util::fs::normalize_path;
use url::Url;

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = "unbundle.config.json";

/// Package cache directory, relative to the root, when none is configured.
pub const DEFAULT_PACKAGE_CACHE: &str = ".unbundle/pkg";

/// URL path segment reserved for unbundle's own files.
pub const DEFAULT_META_URL_PATH: &str = "_unbundle";

/// A mount value: a bare URL or the full form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MountValue {
    Url(String),
    Full {
        url: String,
        #[serde(default, rename = "static")]
        is_static: bool,
        #[serde(default = "default_true")]
        resolve: bool,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackagesSection {
    pub cache_dir: Option<PathBuf>,
    pub url_scheme: UrlScheme,
    /// Package name to origin URL.
    pub remote: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    pub out: PathBuf,
    pub meta_url_path: String,
    pub source_maps: bool,
    pub target: String,
    /// Prepended to every JavaScript file of a production build.
    pub banner: Option<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            out: PathBuf::from("build"),
            meta_url_path: DEFAULT_META_URL_PATH.to_string(),
            source_maps: false,
            target: DEFAULT_TARGET.to_string(),
            banner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevSection {
    pub port: u16,
    pub host: String,
}

impl Default for DevSection {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "localhost".to_string(),
        }
    }
}

/// The config file as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub mount: BTreeMap<String, MountValue>,
    pub alias: BTreeMap<String, String>,
    /// Identifier replacements applied to JavaScript outputs.
    pub define: BTreeMap<String, String>,
    pub packages: PackagesSection,
    pub build: BuildSection,
    pub dev: DevSection,
}

/// A loaded and validated project configuration. Paths are absolute.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    /// The file it was read from, if any.
    pub file: Option<PathBuf>,
    pub mounts: MountTable,
    pub alias: BTreeMap<String, String>,
    pub define: BTreeMap<String, String>,
    pub cache_dir: PathBuf,
    pub url_scheme: UrlScheme,
    pub remote: BTreeMap<String, Url>,
    pub build: BuildSection,
    pub dev: DevSection,
}

impl ProjectConfig {
    /// Load `explicit`, or `<cwd>/unbundle.config.json` if present, or defaults.
    pub fn load(cwd: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(cwd.join(path)),
            None => Some(cwd.join(CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let Some(path) = path else {
            tracing::debug!(root = %cwd.display(), "no config file, using defaults");
            return Self::from_raw(&canonical_root(cwd), None, RawConfig::default());
        };

        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let root = canonical_root(path.parent().unwrap_or(cwd));
        let config = Self::from_json(&root, &text, &path)?;
        tracing::debug!(file = %path.display(), mounts = config.mounts.rules().len(), "loaded config");
        Ok(config)
    }

    /// Parse config text. `path` is only used in error messages.
    pub fn from_json(root: &Path, text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_raw(root, Some(path.to_path_buf()), raw)
    }

    /// Validate a raw config against `root`.
    pub fn from_raw(root: &Path, file: Option<PathBuf>, raw: RawConfig) -> Result<Self, ConfigError> {
        let root = normalize_path(root);

        let mut rules = Vec::with_capacity(raw.mount.len().max(1));
        for (dir, value) in &raw.mount {
            let (url, is_static, resolve) = match value {
                MountValue::Url(url) => (url.as_str(), false, true),
                MountValue::Full {
                    url,
                    is_static,
                    resolve,
                } => (url.as_str(), *is_static, *resolve),
            };
            if !url.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "mount `{dir}`: URL `{url}` must start with `/`"
                )));
            }
            rules.push(
                MountRule::new(root.join(dir), url)
                    .with_static(is_static)
                    .with_resolve(resolve),
            );
        }
        if rules.is_empty() {
            rules.push(MountRule::new(&root, "/"));
        }
        let mounts = MountTable::new(rules)?;

        let meta = raw.build.meta_url_path.trim_matches('/');
        if meta.is_empty() || meta.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "build.meta_url_path `{}` must be a single URL segment",
                raw.build.meta_url_path
            )));
        }

        let mut remote = BTreeMap::new();
        for (package, origin) in &raw.packages.remote {
            let url = Url::parse(origin).map_err(|e| {
                ConfigError::Invalid(format!("packages.remote `{package}`: {e}"))
            })?;
            remote.insert(package.clone(), url);
        }

        let cache_dir = normalize_path(&root.join(
            raw.packages
                .cache_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PACKAGE_CACHE)),
        ));
        let mut build = raw.build;
        build.out = normalize_path(&root.join(&build.out));

        Ok(Self {
            root,
            file,
            mounts,
            alias: raw.alias,
            define: raw.define,
            cache_dir,
            url_scheme: raw.packages.url_scheme,
            remote,
            build,
            dev: raw.dev,
        })
    }

    /// URL prefix of the package cache: `/<meta_url_path>/pkg`.
    #[must_use]
    pub fn package_url_prefix(&self) -> String {
        format!("/{}/pkg", self.build.meta_url_path.trim_matches('/'))
    }

    #[must_use]
    pub fn package_resolver(&self) -> PackageResolver {
        self.remote.iter().fold(
            PackageResolver::new(&self.cache_dir, &self.package_url_prefix())
                .with_url_scheme(self.url_scheme),
            |resolver, (package, origin)| resolver.with_remote(package.clone(), origin.clone()),
        )
    }

    #[must_use]
    pub fn alias_table(&self) -> AliasTable {
        AliasTable::new(&self.root, &self.alias)
    }

    #[must_use]
    pub fn build_options(&self, mode: Mode) -> BuildOptions {
        BuildOptions {
            mode,
            source_maps: self.build.source_maps,
            target: self.build.target.clone(),
        }
    }

    /// Built-in plugins implied by the config.
    pub fn plugins(&self) -> Result<PluginPipeline, ConfigError> {
        let replace = self
            .define
            .iter()
            .fold(ReplacePlugin::new().node_env(), |plugin, (from, to)| {
                plugin.replace(from.clone(), to.clone())
            });
        let mut pipeline = PluginPipeline::new().with(JsonPlugin)?.with(replace)?;
        if let Some(banner) = &self.build.banner {
            pipeline = pipeline.with(BannerPlugin::new(banner.clone()))?;
        }
        Ok(pipeline)
    }

    /// A pipeline over this project with `plugins`.
    #[must_use]
    pub fn build_pipeline(&self, plugins: PluginPipeline) -> BuildPipeline {
        BuildPipeline::new(
            self.mounts.clone(),
            self.package_resolver(),
            self.alias_table(),
            plugins,
        )
    }
}

fn canonical_root(dir: &Path) -> PathBuf {
    dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}
