//! Per-request build options and the cache key derived from them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use unbundle_util::hash::{blake3_parts, short_digest};

/// Default `target` when none is configured.
pub const DEFAULT_TARGET: &str = "es2020";

/// Development serves on demand; production writes a static build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    #[must_use]
    pub fn is_dev(self) -> bool {
        self == Self::Development
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Options that change what a build produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildOptions {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub source_maps: bool,
    #[serde(default = "default_target")]
    pub target: String,
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Development,
            source_maps: false,
            target: default_target(),
        }
    }
}

impl BuildOptions {
    #[must_use]
    pub fn production() -> Self {
        Self {
            mode: Mode::Production,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_source_maps(mut self, source_maps: bool) -> Self {
        self.source_maps = source_maps;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Short BLAKE3 digest over every field.
    #[must_use]
    pub fn digest(&self) -> String {
        let maps: &[u8] = if self.source_maps { b"1" } else { b"0" };
        let full = blake3_parts(&[
            self.mode.as_str().as_bytes(),
            maps,
            self.target.as_bytes(),
        ]);
        short_digest(&full).to_string()
    }
}

/// Single-flight cache key: absolute source path plus options digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildKey {
    pub path: PathBuf,
    pub options_digest: String,
}

impl BuildKey {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, options: &BuildOptions) -> Self {
        Self {
            path: path.into(),
            options_digest: options.digest(),
        }
    }
}

impl AsRef<Path> for BuildKey {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_separates_modes() {
        let dev = BuildOptions::default();
        let prod = BuildOptions::production();
        assert_ne!(dev.digest(), prod.digest());
        assert_ne!(dev.digest(), dev.clone().with_source_maps(true).digest());
        assert_ne!(dev.digest(), dev.clone().with_target("es2017").digest());
        assert_eq!(dev.digest(), BuildOptions::default().digest());
    }

    #[test]
    fn test_keys_for_same_file_differ_by_options() {
        let a = BuildKey::new("/p/src/a.js", &BuildOptions::default());
        let b = BuildKey::new("/p/src/a.js", &BuildOptions::production());
        assert_ne!(a, b);
        assert_eq!(a.as_ref(), Path::new("/p/src/a.js"));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: BuildOptions = serde_json::from_str(r#"{"mode": "production"}"#).unwrap();
        assert_eq!(opts.mode, Mode::Production);
        assert!(!opts.source_maps);
        assert_eq!(opts.target, DEFAULT_TARGET);
    }
}
