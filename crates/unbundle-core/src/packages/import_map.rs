//! `import-map.json` lockfile reader.
//!
//! The installer writes the lockfile into the package cache directory; this
//! module only reads it. Parsed maps are cached and revalidated by file stamp.

use crate::error::ResolutionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Lockfile name inside the package cache directory.
pub const IMPORT_MAP_FILE: &str = "import-map.json";

/// Specifier → cache-relative path, plus the resolved version of each package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
}

impl ImportMap {
    /// Parse lockfile JSON. `path` is only used for error messages.
    pub fn from_json(path: &Path, text: &str) -> Result<Self, ResolutionError> {
        serde_json::from_str(text).map_err(|e| ResolutionError::LockfileInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Cache-relative path for an exact specifier, without the leading `./`.
    #[must_use]
    pub fn lookup(&self, specifier: &str) -> Option<&str> {
        self.imports
            .get(specifier)
            .map(|p| p.trim_start_matches("./"))
    }

    /// Locked version for a package name.
    #[must_use]
    pub fn version(&self, package: &str) -> Option<&str> {
        self.versions.get(package).map(String::as_str)
    }
}

/// File stamp for cache invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStamp {
    /// Modification time in milliseconds since epoch.
    pub mtime_ms: Option<u64>,
    /// File size in bytes.
    pub size: Option<u64>,
}

impl FileStamp {
    /// Stamp a path. `None` when the file does not exist.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_path(path: &Path) -> Option<Self> {
        let meta = path.metadata().ok()?;
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);
        Some(Self {
            mtime_ms,
            size: Some(meta.len()),
        })
    }
}

/// Read cache for one lockfile.
#[derive(Debug, Default)]
pub struct ImportMapCache {
    slot: RwLock<Option<(FileStamp, Arc<ImportMap>)>>,
}

impl ImportMapCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the lockfile from `cache_dir`, reusing the cached parse while the stamp matches.
    ///
    /// A missing lockfile is not an error: the filename scheme still applies.
    pub fn load(&self, cache_dir: &Path) -> Result<Option<Arc<ImportMap>>, ResolutionError> {
        let path = cache_dir.join(IMPORT_MAP_FILE);
        let Some(stamp) = FileStamp::from_path(&path) else {
            *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
            return Ok(None);
        };

        {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            if let Some((cached, map)) = slot.as_ref() {
                if *cached == stamp {
                    return Ok(Some(Arc::clone(map)));
                }
            }
        }

        let text = std::fs::read_to_string(&path).map_err(|e| ResolutionError::LockfileInvalid {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let map = Arc::new(ImportMap::from_json(&path, &text)?);
        tracing::debug!(path = %path.display(), imports = map.imports.len(), "loaded import map");

        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some((stamp, Arc::clone(&map)));
        Ok(Some(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_and_lookup() {
        let map = ImportMap::from_json(
            Path::new("import-map.json"),
            r#"{"imports":{"react":"./react.v17.0.2.js"},"versions":{"react":"17.0.2"}}"#,
        )
        .unwrap();
        assert_eq!(map.lookup("react"), Some("react.v17.0.2.js"));
        assert_eq!(map.version("react"), Some("17.0.2"));
        assert_eq!(map.lookup("vue"), None);
    }

    #[test]
    fn test_versions_are_optional() {
        let map = ImportMap::from_json(Path::new("m"), r#"{"imports":{}}"#).unwrap();
        assert!(map.versions.is_empty());
    }

    #[test]
    fn test_invalid_json_is_lockfile_error() {
        let err = ImportMap::from_json(Path::new("m"), "{not json").unwrap_err();
        assert!(matches!(err, ResolutionError::LockfileInvalid { .. }));
    }

    #[test]
    fn test_cache_revalidates_on_change() {
        let dir = tempdir().unwrap();
        let cache = ImportMapCache::new();
        assert!(cache.load(dir.path()).unwrap().is_none());

        let file = dir.path().join(IMPORT_MAP_FILE);
        fs::write(&file, r#"{"imports":{"a":"./a.js"}}"#).unwrap();
        let first = cache.load(dir.path()).unwrap().unwrap();
        assert_eq!(first.lookup("a"), Some("a.js"));

        // Same stamp → same parse
        let again = cache.load(dir.path()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        // Size changes, so the stamp no longer matches
        fs::write(&file, r#"{"imports":{"a":"./a.js","bb":"./bb.js"}}"#).unwrap();
        let changed = cache.load(dir.path()).unwrap().unwrap();
        assert_eq!(changed.lookup("bb"), Some("bb.js"));
    }
}
