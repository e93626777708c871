//! Mount table: maps source directories to public URL prefixes and back.
//!
//! Lookups pick the longest matching prefix. Trailing slashes on either side
//! are normalized away, so `src/` and `src` (or `/_dist_/` and `/_dist_`)
//! behave identically.

use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use unbundle_util::fs::{normalize_path, slash_path};

/// One configured mount point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountRule {
    /// Directory on disk (absolute once loaded from config).
    pub source_dir: PathBuf,
    /// Public URL prefix. Always starts with `/`, never ends with one unless it is `/`.
    pub url_prefix: String,
    /// Serve files verbatim, without building them.
    pub is_static: bool,
    /// Rewrite import specifiers in files under this mount.
    pub resolve: bool,
}

impl MountRule {
    /// Create a building, resolving mount rule.
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            source_dir: normalize_path(&source_dir.into()),
            url_prefix: normalize_url_prefix(url_prefix),
            is_static: false,
            resolve: true,
        }
    }

    /// Mark the mount as static.
    #[must_use]
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Set whether imports under this mount are rewritten.
    #[must_use]
    pub fn with_resolve(mut self, resolve: bool) -> Self {
        self.resolve = resolve;
        self
    }

    /// Public URL for a path relative to this mount's directory.
    #[must_use]
    pub fn url_for_relative(&self, relative: &Path) -> String {
        join_url(&self.url_prefix, &slash_path(relative))
    }
}

/// Result of mapping a file path onto the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountMatch<'a> {
    pub rule: &'a MountRule,
    /// Path of the file relative to `rule.source_dir`.
    pub relative: PathBuf,
}

impl MountMatch<'_> {
    /// The public URL of the matched file (source extension unchanged).
    #[must_use]
    pub fn url(&self) -> String {
        self.rule.url_for_relative(&self.relative)
    }
}

/// Result of mapping a URL path onto the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch<'a> {
    pub rule: &'a MountRule,
    /// URL remainder after the prefix, without a leading slash.
    pub relative: String,
}

impl UrlMatch<'_> {
    /// The filesystem path the URL points at (extension unchanged).
    ///
    /// `None` when a segment could climb out of the mount (`..`, `.`, a backslash).
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        let mut path = self.rule.source_dir.clone();
        for segment in url_segments(&self.relative)? {
            path.push(segment);
        }
        Some(path)
    }
}

/// Ordered, immutable collection of mount rules.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    /// Rules in declaration order.
    rules: Vec<MountRule>,
    /// Indices into `rules`, longest source directory first.
    by_dir: Vec<usize>,
    /// Indices into `rules`, longest URL prefix first.
    by_url: Vec<usize>,
}

impl MountTable {
    /// Build a table, rejecting duplicate source directories.
    pub fn new(rules: Vec<MountRule>) -> Result<Self, ConfigError> {
        let rules: Vec<MountRule> = rules
            .into_iter()
            .map(|rule| MountRule {
                source_dir: normalize_path(&rule.source_dir),
                url_prefix: normalize_url_prefix(&rule.url_prefix),
                ..rule
            })
            .collect();

        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.source_dir.clone()) {
                return Err(ConfigError::AmbiguousMount {
                    dir: rule.source_dir.clone(),
                });
            }
        }

        // Stable sorts keep declaration order among equal lengths
        let mut by_dir: Vec<usize> = (0..rules.len()).collect();
        by_dir.sort_by_key(|&i| std::cmp::Reverse(rules[i].source_dir.as_os_str().len()));
        let mut by_url: Vec<usize> = (0..rules.len()).collect();
        by_url.sort_by_key(|&i| std::cmp::Reverse(url_prefix_len(&rules[i].url_prefix)));

        Ok(Self {
            rules,
            by_dir,
            by_url,
        })
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[MountRule] {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the mount that owns a filesystem path.
    #[must_use]
    pub fn resolve_mount(&self, path: &Path) -> Option<MountMatch<'_>> {
        let path = normalize_path(path);
        self.by_dir.iter().find_map(|&i| {
            let rule = &self.rules[i];
            path.strip_prefix(&rule.source_dir)
                .ok()
                .map(|relative| MountMatch {
                    rule,
                    relative: relative.to_path_buf(),
                })
        })
    }

    /// Find the mount that serves a URL path. Query strings and fragments are ignored.
    #[must_use]
    pub fn resolve_mount_by_url(&self, url: &str) -> Option<UrlMatch<'_>> {
        let url = strip_query(url);
        self.by_url.iter().find_map(|&i| {
            let rule = &self.rules[i];
            strip_url_prefix(url, &rule.url_prefix).map(|relative| UrlMatch {
                rule,
                relative: relative.to_string(),
            })
        })
    }

    /// Public URL for a file, keeping its source extension.
    #[must_use]
    pub fn url_for_path(&self, path: &Path) -> Option<String> {
        self.resolve_mount(path).map(|m| m.url())
    }

    /// Filesystem path for a URL, keeping its extension.
    #[must_use]
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        self.resolve_mount_by_url(url).and_then(|m| m.path())
    }
}

/// Join a normalized URL prefix with a relative URL path.
#[must_use]
pub fn join_url(prefix: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    match (prefix, relative.is_empty()) {
        ("/", _) => format!("/{relative}"),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}/{relative}"),
    }
}

/// Non-empty `/`-separated segments of a URL path, or `None` if any is a dot segment.
#[must_use]
pub fn url_segments(path: &str) -> Option<Vec<&str>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let unsafe_segment = matches!(s, "." | "..") || s.contains(['\\', '\0']);
            (!unsafe_segment).then_some(s)
        })
        .collect()
}

/// Strip `?query` and `#fragment` from a URL path.
#[must_use]
pub fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// URL remainder after `prefix`, matching on whole segments only.
fn strip_url_prefix<'u>(url: &'u str, prefix: &str) -> Option<&'u str> {
    if prefix == "/" {
        return url.strip_prefix('/');
    }
    let rest = url.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

fn url_prefix_len(prefix: &str) -> usize {
    if prefix == "/" {
        0
    } else {
        prefix.len()
    }
}

fn normalize_url_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rules: &[(&str, &str)]) -> MountTable {
        MountTable::new(
            rules
                .iter()
                .map(|(dir, url)| MountRule::new(format!("/project/{dir}"), url))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mounts = table(&[("src", "/_dist_"), ("src/sub", "/special")]);
        assert_eq!(
            mounts.url_for_path(Path::new("/project/src/sub/a.js")).as_deref(),
            Some("/special/a.js")
        );
        assert_eq!(
            mounts.url_for_path(Path::new("/project/src/a.js")).as_deref(),
            Some("/_dist_/a.js")
        );
    }

    #[test]
    fn test_declaration_order_does_not_matter() {
        let mounts = table(&[("src/sub", "/special"), ("src", "/_dist_")]);
        assert_eq!(
            mounts.url_for_path(Path::new("/project/src/sub/a.js")).as_deref(),
            Some("/special/a.js")
        );
    }

    #[test]
    fn test_round_trip_by_url() {
        let mounts = table(&[("src", "/_dist_")]);
        let path = Path::new("/project/src/components/index.js");
        let url = mounts.url_for_path(path).unwrap();
        assert_eq!(url, "/_dist_/components/index.js");
        assert_eq!(mounts.path_for_url(&url).unwrap(), path);
    }

    #[test]
    fn test_trailing_slashes_are_normalized() {
        let with = table(&[("src/", "/_dist_/")]);
        let without = table(&[("src", "/_dist_")]);
        let path = Path::new("/project/src/a.js");
        assert_eq!(with.url_for_path(path), without.url_for_path(path));
        assert_eq!(
            with.path_for_url("/_dist_/a.js"),
            without.path_for_url("/_dist_/a.js")
        );
    }

    #[test]
    fn test_root_mount() {
        let mounts = table(&[("public", "/"), ("src", "/_dist_")]);
        assert_eq!(
            mounts.url_for_path(Path::new("/project/public/index.html")).as_deref(),
            Some("/index.html")
        );
        // The more specific URL prefix wins over "/"
        let m = mounts.resolve_mount_by_url("/_dist_/app.js").unwrap();
        assert_eq!(m.rule.url_prefix, "/_dist_");
        let m = mounts.resolve_mount_by_url("/favicon.ico?v=2").unwrap();
        assert_eq!(m.path().as_deref(), Some(Path::new("/project/public/favicon.ico")));
    }

    #[test]
    fn test_url_cannot_climb_out_of_mount() {
        let mounts = table(&[("src", "/_dist_"), ("public", "/")]);
        assert_eq!(mounts.path_for_url("/_dist_/../../secret.txt"), None);
        assert_eq!(mounts.path_for_url("/../etc/passwd"), None);
        assert_eq!(mounts.path_for_url("/_dist_/./a.js"), None);
        assert_eq!(mounts.path_for_url("/_dist_/..\\secret.txt"), None);
        assert_eq!(
            mounts.path_for_url("/_dist_/a..b/c.js").as_deref(),
            Some(Path::new("/project/src/a..b/c.js"))
        );
    }

    #[test]
    fn test_url_prefix_matches_whole_segments() {
        let mounts = table(&[("src", "/_dist_")]);
        assert!(mounts.resolve_mount_by_url("/_dist_x/a.js").is_none());
        assert!(mounts.resolve_mount(Path::new("/project/srcx/a.js")).is_none());
    }

    #[test]
    fn test_not_mounted() {
        let mounts = table(&[("src", "/_dist_")]);
        assert!(mounts.url_for_path(Path::new("/elsewhere/a.js")).is_none());
        assert!(mounts.path_for_url("/other/a.js").is_none());
    }

    #[test]
    fn test_duplicate_source_dir_is_ambiguous() {
        let err = MountTable::new(vec![
            MountRule::new("/project/src", "/a"),
            MountRule::new("/project/src/", "/b"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousMount { .. }));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("/", "a.js"), "/a.js");
        assert_eq!(join_url("/_dist_", ""), "/_dist_");
        assert_eq!(join_url("/_dist_", "x/a.js"), "/_dist_/x/a.js");
    }
}
