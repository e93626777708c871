//! Specifier classification.
//!
//! Decides what kind of thing an import string names before any resolution
//! happens. Pure and total: every input gets a classification.

/// Characters that turn a specifier into a glob pattern.
const GLOB_CHARS: &[char] = &['*', '{', '}'];

/// What an import specifier refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// `http://` or `https://`. Passed through verbatim, never installed.
    RemoteUrl,
    /// `./`, `../`, or empty. Resolved against the importing file.
    Relative,
    /// `/` or a platform path. Resolved against the mount table.
    Absolute,
    /// `name` or `name/sub/path`.
    BarePackage { name: String, subpath: String },
    /// `@scope/name` or `@scope/name/sub/path`.
    ScopedPackage { name: String, subpath: String },
    /// Contains `*`, `{` or `}` outside the URL scheme.
    Glob,
}

impl Classification {
    /// Package name and subpath for package classifications.
    #[must_use]
    pub fn package(&self) -> Option<(&str, &str)> {
        match self {
            Self::BarePackage { name, subpath } | Self::ScopedPackage { name, subpath } => {
                Some((name.as_str(), subpath.as_str()))
            }
            _ => None,
        }
    }

    /// Whether this specifier is resolved against local files.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Relative | Self::Absolute)
    }
}

/// Classify a specifier.
#[must_use]
pub fn classify(spec: &str) -> Classification {
    if is_glob(spec) {
        return Classification::Glob;
    }
    if is_remote_url(spec) {
        return Classification::RemoteUrl;
    }
    if spec.is_empty() || spec == "." || spec == ".." {
        return Classification::Relative;
    }
    if spec.starts_with("./") || spec.starts_with("../") {
        return Classification::Relative;
    }
    if spec.starts_with('/') || is_platform_path(spec) {
        return Classification::Absolute;
    }

    let (name, subpath) = split_package_specifier(spec);
    if spec.starts_with('@') {
        Classification::ScopedPackage { name, subpath }
    } else {
        Classification::BarePackage { name, subpath }
    }
}

/// Whether a specifier is an `http(s)` URL.
#[must_use]
pub fn is_remote_url(spec: &str) -> bool {
    spec.starts_with("http://") || spec.starts_with("https://")
}

/// Whether a specifier contains glob metacharacters outside its scheme.
#[must_use]
pub fn is_glob(spec: &str) -> bool {
    let body = spec.split_once("://").map_or(spec, |(_, rest)| rest);
    body.contains(GLOB_CHARS)
}

/// Split a package specifier into `(name, subpath)`.
///
/// The name is the first segment, or the first two for `@scope/name`.
/// The subpath is the remainder without its leading slash, or `.` when empty.
#[must_use]
pub fn split_package_specifier(spec: &str) -> (String, String) {
    let segments = if spec.starts_with('@') { 2 } else { 1 };
    let mut parts = spec.splitn(segments + 1, '/');
    let name = parts
        .by_ref()
        .take(segments)
        .collect::<Vec<_>>()
        .join("/");
    let subpath = parts.next().filter(|s| !s.is_empty()).unwrap_or(".");
    (name, subpath.to_string())
}

/// `\foo`, `C:\foo` and `C:/foo`.
fn is_platform_path(spec: &str) -> bool {
    if spec.starts_with('\\') {
        return true;
    }
    let bytes = spec.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_urls() {
        assert_eq!(classify("https://cdn.example.com/react"), Classification::RemoteUrl);
        assert_eq!(classify("http://localhost:3000/a.js"), Classification::RemoteUrl);
    }

    #[test]
    fn test_relative_and_absolute() {
        assert_eq!(classify("./sort"), Classification::Relative);
        assert_eq!(classify("../lib/util.js"), Classification::Relative);
        assert_eq!(classify("/_dist_/index.js"), Classification::Absolute);
        assert_eq!(classify("C:\\project\\a.js"), Classification::Absolute);
        assert_eq!(classify("\\server\\a.js"), Classification::Absolute);
    }

    #[test]
    fn test_empty_is_relative() {
        assert_eq!(classify(""), Classification::Relative);
    }

    #[test]
    fn test_bare_package() {
        assert_eq!(
            classify("react"),
            Classification::BarePackage {
                name: "react".to_string(),
                subpath: ".".to_string()
            }
        );
        assert_eq!(
            classify("preact/hooks"),
            Classification::BarePackage {
                name: "preact".to_string(),
                subpath: "hooks".to_string()
            }
        );
    }

    #[test]
    fn test_scoped_package() {
        let class = classify("@material/button/dist/index.js");
        assert_eq!(class.package(), Some(("@material/button", "dist/index.js")));
        assert!(matches!(class, Classification::ScopedPackage { .. }));

        assert_eq!(classify("@scope/pkg").package(), Some(("@scope/pkg", ".")));
    }

    #[test]
    fn test_glob_wins_over_other_rules() {
        assert_eq!(classify("./pages/*.js"), Classification::Glob);
        assert_eq!(classify("/src/{a,b}.js"), Classification::Glob);
        assert_eq!(classify("https://cdn.example.com/*"), Classification::Glob);
        assert_eq!(classify("https://cdn.example.com/a"), Classification::RemoteUrl);
    }

    #[test]
    fn test_trailing_slash_package() {
        assert_eq!(split_package_specifier("lodash/"), ("lodash".to_string(), ".".to_string()));
    }
}
