//! Error taxonomy for unbundle.
//!
//! Resolution-level problems (`PackageNotInstalled`, unresolvable dynamic imports)
//! are recovered into [`BuildWarning`]s so the rest of a file still transforms.
//! Parse and plugin failures abort the build of that one file with a [`BuildError`].

use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes.
///
/// All codes are SCREAMING_SNAKE_CASE and stable across versions.
pub mod codes {
    pub const CONFIG_AMBIGUOUS_MOUNT: &str = "CONFIG_AMBIGUOUS_MOUNT";
    pub const CONFIG_READ_FAILED: &str = "CONFIG_READ_FAILED";
    pub const CONFIG_PARSE_FAILED: &str = "CONFIG_PARSE_FAILED";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    pub const RESOLVE_PACKAGE_NOT_INSTALLED: &str = "RESOLVE_PACKAGE_NOT_INSTALLED";
    pub const RESOLVE_EMPTY_SPECIFIER: &str = "RESOLVE_EMPTY_SPECIFIER";
    pub const RESOLVE_LOCKFILE_INVALID: &str = "RESOLVE_LOCKFILE_INVALID";
    pub const RESOLVE_NOT_MOUNTED: &str = "RESOLVE_NOT_MOUNTED";

    pub const SCAN_PARSE_FAILURE: &str = "SCAN_PARSE_FAILURE";

    pub const BUILD_PARSE_FAILURE: &str = "BUILD_PARSE_FAILURE";
    pub const BUILD_PLUGIN_ERROR: &str = "BUILD_PLUGIN_ERROR";
    pub const BUILD_IO_ERROR: &str = "BUILD_IO_ERROR";
    pub const BUILD_NOT_FOUND: &str = "BUILD_NOT_FOUND";
    pub const BUILD_TASK_FAILED: &str = "BUILD_TASK_FAILED";

    pub const PLUGIN_LIFECYCLE_FAILED: &str = "PLUGIN_LIFECYCLE_FAILED";

    pub const WARN_UNRESOLVED_DYNAMIC_SPECIFIER: &str = "WARN_UNRESOLVED_DYNAMIC_SPECIFIER";
    pub const WARN_PACKAGE_NOT_INSTALLED: &str = "WARN_PACKAGE_NOT_INSTALLED";
    pub const WARN_UNRESOLVED_IMPORT: &str = "WARN_UNRESOLVED_IMPORT";
    pub const WARN_UNSUPPORTED_GLOB: &str = "WARN_UNSUPPORTED_GLOB";
}

/// Top-level error type for unbundle operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// A plugin failed outside of a single file's build (`start`, `stop`, `optimize`).
    #[error("[{plugin}] {hook} failed: {message}")]
    Plugin {
        plugin: String,
        hook: &'static str,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Stable code, when the error has one.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Config(e) => Some(e.code()),
            Self::Build(e) => Some(e.code()),
            Self::Plugin { .. } => Some(codes::PLUGIN_LIFECYCLE_FAILED),
            Self::Io(_) | Self::Other(_) => None,
        }
    }
}

/// Configuration is unusable. Raised at load time, never while serving requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Two mount rules share the directory {}", dir.display())]
    AmbiguousMount { dir: PathBuf },

    #[error("Failed to read config at {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config at {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AmbiguousMount { .. } => codes::CONFIG_AMBIGUOUS_MOUNT,
            Self::Read { .. } => codes::CONFIG_READ_FAILED,
            Self::Parse { .. } => codes::CONFIG_PARSE_FAILED,
            Self::Invalid(_) => codes::CONFIG_INVALID,
        }
    }
}

/// A specifier could not be mapped to a package entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No entry in the package cache. The caller decides whether to install and retry.
    #[error("Package not installed: {specifier}")]
    PackageNotInstalled { specifier: String },

    #[error("Cannot resolve empty specifier")]
    EmptySpecifier,

    #[error("Invalid import map at {}: {message}", path.display())]
    LockfileInvalid { path: PathBuf, message: String },

    /// The file lies outside every mounted directory and has no public URL.
    #[error("{} is not under any mounted directory", path.display())]
    NotMounted { path: PathBuf },
}

impl ResolutionError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PackageNotInstalled { .. } => codes::RESOLVE_PACKAGE_NOT_INSTALLED,
            Self::EmptySpecifier => codes::RESOLVE_EMPTY_SPECIFIER,
            Self::LockfileInvalid { .. } => codes::RESOLVE_LOCKFILE_INVALID,
            Self::NotMounted { .. } => codes::RESOLVE_NOT_MOUNTED,
        }
    }
}

/// The import scanner rejected the source text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {message}")]
pub struct ScanError {
    /// Line (1-indexed).
    pub line: u32,
    /// Column (1-indexed, in characters).
    pub column: u32,
    pub message: String,
}

impl ScanError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        codes::SCAN_PARSE_FAILURE
    }
}

/// Fatal failure building one file.
///
/// `Clone` so that every caller joined on the same in-flight build observes
/// the identical error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("{}:{line}:{column}: {message}", file.display())]
    ParseFailure {
        file: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("[{plugin}] {hook} failed for {}: {message}", file.display())]
    PluginLoad {
        plugin: String,
        hook: &'static str,
        file: PathBuf,
        message: String,
    },

    #[error("Failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("Build task for {} did not complete: {message}", file.display())]
    Cancelled { file: PathBuf, message: String },
}

impl BuildError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseFailure { .. } => codes::BUILD_PARSE_FAILURE,
            Self::PluginLoad { .. } => codes::BUILD_PLUGIN_ERROR,
            Self::Io { .. } => codes::BUILD_IO_ERROR,
            Self::NotFound { .. } => codes::BUILD_NOT_FOUND,
            Self::Cancelled { .. } => codes::BUILD_TASK_FAILED,
        }
    }

    /// Attach the file name to a scanner error.
    #[must_use]
    pub fn parse(file: impl Into<PathBuf>, err: ScanError) -> Self {
        Self::ParseFailure {
            file: file.into(),
            line: err.line,
            column: err.column,
            message: err.message,
        }
    }

    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Non-fatal problem found while rewriting a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    #[error("line {line}: dynamic import of `{expression}` cannot be resolved statically")]
    UnresolvedDynamicSpecifier { expression: String, line: u32 },

    #[error("package `{specifier}` is not installed")]
    PackageNotInstalled { specifier: String },

    #[error("import `{specifier}` could not be resolved: {reason}")]
    UnresolvedImport { specifier: String, reason: String },

    #[error("glob `{specifier}` is only supported through import.meta.glob")]
    UnsupportedGlob { specifier: String },
}

impl BuildWarning {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvedDynamicSpecifier { .. } => codes::WARN_UNRESOLVED_DYNAMIC_SPECIFIER,
            Self::PackageNotInstalled { .. } => codes::WARN_PACKAGE_NOT_INSTALLED,
            Self::UnresolvedImport { .. } => codes::WARN_UNRESOLVED_IMPORT,
            Self::UnsupportedGlob { .. } => codes::WARN_UNSUPPORTED_GLOB,
        }
    }
}
