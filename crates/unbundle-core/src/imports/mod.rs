//! Import discovery.
//!
//! [`scan`] produces one [`ImportRecord`] per import/export statement, in
//! source order, with the byte range the rewriter replaces.

mod css;
mod scan;
mod targets;

use crate::error::ScanError;
use serde::Serialize;

pub use targets::{install_targets_for_source, merge_targets, scan_install_targets, InstallTarget};

/// What kind of source a file is, for scanning purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    JavaScript,
    Css,
}

impl SourceKind {
    /// Scanner for an output extension (`.js`, `.css`...). `None` when the format has no imports.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".js" | ".jsx" | ".ts" | ".tsx" | ".mjs" | ".mts" | ".cjs" => Some(Self::JavaScript),
            ".css" => Some(Self::Css),
            _ => None,
        }
    }
}

/// How a specifier is imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Static,
    Dynamic,
    ExportFrom,
    ExportAll,
    Glob { eager: bool },
}

/// One import/export statement found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    /// Specifier text as written (without quotes), or the argument expression when computed.
    pub raw_specifier: String,
    pub kind: ImportKind,
    /// Byte range replaced on rewrite. The specifier inside its quotes, or
    /// the whole `import.meta.glob(...)` call for globs.
    pub start: usize,
    pub end: usize,
    /// The argument is not a plain string literal and cannot be rewritten.
    pub computed: bool,
    /// Import clause (`React, { useState }`, `* as ns`) for declarations with `from`.
    pub clause: Option<String>,
    /// Line of `start` (1-indexed).
    pub line: u32,
}

/// Scan a module for imports.
pub fn scan(source: &str, kind: SourceKind) -> Result<Vec<ImportRecord>, ScanError> {
    match kind {
        SourceKind::JavaScript => scan::scan_js(source),
        SourceKind::Css => css::scan_css(source),
    }
}
