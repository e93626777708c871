#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Core of unbundle: serve ES modules unbundled.
//!
//! Source files are built one at a time on request. Every import specifier
//! is rewritten to a URL the browser can load: relative files get their
//! output extension, bare package imports point into a pre-built package
//! cache, and mounted directories map to their public URL prefixes.

pub mod alias;
pub mod build;
pub mod config;
pub mod error;
pub mod extensions;
pub mod imports;
pub mod mount;
pub mod packages;
pub mod plugin;
pub mod rewrite;
pub mod specifier;
pub mod version;

pub use alias::AliasTable;
pub use build::{BuildOptions, BuildPipeline, BuildResult, Mode, SingleFlight, SourceBuild};
pub use config::{Config, ProjectConfig};
pub use error::{BuildError, BuildWarning, ConfigError, Error, ResolutionError, ScanError};
pub use extensions::ExtensionMap;
pub use imports::{scan, ImportKind, ImportRecord, InstallTarget, SourceKind};
pub use mount::{MountRule, MountTable};
pub use packages::{PackageEntry, PackageResolver, UrlScheme};
pub use plugin::{Plugin, PluginPipeline};
pub use rewrite::{rewrite, ResolutionKind, ResolvedSpecifier, RewriteContext, RewriteOutput};
pub use specifier::{classify, Classification};
pub use version::VERSION;
