//! On-demand builds.
//!
//! [`BuildPipeline`] turns a source file into browser-ready outputs:
//!
//! 1. load it through the plugin pipeline (one file may emit `.js` and `.css`)
//! 2. run the transform plugins over every output
//! 3. scan each output for imports and rewrite their specifiers
//!
//! Results are memoized per (file, options) by the [`SingleFlight`] cache, so
//! concurrent requests for the same module share one build.

pub mod cache;
pub mod options;
pub mod pipeline;
pub mod proxy;

pub use cache::{EntryState, SingleFlight};
pub use options::{BuildKey, BuildOptions, Mode, DEFAULT_TARGET};
pub use pipeline::{BuildPipeline, BuildResult, SourceBuild, UrlTarget};
pub use proxy::proxy_module;
