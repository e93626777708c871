//! Plugin pipeline.
//!
//! A plugin advertises what it can do through [`Capabilities`]. The pipeline
//! reads them once at [`PluginPipeline::register`] and files each plugin into
//! the per-hook lists it asked for; dispatch walks those lists and never asks
//! a plugin whether it supports a hook.
//!
//! ## Example
//!
//! ```ignore
//! use unbundle_core::plugin::{Capabilities, HookResult, Plugin, TransformArgs};
//!
//! struct Uppercase;
//!
//! #[async_trait::async_trait]
//! impl Plugin for Uppercase {
//!     fn name(&self) -> &str { "uppercase" }
//!
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities { transform: true, ..Capabilities::default() }
//!     }
//!
//!     async fn transform(&self, args: &TransformArgs) -> HookResult<Option<String>> {
//!         Ok(Some(args.contents.to_uppercase()))
//!     }
//! }
//! ```

mod builtin;

pub use builtin::{BannerPlugin, JsonPlugin, ReplacePlugin};

use crate::build::Mode;
use crate::error::{BuildError, ConfigError, Error};
use crate::extensions::{path_extension, ExtensionMap};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, PluginError>;

/// Failure reported by a plugin hook. The pipeline attaches plugin name, hook and file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PluginError {
    pub message: String,
}

impl PluginError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PluginError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Source extensions a loader claims and the outputs it produces.
///
/// `output[0]` is the primary output: the one a `.svelte` import is rewritten to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCapability {
    pub input: Vec<String>,
    pub output: Vec<String>,
}

impl LoadCapability {
    #[must_use]
    pub fn new<I, O>(input: I, output: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            input: input.into_iter().map(Into::into).collect(),
            output: output.into_iter().map(Into::into).collect(),
        }
    }
}

/// Hooks a plugin implements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub load: Option<LoadCapability>,
    pub transform: bool,
    pub optimize: bool,
}

/// One emitted output of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedOutput {
    pub code: String,
    pub map: Option<String>,
}

impl LoadedOutput {
    #[must_use]
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }
}

/// Outputs of one source file keyed by output extension (`.js`, `.css`).
pub type LoadResult = BTreeMap<String, LoadedOutput>;

/// Arguments of the `load` hook.
#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub path: PathBuf,
    /// Source extension, including the dot.
    pub ext: String,
    pub mode: Mode,
}

/// Arguments of the `transform` hook.
#[derive(Debug, Clone)]
pub struct TransformArgs {
    pub path: PathBuf,
    /// Output extension being transformed.
    pub ext: String,
    pub contents: String,
    pub mode: Mode,
}

/// Arguments of the `optimize` hook.
#[derive(Debug, Clone)]
pub struct OptimizeArgs {
    pub build_dir: PathBuf,
}

/// A build plugin.
///
/// Every hook has a default that does nothing. Only hooks named by
/// [`Plugin::capabilities`] are ever called.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name for logs and error messages.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Called once before the first build.
    async fn start(&self) -> HookResult<()> {
        Ok(())
    }

    /// Called once on shutdown.
    async fn stop(&self) -> HookResult<()> {
        Ok(())
    }

    /// Produce the outputs of a source file. `None` passes to the next loader.
    async fn load(&self, _args: &LoadArgs) -> HookResult<Option<LoadResult>> {
        Ok(None)
    }

    /// Rewrite one output. `None` leaves it unchanged.
    async fn transform(&self, _args: &TransformArgs) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Post-process a finished production build in place.
    async fn optimize(&self, _args: &OptimizeArgs) -> HookResult<()> {
        Ok(())
    }
}

/// Registered plugins, grouped by hook.
#[derive(Clone, Default)]
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn Plugin>>,
    loaders: Vec<(Arc<dyn Plugin>, LoadCapability)>,
    transformers: Vec<Arc<dyn Plugin>>,
    optimizers: Vec<Arc<dyn Plugin>>,
    extensions: ExtensionMap,
}

impl std::fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginPipeline")
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl PluginPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Its load inputs are mapped to its primary output extension.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), ConfigError> {
        let caps = plugin.capabilities();
        if let Some(load) = caps.load {
            let Some(primary) = load.output.first() else {
                return Err(ConfigError::Invalid(format!(
                    "plugin `{}` declares a loader without outputs",
                    plugin.name()
                )));
            };
            if load.input.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "plugin `{}` declares a loader without inputs",
                    plugin.name()
                )));
            }
            for input in &load.input {
                self.extensions.insert(input.clone(), primary.clone());
            }
            self.loaders.push((Arc::clone(&plugin), load));
        }
        if caps.transform {
            self.transformers.push(Arc::clone(&plugin));
        }
        if caps.optimize {
            self.optimizers.push(Arc::clone(&plugin));
        }
        tracing::debug!(plugin = plugin.name(), "registered plugin");
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder form of [`PluginPipeline::register`].
    pub fn with(mut self, plugin: impl Plugin + 'static) -> Result<Self, ConfigError> {
        self.register(Arc::new(plugin))?;
        Ok(self)
    }

    #[must_use]
    pub fn extensions(&self) -> &ExtensionMap {
        &self.extensions
    }

    #[must_use]
    pub fn has_plugins(&self) -> bool {
        !self.plugins.is_empty()
    }

    pub async fn start(&self) -> Result<(), Error> {
        for plugin in &self.plugins {
            plugin
                .start()
                .await
                .map_err(|e| lifecycle_error(plugin.as_ref(), "start", e))?;
        }
        Ok(())
    }

    /// Stop every plugin, even after a failure. The first failure is returned.
    pub async fn stop(&self) -> Result<(), Error> {
        let mut first = None;
        for plugin in &self.plugins {
            if let Err(e) = plugin.stop().await {
                tracing::warn!(plugin = plugin.name(), error = %e, "plugin failed to stop");
                first.get_or_insert_with(|| lifecycle_error(plugin.as_ref(), "stop", e));
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Load a source file: the first claiming loader that answers wins,
    /// otherwise the file is read as text under its mapped output extension.
    pub async fn load(&self, path: &Path, mode: Mode) -> Result<LoadResult, BuildError> {
        let ext = path_extension(path).unwrap_or_default();
        let args = LoadArgs {
            path: path.to_path_buf(),
            ext: ext.clone(),
            mode,
        };

        for (plugin, cap) in &self.loaders {
            if !cap.input.iter().any(|i| *i == ext) {
                continue;
            }
            let loaded = plugin
                .load(&args)
                .await
                .map_err(|e| hook_error(plugin.as_ref(), "load", path, e))?;
            if let Some(outputs) = loaded {
                tracing::trace!(plugin = plugin.name(), file = %path.display(), "loaded");
                return Ok(outputs);
            }
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BuildError::io(path, &e))?;
        let code = String::from_utf8_lossy(&bytes).into_owned();
        let output = self.extensions.output_ext(&ext).to_string();
        Ok(BTreeMap::from([(output, LoadedOutput::code(code))]))
    }

    /// Run every transformer over one output in registration order.
    pub async fn transform(
        &self,
        path: &Path,
        ext: &str,
        contents: String,
        mode: Mode,
    ) -> Result<String, BuildError> {
        let mut args = TransformArgs {
            path: path.to_path_buf(),
            ext: ext.to_string(),
            contents,
            mode,
        };
        for plugin in &self.transformers {
            let transformed = plugin
                .transform(&args)
                .await
                .map_err(|e| hook_error(plugin.as_ref(), "transform", path, e))?;
            if let Some(code) = transformed {
                args.contents = code;
            }
        }
        Ok(args.contents)
    }

    pub async fn optimize(&self, build_dir: &Path) -> Result<(), Error> {
        let args = OptimizeArgs {
            build_dir: build_dir.to_path_buf(),
        };
        for plugin in &self.optimizers {
            tracing::debug!(plugin = plugin.name(), "optimizing");
            plugin
                .optimize(&args)
                .await
                .map_err(|e| lifecycle_error(plugin.as_ref(), "optimize", e))?;
        }
        Ok(())
    }
}

fn hook_error(plugin: &dyn Plugin, hook: &'static str, file: &Path, err: PluginError) -> BuildError {
    BuildError::PluginLoad {
        plugin: plugin.name().to_string(),
        hook,
        file: file.to_path_buf(),
        message: err.message,
    }
}

fn lifecycle_error(plugin: &dyn Plugin, hook: &'static str, err: PluginError) -> Error {
    Error::Plugin {
        plugin: plugin.name().to_string(),
        hook,
        message: err.message,
    }
}
