//! Built-in plugins.

use super::{
    Capabilities, HookResult, LoadArgs, LoadCapability, LoadResult, LoadedOutput, OptimizeArgs,
    Plugin, PluginError, TransformArgs,
};
use crate::extensions::is_js_output;
use async_trait::async_trait;
use std::collections::BTreeMap;
use unbundle_util::fs::{atomic_write, list_files};

const NODE_ENV: &str = "process.env.NODE_ENV";

/// Plugin that replaces global identifiers with values in JavaScript outputs.
///
/// Useful for replacing `process.env.NODE_ENV` with `"production"`.
#[derive(Debug, Clone, Default)]
pub struct ReplacePlugin {
    replacements: BTreeMap<String, String>,
    /// Replace `process.env.NODE_ENV` with the build mode.
    node_env: bool,
}

impl ReplacePlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a replacement.
    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replacements.insert(from.into(), to.into());
        self
    }

    /// Replace `process.env.KEY` with the quoted value.
    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        let quoted = serde_json::to_string(&value).unwrap_or_else(|_| format!("\"{value}\""));
        self.replacements.insert(format!("process.env.{key}"), quoted);
        self
    }

    /// Replace `process.env.NODE_ENV` with `"development"` or `"production"` per build.
    pub fn node_env(mut self) -> Self {
        self.node_env = true;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && !self.node_env
    }
}

#[async_trait]
impl Plugin for ReplacePlugin {
    fn name(&self) -> &str {
        "replace"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transform: true,
            ..Capabilities::default()
        }
    }

    async fn transform(&self, args: &TransformArgs) -> HookResult<Option<String>> {
        if self.is_empty() || !is_js_output(&args.ext) {
            return Ok(None);
        }

        let mut result = args.contents.clone();
        let mut changed = false;
        for (from, to) in &self.replacements {
            if result.contains(from.as_str()) {
                result = result.replace(from.as_str(), to);
                changed = true;
            }
        }
        if self.node_env && result.contains(NODE_ENV) {
            result = result.replace(NODE_ENV, &format!("\"{}\"", args.mode.as_str()));
            changed = true;
        }

        Ok(changed.then_some(result))
    }
}

/// Plugin that prepends a banner to every JavaScript file of a production build.
#[derive(Debug, Clone)]
pub struct BannerPlugin {
    banner: String,
}

impl BannerPlugin {
    #[must_use]
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }
}

#[async_trait]
impl Plugin for BannerPlugin {
    fn name(&self) -> &str {
        "banner"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            optimize: true,
            ..Capabilities::default()
        }
    }

    async fn optimize(&self, args: &OptimizeArgs) -> HookResult<()> {
        let banner = format!("{}\n", self.banner);
        let dir = args.build_dir.clone();
        tokio::task::spawn_blocking(move || -> HookResult<()> {
            for file in list_files(&dir) {
                if !file
                    .extension()
                    .is_some_and(|e| e == "js" || e == "mjs")
                {
                    continue;
                }
                let code = std::fs::read_to_string(&file)?;
                if code.starts_with(&banner) {
                    continue;
                }
                atomic_write(&file, format!("{banner}{code}").as_bytes())?;
            }
            Ok(())
        })
        .await
        .map_err(|e| PluginError::new(e.to_string()))?
    }
}

/// Plugin that validates `.json` sources on load and keeps them as data.
///
/// JavaScript importers reach the data through its proxy module.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPlugin;

#[async_trait]
impl Plugin for JsonPlugin {
    fn name(&self) -> &str {
        "json"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            load: Some(LoadCapability::new([".json"], [".json"])),
            ..Capabilities::default()
        }
    }

    async fn load(&self, args: &LoadArgs) -> HookResult<Option<LoadResult>> {
        let text = tokio::fs::read_to_string(&args.path).await?;
        serde_json::from_str::<serde_json::Value>(&text)?;
        Ok(Some(BTreeMap::from([(
            ".json".to_string(),
            LoadedOutput::code(text),
        )])))
    }
}
