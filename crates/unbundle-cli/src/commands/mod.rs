//! Subcommands.

pub mod build;
pub mod dev;
pub mod resolve;
pub mod scan;
pub mod version;

use miette::{miette, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use unbundle_core::{BuildPipeline, Config, ProjectConfig};
use walkdir::WalkDir;

/// JSON output schema version shared by every `--json` command.
pub use unbundle_core::version::SCHEMA_VERSION;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ErrorJson {
    pub code: String,
    pub message: String,
}

impl ErrorJson {
    pub fn new(code: &str, message: impl ToString) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Error result for JSON output.
#[derive(Serialize)]
struct ErrorResult {
    schema_version: u32,
    ok: bool,
    error: ErrorJson,
}

/// Report a fatal error on stdout (`--json`) or stderr, and exit non-zero.
pub(crate) fn fail(json: bool, error: ErrorJson) -> ! {
    if json {
        let result = ErrorResult {
            schema_version: SCHEMA_VERSION,
            ok: false,
            error,
        };
        println!("{}", serde_json::to_string(&result).unwrap_or_default());
    } else {
        eprintln!("error: {}: {}", error.code, error.message);
    }
    std::process::exit(1);
}

/// Load the project config, reporting the stable error code.
pub(crate) fn load_project(config: &Config) -> Result<ProjectConfig> {
    config
        .load_project()
        .map_err(|e| miette!(code = e.code(), "{e}"))
}

/// Project and pipeline for the one-shot commands; config errors end the process.
pub(crate) fn open_project(config: &Config) -> (ProjectConfig, BuildPipeline) {
    let json = config.json_logs;
    let project = config
        .load_project()
        .unwrap_or_else(|e| fail(json, ErrorJson::new(e.code(), &e)));
    let plugins = project
        .plugins()
        .unwrap_or_else(|e| fail(json, ErrorJson::new(e.code(), &e)));
    let pipeline = project.build_pipeline(plugins);
    (project, pipeline)
}

/// Directories that are never source: build output, package cache, dependencies.
pub(crate) fn is_excluded(project: &ProjectConfig, path: &Path) -> bool {
    path.starts_with(&project.build.out)
        || path.starts_with(&project.cache_dir)
        || path
            .components()
            .any(|c| c.as_os_str() == "node_modules")
}

/// Every file under every mount, deduplicated and sorted.
///
/// Hidden entries, the config file and [`is_excluded`] directories are skipped.
pub(crate) fn mounted_files(project: &ProjectConfig) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();
    for rule in project.mounts.rules() {
        let walker = WalkDir::new(&rule.source_dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_name().to_string_lossy().starts_with('.')
                        || is_excluded(project, e.path()))
            });
        for entry in walker.filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = dunce::simplified(entry.path()).to_path_buf();
            if project.file.as_deref() == Some(path.as_path()) {
                continue;
            }
            files.insert(path);
        }
    }
    files.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use unbundle_core::config::RawConfig;

    #[test]
    fn test_mounted_files_skips_output_cache_and_hidden() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for file in [
            "src/index.js",
            "src/nested/util.ts",
            "build/_dist_/index.js",
            ".unbundle/pkg/preact.js",
            "node_modules/preact/index.js",
            ".env",
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let project = ProjectConfig::from_raw(root, None, RawConfig::default()).unwrap();
        let files: Vec<String> = mounted_files(&project)
            .iter()
            .map(|p| unbundle_util::fs::slash_path(p.strip_prefix(&project.root).unwrap()))
            .collect();
        assert_eq!(files, vec!["src/index.js", "src/nested/util.ts"]);
    }
}
