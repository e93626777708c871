//! `unbundle scan`: which packages the project imports, and how.

use super::{fail, mounted_files, open_project, ErrorJson, SCHEMA_VERSION};
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;
use unbundle_core::imports::scan_install_targets;
use unbundle_core::{Config, InstallTarget};

#[derive(Serialize)]
struct ScanJson {
    schema_version: u32,
    ok: bool,
    files: usize,
    targets: Vec<InstallTarget>,
}

pub fn run(config: &Config) -> Result<()> {
    let (project, pipeline) = open_project(config);

    // Static mounts are copied as-is; their imports are never rewritten.
    let files: Vec<PathBuf> = mounted_files(&project)
        .into_iter()
        .filter(|path| {
            pipeline
                .mounts()
                .resolve_mount(path)
                .is_some_and(|m| !m.rule.is_static && m.rule.resolve)
        })
        .collect();

    let targets = scan_install_targets(&files, &project.alias_table())
        .unwrap_or_else(|e| fail(config.json_logs, ErrorJson::new(e.code(), &e)));
    tracing::debug!(files = files.len(), targets = targets.len(), "scanned");

    if config.json_logs {
        let output = ScanJson {
            schema_version: SCHEMA_VERSION,
            ok: true,
            files: files.len(),
            targets,
        };
        println!("{}", serde_json::to_string(&output).unwrap_or_default());
        return Ok(());
    }

    if targets.is_empty() {
        println!("No package imports found in {} file(s)", files.len());
    }
    for target in &targets {
        let mut usage = Vec::new();
        if target.imports_all {
            usage.push("*".to_string());
        } else {
            if target.imports_default {
                usage.push("default".to_string());
            }
            if target.imports_namespace {
                usage.push("namespace".to_string());
            }
            usage.extend(target.named_imports.iter().cloned());
        }
        println!("{}  {}", target.specifier, usage.join(", "));
    }
    Ok(())
}
