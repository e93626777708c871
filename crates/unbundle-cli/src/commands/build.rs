//! `unbundle build` command implementation.
//!
//! Writes a static, unbundled copy of the project: every source file is
//! built in production mode and written at its public URL, so the output
//! directory can be served by any static file server.

use super::{fail, mounted_files, open_project, ErrorJson, SCHEMA_VERSION};
use miette::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use unbundle_core::build::proxy_module;
use unbundle_core::extensions::{is_js_output, path_extension, replace_extension};
use unbundle_core::rewrite::PROXY_SUFFIX;
use unbundle_core::{BuildError, BuildOptions, BuildPipeline, Config, Mode};
use unbundle_util::fs::{list_files, normalize_path, slash_path};

const BUILD_IO: &str = unbundle_core::error::codes::BUILD_IO_ERROR;

/// Build action.
#[derive(Debug, Clone, Default)]
pub struct BuildAction {
    /// Output directory; falls back to `build.out`.
    pub out: Option<PathBuf>,
    /// Remove the output directory first.
    pub clean: bool,
}

/// Build result for JSON output.
#[derive(Serialize)]
struct BuildJson {
    schema_version: u32,
    ok: bool,
    out_dir: String,
    counts: BuildCountsJson,
    /// Written files, relative to `out_dir`, sorted.
    files: Vec<String>,
    warnings: Vec<BuildWarningJson>,
    errors: Vec<BuildFileErrorJson>,
    notes: Vec<String>,
}

#[derive(Serialize, Default)]
struct BuildCountsJson {
    built: u32,
    copied: u32,
    proxies: u32,
    packages: u32,
    failed: u32,
}

#[derive(Serialize)]
struct BuildWarningJson {
    code: String,
    file: String,
    message: String,
}

#[derive(Serialize)]
struct BuildFileErrorJson {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    message: String,
}

/// What one file contributed to the output.
#[derive(Default)]
struct FileReport {
    built: bool,
    written: Vec<PathBuf>,
    proxies: u32,
    warnings: Vec<BuildWarningJson>,
}

/// Run the build command.
pub async fn run(config: &Config, action: BuildAction) -> Result<()> {
    let json = config.json_logs;
    let (project, pipeline) = open_project(config);

    let out = action.out.map_or_else(
        || project.build.out.clone(),
        |dir| normalize_path(&config.cwd.join(dir)),
    );
    if action.clean && out.exists() {
        tokio::fs::remove_dir_all(&out)
            .await
            .unwrap_or_else(|e| {
                fail(json, ErrorJson::new(BUILD_IO, format!("{}: {e}", out.display())));
            });
    }

    if let Err(e) = pipeline.start().await {
        fail(json, ErrorJson::new(e.code().unwrap_or(BUILD_IO), &e));
    }

    let options = project.build_options(Mode::Production);
    let files: Vec<PathBuf> = mounted_files(&project)
        .into_iter()
        .filter(|f| !f.starts_with(&out))
        .collect();
    tracing::debug!(files = files.len(), out = %out.display(), "building");

    let mut tasks = JoinSet::new();
    for file in files {
        let pipeline = pipeline.clone();
        let options = options.clone();
        let out = out.clone();
        tasks.spawn(async move {
            let result = emit_file(&pipeline, &file, &options, &out).await;
            (file, result)
        });
    }

    let mut counts = BuildCountsJson::default();
    let mut written = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (file, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                counts.failed += 1;
                errors.push(BuildFileErrorJson {
                    code: unbundle_core::error::codes::BUILD_TASK_FAILED.to_string(),
                    file: None,
                    message: e.to_string(),
                });
                continue;
            }
        };
        match result {
            Ok(report) => {
                if report.built {
                    counts.built += 1;
                } else {
                    counts.copied += 1;
                }
                counts.proxies += report.proxies;
                written.extend(report.written);
                warnings.extend(report.warnings);
            }
            Err(e) => {
                counts.failed += 1;
                errors.push(BuildFileErrorJson {
                    code: e.code().to_string(),
                    file: Some(display_path(&project.root, &file)),
                    message: e.to_string(),
                });
            }
        }
    }

    // Package cache files, each at the URL rewritten imports point to
    if errors.is_empty() && project.cache_dir.is_dir() {
        for file in list_files(&project.cache_dir) {
            match emit_package_file(&pipeline, &file, &options, &out).await {
                Ok(Some(report)) => {
                    counts.packages += 1;
                    counts.proxies += report.proxies;
                    written.extend(report.written);
                }
                Ok(None) => {}
                Err(e) => errors.push(BuildFileErrorJson {
                    code: e.code().to_string(),
                    file: Some(display_path(&project.root, &file)),
                    message: e.to_string(),
                }),
            }
        }
    }

    let mut notes = Vec::new();
    if errors.is_empty() {
        if let Err(e) = pipeline.plugins().optimize(&out).await {
            errors.push(BuildFileErrorJson {
                code: e.code().unwrap_or(BUILD_IO).to_string(),
                file: None,
                message: e.to_string(),
            });
        }
    } else {
        notes.push("optimize plugins skipped: the build has errors".to_string());
    }
    if let Err(e) = pipeline.stop().await {
        tracing::warn!(error = %e, "plugin shutdown failed");
    }

    let ok = errors.is_empty();
    let mut files: Vec<String> = written
        .iter()
        .map(|p| slash_path(p.strip_prefix(&out).unwrap_or(p)))
        .collect();
    files.sort();
    files.dedup();
    errors.sort_by(|a, b| a.file.cmp(&b.file));
    warnings.sort_by(|a, b| (&a.file, &a.code).cmp(&(&b.file, &b.code)));

    let result = BuildJson {
        schema_version: SCHEMA_VERSION,
        ok,
        out_dir: out.display().to_string(),
        counts,
        files,
        warnings,
        errors,
        notes,
    };

    if json {
        println!("{}", serde_json::to_string(&result).unwrap_or_default());
    } else {
        print_human_output(&result);
    }

    if ok {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// Build or copy one file into `out`.
async fn emit_file(
    pipeline: &BuildPipeline,
    file: &Path,
    options: &BuildOptions,
    out: &Path,
) -> Result<FileReport, BuildError> {
    let mut report = FileReport::default();
    let Some(url) = pipeline.mounts().url_for_path(file) else {
        return Ok(report);
    };
    let is_static = pipeline
        .mounts()
        .resolve_mount(file)
        .is_some_and(|m| m.rule.is_static);

    if !pipeline.is_buildable(file) {
        let dest = out_path(out, &url);
        copy_file(file, &dest)
            .await
            .map_err(|e| BuildError::io(file, &e))?;
        report.written.push(dest);

        // Assets next to sources can be imported from JavaScript
        if !is_static {
            let ext = path_extension(file).unwrap_or_default();
            let proxy = proxy_module(&ext, None, &url);
            let dest = out_path(out, &format!("{url}{PROXY_SUFFIX}"));
            write_file(&dest, proxy.as_bytes(), file).await?;
            report.written.push(dest);
            report.proxies += 1;
        }
        return Ok(report);
    }

    let build = pipeline.build_file(file, options).await?;
    report.built = true;
    for (ext, result) in &build.outputs {
        let output_url = replace_extension(&url, ext);
        let dest = out_path(out, &output_url);
        write_file(&dest, result.contents.as_bytes(), file).await?;
        report.written.push(dest.clone());

        if let Some(map) = &result.source_map {
            let map_dest = out_path(out, &format!("{output_url}.map"));
            write_file(&map_dest, map.as_bytes(), file).await?;
            report.written.push(map_dest);
        }

        if !is_js_output(ext) && ext != ".html" {
            let proxy = proxy_module(ext, Some(&result.contents), &output_url);
            let proxy_dest = out_path(out, &format!("{output_url}{PROXY_SUFFIX}"));
            write_file(&proxy_dest, proxy.as_bytes(), file).await?;
            report.written.push(proxy_dest);
            report.proxies += 1;
        }

        for warning in &result.warnings {
            report.warnings.push(BuildWarningJson {
                code: warning.code().to_string(),
                file: output_url.clone(),
                message: warning.to_string(),
            });
        }
    }
    Ok(report)
}

/// Copy one package cache file to its URL, plus a proxy when JavaScript imports it.
///
/// `None` for files no package URL serves (shadowed versions, the import map).
async fn emit_package_file(
    pipeline: &BuildPipeline,
    file: &Path,
    options: &BuildOptions,
    out: &Path,
) -> Result<Option<FileReport>, BuildError> {
    let Some(url) = pipeline.packages().url_for_file(file) else {
        return Ok(None);
    };
    let mut report = FileReport::default();
    let dest = out_path(out, &url);
    copy_file(file, &dest)
        .await
        .map_err(|e| BuildError::io(file, &e))?;
    report.written.push(dest);

    let ext = path_extension(file).unwrap_or_default();
    if !ext.is_empty() && !is_js_output(&ext) && ext != ".map" {
        let proxy = pipeline.build_proxy(file, &ext, options).await?;
        let proxy_dest = out_path(out, &format!("{url}{PROXY_SUFFIX}"));
        write_file(&proxy_dest, proxy.as_bytes(), file).await?;
        report.written.push(proxy_dest);
        report.proxies += 1;
    }
    Ok(Some(report))
}

fn out_path(out: &Path, url: &str) -> PathBuf {
    out.join(url.trim_start_matches('/'))
}

async fn write_file(dest: &Path, contents: &[u8], source: &Path) -> Result<(), BuildError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BuildError::io(source, &e))?;
    }
    tokio::fs::write(dest, contents)
        .await
        .map_err(|e| BuildError::io(source, &e))
}

async fn copy_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await.map(|_| ())
}

fn display_path(root: &Path, path: &Path) -> String {
    slash_path(path.strip_prefix(root).unwrap_or(path))
}

fn print_human_output(result: &BuildJson) {
    for warning in &result.warnings {
        eprintln!("warning: {}: {}: {}", warning.file, warning.code, warning.message);
    }
    for error in &result.errors {
        match &error.file {
            Some(file) => eprintln!("error: {file}: {}: {}", error.code, error.message),
            None => eprintln!("error: {}: {}", error.code, error.message),
        }
    }
    for note in &result.notes {
        eprintln!("note: {note}");
    }

    let c = &result.counts;
    if result.ok {
        println!(
            "Built {} file(s), copied {} file(s) and {} package file(s) into {}",
            c.built, c.copied, c.packages, result.out_dir
        );
    } else {
        println!("Build failed: {} file(s) with errors", result.errors.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use unbundle_core::config::RawConfig;
    use unbundle_core::ProjectConfig;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn pipeline(root: &Path) -> BuildPipeline {
        let raw: RawConfig = serde_json::from_value(serde_json::json!({
            "mount": {
                "src": "/_dist_",
                "public": { "url": "/", "static": true, "resolve": false }
            }
        }))
        .unwrap();
        let project = ProjectConfig::from_raw(root, None, raw).unwrap();
        project.build_pipeline(project.plugins().unwrap())
    }

    #[tokio::test]
    async fn test_emit_built_file_with_proxy() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/style.css", "h1 { color: red; }");
        let out = root.join("build");

        let report = emit_file(
            &pipeline(root),
            &root.join("src/style.css"),
            &BuildOptions::production(),
            &out,
        )
        .await
        .unwrap();

        assert!(report.built);
        assert_eq!(report.proxies, 1);
        assert_eq!(
            fs::read_to_string(out.join("_dist_/style.css")).unwrap(),
            "h1 { color: red; }"
        );
        let proxy = fs::read_to_string(out.join("_dist_/style.css.proxy.js")).unwrap();
        assert!(proxy.contains("h1 { color: red; }"));
    }

    #[tokio::test]
    async fn test_emit_ts_as_js() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/index.ts", "import sort from './sort';\n");
        write(root, "src/sort.ts", "export default 1;\n");
        let out = root.join("build");

        emit_file(
            &pipeline(root),
            &root.join("src/index.ts"),
            &BuildOptions::production(),
            &out,
        )
        .await
        .unwrap();

        assert_eq!(
            fs::read_to_string(out.join("_dist_/index.js")).unwrap(),
            "import sort from './sort.js';\n"
        );
        assert!(!out.join("_dist_/index.ts").exists());
    }

    #[tokio::test]
    async fn test_emit_static_and_asset() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "public/robots.txt", "User-agent: *");
        write(root, "src/logo.png", "png");
        let out = root.join("build");
        let pipeline = pipeline(root);

        let report = emit_file(
            &pipeline,
            &root.join("public/robots.txt"),
            &BuildOptions::production(),
            &out,
        )
        .await
        .unwrap();
        assert!(!report.built);
        assert_eq!(report.proxies, 0);
        assert!(out.join("robots.txt").is_file());

        let report = emit_file(
            &pipeline,
            &root.join("src/logo.png"),
            &BuildOptions::production(),
            &out,
        )
        .await
        .unwrap();
        assert_eq!(report.proxies, 1);
        assert_eq!(
            fs::read_to_string(out.join("_dist_/logo.png.proxy.js")).unwrap(),
            "export default \"/_dist_/logo.png\";\n"
        );
    }

    #[tokio::test]
    async fn test_emit_package_css_with_proxy() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, ".unbundle/pkg/bootstrap/dist/b.css", ".btn { color: blue; }");
        write(root, ".unbundle/pkg/preact.v10.5.0.js", "export default 1;");
        let out = root.join("build");
        let pipeline = pipeline(root);
        let cache = root.join(".unbundle/pkg");

        let report = emit_package_file(
            &pipeline,
            &cache.join("bootstrap/dist/b.css"),
            &BuildOptions::production(),
            &out,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(report.proxies, 1);
        assert!(out.join("_unbundle/pkg/bootstrap/dist/b.css").is_file());
        let proxy =
            fs::read_to_string(out.join("_unbundle/pkg/bootstrap/dist/b.css.proxy.js")).unwrap();
        assert!(proxy.contains(".btn { color: blue; }"));
        assert!(proxy.contains("document.head.appendChild(style)"));

        let report = emit_package_file(
            &pipeline,
            &cache.join("preact.v10.5.0.js"),
            &BuildOptions::production(),
            &out,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(report.proxies, 0);
        assert!(out.join("_unbundle/pkg/preact.js").is_file());
    }

    #[tokio::test]
    async fn test_emit_parse_failure() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/broken.js", "import a from './a.js;\n");

        let err = emit_file(
            &pipeline(root),
            &root.join("src/broken.js"),
            &BuildOptions::production(),
            &root.join("build"),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.code(), "BUILD_PARSE_FAILURE");
    }
}
