//! Specifier rewriting.
//!
//! Turns every import record of a module into a URL the browser can load and
//! splices the results into the source in one right-to-left pass. Rewriting
//! its own output is a no-op: every rewritten specifier resolves to itself.

mod glob;

use crate::alias::{AliasTable, Substitution};
use crate::error::{BuildWarning, ResolutionError};
use crate::extensions::{extension_of, is_js_output, path_extension, replace_extension, ExtensionMap};
use crate::imports::{ImportKind, ImportRecord, SourceKind};
use crate::mount::MountTable;
use crate::packages::PackageResolver;
use crate::specifier::{classify, Classification};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use unbundle_util::fs::normalize_path;

/// Suffix of the JS wrapper served for non-JS imports (`style.css.proxy.js`).
pub const PROXY_SUFFIX: &str = ".proxy.js";

/// How a specifier was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    Relative,
    MountedAbsolute,
    PackageUrl,
    RemoteUrl,
    Unresolved,
}

/// One specifier before and after rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSpecifier {
    pub original: String,
    pub rewritten: String,
    pub kind: ResolutionKind,
}

/// A replaced span, in original and generated byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceEdit {
    pub original_start: usize,
    pub original_end: usize,
    pub generated_start: usize,
    pub generated_end: usize,
}

/// Result of rewriting one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutput {
    pub code: String,
    /// One entry per input record, in input order.
    pub resolutions: Vec<ResolvedSpecifier>,
    /// Applied replacements in ascending order.
    pub edits: Vec<SourceEdit>,
    pub warnings: Vec<BuildWarning>,
}

/// Everything needed to resolve the imports of one module.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Absolute path of the importing file.
    pub importer: &'a Path,
    /// Format of the code being rewritten. Only JavaScript importers get proxy imports.
    pub kind: SourceKind,
    pub mounts: &'a MountTable,
    pub packages: &'a PackageResolver,
    pub aliases: &'a AliasTable,
    pub extensions: &'a ExtensionMap,
}

struct Resolution {
    rewritten: String,
    kind: ResolutionKind,
    warning: Option<BuildWarning>,
}

impl Resolution {
    fn done(rewritten: impl Into<String>, kind: ResolutionKind) -> Self {
        Self {
            rewritten: rewritten.into(),
            kind,
            warning: None,
        }
    }

    fn unresolved(original: &str, warning: BuildWarning) -> Self {
        Self {
            rewritten: original.to_string(),
            kind: ResolutionKind::Unresolved,
            warning: Some(warning),
        }
    }
}

/// Rewrite every record's specifier in `source`.
#[must_use]
pub fn rewrite(source: &str, records: &[ImportRecord], ctx: &RewriteContext<'_>) -> RewriteOutput {
    let mut resolutions = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();
    let mut replacements: Vec<(usize, usize, String)> = Vec::new();
    let mut hoisted = String::new();
    let mut glob_count = 0;

    for record in records {
        let resolution = if record.computed {
            Resolution::unresolved(
                &record.raw_specifier,
                BuildWarning::UnresolvedDynamicSpecifier {
                    expression: record.raw_specifier.clone(),
                    line: record.line,
                },
            )
        } else if let ImportKind::Glob { eager } = record.kind {
            glob_count += 1;
            ctx.expand_glob(record, eager, glob_count - 1, &mut hoisted)
        } else {
            ctx.resolve(&record.raw_specifier)
        };

        let unchanged = match record.kind {
            ImportKind::Glob { .. } => resolution.kind == ResolutionKind::Unresolved,
            _ => resolution.rewritten == record.raw_specifier,
        };
        if !unchanged {
            replacements.push((record.start, record.end, resolution.rewritten.clone()));
        }
        if let Some(warning) = resolution.warning {
            tracing::warn!(importer = %ctx.importer.display(), "{warning}");
            warnings.push(warning);
        }
        resolutions.push(ResolvedSpecifier {
            original: record.raw_specifier.clone(),
            rewritten: resolution.rewritten,
            kind: resolution.kind,
        });
    }

    if !hoisted.is_empty() {
        replacements.push((0, 0, hoisted));
    }
    let (code, edits) = apply_replacements(source, replacements);

    RewriteOutput {
        code,
        resolutions,
        edits,
        warnings,
    }
}

impl RewriteContext<'_> {
    fn resolve(&self, spec: &str) -> Resolution {
        let substituted;
        let target = match self.aliases.substitute(spec) {
            Some(Substitution::Path(path)) => return self.resolve_file(spec, &path),
            Some(Substitution::Specifier(s)) => {
                substituted = s;
                substituted.as_str()
            }
            None => spec,
        };

        match classify(target) {
            Classification::RemoteUrl => Resolution::done(target, ResolutionKind::RemoteUrl),
            Classification::Glob => Resolution::unresolved(
                spec,
                BuildWarning::UnsupportedGlob {
                    specifier: spec.to_string(),
                },
            ),
            Classification::Relative => self.resolve_relative(spec, target),
            Classification::Absolute => self.resolve_absolute(spec, target),
            Classification::BarePackage { name, subpath }
            | Classification::ScopedPackage { name, subpath } => {
                self.resolve_package(spec, &name, &subpath)
            }
        }
    }

    fn resolve_relative(&self, original: &str, spec: &str) -> Resolution {
        if spec.is_empty() {
            return unresolved_import(original, &ResolutionError::EmptySpecifier.to_string());
        }
        let (path_part, suffix) = split_suffix(spec);
        let dir = self.importer.parent().unwrap_or(Path::new("/"));
        let target = normalize_path(&dir.join(path_part));
        match self.locate(&target, path_part) {
            Some(found) => Resolution::done(format!("{found}{suffix}"), ResolutionKind::Relative),
            None => unresolved_import(original, &format!("no file at {}", target.display())),
        }
    }

    fn resolve_absolute(&self, original: &str, spec: &str) -> Resolution {
        let (path_part, suffix) = split_suffix(spec);
        if self.packages.is_package_url(path_part) {
            return Resolution::done(spec, ResolutionKind::PackageUrl);
        }
        if let Some(found) = self
            .mounts
            .resolve_mount_by_url(path_part)
            .and_then(|m| self.locate(&m.path()?, path_part))
        {
            return Resolution::done(format!("{found}{suffix}"), ResolutionKind::MountedAbsolute);
        }
        // A filesystem path written out in full
        match self.url_for_file(&normalize_path(Path::new(path_part))) {
            Some(url) => Resolution::done(format!("{url}{suffix}"), ResolutionKind::MountedAbsolute),
            None => unresolved_import(original, "not served by any mount"),
        }
    }

    fn resolve_file(&self, original: &str, path: &Path) -> Resolution {
        match self.url_for_file(&normalize_path(path)) {
            Some(url) => Resolution::done(url, ResolutionKind::MountedAbsolute),
            None => unresolved_import(
                original,
                &format!("alias target {} is not served by any mount", path.display()),
            ),
        }
    }

    fn resolve_package(&self, original: &str, name: &str, subpath: &str) -> Resolution {
        match self.packages.resolve_package(name, subpath) {
            Ok(entry) if entry.is_remote() => {
                Resolution::done(entry.public_url, ResolutionKind::RemoteUrl)
            }
            Ok(entry) => Resolution::done(self.with_proxy(entry.public_url), ResolutionKind::PackageUrl),
            Err(ResolutionError::PackageNotInstalled { specifier }) => {
                Resolution::unresolved(original, BuildWarning::PackageNotInstalled { specifier })
            }
            Err(e) => unresolved_import(original, &e.to_string()),
        }
    }

    /// Mounted URL of a file, probing extensions and index files like a relative import.
    fn url_for_file(&self, target: &Path) -> Option<String> {
        let url = self.mounts.url_for_path(target)?;
        self.locate(target, &url)
    }

    /// Find the file `spec` names and return `spec` in its output form.
    ///
    /// `target` is where `spec` points on disk. Order: an existing proxy, the
    /// exact file, a source that produces the named output, an extensionless
    /// name plus each source extension, then a directory index.
    fn locate(&self, target: &Path, spec: &str) -> Option<String> {
        if spec.ends_with(PROXY_SUFFIX) {
            let inner = strip_os_suffix(target, PROXY_SUFFIX)?;
            return inner.is_file().then(|| spec.to_string());
        }

        if target.is_file() {
            let rewritten = match path_extension(target) {
                Some(ext) => {
                    let output = self.extensions.output_ext(&ext);
                    if output == ext {
                        spec.to_string()
                    } else {
                        replace_extension(spec, output)
                    }
                }
                None => spec.to_string(),
            };
            return Some(self.with_proxy(rewritten));
        }

        if let Some(ext) = extension_of(spec) {
            let produced = self
                .extensions
                .sources_for_output(ext)
                .into_iter()
                .skip(1)
                .any(|source| target.with_extension(&source[1..]).is_file());
            if produced {
                return Some(self.with_proxy(spec.to_string()));
            }
        }

        let names_directory = spec.ends_with('/')
            || spec.ends_with("/.")
            || spec.ends_with("/..")
            || matches!(spec, "." | "..");
        if !names_directory {
            for source in self.extensions.source_exts() {
                if append_os_suffix(target, source).is_file() {
                    let output = self.extensions.output_ext(source);
                    return Some(self.with_proxy(format!("{spec}{output}")));
                }
            }
        }

        if target.is_dir() {
            let base = spec.trim_end_matches('/');
            for source in self.extensions.source_exts() {
                if target.join(format!("index{source}")).is_file() {
                    let output = self.extensions.output_ext(source);
                    return Some(self.with_proxy(format!("{base}/index{output}")));
                }
            }
        }

        None
    }

    /// Append the proxy suffix when a JS module imports a non-JS output.
    fn with_proxy(&self, spec: String) -> String {
        let needs_proxy = self.kind == SourceKind::JavaScript
            && !spec.ends_with(PROXY_SUFFIX)
            && extension_of(&spec).is_some_and(|ext| !is_js_output(ext));
        if needs_proxy {
            format!("{spec}{PROXY_SUFFIX}")
        } else {
            spec
        }
    }

    fn expand_glob(
        &self,
        record: &ImportRecord,
        eager: bool,
        index: usize,
        hoisted: &mut String,
    ) -> Resolution {
        let pattern = record.raw_specifier.as_str();
        if !(pattern.starts_with("./") || pattern.starts_with("../")) {
            return Resolution::unresolved(
                pattern,
                BuildWarning::UnsupportedGlob {
                    specifier: pattern.to_string(),
                },
            );
        }

        let matches = match glob::glob_matches(self.importer, pattern) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!(pattern, error = %e, "invalid glob pattern");
                return Resolution::unresolved(
                    pattern,
                    BuildWarning::UnsupportedGlob {
                        specifier: pattern.to_string(),
                    },
                );
            }
        };

        let entries: Vec<(String, String)> = matches
            .into_iter()
            .map(|m| {
                let spec = self.locate(&m.path, &m.key).unwrap_or_else(|| m.key.clone());
                (m.key, spec)
            })
            .collect();

        let object = if eager {
            let (imports, object) = glob::eager_object(index, &entries);
            hoisted.push_str(&imports);
            object
        } else {
            glob::lazy_object(&entries)
        };
        Resolution::done(object, ResolutionKind::Relative)
    }
}

fn unresolved_import(original: &str, reason: &str) -> Resolution {
    Resolution::unresolved(
        original,
        BuildWarning::UnresolvedImport {
            specifier: original.to_string(),
            reason: reason.to_string(),
        },
    )
}

/// Split `./a.js?raw#x` into `("./a.js", "?raw#x")`.
fn split_suffix(spec: &str) -> (&str, &str) {
    match spec.find(['?', '#']) {
        Some(i) => spec.split_at(i),
        None => (spec, ""),
    }
}

fn append_os_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn strip_os_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let s = path.to_str()?;
    s.strip_suffix(suffix).map(PathBuf::from)
}

/// Apply non-overlapping replacements right to left.
fn apply_replacements(
    source: &str,
    mut replacements: Vec<(usize, usize, String)>,
) -> (String, Vec<SourceEdit>) {
    replacements.sort_by_key(|(start, end, _)| (*start, *end));
    let mut kept: Vec<(usize, usize, String)> = Vec::with_capacity(replacements.len());
    for replacement in replacements {
        if kept.last().map_or(true, |(_, end, _)| replacement.0 >= *end) {
            kept.push(replacement);
        }
    }

    let mut code = source.to_string();
    for (start, end, text) in kept.iter().rev() {
        code.replace_range(*start..*end, text);
    }

    let mut added = 0;
    let mut removed = 0;
    let edits = kept
        .iter()
        .map(|(start, end, text)| {
            let generated_start = start + added - removed;
            added += text.len();
            removed += end - start;
            SourceEdit {
                original_start: *start,
                original_end: *end,
                generated_start,
                generated_end: generated_start + text.len(),
            }
        })
        .collect();
    (code, edits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::scan;
    use crate::mount::MountRule;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        mounts: MountTable,
        packages: PackageResolver,
        aliases: AliasTable,
        extensions: ExtensionMap,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            for (rel, contents) in [
                ("src/index.js", ""),
                ("src/sort.ts", "export default (a) => a;"),
                ("src/style.css", "body {}"),
                ("src/data.json", "{}"),
                ("src/components/index.jsx", ""),
                ("src/pages/a.js", ""),
                ("src/pages/b.js", ""),
                ("src/app/util.ts", ""),
                ("public/logo.png", ""),
                (".unbundle/pkg/array-flatten.v3.0.0.js", ""),
            ] {
                let path = root.join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, contents).unwrap();
            }

            let mounts = MountTable::new(vec![
                MountRule::new(root.join("src"), "/_dist_"),
                MountRule::new(root.join("public"), "/").with_static(true),
            ])
            .unwrap();
            let packages = PackageResolver::new(root.join(".unbundle/pkg"), "/_web/pkg");
            let aliases = AliasTable::new(
                root,
                [("@app", "./src/app"), ("react", "preact/compat")],
            );
            Self {
                mounts,
                packages,
                aliases,
                extensions: ExtensionMap::default(),
                dir,
            }
        }

        fn importer(&self) -> PathBuf {
            self.dir.path().join("src").join("index.js")
        }

        fn run_as(&self, source: &str, kind: SourceKind) -> RewriteOutput {
            let importer = self.importer();
            let ctx = RewriteContext {
                importer: &importer,
                kind,
                mounts: &self.mounts,
                packages: &self.packages,
                aliases: &self.aliases,
                extensions: &self.extensions,
            };
            let records = scan(source, kind).unwrap();
            rewrite(source, &records, &ctx)
        }

        fn run(&self, source: &str) -> RewriteOutput {
            self.run_as(source, SourceKind::JavaScript)
        }
    }

    #[test]
    fn test_package_specifier_becomes_package_url() {
        let out = Fixture::new().run("import {flatten} from 'array-flatten';");
        assert_eq!(out.code, "import {flatten} from '/_web/pkg/array-flatten.js';");
        assert_eq!(out.resolutions[0].kind, ResolutionKind::PackageUrl);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_extensionless_relative_maps_source_extension() {
        let out = Fixture::new().run("import sort from './sort';");
        assert_eq!(out.code, "import sort from './sort.js';");
        assert_eq!(out.resolutions[0].kind, ResolutionKind::Relative);
    }

    #[test]
    fn test_remote_url_is_untouched() {
        let src = "import x from 'https://cdn.example.com/react';";
        let out = Fixture::new().run(src);
        assert_eq!(out.code, src);
        assert_eq!(out.resolutions[0].kind, ResolutionKind::RemoteUrl);
        assert!(out.edits.is_empty());
    }

    #[test]
    fn test_lazy_glob_expansion() {
        let out = Fixture::new().run("const pages = import.meta.glob('./pages/*.js');");
        assert_eq!(
            out.code,
            r#"const pages = {"./pages/a.js": () => import("./pages/a.js"), "./pages/b.js": () => import("./pages/b.js")};"#
        );
    }

    #[test]
    fn test_brace_glob_expansion() {
        let out = Fixture::new().run("const pages = import.meta.glob('./{pages/a,pages/b,sort}.{js,ts}');");
        assert_eq!(
            out.code,
            r#"const pages = {"./pages/a.js": () => import("./pages/a.js"), "./pages/b.js": () => import("./pages/b.js"), "./sort.ts": () => import("./sort.js")};"#
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_unbalanced_brace_glob_warns() {
        let src = "const pages = import.meta.glob('./pages/{a,b.js');";
        let out = Fixture::new().run(src);
        assert_eq!(out.code, src);
        assert_eq!(out.warnings[0].code(), crate::error::codes::WARN_UNSUPPORTED_GLOB);
    }

    #[test]
    fn test_eager_glob_hoists_imports() {
        let out = Fixture::new().run("const pages = import.meta.globEager('./pages/*.js');");
        assert_eq!(
            out.code,
            "import * as __glob__0_0 from \"./pages/a.js\";\nimport * as __glob__0_1 from \"./pages/b.js\";\nconst pages = {\"./pages/a.js\": __glob__0_0, \"./pages/b.js\": __glob__0_1};"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let fixture = Fixture::new();
        let src = r#"import React from 'react';
import {flatten} from 'array-flatten';
import sort from './sort';
import './style.css';
import data from './data.json';
import Nav from './components';
import util from '@app/util';
import logo from '/logo.png';
const pages = import.meta.glob('./pages/*.js');
const eager = import.meta.globEager('./pages/*.js');
const lazy = import('./sort.ts');
"#;
        let once = fixture.run(src);
        let twice = fixture.run(&once.code);
        assert_eq!(twice.code, once.code);
        assert!(twice.edits.is_empty());
    }

    #[test]
    fn test_proxy_imports_for_non_js_outputs() {
        let out = Fixture::new().run("import './style.css';\nimport data from './data.json';");
        assert_eq!(
            out.code,
            "import './style.css.proxy.js';\nimport data from './data.json.proxy.js';"
        );
    }

    #[test]
    fn test_css_importer_gets_no_proxy() {
        let out = Fixture::new().run_as("@import './style.css';", SourceKind::Css);
        assert_eq!(out.code, "@import './style.css';");
    }

    #[test]
    fn test_directory_index() {
        let out = Fixture::new().run("import Nav from './components';");
        assert_eq!(out.code, "import Nav from './components/index.js';");
    }

    #[test]
    fn test_mounted_absolute_specifiers() {
        let fixture = Fixture::new();
        let out = fixture.run("import sort from '/_dist_/sort';\nimport logo from '/logo.png';");
        assert_eq!(
            out.code,
            "import sort from '/_dist_/sort.js';\nimport logo from '/logo.png.proxy.js';"
        );
        assert!(out
            .resolutions
            .iter()
            .all(|r| r.kind == ResolutionKind::MountedAbsolute));
    }

    #[test]
    fn test_alias_to_path_and_specifier() {
        let fixture = Fixture::new();
        let out = fixture.run("import util from '@app/util';\nimport React from 'react';");
        assert_eq!(out.resolutions[0].rewritten, "/_dist_/app/util.js");
        assert_eq!(out.resolutions[0].kind, ResolutionKind::MountedAbsolute);
        // preact is not installed in the fixture
        assert_eq!(out.resolutions[1].kind, ResolutionKind::Unresolved);
        assert_eq!(
            out.warnings,
            vec![BuildWarning::PackageNotInstalled {
                specifier: "preact/compat".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_package_is_left_in_place() {
        let src = "import pad from 'left-pad';\nimport sort from './sort';";
        let out = Fixture::new().run(src);
        assert_eq!(out.code, "import pad from 'left-pad';\nimport sort from './sort.js';");
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code(), crate::error::codes::WARN_PACKAGE_NOT_INSTALLED);
    }

    #[test]
    fn test_computed_dynamic_import_warns() {
        let src = "const m = import('./pages/' + name);";
        let out = Fixture::new().run(src);
        assert_eq!(out.code, src);
        assert!(matches!(
            out.warnings[0],
            BuildWarning::UnresolvedDynamicSpecifier { line: 1, .. }
        ));
    }

    #[test]
    fn test_unresolved_relative_and_plain_glob() {
        let src = "import a from './missing';\nimport b from './pages/*.js';";
        let out = Fixture::new().run(src);
        assert_eq!(out.code, src);
        let codes: Vec<&str> = out.warnings.iter().map(BuildWarning::code).collect();
        assert_eq!(
            codes,
            vec![
                crate::error::codes::WARN_UNRESOLVED_IMPORT,
                crate::error::codes::WARN_UNSUPPORTED_GLOB
            ]
        );
    }

    #[test]
    fn test_resolutions_follow_input_order_and_edits_track_offsets() {
        let src = "import a from './sort';\nimport b from 'array-flatten';";
        let out = Fixture::new().run(src);
        let originals: Vec<&str> = out.resolutions.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(originals, vec!["./sort", "array-flatten"]);

        assert_eq!(out.edits.len(), 2);
        for edit in &out.edits {
            let rewritten = &out.code[edit.generated_start..edit.generated_end];
            assert!(out.resolutions.iter().any(|r| r.rewritten == rewritten));
        }
        assert_eq!(out.edits[1].generated_start, out.edits[1].original_start + 3);
    }

    #[test]
    fn test_query_suffix_is_preserved() {
        let out = Fixture::new().run("import raw from './sort?raw';");
        assert_eq!(out.code, "import raw from './sort.js?raw';");
    }

    #[test]
    fn test_empty_specifier_warns_clearly() {
        let out = Fixture::new().run("import '';");
        assert_eq!(out.code, "import '';");
        assert!(out.warnings[0].to_string().contains("Cannot resolve empty specifier"));
    }
}
