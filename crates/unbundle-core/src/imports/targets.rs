//! Install-target index: which packages the project imports, and how much of each.

use super::{scan, ImportKind, ImportRecord, SourceKind};
use crate::alias::{AliasTable, Substitution};
use crate::error::{BuildError, ScanError};
use crate::extensions::path_extension;
use crate::specifier::classify;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Aggregated usage of one package specifier across the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallTarget {
    pub specifier: String,
    pub imports_default: bool,
    pub imports_namespace: bool,
    /// Side-effect, dynamic and `export *` imports need the whole package surface.
    pub imports_all: bool,
    pub named_imports: BTreeSet<String>,
}

impl InstallTarget {
    #[must_use]
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            ..Self::default()
        }
    }

    /// Usage implied by one import record. `None` for records that pull in nothing (type-only).
    #[must_use]
    pub fn from_record(specifier: &str, record: &ImportRecord) -> Option<Self> {
        let mut target = Self::new(specifier);
        match (record.kind, record.clause.as_deref()) {
            (ImportKind::Dynamic | ImportKind::ExportAll, _)
            | (ImportKind::Static | ImportKind::ExportFrom, None) => {
                target.imports_all = true;
            }
            (ImportKind::Static | ImportKind::ExportFrom, Some(clause)) => {
                let clause = clause.trim();
                if let Some(rest) = clause.strip_prefix("type ") {
                    if rest.trim_start().starts_with('{') || !rest.contains(',') {
                        return None;
                    }
                }
                target.apply_clause(clause);
            }
            (ImportKind::Glob { .. }, _) => return None,
        }
        Some(target)
    }

    /// Fold another target for the same specifier into this one.
    pub fn merge(&mut self, other: &Self) {
        self.imports_default |= other.imports_default;
        self.imports_namespace |= other.imports_namespace;
        self.imports_all |= other.imports_all;
        self.named_imports
            .extend(other.named_imports.iter().cloned());
    }

    fn apply_clause(&mut self, clause: &str) {
        let (outside, inside) = match (clause.find('{'), clause.rfind('}')) {
            (Some(open), Some(close)) if open < close => (
                format!("{}{}", &clause[..open], &clause[close + 1..]),
                Some(&clause[open + 1..close]),
            ),
            _ => (clause.to_string(), None),
        };

        for part in outside.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.starts_with('*') {
                self.imports_namespace = true;
            } else {
                self.imports_default = true;
            }
        }

        for part in inside.into_iter().flat_map(|s| s.split(',')) {
            let part = part.trim();
            let part = part.strip_prefix("type ").unwrap_or(part).trim();
            let name = part
                .split_whitespace()
                .next()
                .unwrap_or("")
                .trim_matches(|c| c == '"' || c == '\'');
            match name {
                "" => {}
                "default" => self.imports_default = true,
                _ => {
                    self.named_imports.insert(name.to_string());
                }
            }
        }
    }
}

/// Package targets imported by one source text. Aliases are substituted first.
pub fn install_targets_for_source(
    source: &str,
    kind: SourceKind,
    aliases: &AliasTable,
) -> Result<Vec<InstallTarget>, ScanError> {
    let records = scan(source, kind)?;
    Ok(records
        .iter()
        .filter(|r| !r.computed)
        .filter_map(|record| {
            let specifier = match aliases.substitute(&record.raw_specifier) {
                Some(Substitution::Path(_)) => return None,
                Some(Substitution::Specifier(s)) => s,
                None => record.raw_specifier.clone(),
            };
            classify(&specifier).package()?;
            InstallTarget::from_record(&specifier, record)
        })
        .collect())
}

/// Merge targets by specifier, sorted by specifier.
pub fn merge_targets(targets: impl IntoIterator<Item = InstallTarget>) -> Vec<InstallTarget> {
    let mut merged: BTreeMap<String, InstallTarget> = BTreeMap::new();
    for target in targets {
        match merged.get_mut(&target.specifier) {
            Some(existing) => existing.merge(&target),
            None => {
                merged.insert(target.specifier.clone(), target);
            }
        }
    }
    merged.into_values().collect()
}

/// Scan every file with a known source kind, in parallel, and merge the result.
pub fn scan_install_targets(
    files: &[PathBuf],
    aliases: &AliasTable,
) -> Result<Vec<InstallTarget>, BuildError> {
    let per_file: Vec<Vec<InstallTarget>> = files
        .par_iter()
        .filter_map(|path| {
            let kind = path_extension(path).and_then(|ext| SourceKind::from_extension(&ext))?;
            Some((path, kind))
        })
        .map(|(path, kind)| {
            let source = unbundle_util::fs::read_to_string_lossy(path)
                .map_err(|e| BuildError::io(path, &e))?;
            install_targets_for_source(&source, kind, aliases)
                .map_err(|e| BuildError::parse(path, e))
        })
        .collect::<Result<_, _>>()?;

    Ok(merge_targets(per_file.into_iter().flatten()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn targets(source: &str) -> Vec<InstallTarget> {
        merge_targets(
            install_targets_for_source(source, SourceKind::JavaScript, &AliasTable::default())
                .unwrap(),
        )
    }

    #[test]
    fn test_clause_forms() {
        let found = targets(
            r#"
import React, { useState, useEffect as ue } from "react";
import * as d3 from "d3";
import "normalize.css";
import local from "./local.js";
const lazy = import("lodash-es");
export { default as Button, Card } from "@ui/kit";
"#,
        );
        let specs: Vec<&str> = found.iter().map(|t| t.specifier.as_str()).collect();
        assert_eq!(specs, vec!["@ui/kit", "d3", "lodash-es", "normalize.css", "react"]);

        let react = &found[4];
        assert!(react.imports_default);
        assert!(!react.imports_namespace);
        assert_eq!(
            react.named_imports.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["useEffect", "useState"]
        );

        assert!(found[1].imports_namespace);
        assert!(found[2].imports_all);
        assert!(found[3].imports_all);
        assert!(found[0].imports_default);
        assert!(found[0].named_imports.contains("Card"));
    }

    #[test]
    fn test_merge_across_imports() {
        let found = targets("import { a } from 'pkg';\nimport b from 'pkg';\nimport { c } from 'pkg';");
        assert_eq!(found.len(), 1);
        assert!(found[0].imports_default);
        assert_eq!(found[0].named_imports.len(), 2);
    }

    #[test]
    fn test_export_from_without_clause_needs_everything() {
        let record = ImportRecord {
            raw_specifier: "pkg".to_string(),
            kind: ImportKind::ExportFrom,
            start: 0,
            end: 0,
            computed: false,
            clause: None,
            line: 1,
        };
        let target = InstallTarget::from_record("pkg", &record).unwrap();
        assert!(target.imports_all);
        assert!(target.named_imports.is_empty());
    }

    #[test]
    fn test_type_only_imports_are_skipped() {
        assert!(targets("import type { Props } from 'pkg';").is_empty());
    }

    #[test]
    fn test_aliases_apply_first() {
        let aliases = AliasTable::new(
            Path::new("/p"),
            [("react", "preact/compat"), ("@app", "./src")],
        );
        let found = install_targets_for_source(
            "import React from 'react';\nimport x from '@app/x';",
            SourceKind::JavaScript,
            &aliases,
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].specifier, "preact/compat");
    }

    #[test]
    fn test_scan_files_in_parallel() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.ts");
        let c = dir.path().join("logo.png");
        fs::write(&a, "import { x } from 'shared';").unwrap();
        fs::write(&b, "import { y } from 'shared';").unwrap();
        fs::write(&c, [0u8, 1, 2]).unwrap();

        let found = scan_install_targets(&[a, b, c], &AliasTable::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].named_imports.len(), 2);
    }

    #[test]
    fn test_parse_failure_names_file() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("bad.js");
        fs::write(&bad, "import x from 'oops").unwrap();
        let err = scan_install_targets(&[bad.clone()], &AliasTable::default()).unwrap_err();
        assert!(matches!(err, BuildError::ParseFailure { ref file, .. } if *file == bad));
    }
}
