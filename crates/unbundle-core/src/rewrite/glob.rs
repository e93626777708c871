//! `import.meta.glob` expansion.
//!
//! Patterns use `glob` syntax plus `{a,b}` alternation, which is expanded
//! into separate patterns first.

use glob::PatternError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use unbundle_util::fs::slash_path;

/// A file matched by a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct GlobMatch {
    /// Key in the expanded object: `./pages/a.js` or `../shared/b.js`.
    pub key: String,
    pub path: PathBuf,
}

/// Files matching a relative `pattern` from the importer's directory, sorted by key.
///
/// The importer itself never matches.
pub(super) fn glob_matches(importer: &Path, pattern: &str) -> Result<Vec<GlobMatch>, PatternError> {
    let dir = importer.parent().unwrap_or(Path::new("/"));
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());

    let mut found = BTreeMap::new();
    for expanded in expand_braces(pattern)? {
        let relative = expanded.strip_prefix("./").unwrap_or(&expanded);
        for path in glob::glob(&format!("{escaped_dir}/{relative}"))?.filter_map(Result::ok) {
            if !path.is_file() || path.as_path() == importer {
                continue;
            }
            let Ok(rel) = path.strip_prefix(dir) else {
                continue;
            };
            let rel = slash_path(rel);
            let key = if rel.starts_with("../") {
                rel
            } else {
                format!("./{rel}")
            };
            found.entry(key).or_insert(path);
        }
    }
    Ok(found
        .into_iter()
        .map(|(key, path)| GlobMatch { key, path })
        .collect())
}

/// Expand `{a,b}` groups (nested ones too) into plain patterns.
fn expand_braces(pattern: &str) -> Result<Vec<String>, PatternError> {
    let Some(open) = pattern.find('{') else {
        return match pattern.find('}') {
            Some(pos) => Err(unbalanced(pos)),
            None => Ok(vec![pattern.to_string()]),
        };
    };

    let mut depth = 0usize;
    let mut bounds = vec![open];
    let mut close = None;
    for (i, c) in pattern.char_indices().skip_while(|&(i, _)| i < open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => bounds.push(i),
            _ => {}
        }
    }
    let close = close.ok_or_else(|| unbalanced(open))?;
    bounds.push(close);

    let (head, tail) = (&pattern[..open], &pattern[close + 1..]);
    let mut expanded = Vec::new();
    for pair in bounds.windows(2) {
        let alternative = &pattern[pair[0] + 1..pair[1]];
        expanded.extend(expand_braces(&format!("{head}{alternative}{tail}"))?);
    }
    Ok(expanded)
}

fn unbalanced(pos: usize) -> PatternError {
    PatternError {
        pos,
        msg: "unbalanced `{` or `}`",
    }
}

/// `{"./a.js": () => import("./a.js"), ...}`
pub(super) fn lazy_object(entries: &[(String, String)]) -> String {
    let body: Vec<String> = entries
        .iter()
        .map(|(key, spec)| format!("{}: () => import({})", quote(key), quote(spec)))
        .collect();
    format!("{{{}}}", body.join(", "))
}

/// Hoisted namespace imports plus `{"./a.js": __glob__0_0, ...}`.
pub(super) fn eager_object(index: usize, entries: &[(String, String)]) -> (String, String) {
    let mut hoisted = String::new();
    let mut body = Vec::with_capacity(entries.len());
    for (i, (key, spec)) in entries.iter().enumerate() {
        let binding = format!("__glob__{index}_{i}");
        hoisted.push_str(&format!("import * as {binding} from {};\n", quote(spec)));
        body.push(format!("{}: {binding}", quote(key)));
    }
    (hoisted, format!("{{{}}}", body.join(", ")))
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_matches_sorted_and_exclude_importer() {
        let dir = tempdir().unwrap();
        let pages = dir.path().join("pages");
        fs::create_dir_all(&pages).unwrap();
        fs::write(pages.join("b.js"), "").unwrap();
        fs::write(pages.join("a.js"), "").unwrap();
        fs::write(pages.join("c.css"), "").unwrap();
        let importer = pages.join("index.js");
        fs::write(&importer, "").unwrap();

        let found = glob_matches(&importer, "./*.js").unwrap();
        let keys: Vec<&str> = found.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["./a.js", "./b.js"]);
    }

    #[test]
    fn test_parent_pattern_keeps_dotdot() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("shared")).unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("shared").join("x.js"), "").unwrap();

        let found = glob_matches(&dir.path().join("app").join("main.js"), "../shared/*.js").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "../shared/x.js");
    }

    #[test]
    fn test_brace_alternation() {
        let dir = tempdir().unwrap();
        let pages = dir.path().join("pages");
        fs::create_dir_all(&pages).unwrap();
        for name in ["a.js", "b.js", "c.js", "d.ts"] {
            fs::write(pages.join(name), "").unwrap();
        }
        let importer = dir.path().join("main.js");

        let found = glob_matches(&importer, "./pages/{a,b}.js").unwrap();
        let keys: Vec<&str> = found.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["./pages/a.js", "./pages/b.js"]);

        // Overlapping alternatives list each file once
        let found = glob_matches(&importer, "./pages/{*.js,a.js,*.{ts,tsx}}").unwrap();
        let keys: Vec<&str> = found.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["./pages/a.js", "./pages/b.js", "./pages/c.js", "./pages/d.ts"]);
    }

    #[test]
    fn test_expand_braces() {
        assert_eq!(expand_braces("./a/*.js").unwrap(), vec!["./a/*.js"]);
        assert_eq!(
            expand_braces("./{x,y/{1,2}}.js").unwrap(),
            vec!["./x.js", "./y/1.js", "./y/2.js"]
        );
        assert_eq!(expand_braces("./{,b}.js").unwrap(), vec!["./.js", "./b.js"]);
        assert!(expand_braces("./{a,b.js").is_err());
        assert!(expand_braces("./a}.js").is_err());
    }

    #[test]
    fn test_object_rendering() {
        let entries = vec![
            ("./pages/a.js".to_string(), "./pages/a.js".to_string()),
            ("./pages/b.ts".to_string(), "./pages/b.js".to_string()),
        ];
        assert_eq!(
            lazy_object(&entries),
            r#"{"./pages/a.js": () => import("./pages/a.js"), "./pages/b.ts": () => import("./pages/b.js")}"#
        );
        let (hoisted, object) = eager_object(2, &entries);
        assert_eq!(
            hoisted,
            "import * as __glob__2_0 from \"./pages/a.js\";\nimport * as __glob__2_1 from \"./pages/b.js\";\n"
        );
        assert_eq!(object, r#"{"./pages/a.js": __glob__2_0, "./pages/b.ts": __glob__2_1}"#);
        assert_eq!(lazy_object(&[]), "{}");
    }
}
