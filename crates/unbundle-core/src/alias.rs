//! User alias table.
//!
//! Aliases are consulted before classification: the longest key that equals
//! the specifier or is a path-prefix of it is substituted first.

use std::path::{Path, PathBuf};

/// Where an alias points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// A local file or directory (config values starting with `./`, `../` or `/`).
    Path(PathBuf),
    /// Another specifier, reclassified after substitution.
    Specifier(String),
}

/// Outcome of substituting an alias into a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    Path(PathBuf),
    Specifier(String),
}

/// Alias keys, longest first.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<(String, AliasTarget)>,
}

impl AliasTable {
    /// Build from raw config pairs. Path-like values are made absolute against `root`.
    pub fn new<I, K, V>(root: &Path, raw: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut entries: Vec<(String, AliasTarget)> = raw
            .into_iter()
            .map(|(key, value)| {
                let key = key.into().trim_end_matches('/').to_string();
                let value = value.as_ref();
                let target = if value.starts_with("./")
                    || value.starts_with("../")
                    || value.starts_with('/')
                {
                    AliasTarget::Path(root.join(value.trim_end_matches('/')))
                } else {
                    AliasTarget::Specifier(value.trim_end_matches('/').to_string())
                };
                (key, target)
            })
            .filter(|(key, _)| !key.is_empty())
            .collect();
        // Longest key first; ties keep insertion order
        entries.sort_by_key(|(key, _)| std::cmp::Reverse(key.len()));
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitute the longest matching alias, if any.
    #[must_use]
    pub fn substitute(&self, spec: &str) -> Option<Substitution> {
        self.entries.iter().find_map(|(key, target)| {
            let rest = spec.strip_prefix(key.as_str())?;
            if !(rest.is_empty() || rest.starts_with('/')) {
                return None;
            }
            Some(match target {
                AliasTarget::Path(base) => {
                    let mut path = base.clone();
                    for segment in rest.split('/').filter(|s| !s.is_empty()) {
                        path.push(segment);
                    }
                    Substitution::Path(path)
                }
                AliasTarget::Specifier(value) => Substitution::Specifier(format!("{value}{rest}")),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> AliasTable {
        AliasTable::new(
            Path::new("/project"),
            [
                ("@app", "./src/app"),
                ("@app/widgets", "./src/widgets/"),
                ("react", "preact/compat"),
            ],
        )
    }

    #[test]
    fn test_exact_and_prefix_match() {
        let table = aliases();
        assert_eq!(
            table.substitute("@app"),
            Some(Substitution::Path(PathBuf::from("/project/./src/app")))
        );
        assert_eq!(
            table.substitute("@app/util/x"),
            Some(Substitution::Path(PathBuf::from("/project/./src/app/util/x")))
        );
    }

    #[test]
    fn test_longest_key_wins() {
        assert_eq!(
            aliases().substitute("@app/widgets/button"),
            Some(Substitution::Path(PathBuf::from(
                "/project/./src/widgets/button"
            )))
        );
    }

    #[test]
    fn test_specifier_alias() {
        let table = aliases();
        assert_eq!(
            table.substitute("react"),
            Some(Substitution::Specifier("preact/compat".to_string()))
        );
        assert_eq!(
            table.substitute("react/jsx-runtime"),
            Some(Substitution::Specifier("preact/compat/jsx-runtime".to_string()))
        );
    }

    #[test]
    fn test_partial_segment_does_not_match() {
        assert_eq!(aliases().substitute("react-dom"), None);
        assert_eq!(aliases().substitute("@apple"), None);
    }
}
