//! Source → output extension map.
//!
//! A `.ts` source is served as `.js`, a `.svelte` source (once a plugin
//! claims it) as whatever the plugin's first output extension is.

use std::path::Path;

/// Built-in mappings, in the order extensionless specifiers are probed.
const BUILTIN: &[(&str, &str)] = &[
    (".js", ".js"),
    (".jsx", ".js"),
    (".ts", ".js"),
    (".tsx", ".js"),
    (".mjs", ".mjs"),
    (".mts", ".js"),
    (".json", ".json"),
    (".css", ".css"),
    (".html", ".html"),
];

/// Ordered map from source extension to output extension.
#[derive(Debug, Clone)]
pub struct ExtensionMap {
    entries: Vec<(String, String)>,
}

impl Default for ExtensionMap {
    fn default() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(i, o)| ((*i).to_string(), (*o).to_string()))
                .collect(),
        }
    }
}

impl ExtensionMap {
    /// Map `input` to `output`, replacing any earlier mapping of `input`.
    pub fn insert(&mut self, input: impl Into<String>, output: impl Into<String>) {
        let input = input.into();
        let output = output.into();
        if let Some(entry) = self.entries.iter_mut().find(|(i, _)| *i == input) {
            entry.1 = output;
        } else {
            self.entries.push((input, output));
        }
    }

    /// Output extension for a source extension. Unknown extensions map to themselves.
    #[must_use]
    pub fn output_ext<'a>(&'a self, input: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|(i, _)| i == input)
            .map_or(input, |(_, o)| o.as_str())
    }

    /// Whether `input` has a mapping, i.e. files with it go through the build pipeline.
    #[must_use]
    pub fn contains(&self, input: &str) -> bool {
        self.entries.iter().any(|(i, _)| i == input)
    }

    /// Source extensions in probe order.
    pub fn source_exts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(i, _)| i.as_str())
    }

    /// Source extensions that produce `output`, the identical extension first.
    #[must_use]
    pub fn sources_for_output<'a>(&'a self, output: &'a str) -> Vec<&'a str> {
        let mut sources: Vec<&str> = self
            .entries
            .iter()
            .filter(|(i, o)| o == output && i != output)
            .map(|(i, _)| i.as_str())
            .collect();
        sources.insert(0, output);
        sources
    }
}

/// Extension of the last path segment including the dot, e.g. `.js`.
#[must_use]
pub fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(&name[dot..])
}

/// Extension of a filesystem path including the dot.
#[must_use]
pub fn path_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
}

/// Whether an output extension is served as a JavaScript module.
#[must_use]
pub fn is_js_output(ext: &str) -> bool {
    matches!(ext, ".js" | ".mjs")
}

/// Replace the extension of the last segment of `spec`.
#[must_use]
pub fn replace_extension(spec: &str, new_ext: &str) -> String {
    match extension_of(spec) {
        Some(ext) => format!("{}{new_ext}", &spec[..spec.len() - ext.len()]),
        None => format!("{spec}{new_ext}"),
    }
}
