//! JavaScript wrappers for non-JavaScript imports (`*.proxy.js`).

/// Module that injects `css` as a `<style>` element and default-exports the text.
#[must_use]
pub fn css_module(css: &str, url: &str) -> String {
    let escaped = css
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${");
    let id = serde_json::to_string(url).unwrap_or_else(|_| "\"\"".to_string());

    format!(
        r#"const css = `{escaped}`;
const style = document.createElement('style');
style.setAttribute('data-unbundle-css', {id});
style.textContent = css;
document.head.appendChild(style);

export default css;
"#
    )
}

/// Module that default-exports parsed JSON.
#[must_use]
pub fn json_module(json: &str) -> String {
    format!("export default {};\n", json.trim())
}

/// Module that default-exports the public URL of an asset.
#[must_use]
pub fn asset_module(url: &str) -> String {
    let quoted = serde_json::to_string(url).unwrap_or_else(|_| format!("\"{url}\""));
    format!("export default {quoted};\n")
}

/// Proxy module for an output with extension `ext`.
///
/// `contents` is only consulted for `.css` and `.json`.
#[must_use]
pub fn proxy_module(ext: &str, contents: Option<&str>, url: &str) -> String {
    match (ext, contents) {
        (".css", Some(css)) => css_module(css, url),
        (".json", Some(json)) => json_module(json),
        _ => asset_module(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_module_escapes_template() {
        let module = css_module("a::before { content: `${x}\\` }", "/_dist_/a.css");
        assert!(module.starts_with("const css = `a::before { content: \\`\\${x}\\\\\\` }`;"));
        assert!(module.contains(r#"setAttribute('data-unbundle-css', "/_dist_/a.css")"#));
        assert!(module.trim_end().ends_with("export default css;"));
    }

    #[test]
    fn test_json_and_asset_modules() {
        assert_eq!(json_module("{\"a\": 1}\n"), "export default {\"a\": 1};\n");
        assert_eq!(
            asset_module("/_dist_/logo.png"),
            "export default \"/_dist_/logo.png\";\n"
        );
        assert_eq!(
            proxy_module(".svg", None, "/icon.svg"),
            "export default \"/icon.svg\";\n"
        );
    }
}
