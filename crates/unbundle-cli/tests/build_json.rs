//! Integration tests for `unbundle build --json` output.
//!
//! These tests verify:
//! - JSON output is always valid JSON
//! - Schema version, `ok` and `notes` are present
//! - Outputs land at their public URLs under the output directory
//! - A parse failure fails the whole build with a SCREAMING_SNAKE_CASE code

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "unbundle-cli", "--bin", "unbundle", "--"]);
    cmd
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn build(root: &Path) -> (bool, serde_json::Value) {
    let output = cargo_bin()
        .args(["build", "--json", "--cwd"])
        .arg(root)
        .output()
        .expect("Failed to run build command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");
    (output.status.success(), json)
}

fn project(root: &Path) {
    write(
        root,
        "unbundle.config.json",
        r#"{
            "mount": {
                "src": "/_dist_",
                "public": { "url": "/", "static": true, "resolve": false }
            },
            "define": { "__DEV__": "false" }
        }"#,
    );
    write(
        root,
        "public/index.html",
        r#"<script type="module" src="/_dist_/index.js"></script>"#,
    );
    write(
        root,
        ".unbundle/pkg/array-flatten.v3.0.0.js",
        "export function flatten(a) { return a.flat(); }\n",
    );
}

#[test]
fn test_build_json_writes_outputs_at_public_urls() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    project(root);
    write(
        root,
        "src/index.ts",
        "import { flatten } from 'array-flatten';\nimport sort from './sort';\nimport './style.css';\nif (__DEV__) {}\nconsole.log(process.env.NODE_ENV);\n",
    );
    write(root, "src/sort.ts", "export default function sort() {}\n");
    write(root, "src/style.css", "h1 { color: red; }\n");

    let (success, json) = build(root);
    assert!(success, "build should succeed: {json}");
    assert_eq!(json["ok"], true);
    assert_eq!(json["schema_version"], 1);
    assert!(json["notes"].is_array(), "notes should be an array");
    assert_eq!(json["counts"]["built"], 3);
    assert_eq!(json["counts"]["copied"], 1);
    assert_eq!(json["counts"]["packages"], 1);

    let files: Vec<&str> = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    for expected in [
        "_dist_/index.js",
        "_dist_/sort.js",
        "_dist_/style.css",
        "_dist_/style.css.proxy.js",
        "_unbundle/pkg/array-flatten.js",
        "index.html",
    ] {
        assert!(files.contains(&expected), "missing {expected} in {files:?}");
    }

    let out = root.join("build");
    let index = fs::read_to_string(out.join("_dist_/index.js")).unwrap();
    assert!(index.contains("from '/_unbundle/pkg/array-flatten.js'"), "{index}");
    assert!(index.contains("from './sort.js'"), "{index}");
    assert!(index.contains("import './style.css.proxy.js'"), "{index}");
    assert!(index.contains("if (false)"), "{index}");
    assert!(index.contains("console.log(\"production\")"), "{index}");
}

#[test]
fn test_build_json_parse_failure_fails_build() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    project(root);
    write(root, "src/index.js", "export const ok = 1;\n");
    write(root, "src/broken.js", "import a from './a.js;\n");

    let (success, json) = build(root);
    assert!(!success, "a parse failure should exit non-zero");
    assert_eq!(json["ok"], false);
    assert_eq!(json["counts"]["failed"], 1);

    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "BUILD_PARSE_FAILURE");
    assert_eq!(errors[0]["file"], "src/broken.js");

    let code = errors[0]["code"].as_str().unwrap();
    assert!(
        code.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
        "Error code should be SCREAMING_SNAKE_CASE: {code}"
    );
}

#[test]
fn test_build_json_invalid_config() {
    let dir = tempdir().unwrap();
    write(dir.path(), "unbundle.config.json", r#"{"mount": {"src": "no-slash"}}"#);

    let (success, json) = build(dir.path());
    assert!(!success);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "CONFIG_INVALID");
}
