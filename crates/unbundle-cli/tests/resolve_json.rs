//! Integration tests for `unbundle resolve --json` output.

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

fn resolve(root: &Path, target: &str) -> (bool, serde_json::Value) {
    let output = cargo_bin()
        .args(["resolve", target, "--json", "--cwd"])
        .arg(root)
        .output()
        .expect("Failed to run resolve command");
    let json = serde_json::from_str(&String::from_utf8_lossy(&output.stdout))
        .expect("Output should be valid JSON");
    (output.status.success(), json)
}

fn project(root: &Path) {
    write(root, "unbundle.config.json", r#"{"mount": {"src": "/_dist_"}}"#);
    write(root, "src/components/App.tsx", "export default 1;\n");
    write(root, ".unbundle/pkg/preact.v10.5.0.js", "");
}

#[test]
fn test_resolve_file_and_package() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    project(root);

    let (ok, json) = resolve(root, "src/components/App.tsx");
    assert!(ok);
    assert_eq!(json["kind"], "file");
    assert_eq!(json["url"], "/_dist_/components/App.js");

    let (ok, json) = resolve(root, "preact");
    assert!(ok);
    assert_eq!(json["kind"], "package");
    assert_eq!(json["url"], "/_unbundle/pkg/preact.js");
}

#[test]
fn test_resolve_missing_package() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    project(root);

    let (ok, json) = resolve(root, "left-pad");
    assert!(!ok);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "RESOLVE_PACKAGE_NOT_INSTALLED");
}

#[test]
fn test_resolve_unmounted_file() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    project(root);
    write(root, "scripts/deploy.js", "");

    let (ok, json) = resolve(root, "scripts/deploy.js");
    assert!(!ok);
    assert_eq!(json["kind"], "file");
    assert_eq!(json["error"]["code"], "RESOLVE_NOT_MOUNTED");
}
