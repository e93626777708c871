//! `unbundle resolve`: the public URL of a source file or package specifier.

use super::{open_project, ErrorJson, SCHEMA_VERSION};
use miette::Result;
use serde::Serialize;
use unbundle_core::{Config, ResolutionError};

#[derive(Serialize)]
struct ResolveJson<'a> {
    schema_version: u32,
    ok: bool,
    input: &'a str,
    /// `file` or `package`.
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

pub fn run(config: &Config, target: &str) -> Result<()> {
    let (_project, pipeline) = open_project(config);

    // An existing path wins over a bare specifier of the same spelling.
    let path = config.cwd.join(target);
    let (kind, resolved) = if path.is_file() {
        let path = dunce::canonicalize(&path).unwrap_or(path);
        let url = pipeline
            .resolve_url_for_file(&path)
            .ok_or(ResolutionError::NotMounted { path });
        ("file", url)
    } else {
        ("package", pipeline.get_url_for_package(target))
    };

    let ok = resolved.is_ok();
    if config.json_logs {
        let (url, error) = match resolved {
            Ok(url) => (Some(url), None),
            Err(e) => (None, Some(ErrorJson::new(e.code(), &e))),
        };
        let output = ResolveJson {
            schema_version: SCHEMA_VERSION,
            ok,
            input: target,
            kind,
            url,
            error,
        };
        println!("{}", serde_json::to_string(&output).unwrap_or_default());
    } else {
        match resolved {
            Ok(url) => println!("{url}"),
            Err(e) => eprintln!("error: {}: {e}", e.code()),
        }
    }

    if ok {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
