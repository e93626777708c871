use super::SCHEMA_VERSION;
use miette::Result;
use unbundle_core::version::{version_string, VERSION};

pub fn run(json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "version": VERSION,
        });
        println!("{output}");
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
