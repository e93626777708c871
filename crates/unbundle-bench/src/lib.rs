#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Benchmark harness for unbundle.
//!
//! Run benchmarks with: `cargo bench -p unbundle-bench`
//!
//! Holds the synthetic fixtures the criterion benches share.

use std::fmt::Write;
use std::fs;
use std::path::Path;
use unbundle_core::{MountRule, MountTable, PackageResolver};

/// Packages written to the fixture cache; module `i` imports `PACKAGES[i % len]`.
pub const PACKAGES: [&str; 4] = ["preact", "array-flatten", "lodash-es", "@scope/ui"];

/// A JavaScript module with `imports` import statements of mixed kinds.
#[must_use]
pub fn synthetic_module(imports: usize) -> String {
    let mut source = String::with_capacity(imports * 48);
    for i in 0..imports {
        let _ = match i % 5 {
            0 => writeln!(source, "import {{ a{i}, b{i} }} from '{}';", PACKAGES[i % PACKAGES.len()]),
            1 => writeln!(source, "import m{i} from './lib/m{i}';"),
            2 => writeln!(source, "import './styles/s{i}.css';"),
            3 => writeln!(source, "export * from '../shared/e{i}.js';"),
            _ => writeln!(source, "const d{i} = await import('./lazy/l{i}.ts');"),
        };
        let _ = writeln!(source, "// {} `import x from 'y'` inside a comment", "-".repeat(i % 7));
    }
    source.push_str("export default function main() { return 'import(\"not-real\")'; }\n");
    source
}

/// Lay out a project under `root` matching [`synthetic_module`]'s imports.
///
/// Returns the mounts, the package resolver and the importer path.
pub fn synthetic_project(
    root: &Path,
    imports: usize,
) -> std::io::Result<(MountTable, PackageResolver, std::path::PathBuf)> {
    let src = root.join("src");
    let cache = root.join("pkg");
    for dir in ["lib", "styles", "lazy"] {
        fs::create_dir_all(src.join("app").join(dir))?;
    }
    fs::create_dir_all(src.join("shared"))?;
    fs::create_dir_all(cache.join("@scope"))?;
    for package in PACKAGES {
        fs::write(cache.join(format!("{package}.v1.0.0.js")), "export {};")?;
    }
    for i in 0..imports {
        match i % 5 {
            1 => fs::write(src.join(format!("app/lib/m{i}.ts")), "")?,
            2 => fs::write(src.join(format!("app/styles/s{i}.css")), "")?,
            3 => fs::write(src.join(format!("shared/e{i}.js")), "")?,
            4 => fs::write(src.join(format!("app/lazy/l{i}.ts")), "")?,
            _ => {}
        }
    }

    let mounts = MountTable::new(vec![MountRule::new(&src, "/_dist_")])
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let packages = PackageResolver::new(cache, "/_unbundle/pkg");
    Ok((mounts, packages, src.join("app").join("index.js")))
}
