//! Package cache lookups.

mod import_map;
mod resolve;

pub use import_map::{FileStamp, ImportMap, ImportMapCache, IMPORT_MAP_FILE};
pub use resolve::{PackageEntry, PackageResolver, UrlScheme};
