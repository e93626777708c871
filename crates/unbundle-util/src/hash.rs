use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Length of the abbreviated digests used in cache keys.
pub const SHORT_DIGEST_LEN: usize = 16;

/// Compute the BLAKE3 hash of a file, returning the hex-encoded digest.
///
/// Streams the file content so large source files never sit in memory twice.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn blake3_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute the BLAKE3 hash of a byte slice, returning the hex-encoded digest.
#[must_use]
pub fn blake3_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Hash an ordered list of byte parts.
///
/// Each part is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` never collide.
#[must_use]
pub fn blake3_parts(parts: &[&[u8]]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().to_hex().to_string()
}

/// Abbreviate a hex digest to [`SHORT_DIGEST_LEN`] characters.
#[must_use]
pub fn short_digest(digest: &str) -> &str {
    &digest[..digest.len().min(SHORT_DIGEST_LEN)]
}
