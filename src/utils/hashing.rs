//! Hashing utilities

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha1::{Digest, Sha1};
use xxhash_rust::xxh3::xxh3_64;

use crate::utils::normalize::slugify;

/// How much of a file participates in the content hash.
const CONTENT_HASH_WINDOW: u64 = 1024 * 1024;

/// SHA1 of a string, full 40-char lowercase hex.
pub fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

/// Content identity for files on filesystems without meaningful inodes:
/// the first 16 hex chars of the SHA1 of the first MiB.
pub fn file_content_hash(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut buf = Vec::new();
    file.take(CONTENT_HASH_WINDOW).read_to_end(&mut buf)?;
    let digest = Sha1::digest(&buf);
    Ok(hex::encode(digest)[..16].to_string())
}

/// Short non-cryptographic key for the dedupe fallback path component.
pub fn short_path_hash(path: &str) -> String {
    let hash = xxh3_64(path.to_lowercase().as_bytes());
    format!("{:016x}", hash)[..8].to_string()
}

/// Deterministic identity key for an album row. Never touched on disk; the
/// `.crate` segment keeps it out of any real artist directory namespace.
pub fn virtual_album_path(artist_path: &Path, album_title: &str) -> String {
    let slug = slugify(album_title);
    let slug = if slug.is_empty() { "album".to_string() } else { slug };
    let digest = &sha1_hex(album_title)[..8];
    format!("{}/.crate/{}-{}", artist_path.display(), slug, digest)
}
