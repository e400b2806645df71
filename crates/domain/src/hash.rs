//! Shared hashing helper: the transcript writer (§4.K) shards by
//! `sha256(user_id)` so a single user's turns live under one directory
//! without leaking the raw user id into the filesystem layout.

use sha2::{Digest, Sha256};

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Strip leading path separators and reject `..` components so a
/// path segment derived from user input can't escape the storage root.
pub fn sanitize_path_component(component: &str) -> String {
    component
        .trim_start_matches(['/', '\\'])
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "..")
        .collect::<Vec<_>>()
        .join("_")
}
