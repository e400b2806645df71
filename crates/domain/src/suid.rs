//! Session-unique identifiers: RFC-4122 v4 UUIDs used for conversation ids,
//! transcript file names, and feedback submission names.

use uuid::Uuid;

/// Generate a new session-unique identifier.
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// Check whether `candidate` is a valid UUID (any RFC-4122 variant, not
/// just v4 — the upstream only ever hands back v4 but the gateway must
/// still accept whatever it was given on a round trip).
///
/// Fails silently: non-UUID input yields `false`, never an error.
pub fn is_valid(candidate: &str) -> bool {
    Uuid::parse_str(candidate).is_ok()
}
