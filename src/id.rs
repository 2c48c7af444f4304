//! Unique identifier generation shared by every scheduling artifact.

/// Identifier type used for workers, tasks, and protocols.
pub type Id = String;

/// Generates a new unique identifier.
///
/// When `prefix` is non-empty the result is `"<prefix>-<uuid4>"`; otherwise it
/// is a bare UUIDv4 string.
pub fn generate_id(prefix: &str) -> Id {
    let uuid = uuid::Uuid::new_v4();
    if prefix.is_empty() {
        uuid.to_string()
    } else {
        format!("{prefix}-{uuid}")
    }
}
