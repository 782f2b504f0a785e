//! Shared types used throughout the library.

mod color;
pub mod transform;

pub use color::Color;

use uuid::Uuid;

/// Deterministic identifier for an exported entity.
///
/// Derived from the entity kind and name only, so the same logical entity
/// gets the same identifier on every export. Two entities of the same kind
/// with the same name share an identifier.
pub fn entity_uuid(kind: &str, name: &str) -> String {
    let identity = format!("{}(\"{}\")", kind, name);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, identity.as_bytes()).to_string()
}

/// Make an entity name safe for use as an identifier.
///
/// Every character outside `[A-Za-z0-9]` is replaced with `_`.
pub fn clean_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
