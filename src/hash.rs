//! Hashing of set elements.
//!
//! Terraform keys set elements by a hash code rather than by position. A schema
//! may supply its own hash function; otherwise elements are hashed by content.

use crate::property::PropertyValue;
use crate::schema::SetHasher;
use sha2::{Digest, Sha256};

/// Hash a set element by content.
///
/// The element is serialized to canonical JSON (object keys sorted) and the
/// first four bytes of its SHA-256 digest are read as a non-negative integer.
pub fn default_set_hash(element: &PropertyValue) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(element.to_json().to_string().as_bytes());
    let digest = hasher.finalize();
    i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// Hash a set element with the schema's function, falling back to [`default_set_hash`].
pub fn set_element_hash(element: &PropertyValue, hasher: Option<SetHasher>) -> i64 {
    match hasher {
        Some(hasher) => hasher.hash(element),
        None => default_set_hash(element),
    }
}

/// The flattened-key fragment for a set element.
///
/// Wholly computed elements have no stable key. Elements that merely contain
/// computed values get a `~` prefix.
pub fn set_element_key(element: &PropertyValue, hasher: Option<SetHasher>) -> Option<String> {
    if element.is_computed() {
        return None;
    }
    let code = set_element_hash(element, hasher);
    if element.contains_computed() {
        Some(format!("~{}", code))
    } else {
        Some(code.to_string())
    }
}
