//! Co-traversal of two property trees.
//!
//! [`walk_two_property_values`] visits every location present in either of two
//! values, parents before children, handing the visitor both sides. A missing
//! side is presented as null.

use crate::error::BridgeError;
use crate::property::{PropertyPath, PropertyValue};
use std::collections::BTreeSet;

/// What the walker should do after visiting a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkSignal {
    /// Descend into the children of this location.
    Continue,
    /// Do not descend below this location; siblings are still visited.
    SkipChildren,
}

/// Walk `left` and `right` together, starting at `path`.
///
/// * The visitor runs before any child of the current location.
/// * Arrays are visited index by index up to the longer length.
/// * Objects are visited over the union of their keys in sorted order.
/// * Nothing below a null (or computed) value on either side is visited.
/// * Shapes that cannot be aligned (an array against an object or a
///   scalar) fail with [`BridgeError::TypeMismatch`] at that path.
///
/// Errors returned by the visitor stop the walk and are returned as-is.
pub fn walk_two_property_values<F>(
    path: &PropertyPath,
    left: &PropertyValue,
    right: &PropertyValue,
    visitor: &mut F,
) -> Result<(), BridgeError>
where
    F: FnMut(&PropertyPath, &PropertyValue, &PropertyValue) -> Result<WalkSignal, BridgeError>,
{
    if visitor(path, left, right)? == WalkSignal::SkipChildren {
        return Ok(());
    }

    if left.is_null() || right.is_null() || left.is_computed() || right.is_computed() {
        return Ok(());
    }

    match (left, right) {
        (PropertyValue::Array(l), PropertyValue::Array(r)) => {
            for i in 0..l.len().max(r.len()) {
                let lv = l.get(i).unwrap_or(&PropertyValue::Null);
                let rv = r.get(i).unwrap_or(&PropertyValue::Null);
                walk_two_property_values(&path.index(i), lv, rv, visitor)?;
            }
            Ok(())
        },
        (PropertyValue::Object(l), PropertyValue::Object(r)) => {
            let keys: BTreeSet<&String> = l.keys().chain(r.keys()).collect();
            for key in keys {
                let lv = l.get(key).unwrap_or(&PropertyValue::Null);
                let rv = r.get(key).unwrap_or(&PropertyValue::Null);
                walk_two_property_values(&path.key(key.as_str()), lv, rv, visitor)?;
            }
            Ok(())
        },
        (PropertyValue::Array(_) | PropertyValue::Object(_), _)
        | (_, PropertyValue::Array(_) | PropertyValue::Object(_)) => {
            Err(BridgeError::TypeMismatch {
                path: path.to_string(),
                left: left.kind_name(),
                right: right.kind_name(),
            })
        },
        _ => Ok(()),
    }
}
