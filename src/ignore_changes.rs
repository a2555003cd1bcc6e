//! `ignoreChanges` resource option handling.
//!
//! An ignore path suppresses changes at that location and everything below
//! it. `*` matches any single key or index, but only among locations that
//! already exist in the prior state: an element appended by the new inputs is
//! never matched by a wildcard.

use crate::error::BridgeError;
use crate::property::{self, PathSegment, PropertyMap, PropertyPath, PropertyValue};
use std::collections::BTreeSet;

/// A parsed set of ignore paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreChanges {
    patterns: Vec<PropertyPath>,
}

impl IgnoreChanges {
    /// Create from already parsed paths.
    pub fn new(patterns: Vec<PropertyPath>) -> Self {
        Self { patterns }
    }

    /// Parse ignore path strings. Every malformed path is reported.
    pub fn parse<S: AsRef<str>>(paths: &[S]) -> Result<Self, BridgeError> {
        let mut patterns = Vec::with_capacity(paths.len());
        let mut errors = Vec::new();
        for (i, path) in paths.iter().enumerate() {
            match PropertyPath::parse(path.as_ref()) {
                Ok(p) => patterns.push(p),
                Err(_) => errors.push(format!(
                    "failed to parse property path {}: {}",
                    i,
                    path.as_ref()
                )),
            }
        }
        if !errors.is_empty() {
            return Err(BridgeError::InvalidPropertyPath(errors.join("; ")));
        }
        Ok(Self { patterns })
    }

    /// True when nothing is ignored.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The parsed paths.
    pub fn patterns(&self) -> &[PropertyPath] {
        &self.patterns
    }

    /// Whether a change at `path` is ignored.
    ///
    /// `olds` is the prior state; wildcard patterns only match locations that
    /// exist there.
    pub fn suppresses(&self, path: &PropertyPath, olds: &PropertyMap) -> bool {
        self.patterns.iter().any(|pattern| {
            if pattern.is_empty() || !pattern.covers(path) {
                return false;
            }
            if !pattern.has_wildcard() {
                return true;
            }
            let matched = PropertyPath::from(path.segments()[..pattern.len()].to_vec());
            property::lookup(olds, &matched).is_some_and(|v| !v.is_null())
        })
    }
}

/// Replace ignored locations of `news` with their values from `olds`.
///
/// A location present only in `olds` is copied into the result and one present
/// only in `news` is removed, but only when it is the last step of the path.
/// Paths that do not resolve on both sides are skipped.
pub fn apply_ignore_changes<S: AsRef<str>>(
    olds: &PropertyMap,
    news: &PropertyMap,
    paths: &[S],
) -> Result<PropertyMap, BridgeError> {
    let ignore = IgnoreChanges::parse(paths)?;

    let src = PropertyValue::Object(olds.clone());
    let mut dst = PropertyValue::Object(news.clone());
    for pattern in ignore.patterns() {
        // The root would replace the inputs wholesale.
        if pattern.is_empty() {
            continue;
        }
        apply_path(pattern.segments(), &src, &mut dst);
    }

    match dst {
        PropertyValue::Object(map) => Ok(map),
        _ => Ok(news.clone()),
    }
}

fn apply_path(path: &[PathSegment], src: &PropertyValue, dst: &mut PropertyValue) {
    let Some((first, rest)) = path.split_first() else {
        *dst = src.clone();
        return;
    };

    match first {
        PathSegment::Wildcard => {
            let expanded: Vec<PathSegment> = match (src, &*dst) {
                (PropertyValue::Array(items), PropertyValue::Array(_)) => {
                    (0..items.len()).map(PathSegment::Index).collect()
                },
                (PropertyValue::Object(s), PropertyValue::Object(d)) => s
                    .keys()
                    .chain(d.keys())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(|k| PathSegment::Key(k.clone()))
                    .collect(),
                _ => Vec::new(),
            };
            for segment in expanded {
                let mut concrete = Vec::with_capacity(path.len());
                concrete.push(segment);
                concrete.extend_from_slice(rest);
                apply_path(&concrete, src, dst);
            }
        },
        PathSegment::Key(key) => {
            let (PropertyValue::Object(s), PropertyValue::Object(d)) = (src, dst) else {
                return;
            };
            match (s.get(key), d.contains_key(key)) {
                (None, true) if rest.is_empty() => {
                    d.remove(key);
                },
                (Some(v), false) if rest.is_empty() => {
                    d.insert(key.clone(), v.clone());
                },
                (Some(v), true) => {
                    if let Some(dv) = d.get_mut(key) {
                        apply_path(rest, v, dv);
                    }
                },
                _ => {},
            }
        },
        PathSegment::Index(i) => {
            if let (PropertyValue::Array(s), PropertyValue::Array(d)) = (src, dst) {
                if let (Some(sv), Some(dv)) = (s.get(*i), d.get_mut(*i)) {
                    apply_path(rest, sv, dv);
                }
            }
        },
    }
}
