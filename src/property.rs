//! Pulumi-side property values and property paths.
//!
//! A [`PropertyValue`] is the JSON-like tree Pulumi hands to a provider, with
//! one extra case: a computed (unknown) value whose content is not yet known.
//! A [`PropertyPath`] addresses a location inside such a tree using Pulumi's
//! path syntax (`items[0].weight`, `tags["a.b"]`, `rules[*].port`).

use crate::error::BridgeError;
use crate::types::UNKNOWN_VALUE;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// An object payload: keys are unique and iterate in sorted order.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A Pulumi property value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropertyValue {
    /// The absent value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An arbitrary-precision number.
    Number(Number),
    /// A string.
    String(String),
    /// An ordered list of values.
    Array(Vec<PropertyValue>),
    /// A map of named values.
    Object(PropertyMap),
    /// A value that will only be known after the resource is updated.
    Computed,
}

impl PropertyValue {
    /// Returns true for [`PropertyValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for [`PropertyValue::Computed`].
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed)
    }

    /// Returns the array payload, if any.
    pub fn as_array(&self) -> Option<&Vec<PropertyValue>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the object payload, if any.
    pub fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// A short name for the kind of this value, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Computed => "computed",
        }
    }

    /// Returns true if this value or anything nested in it is computed.
    pub fn contains_computed(&self) -> bool {
        match self {
            Self::Computed => true,
            Self::Array(items) => items.iter().any(Self::contains_computed),
            Self::Object(map) => map.values().any(Self::contains_computed),
            _ => false,
        }
    }

    /// Convert a JSON value, mapping the unknown sentinel string to [`PropertyValue::Computed`].
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) if s == UNKNOWN_VALUE => Self::Computed,
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON, encoding computed values as the unknown sentinel string.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Computed => Value::String(UNKNOWN_VALUE.to_string()),
        }
    }

    /// Look up the value at `path`. Wildcard segments never resolve.
    pub fn get_path(&self, path: &PropertyPath) -> Option<&PropertyValue> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (PathSegment::Key(key), Self::Object(map)) => map.get(key)?,
                (PathSegment::Index(i), Self::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl From<&PropertyValue> for Value {
    fn from(value: &PropertyValue) -> Self {
        value.to_json()
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Self::from_json(&v))
    }
}

/// Look up `path` in a property map. The first segment must be a key.
pub fn lookup<'a>(map: &'a PropertyMap, path: &PropertyPath) -> Option<&'a PropertyValue> {
    let (first, rest) = path.segments().split_first()?;
    let PathSegment::Key(key) = first else {
        return None;
    };
    map.get(key)?.get_path(&PropertyPath::from(rest.to_vec()))
}

/// Convert a JSON object into a [`PropertyMap`]. Non-object values yield an empty map.
pub fn property_map_from_json(value: &Value) -> PropertyMap {
    match PropertyValue::from_json(value) {
        PropertyValue::Object(map) => map,
        _ => PropertyMap::new(),
    }
}

/// One step of a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
    /// `*`: any single key or index.
    Wildcard,
}

impl PathSegment {
    /// Whether this (pattern) segment matches the concrete segment `other`.
    pub fn matches(&self, other: &PathSegment) -> bool {
        match (self, other) {
            (Self::Wildcard, _) => true,
            (a, b) => a == b,
        }
    }
}

/// A location inside a property tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PropertyPath(Vec<PathSegment>);

impl PropertyPath {
    /// The empty path, addressing the root.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a path string such as `items[0].weight` or `tags["a.b"]`.
    pub fn parse(input: &str) -> Result<Self, BridgeError> {
        PathParser::new(input).parse()
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with `key` appended.
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(PathSegment::Key(key.into()))
    }

    /// A new path with `index` appended.
    pub fn index(&self, index: usize) -> Self {
        self.with(PathSegment::Index(index))
    }

    /// A new path with `segment` appended.
    pub fn with(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// The path without its last segment, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Whether this path contains a wildcard segment.
    pub fn has_wildcard(&self) -> bool {
        self.0.iter().any(|s| matches!(s, PathSegment::Wildcard))
    }

    /// Whether `self`, used as a pattern, matches `other` or one of its ancestors.
    ///
    /// `a.b` covers `a.b` and `a.b[0].c` but not `a` or `a.bc`.
    pub fn covers(&self, other: &PropertyPath) -> bool {
        self.0.len() <= other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(pattern, concrete)| pattern.matches(concrete))
    }
}

impl FromStr for PropertyPath {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<PathSegment>> for PropertyPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

fn is_simple_key(key: &str) -> bool {
    !key.is_empty() && key != "*" && !key.contains(['.', '[', ']', '"'])
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if is_simple_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                },
                // A bare `"*"` reads back as a wildcard, so a literal star key is escaped.
                PathSegment::Key(key) if key == "*" => f.write_str(r#"["\*"]"#)?,
                PathSegment::Key(key) => {
                    write!(f, "[\"{}\"]", key.replace('\\', "\\\\").replace('"', "\\\""))?;
                },
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Wildcard => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

struct PathParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> BridgeError {
        BridgeError::InvalidPropertyPath(format!(
            "{} in '{}' at offset {}",
            reason, self.input, self.pos
        ))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse(mut self) -> Result<PropertyPath, BridgeError> {
        if self.chars.is_empty() {
            return Err(self.error("empty path"));
        }

        let mut segments = Vec::new();
        if self.peek() != Some('[') {
            segments.push(self.bare_key()?);
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(self.bare_key()?);
                },
                '[' => {
                    self.pos += 1;
                    segments.push(self.bracketed()?);
                },
                _ => return Err(self.error("expected '.' or '['")),
            }
        }

        Ok(PropertyPath(segments))
    }

    fn bare_key(&mut self) -> Result<PathSegment, BridgeError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' {
                break;
            }
            if c == ']' || c == '"' {
                return Err(self.error("unexpected character in key"));
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("empty key"));
        }
        let key: String = self.chars[start..self.pos].iter().collect();
        if key == "*" {
            Ok(PathSegment::Wildcard)
        } else {
            Ok(PathSegment::Key(key))
        }
    }

    fn bracketed(&mut self) -> Result<PathSegment, BridgeError> {
        let segment = match self.peek() {
            Some('"') => {
                self.pos += 1;
                let mut key = String::new();
                let mut escaped = false;
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated quoted key")),
                        Some('\\') => {
                            escaped = true;
                            self.pos += 1;
                            match self.peek() {
                                Some(c) => key.push(c),
                                None => return Err(self.error("dangling escape")),
                            }
                        },
                        Some('"') => break,
                        Some(c) => key.push(c),
                    }
                    self.pos += 1;
                }
                self.pos += 1;
                if key == "*" && !escaped {
                    PathSegment::Wildcard
                } else {
                    PathSegment::Key(key)
                }
            },
            Some('*') => {
                self.pos += 1;
                PathSegment::Wildcard
            },
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(self.error("expected index, '*' or quoted key"));
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| self.error("index out of range"))?;
                PathSegment::Index(index)
            },
        };

        if self.peek() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        self.pos += 1;
        Ok(segment)
    }
}
