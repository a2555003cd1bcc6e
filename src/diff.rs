//! Translation of Terraform instance diffs into Pulumi detailed diffs.
//!
//! Terraform reports changes against flattened attribute keys such as
//! `items.0.weight` or `rules.1234567.port`, where set elements are keyed by
//! hash rather than position. Pulumi wants changes against property paths
//! such as `items[0].weight`. Walking the prior state and the new inputs
//! together with the schema recovers the property path behind every key.
//!
//! # Example
//!
//! ```
//! use tf_bridge_sdk::diff::{make_detailed_diff, DiffOptions};
//! use tf_bridge_sdk::property::property_map_from_json;
//! use tf_bridge_sdk::schema::{Attribute, Block};
//! use tf_bridge_sdk::types::{DiffKind, InstanceDiff, ResourceAttrDiff};
//! use serde_json::json;
//!
//! let block = Block::new().with_attribute("instance_type", Attribute::optional_string());
//! let olds = property_map_from_json(&json!({"instanceType": "t3.micro"}));
//! let news = property_map_from_json(&json!({"instanceType": "t3.large"}));
//! let tf_diff = InstanceDiff::new()
//!     .with_attribute("instance_type", ResourceAttrDiff::update("t3.micro", "t3.large"));
//!
//! let result = make_detailed_diff(&block, &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
//! assert_eq!(result.detailed_diff["instanceType"], DiffKind::Update);
//! ```

use crate::convert;
use crate::error::BridgeError;
use crate::hash;
use crate::ignore_changes::IgnoreChanges;
use crate::naming;
use crate::property::{self, PropertyMap, PropertyPath, PropertyValue};
use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Field, NestedBlock, SetHasher};
use crate::types::{DiffKind, DiffResult, InstanceDiff, ResourceAttrDiff};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};

/// Options for diff translation.
///
/// # Example
///
/// ```
/// use tf_bridge_sdk::diff::DiffOptions;
///
/// let options = DiffOptions::new()
///     .with_ignore_changes(["tags", "items[*].weight"])
///     .with_raw_names(false);
/// assert_eq!(options.ignore_changes.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOptions {
    /// Property paths whose changes are ignored.
    #[serde(default)]
    pub ignore_changes: Vec<String>,
    /// Property keys are Terraform names rather than Pulumi names.
    #[serde(default)]
    pub raw_names: bool,
}

impl DiffOptions {
    /// Create options with nothing ignored and Pulumi naming.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ignored property paths.
    pub fn with_ignore_changes<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_changes = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Use Terraform names as property keys.
    pub fn with_raw_names(mut self, raw_names: bool) -> Self {
        self.raw_names = raw_names;
        self
    }
}

/// The schema describing a value being visited.
#[derive(Debug, Clone, Copy)]
enum Node<'a> {
    Block(&'a Block),
    Attribute(&'a Attribute),
    Type(&'a AttributeType),
    Nested(&'a NestedBlock),
    Unknown,
}

impl<'a> Node<'a> {
    fn from_field(field: Field<'a>) -> Self {
        match field {
            Field::Attribute(attr) => Self::Attribute(attr),
            Field::Block(nested) => Self::Nested(nested),
        }
    }

    /// Collections that Pulumi sees as their single element.
    fn collapsed(self) -> bool {
        match self {
            Self::Attribute(attr) => attr.is_max_items_one(),
            Self::Nested(nested) => {
                nested.is_max_items_one() || nested.nesting_mode == BlockNestingMode::Single
            },
            _ => false,
        }
    }

    fn is_set(self) -> bool {
        match self {
            Self::Attribute(attr) => matches!(attr.attr_type, AttributeType::Set(_)),
            Self::Type(ty) => matches!(ty, AttributeType::Set(_)),
            Self::Nested(nested) => nested.nesting_mode == BlockNestingMode::Set,
            _ => false,
        }
    }

    fn is_list(self) -> bool {
        match self {
            Self::Attribute(attr) => matches!(attr.attr_type, AttributeType::List(_)),
            Self::Type(ty) => matches!(ty, AttributeType::List(_)),
            Self::Nested(nested) => nested.nesting_mode == BlockNestingMode::List,
            _ => false,
        }
    }

    fn is_keyed(self) -> bool {
        match self {
            Self::Attribute(attr) => {
                matches!(attr.attr_type, AttributeType::Map(_) | AttributeType::Object(_))
            },
            Self::Type(ty) => matches!(ty, AttributeType::Map(_) | AttributeType::Object(_)),
            Self::Nested(nested) => nested.nesting_mode == BlockNestingMode::Map,
            Self::Block(_) | Self::Unknown => false,
        }
    }

    fn set_hash(self) -> Option<SetHasher> {
        match self {
            Self::Attribute(attr) => attr.set_hash,
            Self::Nested(nested) => nested.set_hash,
            _ => None,
        }
    }

    /// The node describing elements of this collection.
    fn element(self) -> Node<'a> {
        match self {
            Self::Attribute(attr) => attr.attr_type.element_type().map_or(Self::Unknown, Self::Type),
            Self::Type(ty) => ty.element_type().map_or(Self::Unknown, Self::Type),
            Self::Nested(nested) => Self::Block(&nested.block),
            _ => Self::Unknown,
        }
    }

    /// The Terraform name and node behind the object key `key`.
    fn child(self, key: &str, raw_names: bool) -> (String, Node<'a>) {
        let node = match self {
            Self::Block(block) => {
                return match naming::terraform_field(block, key, raw_names) {
                    Some((name, field)) => (name.to_string(), Self::from_field(field)),
                    None => (key.to_string(), Self::Unknown),
                };
            },
            Self::Attribute(attr) => type_child(&attr.attr_type, key),
            Self::Type(ty) => type_child(ty, key),
            Self::Nested(nested) if nested.nesting_mode == BlockNestingMode::Map => {
                Self::Block(&nested.block)
            },
            _ => Self::Unknown,
        };
        (key.to_string(), node)
    }
}

fn type_child<'a>(ty: &'a AttributeType, key: &str) -> Node<'a> {
    match ty {
        AttributeType::Map(elem) => Node::Type(elem.as_ref()),
        AttributeType::Object(attrs) => attrs.get(key).map_or(Node::Unknown, Node::Type),
        _ => Node::Unknown,
    }
}

/// Visit every value of `props` with its Terraform key and property path.
fn visit_properties<F>(block: &Block, props: &PropertyMap, raw_names: bool, visitor: &mut F)
where
    F: FnMut(&str, &PropertyPath, &PropertyValue),
{
    let root = Node::Block(block);
    for (key, value) in props {
        let (name, node) = root.child(key, raw_names);
        visit_property(&name, &PropertyPath::new().key(key.as_str()), value, node, raw_names, visitor);
    }
}

fn visit_property<F>(
    key: &str,
    path: &PropertyPath,
    value: &PropertyValue,
    node: Node<'_>,
    raw_names: bool,
    visitor: &mut F,
) where
    F: FnMut(&str, &PropertyPath, &PropertyValue),
{
    let collapsed = node.collapsed();
    let wrapped;
    let value = if collapsed {
        wrapped = match value {
            PropertyValue::Null => PropertyValue::Array(Vec::new()),
            v => PropertyValue::Array(vec![v.clone()]),
        };
        &wrapped
    } else {
        value
    };

    visitor(key, path, value);

    match value {
        PropertyValue::Array(items) => {
            let elem = node.element();
            for (i, item) in items.iter().enumerate() {
                let item_path = if collapsed { path.clone() } else { path.index(i) };
                let mut fragment = i.to_string();
                if node.is_set() {
                    match set_fragment(item, elem, node.set_hash()) {
                        Ok(Some(hashed)) => fragment = hashed,
                        Ok(None) => {},
                        Err(err) => {
                            warn!(path = %item_path, error = %err, "cannot hash set element");
                            return;
                        },
                    }
                }
                let item_key = format!("{}.{}", key, fragment);
                visit_property(&item_key, &item_path, item, elem, raw_names, visitor);
            }
        },
        PropertyValue::Object(entries) => {
            for (k, item) in entries {
                let (name, child) = node.child(k, raw_names);
                let item_key = format!("{}.{}", key, name);
                visit_property(&item_key, &path.key(k.as_str()), item, child, raw_names, visitor);
            }
        },
        _ => {},
    }
}

/// The key fragment Terraform uses for a set element.
fn set_fragment(
    item: &PropertyValue,
    elem: Node<'_>,
    hasher: Option<SetHasher>,
) -> Result<Option<String>, BridgeError> {
    let item = match elem {
        Node::Block(block) if !item.is_computed() => Cow::Owned(convert::to_terraform_names(block, item)?),
        _ => Cow::Borrowed(item),
    };
    Ok(hash::set_element_key(&item, hasher))
}

/// Where a Terraform key was found on each side.
#[derive(Debug, Default)]
struct Located {
    old: Option<PropertyPath>,
    new: Option<PropertyPath>,
}

/// Terraform attribute key to property paths in the prior state and the new inputs.
struct KeyIndex {
    entries: BTreeMap<String, Located>,
}

impl KeyIndex {
    fn build(block: &Block, olds: &PropertyMap, news: &PropertyMap, raw_names: bool) -> Self {
        let mut entries: BTreeMap<String, Located> = BTreeMap::new();
        visit_properties(block, olds, raw_names, &mut |key, path, value| {
            if !value.is_null() {
                entries
                    .entry(key.to_string())
                    .or_default()
                    .old
                    .get_or_insert_with(|| path.clone());
            }
        });
        visit_properties(block, news, raw_names, &mut |key, path, value| {
            if !value.is_null() {
                entries
                    .entry(key.to_string())
                    .or_default()
                    .new
                    .get_or_insert_with(|| path.clone());
            }
        });
        Self { entries }
    }

    fn path(&self, key: &str) -> Option<&PropertyPath> {
        self.entries
            .get(key)
            .and_then(|l| l.new.as_ref().or(l.old.as_ref()))
    }

    /// The shallowest ancestor of `key` (or `key` itself) present on one side
    /// but not the other, as a path on the side where it is present.
    fn shallowest_unmatched(&self, key: &str, in_olds: bool) -> Option<PropertyPath> {
        let mut end = 0;
        loop {
            end = key[end..].find('.').map_or(key.len(), |i| end + i);
            if let Some(located) = self.entries.get(&key[..end]) {
                let (ours, theirs) = if in_olds {
                    (&located.old, &located.new)
                } else {
                    (&located.new, &located.old)
                };
                if let (Some(path), None) = (ours, theirs) {
                    return Some(path.clone());
                }
            }
            if end == key.len() {
                return None;
            }
            end += 1;
        }
    }
}

/// A Terraform key translated by walking the schema alone.
struct ParsedKey<'a> {
    path: PropertyPath,
    node: Node<'a>,
    /// The key names a map entry or something the schema does not know.
    specific: bool,
    /// Translation stopped at a set, whose elements cannot be located by key.
    truncated: bool,
}

fn parse_tf_key<'a>(key: &str, block: &'a Block, raw_names: bool) -> ParsedKey<'a> {
    let mut parsed = ParsedKey {
        path: PropertyPath::new(),
        node: Node::Block(block),
        specific: false,
        truncated: false,
    };

    for part in key.split('.') {
        if part == "#" || part == "%" {
            break;
        }
        let node = parsed.node;
        match node {
            Node::Block(b) => match b.field(part) {
                Some(field) => {
                    parsed.path = parsed.path.key(naming::property_name(b, part, raw_names));
                    parsed.node = Node::from_field(field);
                },
                None => {
                    parsed.path = parsed.path.key(part);
                    parsed.node = Node::Unknown;
                    parsed.specific = true;
                },
            },
            _ if node.is_set() => {
                parsed.truncated = true;
                break;
            },
            _ if node.is_list() || node.collapsed() => {
                if !node.collapsed() {
                    match part.parse::<usize>() {
                        Ok(i) => parsed.path = parsed.path.index(i),
                        Err(_) => {
                            parsed.truncated = true;
                            break;
                        },
                    }
                }
                parsed.node = node.element();
            },
            _ if node.is_keyed() => {
                parsed.path = parsed.path.key(part);
                parsed.node = node.child(part, true).1;
                parsed.specific = true;
            },
            _ => {
                match part.parse::<usize>() {
                    Ok(i) => parsed.path = parsed.path.index(i),
                    Err(_) => parsed.path = parsed.path.key(part),
                }
                parsed.node = Node::Unknown;
                parsed.specific = true;
            },
        }
    }
    parsed
}

/// Split a count key (`items.#`, `labels.%`) into its collection key and marker.
fn count_key(key: &str) -> Option<(&str, char)> {
    key.strip_suffix(".#")
        .map(|base| (base, '#'))
        .or_else(|| key.strip_suffix(".%").map(|base| (base, '%')))
}

/// Whether the change at `key` or a collection enclosing it forces replacement.
fn requires_new(tf_diff: &InstanceDiff, key: &str, attr: &ResourceAttrDiff) -> bool {
    if attr.requires_new {
        return true;
    }
    key.match_indices('.').any(|(i, _)| {
        let prefix = &key[..i];
        ["#", "%"].iter().any(|marker| {
            tf_diff
                .attribute(&format!("{}.{}", prefix, marker))
                .is_some_and(|count| count.requires_new)
        })
    })
}

fn present(map: &PropertyMap, path: &PropertyPath) -> bool {
    property::lookup(map, path).is_some_and(|v| !v.is_null())
}

pub(crate) fn report(reported: &mut BTreeMap<PropertyPath, DiffKind>, path: PropertyPath, kind: DiffKind) {
    reported
        .entry(path)
        .and_modify(|existing| {
            if kind.is_replace() {
                *existing = existing.to_replace();
            }
        })
        .or_insert(kind);
}

pub(crate) fn with_replace(kind: DiffKind, replace: bool) -> DiffKind {
    if replace {
        kind.to_replace()
    } else {
        kind
    }
}

/// Collect the Terraform keys of every location an ignore path suppresses.
///
/// Both sides are visited, but wildcard patterns only match locations in
/// `olds`.
pub fn ignored_attribute_keys(
    block: &Block,
    olds: &PropertyMap,
    news: &PropertyMap,
    ignore: &IgnoreChanges,
    raw_names: bool,
) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    if ignore.is_empty() {
        return keys;
    }
    let mut collect = |key: &str, path: &PropertyPath, _: &PropertyValue| {
        if ignore.suppresses(path, olds) {
            keys.insert(key.to_string());
        }
    };
    visit_properties(block, olds, raw_names, &mut collect);
    visit_properties(block, news, raw_names, &mut collect);
    keys
}

/// Translate `tf_diff` into a Pulumi detailed diff.
///
/// `olds` is the prior state and `news` the new inputs, both keyed by Pulumi
/// names unless [`DiffOptions::raw_names`] is set. Ignored paths are stripped
/// from the instance diff first and never appear in the result.
#[instrument(skip_all, fields(entries = tf_diff.attributes.len()))]
pub fn make_detailed_diff(
    block: &Block,
    olds: &PropertyMap,
    news: &PropertyMap,
    tf_diff: &InstanceDiff,
    options: &DiffOptions,
) -> Result<DiffResult, BridgeError> {
    let raw_names = options.raw_names;
    let ignore = IgnoreChanges::parse(&options.ignore_changes)?;

    let tf_diff = if ignore.is_empty() {
        Cow::Borrowed(tf_diff)
    } else {
        let ignored = ignored_attribute_keys(block, olds, news, &ignore, raw_names);
        debug!(keys = ?ignored, "ignoring attribute keys");
        let mut stripped = tf_diff.clone();
        stripped.ignore_changes(&ignored);
        Cow::Owned(stripped)
    };

    let index = KeyIndex::build(block, olds, news, raw_names);
    let mut reported = BTreeMap::new();

    let resolve = |key: &str| {
        let mut parsed = parse_tf_key(key, block, raw_names);
        if let Some(path) = index.path(key) {
            parsed.path = path.clone();
        }
        parsed
    };

    // Collections whose contents become unknown are reported as a whole.
    let mut opaque = Vec::new();
    for (key, attr) in &tf_diff.attributes {
        let Some((base, _)) = count_key(key) else {
            continue;
        };
        if !attr.new_computed {
            continue;
        }
        let path = resolve(base).path;
        let kind = with_replace(DiffKind::Update, requires_new(&tf_diff, key, attr));
        debug!(key = %key, path = %path, kind = ?kind, "collection becomes unknown");
        opaque.push(path.clone());
        report(&mut reported, path, kind);
    }

    for (key, attr) in &tf_diff.attributes {
        if count_key(key).is_some() || !attr.is_change() {
            continue;
        }
        let replace = requires_new(&tf_diff, key, attr);

        let translated = match index.entries.get(key.as_str()) {
            Some(located) if attr.new_removed || (located.new.is_none() && !attr.new_computed) => {
                index
                    .shallowest_unmatched(key, true)
                    .or_else(|| located.old.clone())
                    .or_else(|| located.new.clone())
                    .map(|path| (path, DiffKind::Delete))
            },
            Some(Located { old: None, new: Some(new) }) => Some((
                index
                    .shallowest_unmatched(key, false)
                    .unwrap_or_else(|| new.clone()),
                DiffKind::Add,
            )),
            Some(located) => located
                .new
                .clone()
                .or_else(|| located.old.clone())
                .map(|path| (path, DiffKind::Update)),
            None => None,
        };

        let (path, kind) = match translated {
            Some(found) => found,
            None => {
                let parsed = parse_tf_key(key, block, raw_names);
                let kind = match (present(olds, &parsed.path), present(news, &parsed.path)) {
                    _ if attr.new_removed => DiffKind::Delete,
                    (false, true) => DiffKind::Add,
                    (false, false) if parsed.specific && attr.old.is_empty() => DiffKind::Add,
                    _ => DiffKind::Update,
                };
                (parsed.path, kind)
            },
        };

        if opaque.iter().any(|collection: &PropertyPath| collection.covers(&path)) {
            continue;
        }
        let kind = with_replace(kind, replace);
        debug!(key = %key, path = %path, kind = ?kind, "translated attribute diff");
        report(&mut reported, path, kind);
    }

    for (key, attr) in &tf_diff.attributes {
        let Some((base, marker)) = count_key(key) else {
            continue;
        };
        if attr.new_computed || !attr.is_change() {
            continue;
        }
        let parsed = resolve(base);
        let path = parsed.path;
        if reported
            .keys()
            .any(|other: &PropertyPath| path.covers(other) || other.covers(&path))
        {
            continue;
        }
        let replace = requires_new(&tf_diff, key, attr);

        let counts = (attr.old.parse::<usize>(), attr.new.parse::<usize>());
        let indexed = marker == '#' && !parsed.truncated && parsed.node.is_list() && !parsed.node.collapsed();
        match counts {
            (Ok(old), Ok(new)) if indexed && old != new => {
                let kind = if new > old { DiffKind::Add } else { DiffKind::Delete };
                for i in old.min(new)..old.max(new) {
                    report(&mut reported, path.index(i), with_replace(kind, replace));
                }
            },
            _ => {
                let kind = match (present(olds, &path), present(news, &path)) {
                    _ if attr.new_removed => DiffKind::Delete,
                    (false, true) => DiffKind::Add,
                    (true, false) => DiffKind::Delete,
                    _ => DiffKind::Update,
                };
                report(&mut reported, path, with_replace(kind, replace));
            },
        }
    }

    let detailed_diff = reported
        .into_iter()
        .filter(|(path, _)| !ignore.suppresses(path, olds))
        .map(|(path, kind)| (path.to_string(), kind))
        .collect();
    Ok(DiffResult::from_detailed(detailed_diff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::property_map_from_json;
    use crate::types::DiffChanges;
    use serde_json::json;

    fn map(value: serde_json::Value) -> PropertyMap {
        property_map_from_json(&value)
    }

    fn items_block() -> Block {
        Block::new().with_block(
            "items",
            NestedBlock::list(Block::new().with_attribute("weight", Attribute::optional_int64())),
        )
    }

    fn port_hash(element: &PropertyValue) -> i64 {
        match element.as_object().and_then(|o| o.get("from_port")) {
            Some(PropertyValue::Number(n)) => n.as_i64().unwrap_or_default(),
            _ => 0,
        }
    }

    fn rule_block() -> Block {
        Block::new().with_block(
            "rule",
            NestedBlock::set(
                Block::new()
                    .with_attribute("from_port", Attribute::optional_int64())
                    .with_attribute("cidr", Attribute::optional_string()),
            )
            .with_set_hash(port_hash),
        )
    }

    #[test]
    fn test_ignore_changes_end_to_end() {
        let olds = map(json!({"items": [{"weight": 200}]}));
        let news = map(json!({"items": [{"weight": 100}]}));
        let tf_diff = InstanceDiff::new()
            .with_attribute("items.0.weight", ResourceAttrDiff::update("200", "100"));

        let result = make_detailed_diff(&items_block(), &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(result.detailed_diff["items[0].weight"], DiffKind::Update);
        assert_eq!(result.changes, DiffChanges::Some);

        let options = DiffOptions::new().with_ignore_changes(["items[0].weight"]);
        let result = make_detailed_diff(&items_block(), &olds, &news, &tf_diff, &options).unwrap();
        assert!(result.detailed_diff.is_empty());
        assert_eq!(result.changes, DiffChanges::None);
    }

    #[test]
    fn test_list_growth_reports_new_element() {
        let olds = map(json!({"items": [{"weight": 1}]}));
        let news = map(json!({"items": [{"weight": 1}, {"weight": 2}]}));
        let tf_diff = InstanceDiff::new()
            .with_attribute("items.#", ResourceAttrDiff::update("1", "2").with_requires_new())
            .with_attribute("items.1.weight", ResourceAttrDiff::update("", "2"));

        let result = make_detailed_diff(&items_block(), &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([("items[1]".to_string(), DiffKind::AddReplace)])
        );
        assert_eq!(result.changes, DiffChanges::SomeReplacing);
    }

    #[test]
    fn test_list_shrink_reports_removed_element() {
        let olds = map(json!({"items": [{"weight": 1}, {"weight": 2}]}));
        let news = map(json!({"items": [{"weight": 1}]}));
        let tf_diff = InstanceDiff::new()
            .with_attribute("items.#", ResourceAttrDiff::update("2", "1"))
            .with_attribute("items.1.weight", ResourceAttrDiff::removed("2"));

        let result = make_detailed_diff(&items_block(), &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([("items[1]".to_string(), DiffKind::Delete)])
        );
    }

    #[test]
    fn test_count_only_change() {
        let olds = map(json!({"items": [{"weight": 1}]}));
        let news = map(json!({"items": []}));
        let tf_diff = InstanceDiff::new().with_attribute("items.#", ResourceAttrDiff::update("1", "0"));

        let result = make_detailed_diff(&items_block(), &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([("items[0]".to_string(), DiffKind::Delete)])
        );
    }

    #[test]
    fn test_set_elements_located_by_hash() {
        let olds = map(json!({"rules": [{"fromPort": 80, "cidr": "a"}]}));
        let news = map(json!({"rules": [{"fromPort": 22, "cidr": "b"}, {"fromPort": 80, "cidr": "c"}]}));
        let tf_diff = InstanceDiff::new()
            .with_attribute("rule.#", ResourceAttrDiff::update("1", "2"))
            .with_attribute("rule.80.cidr", ResourceAttrDiff::update("a", "c"))
            .with_attribute("rule.22.from_port", ResourceAttrDiff::update("", "22"))
            .with_attribute("rule.22.cidr", ResourceAttrDiff::update("", "b"));

        let result = make_detailed_diff(&rule_block(), &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([
                ("rules[0]".to_string(), DiffKind::Add),
                ("rules[1].cidr".to_string(), DiffKind::Update),
            ])
        );
    }

    #[test]
    fn test_computed_collection_reported_whole() {
        let block = Block::new().with_attribute(
            "tags",
            Attribute::new(
                AttributeType::map(AttributeType::String),
                crate::schema::AttributeFlags::optional(),
            ),
        );
        let olds = map(json!({"tags": {"env": "dev"}}));
        let news = map(json!({"tags": crate::types::UNKNOWN_VALUE}));
        let tf_diff = InstanceDiff::new()
            .with_attribute("tags.%", ResourceAttrDiff::computed("1"))
            .with_attribute("tags.env", ResourceAttrDiff::removed("dev"));

        let result = make_detailed_diff(&block, &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([("tags".to_string(), DiffKind::Update)])
        );
    }

    #[test]
    fn test_replacement_and_outputs() {
        let block = Block::new()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("arn", Attribute::computed_string());
        let olds = map(json!({"name": "a", "arn": "arn:1"}));
        let news = map(json!({"name": "b"}));
        let tf_diff = InstanceDiff::new()
            .with_attribute("name", ResourceAttrDiff::update("a", "b").with_requires_new())
            .with_attribute("arn", ResourceAttrDiff::computed("arn:1"));

        let result = make_detailed_diff(&block, &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(result.detailed_diff["name"], DiffKind::UpdateReplace);
        assert_eq!(result.detailed_diff["arn"], DiffKind::Update);
        assert_eq!(result.changes, DiffChanges::SomeReplacing);
    }

    #[test]
    fn test_removed_attribute() {
        let block = Block::new().with_attribute("description", Attribute::optional_string());
        let olds = map(json!({"description": "old"}));
        let news = map(json!({}));
        let tf_diff = InstanceDiff::new().with_attribute("description", ResourceAttrDiff::removed("old"));

        let result = make_detailed_diff(&block, &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(result.detailed_diff["description"], DiffKind::Delete);
    }

    #[test]
    fn test_max_items_one_paths_are_collapsed() {
        let block = Block::new().with_block(
            "settings",
            NestedBlock::list(Block::new().with_attribute("tier", Attribute::optional_string()))
                .with_max_items(1),
        );
        let olds = map(json!({"settings": {"tier": "a"}}));
        let news = map(json!({"settings": {"tier": "b"}}));
        let tf_diff = InstanceDiff::new().with_attribute("settings.0.tier", ResourceAttrDiff::update("a", "b"));

        let result = make_detailed_diff(&block, &olds, &news, &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(result.detailed_diff["settings.tier"], DiffKind::Update);

        // Keys absent from both sides are translated through the schema.
        let result = make_detailed_diff(&block, &map(json!({})), &map(json!({})), &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(result.detailed_diff["settings.tier"], DiffKind::Update);
    }

    #[test]
    fn test_unlocated_map_key_is_an_add() {
        let block = Block::new().with_attribute(
            "labels",
            Attribute::new(
                AttributeType::map(AttributeType::String),
                crate::schema::AttributeFlags::optional_computed(),
            ),
        );
        let tf_diff = InstanceDiff::new().with_attribute("labels.team", ResourceAttrDiff::update("", "core"));

        let result = make_detailed_diff(&block, &map(json!({})), &map(json!({})), &tf_diff, &DiffOptions::new()).unwrap();
        assert_eq!(result.detailed_diff["labels.team"], DiffKind::Add);
    }

    #[test]
    fn test_raw_names() {
        let block = Block::new().with_attribute("instance_type", Attribute::optional_string());
        let olds = map(json!({"instance_type": "a"}));
        let news = map(json!({"instance_type": "b"}));
        let tf_diff = InstanceDiff::new().with_attribute("instance_type", ResourceAttrDiff::update("a", "b"));

        let options = DiffOptions::new().with_raw_names(true);
        let result = make_detailed_diff(&block, &olds, &news, &tf_diff, &options).unwrap();
        assert_eq!(result.detailed_diff["instance_type"], DiffKind::Update);
    }

    #[test]
    fn test_wildcard_does_not_hide_appended_elements() {
        let olds = map(json!({"items": [{"weight": 1}]}));
        let news = map(json!({"items": [{"weight": 5}, {"weight": 2}]}));
        let tf_diff = InstanceDiff::new()
            .with_attribute("items.#", ResourceAttrDiff::update("1", "2"))
            .with_attribute("items.0.weight", ResourceAttrDiff::update("1", "5"))
            .with_attribute("items.1.weight", ResourceAttrDiff::update("", "2"));

        let options = DiffOptions::new().with_ignore_changes(["items[*].weight"]);
        let result = make_detailed_diff(&items_block(), &olds, &news, &tf_diff, &options).unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([("items[1]".to_string(), DiffKind::Add)])
        );
    }

    #[test]
    fn test_ignored_attribute_keys() {
        let olds = map(json!({"items": [{"weight": 1}], "rules": []}));
        let news = map(json!({"items": [{"weight": 2}]}));
        let ignore = IgnoreChanges::parse(&["items"]).unwrap();

        let keys = ignored_attribute_keys(&items_block(), &olds, &news, &ignore, false);
        assert!(keys.contains("items"));
        assert!(keys.contains("items.0.weight"));

        let mut tf_diff = InstanceDiff::new()
            .with_attribute("items.#", ResourceAttrDiff::update("1", "1"))
            .with_attribute("items.0.weight", ResourceAttrDiff::update("1", "2"));
        tf_diff.ignore_changes(&keys);
        assert!(tf_diff.attributes.is_empty());
    }

    #[test]
    fn test_bad_ignore_path() {
        let options = DiffOptions::new().with_ignore_changes(["items["]);
        let err = make_detailed_diff(&items_block(), &map(json!({})), &map(json!({})), &InstanceDiff::new(), &options)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidPropertyPath(_)));
    }

    #[test]
    fn test_options_deserialize() {
        let options: DiffOptions =
            serde_json::from_value(json!({"ignoreChanges": ["tags"], "rawNames": true})).unwrap();
        assert_eq!(options, DiffOptions::new().with_ignore_changes(["tags"]).with_raw_names(true));
    }
}
