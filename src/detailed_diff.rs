//! Structural diffs computed directly from property values.
//!
//! Providers that never produce a Terraform instance diff still need a
//! detailed diff. [`compute_detailed_diff`] compares the prior state with the
//! new inputs location by location, using the schema to pair set elements by
//! identity and to decide which changes force replacement.

use crate::convert;
use crate::diff::{report, with_replace, DiffOptions};
use crate::error::BridgeError;
use crate::hash;
use crate::ignore_changes::IgnoreChanges;
use crate::property::{PropertyMap, PropertyPath, PropertyValue};
use crate::schema::Block;
use crate::schema_path::{lookup_schema_path, property_path_to_schema_path, SchemaNode};
use crate::types::{DiffKind, DiffResult};
use crate::walk::{walk_two_property_values, WalkSignal};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Diff `olds` (prior state) against `news` (new inputs).
///
/// Lists pair by index, sets by element hash, maps and objects by key and
/// scalars by value. A new value that is unknown counts as an update. A
/// change under a field marked `force_new` is reported as a replacement.
#[instrument(skip_all)]
pub fn compute_detailed_diff(
    block: &Block,
    olds: &PropertyMap,
    news: &PropertyMap,
    options: &DiffOptions,
) -> Result<DiffResult, BridgeError> {
    let ignore = IgnoreChanges::parse(&options.ignore_changes)?;
    let raw_names = options.raw_names;
    let mut reported = BTreeMap::new();

    let old_root = PropertyValue::Object(olds.clone());
    let new_root = PropertyValue::Object(news.clone());
    walk_two_property_values(&PropertyPath::new(), &old_root, &new_root, &mut |path, old, new| {
        if path.is_empty() {
            return Ok(WalkSignal::Continue);
        }
        if old == new {
            return Ok(WalkSignal::SkipChildren);
        }

        let kind = match (old, new) {
            (PropertyValue::Null, _) => DiffKind::Add,
            (_, PropertyValue::Null) => DiffKind::Delete,
            (_, PropertyValue::Computed) | (PropertyValue::Computed, _) => DiffKind::Update,
            (PropertyValue::Array(old_elems), PropertyValue::Array(new_elems)) => {
                let node = schema_node(block, path, raw_names);
                match node.filter(SchemaNode::is_set) {
                    Some(set) => {
                        for (elem_path, kind) in diff_set(&set, path, old_elems, new_elems)? {
                            let kind = with_replace(kind, forces_replacement(block, &elem_path, raw_names));
                            report(&mut reported, elem_path, kind);
                        }
                        return Ok(WalkSignal::SkipChildren);
                    },
                    None => return Ok(WalkSignal::Continue),
                }
            },
            (PropertyValue::Object(_), PropertyValue::Object(_)) => {
                return Ok(WalkSignal::Continue);
            },
            _ => DiffKind::Update,
        };

        let kind = with_replace(kind, forces_replacement(block, path, raw_names));
        debug!(path = %path, kind = ?kind, "property changed");
        report(&mut reported, path.clone(), kind);
        Ok(WalkSignal::SkipChildren)
    })?;

    let detailed_diff = reported
        .into_iter()
        .filter(|(path, _)| !ignore.suppresses(path, olds))
        .map(|(path, kind)| (path.to_string(), kind))
        .collect();
    Ok(DiffResult::from_detailed(detailed_diff))
}

fn schema_node<'a>(block: &'a Block, path: &PropertyPath, raw_names: bool) -> Option<SchemaNode<'a>> {
    let schema_path = match property_path_to_schema_path(path, block, raw_names) {
        Ok(schema_path) => schema_path,
        Err(err) => {
            debug!(path = %path, error = %err, "property not described by the schema");
            return None;
        },
    };
    lookup_schema_path(&schema_path, block).ok()
}

/// Whether a change at `path` forces replacement.
///
/// Only the field at `path` and its immediate parent count, and the parent
/// only when it is a collection. Editing a field inside an element of a
/// `force_new` block list updates in place; adding or removing the element
/// replaces.
fn forces_replacement(block: &Block, path: &PropertyPath, raw_names: bool) -> bool {
    let node = |path: &PropertyPath| {
        property_path_to_schema_path(path, block, raw_names)
            .ok()
            .and_then(|schema_path| lookup_schema_path(&schema_path, block).ok())
    };
    if node(path).is_some_and(|node| node.force_new()) {
        return true;
    }
    match path.parent() {
        Some(parent) if !parent.is_empty() => {
            node(&parent).is_some_and(|node| node.is_collection() && node.force_new())
        },
        _ => false,
    }
}

/// Pair set elements by hash; elements only in `olds` are deletions at their
/// old index and elements only in `news` additions at their new index.
fn diff_set(
    set: &SchemaNode<'_>,
    path: &PropertyPath,
    olds: &[PropertyValue],
    news: &[PropertyValue],
) -> Result<Vec<(PropertyPath, DiffKind)>, BridgeError> {
    let (elem_block, hasher) = match set {
        SchemaNode::NestedBlock(nested) => (Some(&nested.block), nested.set_hash),
        SchemaNode::Attribute(attr) => (None, attr.set_hash),
        _ => (None, None),
    };

    let keys = |elems: &[PropertyValue]| -> Result<Option<BTreeMap<String, usize>>, BridgeError> {
        let mut by_hash = BTreeMap::new();
        for (i, elem) in elems.iter().enumerate() {
            let elem = match elem_block {
                Some(block) if !elem.is_computed() => convert::to_terraform_names(block, elem)?,
                _ => elem.clone(),
            };
            match hash::set_element_key(&elem, hasher) {
                Some(key) => {
                    by_hash.entry(key).or_insert(i);
                },
                None => return Ok(None),
            }
        }
        Ok(Some(by_hash))
    };

    let (Some(old_keys), Some(new_keys)) = (keys(olds)?, keys(news)?) else {
        // An unknown element hides the set's membership.
        return Ok(vec![(path.clone(), DiffKind::Update)]);
    };

    let mut changes = Vec::new();
    for (key, i) in &new_keys {
        if !old_keys.contains_key(key) {
            changes.push((path.index(*i), DiffKind::Add));
        }
    }
    for (key, i) in &old_keys {
        if !new_keys.contains_key(key) {
            changes.push((path.index(*i), DiffKind::Delete));
        }
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::property_map_from_json;
    use crate::schema::{Attribute, AttributeFlags, AttributeType, NestedBlock};
    use crate::types::{DiffChanges, UNKNOWN_VALUE};
    use serde_json::json;

    fn map(value: serde_json::Value) -> PropertyMap {
        property_map_from_json(&value)
    }

    fn block() -> Block {
        Block::new()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("description", Attribute::optional_string())
            .with_block(
                "items",
                NestedBlock::list(Block::new().with_attribute("weight", Attribute::optional_int64())),
            )
            .with_block(
                "rule",
                NestedBlock::set(Block::new().with_attribute("from_port", Attribute::optional_int64())),
            )
            .with_block(
                "disk",
                NestedBlock::list(Block::new().with_attribute("size", Attribute::optional_int64()))
                    .with_force_new(),
            )
    }

    fn diff(olds: serde_json::Value, news: serde_json::Value) -> DiffResult {
        compute_detailed_diff(&block(), &map(olds), &map(news), &DiffOptions::new()).unwrap()
    }

    #[test]
    fn test_no_changes() {
        let state = json!({"name": "a", "items": [{"weight": 1}]});
        let result = diff(state.clone(), state);
        assert!(result.detailed_diff.is_empty());
        assert_eq!(result.changes, DiffChanges::None);
    }

    #[test]
    fn test_scalars_and_replacement() {
        let result = diff(
            json!({"name": "a", "description": "old"}),
            json!({"name": "b"}),
        );
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([
                ("description".to_string(), DiffKind::Delete),
                ("name".to_string(), DiffKind::UpdateReplace),
            ])
        );
        assert_eq!(result.changes, DiffChanges::SomeReplacing);
    }

    #[test]
    fn test_lists_pair_by_index() {
        let result = diff(
            json!({"items": [{"weight": 1}]}),
            json!({"items": [{"weight": 2}, {"weight": 3}]}),
        );
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([
                ("items[0].weight".to_string(), DiffKind::Update),
                ("items[1]".to_string(), DiffKind::Add),
            ])
        );
    }

    #[test]
    fn test_sets_pair_by_hash() {
        let result = diff(
            json!({"rules": [{"fromPort": 80}, {"fromPort": 443}]}),
            json!({"rules": [{"fromPort": 443}, {"fromPort": 22}]}),
        );
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([
                ("rules[0]".to_string(), DiffKind::Delete),
                ("rules[1]".to_string(), DiffKind::Add),
            ])
        );

        let reordered = diff(
            json!({"rules": [{"fromPort": 80}, {"fromPort": 443}]}),
            json!({"rules": [{"fromPort": 443}, {"fromPort": 80}]}),
        );
        assert!(reordered.detailed_diff.is_empty());
    }

    #[test]
    fn test_unknowns_are_updates() {
        let result = diff(json!({"description": "x"}), json!({"description": UNKNOWN_VALUE}));
        assert_eq!(result.detailed_diff["description"], DiffKind::Update);

        let result = diff(
            json!({"rules": [{"fromPort": 80}]}),
            json!({"rules": [UNKNOWN_VALUE]}),
        );
        assert_eq!(result.detailed_diff["rules"], DiffKind::Update);
    }

    #[test]
    fn test_force_new_collection_replaces_on_element_changes() {
        let result = diff(
            json!({"disks": [{"size": 10}]}),
            json!({"disks": [{"size": 20}, {"size": 30}]}),
        );
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([
                ("disks[0].size".to_string(), DiffKind::Update),
                ("disks[1]".to_string(), DiffKind::AddReplace),
            ])
        );
        assert_eq!(result.changes, DiffChanges::SomeReplacing);
    }

    #[test]
    fn test_force_new_only_reaches_direct_children() {
        let block = Block::new()
            .with_attribute(
                "tags",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::optional())
                    .with_force_new(),
            )
            .with_block(
                "outer",
                NestedBlock::list(Block::new().with_block(
                    "inner",
                    NestedBlock::list(Block::new().with_attribute("size", Attribute::optional_int64())),
                ))
                .with_force_new(),
            );
        let options = DiffOptions::new().with_raw_names(true);

        let result = compute_detailed_diff(
            &block,
            &map(json!({"tags": ["a"], "outer": [{"inner": [{"size": 1}]}]})),
            &map(json!({"tags": ["b"], "outer": [{"inner": [{"size": 2}, {"size": 3}]}]})),
            &options,
        )
        .unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([
                ("outer[0].inner[0].size".to_string(), DiffKind::Update),
                ("outer[0].inner[1]".to_string(), DiffKind::Add),
                ("tags[0]".to_string(), DiffKind::UpdateReplace),
            ])
        );
    }

    #[test]
    fn test_ignore_changes_and_unknown_properties() {
        let options = DiffOptions::new().with_ignore_changes(["description"]);
        let result = compute_detailed_diff(
            &block(),
            &map(json!({"description": "a", "extra": 1})),
            &map(json!({"description": "b", "extra": 2})),
            &options,
        )
        .unwrap();
        assert_eq!(
            result.detailed_diff,
            BTreeMap::from([("extra".to_string(), DiffKind::Update)])
        );
    }
}
