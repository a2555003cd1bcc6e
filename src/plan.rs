//! Prediction of planned state from prior state and configuration.
//!
//! [`proposed_new`] merges a resource's prior state with its configuration the
//! way Terraform core does before the provider customizes the plan. Where the
//! configuration says something it wins. Computed attributes the
//! configuration leaves out keep their prior value, and nested blocks are
//! paired element by element according to their nesting mode.
//!
//! # Example
//!
//! ```
//! use tf_bridge_sdk::plan::propose_property_value;
//! use tf_bridge_sdk::property::PropertyValue;
//! use tf_bridge_sdk::schema::{Attribute, Block};
//! use serde_json::json;
//!
//! let block = Block::new()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("arn", Attribute::computed_string());
//!
//! let prior = PropertyValue::from(json!({"name": "old", "arn": "arn:1"}));
//! let config = PropertyValue::from(json!({"name": "new"}));
//!
//! let planned = propose_property_value(&block, &prior, &config).unwrap();
//! assert_eq!(planned, PropertyValue::from(json!({"name": "new", "arn": "arn:1"})));
//! ```

use crate::convert;
use crate::cty::{DynamicValue, Value};
use crate::error::BridgeError;
use crate::property::{PropertyPath, PropertyValue};
use crate::schema::{Attribute, Block, BlockNestingMode, NestedBlock};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

static NULL: Value = Value::Null;

/// Compute the proposed new value of an object conforming to `block`.
///
/// A null or unknown `config` yields `prior` unchanged. A null `prior` plans
/// the object as if every attribute were previously null.
pub fn proposed_new(block: &Block, prior: &Value, config: &Value) -> Value {
    if config.is_null() || !config.is_known() {
        return prior.clone();
    }
    plan_block(block, prior, config, &PropertyPath::new())
}

/// Plan over values in their protocol envelope.
///
/// Both inputs are decoded against the block's implied type and the planned
/// value is encoded the same way. Decode and encode failures name the value
/// that could not be converted.
#[instrument(skip_all)]
pub fn plan_proposed_new(
    block: &Block,
    prior: &DynamicValue,
    config: &DynamicValue,
) -> Result<DynamicValue, BridgeError> {
    let ty = block.implied_type();
    let prior = prior
        .decode(&ty)
        .map_err(|e| e.in_context("prior state from its envelope"))?;
    let config = config
        .decode(&ty)
        .map_err(|e| e.in_context("config from its envelope"))?;

    let planned = proposed_new(block, &prior, &config);
    debug!(planned = %planned.to_json(), "computed proposed new state");

    DynamicValue::encode(&planned).map_err(|e| e.in_context("planned state into its envelope"))
}

/// Plan over Pulumi property values keyed by Pulumi names.
pub fn propose_property_value(
    block: &Block,
    prior: &PropertyValue,
    config: &PropertyValue,
) -> Result<PropertyValue, BridgeError> {
    let prior = convert::block_to_value(block, prior, false)
        .map_err(|e| e.in_context("prior state to a typed value"))?;
    let config = convert::block_to_value(block, config, false)
        .map_err(|e| e.in_context("config to a typed value"))?;

    let planned = proposed_new(block, &prior, &config);
    Ok(convert::value_to_block(block, &planned, false))
}

fn plan_block(block: &Block, prior: &Value, config: &Value, path: &PropertyPath) -> Value {
    if config.is_null() || !config.is_known() {
        return config.clone();
    }

    let mut planned = BTreeMap::new();
    for (name, attr) in &block.attributes {
        let config_v = config.get_attr(name);
        let value = plan_attribute(attr, prior.get_attr(name), config_v).unwrap_or_else(|err| {
            warn!(path = %path.key(name.as_str()), error = %err, "ignoring unusable default");
            config_v.clone()
        });
        planned.insert(name.clone(), value);
    }

    for (name, nested) in &block.blocks {
        let nested_path = path.key(name.as_str());
        let config_v = config.get_attr(name);
        let value = plan_nested(nested, prior.get_attr(name), config_v, &nested_path)
            .unwrap_or_else(|err| {
                warn!(path = %nested_path, error = %err, "cannot plan nested block, using config value");
                config_v.clone()
            });
        planned.insert(name.clone(), value);
    }

    Value::Object(planned)
}

fn plan_attribute(attr: &Attribute, prior: &Value, config: &Value) -> Result<Value, BridgeError> {
    if attr.flags.computed {
        // Only an absent config value defers to the prior state; unknown stays unknown.
        return Ok(if config.is_null() {
            prior.clone()
        } else {
            config.clone()
        });
    }

    match (&attr.default, config) {
        (Some(default), Value::Null) => Value::from_json(default, &attr.attr_type.cty_type())
            .map_err(|e| e.in_context("attribute default")),
        _ => Ok(config.clone()),
    }
}

fn plan_nested(
    nested: &NestedBlock,
    prior: &Value,
    config: &Value,
    path: &PropertyPath,
) -> Result<Value, BridgeError> {
    if !config.is_known() {
        return Ok(Value::Unknown);
    }
    if config.is_null() {
        return Ok(Value::Null);
    }

    match nested.nesting_mode {
        BlockNestingMode::Single => {
            expect_shape(prior, path, "object", |v| matches!(v, Value::Object(_)))?;
            expect_shape(config, path, "object", |v| matches!(v, Value::Object(_)))?;
            Ok(plan_block(&nested.block, prior, config, path))
        },
        BlockNestingMode::List => {
            let prior_elems = prior_elements(prior, path, "list")?;
            let config_elems = config_elements(config, path, "list")?;
            let planned = config_elems
                .iter()
                .enumerate()
                .map(|(i, elem)| {
                    let prior_elem = prior_elems.get(i).unwrap_or(&NULL);
                    plan_block(&nested.block, prior_elem, elem, &path.index(i))
                })
                .collect();
            Ok(Value::List(planned))
        },
        BlockNestingMode::Set => {
            let prior_elems = prior_elements(prior, path, "set")?;
            let config_elems = config_elements(config, path, "set")?;
            Ok(Value::Set(plan_set(
                &nested.block,
                prior_elems,
                config_elems,
                path,
            )))
        },
        BlockNestingMode::Map => {
            expect_shape(prior, path, "map", |v| v.entries().is_some())?;
            let entries = config.entries().ok_or_else(|| BridgeError::TypeMismatch {
                path: path.to_string(),
                left: "map",
                right: config.kind_name(),
            })?;
            let prior_entries = prior.entries();
            let planned = entries
                .iter()
                .map(|(key, elem)| {
                    let prior_elem = prior_entries.and_then(|p| p.get(key)).unwrap_or(&NULL);
                    let value = plan_block(&nested.block, prior_elem, elem, &path.key(key.as_str()));
                    (key.clone(), value)
                })
                .collect();
            Ok(Value::Map(planned))
        },
    }
}

/// Pair each configured set element with an unused prior element that agrees
/// on everything the configuration controls.
fn plan_set(block: &Block, prior: &[Value], config: &[Value], path: &PropertyPath) -> Vec<Value> {
    let prior_keys: Vec<Value> = prior
        .iter()
        .map(|elem| set_compare_value(block, elem, false))
        .collect();
    let mut used = vec![false; prior.len()];

    let mut planned = Vec::with_capacity(config.len());
    for (i, elem) in config.iter().enumerate() {
        let key = set_compare_value(block, elem, true);
        let mut prior_elem = &NULL;
        for (j, prior_key) in prior_keys.iter().enumerate() {
            if !used[j] && *prior_key == key {
                used[j] = true;
                prior_elem = &prior[j];
                break;
            }
        }
        if prior_elem.is_null() {
            debug!(path = %path.index(i), "set element has no prior counterpart");
        }
        planned.push(plan_block(block, prior_elem, elem, &path.index(i)));
    }
    planned
}

/// The value a set element is matched on.
///
/// Computed-only attributes are always blanked. Optional computed attributes
/// are blanked on the prior side only, so a prior element matches a config
/// element that leaves them unset.
fn set_compare_value(block: &Block, value: &Value, is_config: bool) -> Value {
    if !matches!(value, Value::Object(_)) {
        return normalize(value);
    }

    let mut attrs = BTreeMap::new();
    for (name, attr) in &block.attributes {
        let blank = attr.flags.computed && !(attr.flags.optional && is_config);
        let v = if blank {
            Value::Null
        } else {
            normalize(value.get_attr(name))
        };
        attrs.insert(name.clone(), v);
    }

    for (name, nested) in &block.blocks {
        let v = value.get_attr(name);
        let compared = match (nested.nesting_mode, v) {
            (BlockNestingMode::Single, _) => set_compare_value(&nested.block, v, is_config),
            (_, Value::List(elems)) => Value::List(
                elems
                    .iter()
                    .map(|e| set_compare_value(&nested.block, e, is_config))
                    .collect(),
            ),
            (_, Value::Set(elems)) => Value::Set(sorted(
                elems
                    .iter()
                    .map(|e| set_compare_value(&nested.block, e, is_config))
                    .collect(),
            )),
            (_, Value::Map(entries)) => Value::Map(
                entries
                    .iter()
                    .map(|(k, e)| (k.clone(), set_compare_value(&nested.block, e, is_config)))
                    .collect(),
            ),
            _ => v.clone(),
        };
        attrs.insert(name.clone(), compared);
    }

    Value::Object(attrs)
}

/// Put set elements in a canonical order so equal sets compare equal.
fn normalize(value: &Value) -> Value {
    match value {
        Value::Set(elems) => Value::Set(sorted(elems.iter().map(normalize).collect())),
        Value::List(elems) => Value::List(elems.iter().map(normalize).collect()),
        Value::Tuple(elems) => Value::Tuple(elems.iter().map(normalize).collect()),
        Value::Map(entries) => {
            Value::Map(entries.iter().map(|(k, v)| (k.clone(), normalize(v))).collect())
        },
        Value::Object(attrs) => {
            Value::Object(attrs.iter().map(|(k, v)| (k.clone(), normalize(v))).collect())
        },
        other => other.clone(),
    }
}

fn sorted(mut elems: Vec<Value>) -> Vec<Value> {
    elems.sort_by_cached_key(|e| e.to_json().to_string());
    elems
}

fn expect_shape(
    value: &Value,
    path: &PropertyPath,
    expected: &'static str,
    accepts: impl Fn(&Value) -> bool,
) -> Result<(), BridgeError> {
    if value.is_null() || !value.is_known() || accepts(value) {
        Ok(())
    } else {
        Err(BridgeError::TypeMismatch {
            path: path.to_string(),
            left: expected,
            right: value.kind_name(),
        })
    }
}

fn prior_elements<'a>(
    prior: &'a Value,
    path: &PropertyPath,
    expected: &'static str,
) -> Result<&'a [Value], BridgeError> {
    match prior {
        Value::Null | Value::Unknown => Ok(&[]),
        other => config_elements(other, path, expected),
    }
}

fn config_elements<'a>(
    value: &'a Value,
    path: &PropertyPath,
    expected: &'static str,
) -> Result<&'a [Value], BridgeError> {
    value.elements().ok_or_else(|| BridgeError::TypeMismatch {
        path: path.to_string(),
        left: expected,
        right: value.kind_name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cty::Type;
    use crate::schema::{AttributeFlags, AttributeType};
    use serde_json::json;

    fn optional_computed_string() -> Attribute {
        Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    fn value(block: &Block, json: serde_json::Value) -> Value {
        Value::from_json(&json, &block.implied_type()).unwrap()
    }

    #[test]
    fn test_computed_carry_forward() {
        let block = Block::new().with_attribute("name", optional_computed_string());
        let prior = value(&block, json!({"name": "foo"}));
        let config = value(&block, json!({"name": null}));

        let planned = proposed_new(&block, &prior, &config);
        assert_eq!(planned.get_attr("name"), &Value::String("foo".to_string()));
    }

    #[test]
    fn test_config_override() {
        let block = Block::new().with_attribute("name", optional_computed_string());
        let prior = value(&block, json!({"name": "foo"}));
        let config = value(&block, json!({"name": "bar"}));

        let planned = proposed_new(&block, &prior, &config);
        assert_eq!(planned.get_attr("name"), &Value::String("bar".to_string()));
    }

    #[test]
    fn test_attribute_rules() {
        let block = Block::new()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("mode", optional_computed_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "retries",
                Attribute::optional_int64().with_default(json!(3)),
            );
        let prior = value(
            &block,
            json!({"id": "i-1", "mode": "auto", "description": "old", "retries": 5}),
        );
        let config = Value::Object(BTreeMap::from([
            ("mode".to_string(), Value::Unknown),
            ("description".to_string(), Value::Null),
            ("retries".to_string(), Value::Null),
        ]));

        let planned = proposed_new(&block, &prior, &config);
        assert_eq!(planned.get_attr("id"), &Value::String("i-1".to_string()));
        assert_eq!(planned.get_attr("mode"), &Value::Unknown);
        assert!(planned.get_attr("description").is_null());
        assert_eq!(planned.get_attr("retries"), &Value::Number(3.into()));
    }

    #[test]
    fn test_null_prior_and_null_config() {
        let block = Block::new()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string());
        let config = value(&block, json!({"name": "web"}));

        let planned = proposed_new(&block, &Value::Null, &config);
        assert!(planned.get_attr("id").is_null());
        assert_eq!(planned.get_attr("name"), &Value::String("web".to_string()));

        let prior = value(&block, json!({"id": "i-1", "name": "web"}));
        assert_eq!(proposed_new(&block, &prior, &Value::Null), prior);
        assert_eq!(proposed_new(&block, &prior, &Value::Unknown), prior);
    }

    fn rule_block() -> Block {
        Block::new()
            .with_attribute("port", Attribute::optional_int64())
            .with_attribute("id", Attribute::computed_string())
    }

    #[test]
    fn test_list_blocks_pair_by_index() {
        let block = Block::new().with_block("rule", NestedBlock::list(rule_block()));
        let prior = value(
            &block,
            json!({"rule": [{"port": 1, "id": "a"}, {"port": 2, "id": "b"}]}),
        );
        let config = value(
            &block,
            json!({"rule": [{"port": 5}, {"port": 6}, {"port": 7}]}),
        );

        let planned = proposed_new(&block, &prior, &config);
        let rules = planned.get_attr("rule").elements().unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].get_attr("port"), &Value::Number(5.into()));
        assert_eq!(rules[0].get_attr("id"), &Value::String("a".to_string()));
        assert_eq!(rules[1].get_attr("id"), &Value::String("b".to_string()));
        assert!(rules[2].get_attr("id").is_null());
    }

    #[test]
    fn test_set_blocks_pair_by_content() {
        let block = Block::new().with_block("rule", NestedBlock::set(rule_block()));
        let prior = value(
            &block,
            json!({"rule": [{"port": 80, "id": "x"}, {"port": 443, "id": "y"}]}),
        );
        let config = value(&block, json!({"rule": [{"port": 443}, {"port": 22}]}));

        let planned = proposed_new(&block, &prior, &config);
        assert_eq!(
            planned.get_attr("rule"),
            &Value::Set(vec![
                value(&rule_block(), json!({"port": 443, "id": "y"})),
                value(&rule_block(), json!({"port": 22})),
            ])
        );
    }

    #[test]
    fn test_set_pairs_each_prior_element_once() {
        let elem = Block::new()
            .with_attribute("port", Attribute::optional_int64())
            .with_attribute("mode", optional_computed_string());
        let block = Block::new().with_block("rule", NestedBlock::set(elem.clone()));
        let prior = value(&block, json!({"rule": [{"port": 80, "mode": "auto"}]}));
        let config = value(&block, json!({"rule": [{"port": 80}, {"port": 80}]}));

        let planned = proposed_new(&block, &prior, &config);
        assert_eq!(
            planned.get_attr("rule"),
            &Value::Set(vec![
                value(&elem, json!({"port": 80, "mode": "auto"})),
                value(&elem, json!({"port": 80})),
            ])
        );
    }

    #[test]
    fn test_single_and_map_blocks() {
        let settings = Block::new()
            .with_attribute("tier", Attribute::optional_string())
            .with_attribute("endpoint", Attribute::computed_string());
        let block = Block::new()
            .with_block("settings", NestedBlock::single(settings.clone()))
            .with_block("by_zone", NestedBlock::map(settings));

        let prior = value(
            &block,
            json!({
                "settings": {"tier": "gold", "endpoint": "e1"},
                "by_zone": {"a": {"tier": "x", "endpoint": "ea"}},
            }),
        );
        let config = value(
            &block,
            json!({"by_zone": {"a": {"tier": "y"}, "b": {"tier": "z"}}}),
        );

        let planned = proposed_new(&block, &prior, &config);
        assert!(planned.get_attr("settings").is_null());

        let zones = planned.get_attr("by_zone").entries().unwrap();
        assert_eq!(zones["a"].get_attr("tier"), &Value::String("y".to_string()));
        assert_eq!(zones["a"].get_attr("endpoint"), &Value::String("ea".to_string()));
        assert!(zones["b"].get_attr("endpoint").is_null());
    }

    #[test]
    fn test_nested_mismatch_falls_back_to_config() {
        let block = Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_block("rule", NestedBlock::list(rule_block()));
        let prior = Value::Object(BTreeMap::from([(
            "rule".to_string(),
            Value::String("garbage".to_string()),
        )]));
        let config = value(&block, json!({"name": "web", "rule": [{"port": 1}]}));

        let planned = proposed_new(&block, &prior, &config);
        assert_eq!(planned.get_attr("rule"), config.get_attr("rule"));
        assert_eq!(planned.get_attr("name"), &Value::String("web".to_string()));
    }

    #[test]
    fn test_plan_envelope() {
        let block = Block::new()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string());
        let prior = DynamicValue {
            json: serde_json::to_vec(&json!({"id": "i-1", "name": "a"})).unwrap(),
        };
        let config = DynamicValue {
            json: serde_json::to_vec(&json!({"id": null, "name": "b"})).unwrap(),
        };

        let planned = plan_proposed_new(&block, &prior, &config).unwrap();
        let decoded = planned.decode(&block.implied_type()).unwrap();
        assert_eq!(decoded, value(&block, json!({"id": "i-1", "name": "b"})));
    }

    #[test]
    fn test_plan_envelope_errors_name_the_value() {
        let block = Block::new().with_attribute("name", Attribute::required_string());
        let bad = DynamicValue {
            json: serde_json::to_vec(&json!({"name": 7})).unwrap(),
        };

        let err = plan_proposed_new(&block, &bad, &DynamicValue::null()).unwrap_err();
        match err {
            BridgeError::Conversion { context, source } => {
                assert!(context.contains("prior state"));
                assert!(matches!(*source, BridgeError::TypeMismatch { .. }));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_propose_property_value() {
        let block = Block::new()
            .with_attribute("instance_type", Attribute::optional_string())
            .with_attribute("arn", Attribute::computed_string());
        let prior = PropertyValue::from(json!({"instanceType": "t3.micro", "arn": "arn:1"}));
        let config = PropertyValue::from(json!({"instanceType": "t3.large"}));

        let planned = propose_property_value(&block, &prior, &config).unwrap();
        assert_eq!(
            planned,
            PropertyValue::from(json!({"instanceType": "t3.large", "arn": "arn:1"}))
        );
    }

    #[test]
    fn test_number_precision_preserved() {
        let block = Block::new().with_attribute(
            "size",
            Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed()),
        );
        assert_eq!(
            block.implied_type(),
            Type::Object(BTreeMap::from([("size".to_string(), Type::Number)]))
        );

        let big = json!({"size": 9007199254740993_i64});
        let prior = value(&block, big.clone());
        let planned = proposed_new(&block, &prior, &value(&block, json!({})));
        assert_eq!(planned.to_json(), big);
    }

    #[test]
    fn test_wide_numbers_survive_planning() {
        let block = Block::new()
            .with_attribute(
                "size",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed()),
            )
            .with_attribute(
                "ratio",
                Attribute::new(AttributeType::Number, AttributeFlags::optional()),
            );
        let envelope = |text: String| DynamicValue {
            json: text.into_bytes(),
        };

        for literal in [
            "123456789012345678901234567890",
            "0.1000000000000000000001",
            "1e400",
        ] {
            // Computed carry-forward from prior state.
            let prior = envelope(format!(r#"{{"size":{literal},"ratio":null}}"#));
            let config = envelope(r#"{"size":null,"ratio":null}"#.to_string());
            let planned = plan_proposed_new(&block, &prior, &config).unwrap();
            assert_eq!(
                String::from_utf8(planned.json).unwrap(),
                format!(r#"{{"ratio":null,"size":{literal}}}"#)
            );

            // Configured values win over prior state.
            let prior = envelope(r#"{"size":1,"ratio":2}"#.to_string());
            let config = envelope(format!(r#"{{"size":{literal},"ratio":{literal}}}"#));
            let planned = plan_proposed_new(&block, &prior, &config).unwrap();
            assert_eq!(
                String::from_utf8(planned.json).unwrap(),
                format!(r#"{{"ratio":{literal},"size":{literal}}}"#)
            );
        }
    }
}
