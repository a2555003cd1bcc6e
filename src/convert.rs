//! Schema-driven conversion between Pulumi property values and typed values.
//!
//! Pulumi properties are keyed by Pulumi names and collapse one-element lists
//! to scalars; typed values are keyed by Terraform names and keep the list.
//! Conversion walks the [`Block`] so both sides line up.
//!
//! # Example
//!
//! ```
//! use tf_bridge_sdk::convert::{block_to_value, value_to_block};
//! use tf_bridge_sdk::property::PropertyValue;
//! use tf_bridge_sdk::schema::{Attribute, Block};
//! use serde_json::json;
//!
//! let block = Block::new().with_attribute("instance_type", Attribute::required_string());
//! let props = PropertyValue::from(json!({"instanceType": "t3.micro"}));
//!
//! let value = block_to_value(&block, &props, false).unwrap();
//! assert_eq!(value_to_block(&block, &value, false), props);
//! ```

use crate::cty::{self, Value};
use crate::error::BridgeError;
use crate::naming;
use crate::property::{PropertyMap, PropertyPath, PropertyValue};
use crate::schema::{Attribute, Block, BlockNestingMode, Field, NestedBlock};
use std::collections::BTreeMap;
use tracing::warn;

/// Convert a Pulumi object conforming to `block` into a typed object value.
///
/// With `raw_names` property keys are Terraform names already.
pub fn block_to_value(
    block: &Block,
    props: &PropertyValue,
    raw_names: bool,
) -> Result<Value, BridgeError> {
    convert_block(block, props, &PropertyPath::new(), raw_names)
}

/// Convert a typed object value conforming to `block` back into a Pulumi object.
///
/// Null attributes are omitted from the result.
pub fn value_to_block(block: &Block, value: &Value, raw_names: bool) -> PropertyValue {
    match value {
        Value::Null => PropertyValue::Null,
        Value::Unknown => PropertyValue::Computed,
        _ => {
            let mut props = PropertyMap::new();
            for (name, attr) in &block.attributes {
                let v = attribute_to_property(attr, value.get_attr(name));
                if !v.is_null() {
                    props.insert(naming::property_name(block, name, raw_names), v);
                }
            }
            for (name, nested) in &block.blocks {
                let v = nested_to_property(nested, value.get_attr(name), raw_names);
                if !v.is_null() {
                    props.insert(naming::property_name(block, name, raw_names), v);
                }
            }
            PropertyValue::Object(props)
        },
    }
}

/// Rename the keys of a Pulumi object to Terraform names and expand collapsed lists.
///
/// Used to present set elements to schema hash functions.
pub fn to_terraform_names(block: &Block, props: &PropertyValue) -> Result<PropertyValue, BridgeError> {
    Ok(block_to_value(block, props, false)?.to_property())
}

fn convert_block(
    block: &Block,
    props: &PropertyValue,
    path: &PropertyPath,
    raw_names: bool,
) -> Result<Value, BridgeError> {
    let obj = match props {
        PropertyValue::Null => return Ok(Value::Null),
        PropertyValue::Computed => return Ok(Value::Unknown),
        PropertyValue::Object(obj) => obj,
        other => {
            return Err(BridgeError::TypeMismatch {
                path: path.to_string(),
                left: "object",
                right: other.kind_name(),
            })
        },
    };

    let mut attrs = BTreeMap::new();
    let mut consumed = 0;
    for (name, field) in block.fields() {
        let key = naming::property_name(block, name, raw_names);
        let value = obj.get(&key);
        if value.is_some() {
            consumed += 1;
        }
        let value = value.unwrap_or(&PropertyValue::Null);
        let field_path = path.key(key.as_str());
        let converted = match field {
            Field::Attribute(attr) => {
                convert_attribute(attr, value, &field_path)?
            },
            Field::Block(nested) => {
                convert_nested(nested, value, &field_path, raw_names)?
            },
        };
        attrs.insert(name.to_string(), converted);
    }

    if consumed < obj.len() {
        for key in obj.keys() {
            if naming::terraform_field(block, key, raw_names).is_none() {
                warn!(path = %path, key = %key, "ignoring property not present in schema");
            }
        }
    }

    Ok(Value::Object(attrs))
}

fn convert_attribute(
    attr: &Attribute,
    value: &PropertyValue,
    path: &PropertyPath,
) -> Result<Value, BridgeError> {
    let ty = attr.attr_type.cty_type();
    if attr.is_max_items_one() {
        return match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Computed => Ok(Value::Unknown),
            v => {
                let elem_ty = match &ty {
                    cty::Type::List(elem) | cty::Type::Set(elem) => (**elem).clone(),
                    other => other.clone(),
                };
                let elem = cty::from_property_at(path, v, &elem_ty)?;
                Ok(match ty {
                    cty::Type::Set(_) => Value::Set(vec![elem]),
                    _ => Value::List(vec![elem]),
                })
            },
        };
    }
    cty::from_property_at(path, value, &ty)
}

fn convert_nested(
    nested: &NestedBlock,
    value: &PropertyValue,
    path: &PropertyPath,
    raw_names: bool,
) -> Result<Value, BridgeError> {
    if nested.is_max_items_one() {
        return match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Computed => Ok(Value::Unknown),
            v => {
                let elem = convert_block(&nested.block, v, path, raw_names)?;
                Ok(match nested.nesting_mode {
                    BlockNestingMode::Set => Value::Set(vec![elem]),
                    _ => Value::List(vec![elem]),
                })
            },
        };
    }

    match (nested.nesting_mode, value) {
        (_, PropertyValue::Null) => Ok(Value::Null),
        (_, PropertyValue::Computed) => Ok(Value::Unknown),
        (BlockNestingMode::Single, v) => convert_block(&nested.block, v, path, raw_names),
        (BlockNestingMode::List | BlockNestingMode::Set, PropertyValue::Array(items)) => {
            let elems = items
                .iter()
                .enumerate()
                .map(|(i, item)| convert_block(&nested.block, item, &path.index(i), raw_names))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if nested.nesting_mode == BlockNestingMode::Set {
                Value::Set(elems)
            } else {
                Value::List(elems)
            })
        },
        (BlockNestingMode::Map, PropertyValue::Object(entries)) => {
            let entries = entries
                .iter()
                .map(|(k, item)| {
                    Ok((
                        k.clone(),
                        convert_block(&nested.block, item, &path.key(k.as_str()), raw_names)?,
                    ))
                })
                .collect::<Result<BTreeMap<_, _>, BridgeError>>()?;
            Ok(Value::Map(entries))
        },
        (mode, other) => Err(BridgeError::TypeMismatch {
            path: path.to_string(),
            left: match mode {
                BlockNestingMode::Map => "map",
                _ => "list",
            },
            right: other.kind_name(),
        }),
    }
}

fn attribute_to_property(attr: &Attribute, value: &Value) -> PropertyValue {
    if attr.is_max_items_one() {
        if let Some(elems) = value.elements() {
            return elems.first().map(Value::to_property).unwrap_or_default();
        }
    }
    value.to_property()
}

fn nested_to_property(nested: &NestedBlock, value: &Value, raw_names: bool) -> PropertyValue {
    if nested.is_max_items_one() {
        if let Some(elems) = value.elements() {
            return elems
                .first()
                .map(|e| value_to_block(&nested.block, e, raw_names))
                .unwrap_or_default();
        }
    }
    match value {
        Value::Null => PropertyValue::Null,
        Value::Unknown => PropertyValue::Computed,
        Value::List(elems) | Value::Set(elems) | Value::Tuple(elems) => PropertyValue::Array(
            elems
                .iter()
                .map(|e| value_to_block(&nested.block, e, raw_names))
                .collect(),
        ),
        Value::Map(entries) if nested.nesting_mode == BlockNestingMode::Map => {
            PropertyValue::Object(
                entries
                    .iter()
                    .map(|(k, e)| (k.clone(), value_to_block(&nested.block, e, raw_names)))
                    .collect(),
            )
        },
        other => value_to_block(&nested.block, other, raw_names),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, AttributeType};
    use serde_json::json;

    fn test_block() -> Block {
        Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "zones",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                ),
            )
            .with_attribute(
                "primary_zone",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_max_items(1),
            )
            .with_block(
                "rule",
                NestedBlock::set(Block::new().with_attribute("from_port", Attribute::optional_int64())),
            )
            .with_block(
                "settings",
                NestedBlock::list(Block::new().with_attribute("tier", Attribute::optional_string()))
                    .with_max_items(1),
            )
    }

    #[test]
    fn test_block_to_value() {
        let props = PropertyValue::from(json!({
            "name": "web",
            "primaryZone": "us-east-1a",
            "rules": [{"fromPort": 80}],
            "settings": {"tier": "gold"},
        }));
        let value = block_to_value(&test_block(), &props, false).unwrap();

        assert_eq!(value.get_attr("name"), &Value::String("web".to_string()));
        assert_eq!(
            value.get_attr("primary_zone"),
            &Value::List(vec![Value::String("us-east-1a".to_string())])
        );
        assert!(value.get_attr("zones").is_null());
        let rules = value.get_attr("rule").elements().unwrap();
        assert_eq!(rules[0].get_attr("from_port"), &Value::Number(80.into()));
        let settings = value.get_attr("settings").elements().unwrap();
        assert_eq!(settings[0].get_attr("tier"), &Value::String("gold".to_string()));

        assert_eq!(value_to_block(&test_block(), &value, false), props);
    }

    #[test]
    fn test_raw_names() {
        let props = PropertyValue::from(json!({"primary_zone": "a", "rule": []}));
        let value = block_to_value(&test_block(), &props, true).unwrap();
        assert!(matches!(value.get_attr("primary_zone"), Value::List(z) if z.len() == 1));
        assert_eq!(value.get_attr("rule"), &Value::Set(vec![]));
    }

    #[test]
    fn test_type_mismatch_has_property_path() {
        let props = PropertyValue::from(json!({"name": "x", "rules": [{"fromPort": "eighty"}]}));
        let err = block_to_value(&test_block(), &props, false).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::TypeMismatch { ref path, .. } if path == "rules[0].fromPort"
        ));
    }

    #[test]
    fn test_to_terraform_names() {
        let block = Block::new().with_attribute("from_port", Attribute::optional_int64());
        let renamed = to_terraform_names(&block, &PropertyValue::from(json!({"fromPort": 22}))).unwrap();
        assert_eq!(renamed, PropertyValue::from(json!({"from_port": 22})));
    }
}
