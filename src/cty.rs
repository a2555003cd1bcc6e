//! Typed values on the Terraform side of the bridge.
//!
//! Terraform plans over values that carry a type from the schema: an object
//! attribute may be null or unknown, sets and lists are distinct, and numbers
//! are never confused with strings. [`Type`] and [`Value`] model that, along
//! with the JSON type encoding Terraform uses for attribute types and the
//! [`DynamicValue`] envelope values travel in.

use crate::error::BridgeError;
use crate::property::{PropertyPath, PropertyValue};
use crate::types::TF_UNKNOWN_VALUE;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;

/// A Terraform type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// `bool`
    Bool,
    /// `number`
    Number,
    /// `string`
    String,
    /// `list(T)`
    List(Box<Type>),
    /// `set(T)`
    Set(Box<Type>),
    /// `map(T)`
    Map(Box<Type>),
    /// `object({...})`
    Object(BTreeMap<String, Type>),
    /// `tuple([...])`
    Tuple(Vec<Type>),
    /// `dynamic`: the concrete type is carried by the value.
    Dynamic,
}

impl Type {
    /// `list(elem)`
    pub fn list(elem: Type) -> Self {
        Self::List(Box::new(elem))
    }

    /// `set(elem)`
    pub fn set(elem: Type) -> Self {
        Self::Set(Box::new(elem))
    }

    /// `map(elem)`
    pub fn map(elem: Type) -> Self {
        Self::Map(Box::new(elem))
    }

    /// A short name for error messages.
    pub fn friendly_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Tuple(_) => "tuple",
            Self::Dynamic => "dynamic",
        }
    }

    /// Parse Terraform's JSON type encoding, e.g. `["list", "string"]`.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, BridgeError> {
        use serde_json::Value as J;

        match json {
            J::String(s) => match s.as_str() {
                "bool" => Ok(Self::Bool),
                "number" => Ok(Self::Number),
                "string" => Ok(Self::String),
                "dynamic" => Ok(Self::Dynamic),
                _ => Err(BridgeError::UnsupportedType(json.to_string())),
            },
            J::Array(parts) if parts.len() == 2 => {
                let kind = parts[0].as_str().unwrap_or_default();
                match kind {
                    "list" => Ok(Self::list(Self::from_json(&parts[1])?)),
                    "set" => Ok(Self::set(Self::from_json(&parts[1])?)),
                    "map" => Ok(Self::map(Self::from_json(&parts[1])?)),
                    "object" => {
                        let attrs = parts[1]
                            .as_object()
                            .ok_or_else(|| BridgeError::UnsupportedType(json.to_string()))?;
                        let attrs = attrs
                            .iter()
                            .map(|(name, ty)| Ok((name.clone(), Self::from_json(ty)?)))
                            .collect::<Result<_, BridgeError>>()?;
                        Ok(Self::Object(attrs))
                    },
                    "tuple" => {
                        let elems = parts[1]
                            .as_array()
                            .ok_or_else(|| BridgeError::UnsupportedType(json.to_string()))?;
                        let elems = elems
                            .iter()
                            .map(Self::from_json)
                            .collect::<Result<_, _>>()?;
                        Ok(Self::Tuple(elems))
                    },
                    _ => Err(BridgeError::UnsupportedType(json.to_string())),
                }
            },
            _ => Err(BridgeError::UnsupportedType(json.to_string())),
        }
    }

    /// Produce Terraform's JSON type encoding.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            Self::Bool => json!("bool"),
            Self::Number => json!("number"),
            Self::String => json!("string"),
            Self::Dynamic => json!("dynamic"),
            Self::List(elem) => json!(["list", elem.to_json()]),
            Self::Set(elem) => json!(["set", elem.to_json()]),
            Self::Map(elem) => json!(["map", elem.to_json()]),
            Self::Object(attrs) => {
                let attrs: serde_json::Map<String, serde_json::Value> = attrs
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_json()))
                    .collect();
                json!(["object", attrs])
            },
            Self::Tuple(elems) => {
                let elems: Vec<serde_json::Value> = elems.iter().map(Type::to_json).collect();
                json!(["tuple", elems])
            },
        }
    }
}

/// A Terraform value.
///
/// Nulls and unknowns are untyped here; the type is supplied by the schema
/// whenever a value is decoded or converted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null value.
    #[default]
    Null,
    /// A value that will be known after apply.
    Unknown,
    /// A bool.
    Bool(bool),
    /// A number, kept as the exact decimal text it was decoded from.
    Number(Number),
    /// A string.
    String(String),
    /// An ordered list.
    List(Vec<Value>),
    /// A set, in the order the elements were received.
    Set(Vec<Value>),
    /// A map of homogeneous values.
    Map(BTreeMap<String, Value>),
    /// An object with typed attributes.
    Object(BTreeMap<String, Value>),
    /// A fixed-length heterogeneous sequence.
    Tuple(Vec<Value>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for anything but [`Value::Unknown`].
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// A short name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Tuple(_) => "tuple",
        }
    }

    /// The named attribute of an object; null for anything else or when absent.
    pub fn get_attr(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        match self {
            Self::Object(attrs) => attrs.get(name).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Elements of a list, set or tuple.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Self::List(elems) | Self::Set(elems) | Self::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    /// Entries of a map or object.
    pub fn entries(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(entries) | Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Decode a JSON value of type `ty`, treating Terraform's unknown sentinel as unknown.
    pub fn from_json(json: &serde_json::Value, ty: &Type) -> Result<Self, BridgeError> {
        decode_json(&PropertyPath::new(), json, ty)
    }

    /// Encode as JSON, writing unknowns as Terraform's unknown sentinel.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;

        match self {
            Self::Null => J::Null,
            Self::Unknown => J::String(TF_UNKNOWN_VALUE.to_string()),
            Self::Bool(b) => J::Bool(*b),
            Self::Number(n) => J::Number(n.clone()),
            Self::String(s) => J::String(s.clone()),
            Self::List(elems) | Self::Set(elems) | Self::Tuple(elems) => {
                J::Array(elems.iter().map(Value::to_json).collect())
            },
            Self::Map(entries) | Self::Object(entries) => J::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Convert a property value (keyed by Terraform names) into a value of type `ty`.
    pub fn from_property(value: &PropertyValue, ty: &Type) -> Result<Self, BridgeError> {
        from_property_at(&PropertyPath::new(), value, ty)
    }

    /// Convert into a property value. Unknowns become computed values.
    pub fn to_property(&self) -> PropertyValue {
        match self {
            Self::Null => PropertyValue::Null,
            Self::Unknown => PropertyValue::Computed,
            Self::Bool(b) => PropertyValue::Bool(*b),
            Self::Number(n) => PropertyValue::Number(n.clone()),
            Self::String(s) => PropertyValue::String(s.clone()),
            Self::List(elems) | Self::Set(elems) | Self::Tuple(elems) => {
                PropertyValue::Array(elems.iter().map(Value::to_property).collect())
            },
            Self::Map(entries) | Self::Object(entries) => PropertyValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_property()))
                    .collect(),
            ),
        }
    }
}

fn mismatch(path: &PropertyPath, ty: &Type, found: &'static str) -> BridgeError {
    BridgeError::TypeMismatch {
        path: path.to_string(),
        left: ty.friendly_name(),
        right: found,
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn decode_json(
    path: &PropertyPath,
    json: &serde_json::Value,
    ty: &Type,
) -> Result<Value, BridgeError> {
    use serde_json::Value as J;

    match (json, ty) {
        (J::Null, _) => Ok(Value::Null),
        (J::String(s), _) if s == TF_UNKNOWN_VALUE => Ok(Value::Unknown),
        (J::Bool(b), Type::Bool) => Ok(Value::Bool(*b)),
        (J::Number(n), Type::Number) => Ok(Value::Number(n.clone())),
        (J::String(s), Type::String) => Ok(Value::String(s.clone())),
        (J::Array(elems), Type::List(elem_ty)) => Ok(Value::List(decode_elems(path, elems, elem_ty)?)),
        (J::Array(elems), Type::Set(elem_ty)) => Ok(Value::Set(decode_elems(path, elems, elem_ty)?)),
        (J::Array(elems), Type::Tuple(elem_tys)) => {
            if elems.len() != elem_tys.len() {
                return Err(mismatch(path, ty, "array"));
            }
            let elems = elems
                .iter()
                .zip(elem_tys)
                .enumerate()
                .map(|(i, (e, t))| decode_json(&path.index(i), e, t))
                .collect::<Result<_, _>>()?;
            Ok(Value::Tuple(elems))
        },
        (J::Object(entries), Type::Map(elem_ty)) => {
            let entries = entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), decode_json(&path.key(k.as_str()), v, elem_ty)?)))
                .collect::<Result<_, BridgeError>>()?;
            Ok(Value::Map(entries))
        },
        (J::Object(entries), Type::Object(attr_tys)) => {
            if let Some(extra) = entries.keys().find(|k| !attr_tys.contains_key(*k)) {
                return Err(BridgeError::SchemaLookup {
                    path: path.to_string(),
                    reason: format!("unexpected attribute '{}'", extra),
                });
            }
            let attrs = attr_tys
                .iter()
                .map(|(name, attr_ty)| {
                    let v = match entries.get(name) {
                        Some(v) => decode_json(&path.key(name.as_str()), v, attr_ty)?,
                        None => Value::Null,
                    };
                    Ok((name.clone(), v))
                })
                .collect::<Result<_, BridgeError>>()?;
            Ok(Value::Object(attrs))
        },
        (_, Type::Dynamic) => Ok(infer_json(json)),
        _ => Err(mismatch(path, ty, json_kind(json))),
    }
}

fn decode_elems(
    path: &PropertyPath,
    elems: &[serde_json::Value],
    elem_ty: &Type,
) -> Result<Vec<Value>, BridgeError> {
    elems
        .iter()
        .enumerate()
        .map(|(i, e)| decode_json(&path.index(i), e, elem_ty))
        .collect()
}

fn infer_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as J;

    match json {
        J::Null => Value::Null,
        J::Bool(b) => Value::Bool(*b),
        J::Number(n) => Value::Number(n.clone()),
        J::String(s) if s == TF_UNKNOWN_VALUE => Value::Unknown,
        J::String(s) => Value::String(s.clone()),
        J::Array(elems) => Value::Tuple(elems.iter().map(infer_json).collect()),
        J::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), infer_json(v)))
                .collect(),
        ),
    }
}

pub(crate) fn from_property_at(
    path: &PropertyPath,
    value: &PropertyValue,
    ty: &Type,
) -> Result<Value, BridgeError> {
    match (value, ty) {
        (PropertyValue::Null, _) => Ok(Value::Null),
        (PropertyValue::Computed, _) => Ok(Value::Unknown),
        (PropertyValue::Bool(b), Type::Bool) => Ok(Value::Bool(*b)),
        (PropertyValue::Number(n), Type::Number) => Ok(Value::Number(n.clone())),
        (PropertyValue::String(s), Type::String) => Ok(Value::String(s.clone())),
        (PropertyValue::Array(elems), Type::List(elem_ty)) => {
            Ok(Value::List(property_elems(path, elems, elem_ty)?))
        },
        (PropertyValue::Array(elems), Type::Set(elem_ty)) => {
            Ok(Value::Set(property_elems(path, elems, elem_ty)?))
        },
        (PropertyValue::Array(elems), Type::Tuple(elem_tys)) if elems.len() == elem_tys.len() => {
            let elems = elems
                .iter()
                .zip(elem_tys)
                .enumerate()
                .map(|(i, (e, t))| from_property_at(&path.index(i), e, t))
                .collect::<Result<_, _>>()?;
            Ok(Value::Tuple(elems))
        },
        (PropertyValue::Object(entries), Type::Map(elem_ty)) => {
            let entries = entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), from_property_at(&path.key(k.as_str()), v, elem_ty)?)))
                .collect::<Result<_, BridgeError>>()?;
            Ok(Value::Map(entries))
        },
        (PropertyValue::Object(entries), Type::Object(attr_tys)) => {
            if let Some(extra) = entries.keys().find(|k| !attr_tys.contains_key(*k)) {
                return Err(BridgeError::SchemaLookup {
                    path: path.to_string(),
                    reason: format!("unexpected attribute '{}'", extra),
                });
            }
            let attrs = attr_tys
                .iter()
                .map(|(name, attr_ty)| {
                    let v = match entries.get(name) {
                        Some(v) => from_property_at(&path.key(name.as_str()), v, attr_ty)?,
                        None => Value::Null,
                    };
                    Ok((name.clone(), v))
                })
                .collect::<Result<_, BridgeError>>()?;
            Ok(Value::Object(attrs))
        },
        (_, Type::Dynamic) => Ok(infer_property(value)),
        _ => Err(mismatch(path, ty, value.kind_name())),
    }
}

fn property_elems(
    path: &PropertyPath,
    elems: &[PropertyValue],
    elem_ty: &Type,
) -> Result<Vec<Value>, BridgeError> {
    elems
        .iter()
        .enumerate()
        .map(|(i, e)| from_property_at(&path.index(i), e, elem_ty))
        .collect()
}

fn infer_property(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Computed => Value::Unknown,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Number(n) => Value::Number(n.clone()),
        PropertyValue::String(s) => Value::String(s.clone()),
        PropertyValue::Array(elems) => Value::Tuple(elems.iter().map(infer_property).collect()),
        PropertyValue::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), infer_property(v)))
                .collect(),
        ),
    }
}

/// A value as it travels over the provider protocol.
///
/// Only the JSON encoding is handled here; msgpack payloads are decoded by
/// the transport before they reach the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicValue {
    /// JSON-encoded value; empty means null.
    #[serde(default)]
    pub json: Vec<u8>,
}

impl DynamicValue {
    /// The null value.
    pub fn null() -> Self {
        Self::default()
    }

    /// Encode `value`.
    pub fn encode(value: &Value) -> Result<Self, BridgeError> {
        Ok(Self {
            json: serde_json::to_vec(&value.to_json())?,
        })
    }

    /// Decode as a value of type `ty`.
    pub fn decode(&self, ty: &Type) -> Result<Value, BridgeError> {
        if self.json.is_empty() {
            return Ok(Value::Null);
        }
        let json: serde_json::Value = serde_json::from_slice(&self.json)?;
        Value::from_json(&json, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_json_round_trip() {
        let encoded = json!(["object", {
            "name": "string",
            "tags": ["map", "string"],
            "rules": ["set", ["object", {"port": "number"}]],
            "pair": ["tuple", ["bool", "dynamic"]],
        }]);
        let ty = Type::from_json(&encoded).unwrap();
        assert_eq!(ty.to_json(), encoded);
    }

    #[test]
    fn test_unsupported_type() {
        let err = Type::from_json(&json!("capsule")).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedType(_)));

        let err = Type::from_json(&json!(["list"])).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedType(_)));
    }

    #[test]
    fn test_decode_json_with_unknowns() {
        let ty = Type::Object(BTreeMap::from([
            ("id".to_string(), Type::String),
            ("size".to_string(), Type::Number),
            ("tags".to_string(), Type::map(Type::String)),
        ]));
        let value = Value::from_json(&json!({"id": TF_UNKNOWN_VALUE, "size": 3}), &ty).unwrap();

        assert_eq!(value.get_attr("id"), &Value::Unknown);
        assert_eq!(value.get_attr("size"), &Value::Number(3.into()));
        assert!(value.get_attr("tags").is_null());
    }

    #[test]
    fn test_decode_type_mismatch_reports_path() {
        let ty = Type::Object(BTreeMap::from([(
            "items".to_string(),
            Type::list(Type::Number),
        )]));
        let err = Value::from_json(&json!({"items": [1, "two"]}), &ty).unwrap_err();
        match err {
            BridgeError::TypeMismatch { path, left, right } => {
                assert_eq!(path, "items[1]");
                assert_eq!(left, "number");
                assert_eq!(right, "string");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_property_conversion() {
        let ty = Type::Object(BTreeMap::from([
            ("name".to_string(), Type::String),
            ("zones".to_string(), Type::set(Type::String)),
        ]));
        let prop = PropertyValue::from(json!({"name": "a", "zones": ["x", "y"]}));
        let value = Value::from_property(&prop, &ty).unwrap();
        assert!(matches!(value.get_attr("zones"), Value::Set(z) if z.len() == 2));
        assert_eq!(value.to_property(), prop);

        let prop = PropertyValue::Object(BTreeMap::from([(
            "name".to_string(),
            PropertyValue::Computed,
        )]));
        let value = Value::from_property(&prop, &ty).unwrap();
        assert!(!value.get_attr("name").is_known());
    }

    #[test]
    fn test_dynamic_value_envelope() {
        let ty = Type::Object(BTreeMap::from([("id".to_string(), Type::String)]));
        let value = Value::Object(BTreeMap::from([("id".to_string(), Value::Unknown)]));

        let envelope = DynamicValue::encode(&value).unwrap();
        assert!(String::from_utf8_lossy(&envelope.json).contains(TF_UNKNOWN_VALUE));
        assert_eq!(envelope.decode(&ty).unwrap(), value);
        assert_eq!(DynamicValue::null().decode(&ty).unwrap(), Value::Null);
    }

    #[test]
    fn test_dynamic_value_keeps_number_text() {
        let ty = Type::Object(BTreeMap::from([("size".to_string(), Type::Number)]));
        for literal in [
            "123456789012345678901234567890",
            "0.1000000000000000000001",
            "1e400",
        ] {
            let envelope = DynamicValue {
                json: format!(r#"{{"size":{literal}}}"#).into_bytes(),
            };
            let value = envelope.decode(&ty).unwrap();
            let expected: Number = serde_json::from_str(literal).unwrap();
            assert_eq!(value.get_attr("size"), &Value::Number(expected));

            let encoded = DynamicValue::encode(&value).unwrap();
            assert_eq!(
                String::from_utf8(encoded.json).unwrap(),
                format!(r#"{{"size":{literal}}}"#)
            );
        }
    }

    #[test]
    fn test_property_conversion_keeps_number_text() {
        let ty = Type::list(Type::Number);
        let json: serde_json::Value =
            serde_json::from_str("[123456789012345678901234567890, 1e400]").unwrap();
        let prop = PropertyValue::from(json.clone());

        let value = Value::from_property(&prop, &ty).unwrap();
        assert_eq!(value.to_json(), json);
        assert_eq!(value.to_property(), prop);
        assert_eq!(
            value.to_json().to_string(),
            "[123456789012345678901234567890,1e400]"
        );
    }
}
