//! Schema types describing the Terraform side of a bridged provider.
//!
//! A [`Schema`] is a tree of [`Block`]s holding [`Attribute`]s and
//! [`NestedBlock`]s. Schemas are built once and shared read-only by the path
//! model, planner and diff translator. All containers are ordered maps so that
//! every traversal is deterministic.

use crate::cty;
use crate::property::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit floating point number.
    Float64,
    /// An arbitrary-precision number.
    Number,
    /// A boolean value.
    Bool,
    /// A list of values of a single type.
    List(Box<AttributeType>),
    /// A set of unique values of a single type.
    Set(Box<AttributeType>),
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
    /// An object with a fixed set of attributes.
    Object(BTreeMap<String, AttributeType>),
    /// A dynamic type that can hold any value.
    Dynamic,
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a set type.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// Create an object type.
    pub fn object(attributes: BTreeMap<String, AttributeType>) -> Self {
        Self::Object(attributes)
    }

    /// The element type of a list, set or map.
    pub fn element_type(&self) -> Option<&AttributeType> {
        match self {
            Self::List(elem) | Self::Set(elem) | Self::Map(elem) => Some(elem),
            _ => None,
        }
    }

    /// The typed-value type this attribute type maps to.
    pub fn cty_type(&self) -> cty::Type {
        match self {
            Self::String => cty::Type::String,
            Self::Int64 | Self::Float64 | Self::Number => cty::Type::Number,
            Self::Bool => cty::Type::Bool,
            Self::List(elem) => cty::Type::list(elem.cty_type()),
            Self::Set(elem) => cty::Type::set(elem.cty_type()),
            Self::Map(elem) => cty::Type::map(elem.cty_type()),
            Self::Object(attrs) => cty::Type::Object(
                attrs
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.cty_type()))
                    .collect(),
            ),
            Self::Dynamic => cty::Type::Dynamic,
        }
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    #[serde(default)]
    pub required: bool,
    /// The attribute is optional in configuration.
    #[serde(default)]
    pub optional: bool,
    /// The attribute is computed by the provider.
    #[serde(default)]
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    #[serde(default)]
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional+computed attribute.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Computed and never settable from configuration.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// A schema-provided hash function for set elements.
///
/// The function receives the element keyed by Terraform attribute names.
#[derive(Clone, Copy)]
pub struct SetHasher(pub fn(&PropertyValue) -> i64);

impl SetHasher {
    /// Hash a set element.
    pub fn hash(&self, element: &PropertyValue) -> i64 {
        (self.0)(element)
    }
}

impl PartialEq for SetHasher {
    fn eq(&self, other: &Self) -> bool {
        self.0 as usize == other.0 as usize
    }
}

impl fmt::Debug for SetHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SetHasher(..)")
    }
}

/// Describes a single attribute in a schema.
///
/// Serialized flat: the usage flags sit next to `type` rather than under a
/// nested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AttributeRepr", into = "AttributeRepr")]
pub struct Attribute {
    /// The type of the attribute.
    pub attr_type: AttributeType,
    /// Flags describing how the attribute can be used.
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    pub description: Option<String>,
    /// If set, changing this attribute forces resource replacement.
    pub force_new: bool,
    /// Default value for the attribute (JSON-encoded).
    pub default: Option<serde_json::Value>,
    /// Maximum number of list/set elements (0 = unlimited).
    pub max_items: u32,
    /// Overrides the derived Pulumi property name.
    pub pulumi_name: Option<String>,
    /// Hash function for set elements. Never serialized.
    pub set_hash: Option<SetHasher>,
}

// Wire form of `Attribute`. `#[serde(flatten)]` buffers its input, which
// loses numbers under serde_json's arbitrary precision, so the fields are
// spelled out here instead.
#[derive(Serialize, Deserialize)]
struct AttributeRepr {
    #[serde(rename = "type")]
    attr_type: AttributeType,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    computed: bool,
    #[serde(default)]
    sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    force_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<serde_json::Value>,
    #[serde(default)]
    max_items: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pulumi_name: Option<String>,
}

impl From<AttributeRepr> for Attribute {
    fn from(repr: AttributeRepr) -> Self {
        Self {
            attr_type: repr.attr_type,
            flags: AttributeFlags {
                required: repr.required,
                optional: repr.optional,
                computed: repr.computed,
                sensitive: repr.sensitive,
            },
            description: repr.description,
            force_new: repr.force_new,
            default: repr.default,
            max_items: repr.max_items,
            pulumi_name: repr.pulumi_name,
            set_hash: None,
        }
    }
}

impl From<Attribute> for AttributeRepr {
    fn from(attr: Attribute) -> Self {
        Self {
            attr_type: attr.attr_type,
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description,
            force_new: attr.force_new,
            default: attr.default,
            max_items: attr.max_items,
            pulumi_name: attr.pulumi_name,
        }
    }
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            max_items: 0,
            pulumi_name: None,
            set_hash: None,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Create a required int64 attribute.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// Create an optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Set a default value for this attribute.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Limit the number of list/set elements.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Use `name` as the Pulumi property name.
    pub fn with_pulumi_name(mut self, name: impl Into<String>) -> Self {
        self.pulumi_name = Some(name.into());
        self
    }

    /// Use `hasher` to identify set elements.
    pub fn with_set_hash(mut self, hasher: fn(&PropertyValue) -> i64) -> Self {
        self.set_hash = Some(SetHasher(hasher));
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// A list or set limited to one element, surfaced to Pulumi as a scalar.
    pub fn is_max_items_one(&self) -> bool {
        matches!(self.attr_type, AttributeType::List(_) | AttributeType::Set(_)) && self.max_items == 1
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// A single nested block (at most one).
    #[default]
    Single,
    /// A list of nested blocks (zero or more, ordered).
    List,
    /// A set of nested blocks (zero or more, unordered, unique).
    Set,
    /// A map of nested blocks keyed by string.
    Map,
}

/// A group of attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The attributes within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Human-readable description of the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named member of a [`Block`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// A plain attribute.
    Attribute(&'a Attribute),
    /// A nested block.
    Block(&'a NestedBlock),
}

impl<'a> Field<'a> {
    /// Whether changing this field forces replacement.
    pub fn force_new(&self) -> bool {
        match self {
            Self::Attribute(attr) => attr.force_new,
            Self::Block(block) => block.force_new,
        }
    }

    /// Whether this field is collapsed from a one-element list to a scalar.
    pub fn is_max_items_one(&self) -> bool {
        match self {
            Self::Attribute(attr) => attr.is_max_items_one(),
            Self::Block(block) => block.is_max_items_one(),
        }
    }

    /// The Pulumi name override, if any.
    pub fn pulumi_name(&self) -> Option<&'a str> {
        match self {
            Self::Attribute(attr) => attr.pulumi_name.as_deref(),
            Self::Block(block) => block.pulumi_name.as_deref(),
        }
    }
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to this block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Look up an attribute or nested block by its Terraform name.
    pub fn field(&self, name: &str) -> Option<Field<'_>> {
        self.attributes
            .get(name)
            .map(Field::Attribute)
            .or_else(|| self.blocks.get(name).map(Field::Block))
    }

    /// All fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Field<'_>)> {
        let mut fields: Vec<(&str, Field<'_>)> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.as_str(), Field::Attribute(attr)))
            .chain(
                self.blocks
                    .iter()
                    .map(|(name, block)| (name.as_str(), Field::Block(block))),
            )
            .collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields.into_iter()
    }

    /// The object type of values conforming to this block.
    pub fn implied_type(&self) -> cty::Type {
        let mut attrs: BTreeMap<String, cty::Type> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.attr_type.cty_type()))
            .collect();
        for (name, nested) in &self.blocks {
            attrs.insert(name.clone(), nested.implied_type());
        }
        cty::Type::Object(attrs)
    }
}

/// A nested block with its nesting mode and constraints.
///
/// Serialized flat: the block's attributes and blocks sit next to the nesting
/// constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NestedBlockRepr", into = "NestedBlockRepr")]
pub struct NestedBlock {
    /// The block definition.
    pub block: Block,
    /// How the block is nested (single, list, set, map).
    pub nesting_mode: BlockNestingMode,
    /// Minimum number of blocks required.
    pub min_items: u32,
    /// Maximum number of blocks allowed (0 = unlimited).
    pub max_items: u32,
    /// If set, changing this block forces resource replacement.
    pub force_new: bool,
    /// Overrides the derived Pulumi property name.
    pub pulumi_name: Option<String>,
    /// Hash function for set elements. Never serialized.
    pub set_hash: Option<SetHasher>,
}

#[derive(Serialize, Deserialize)]
struct NestedBlockRepr {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    blocks: BTreeMap<String, NestedBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    nesting_mode: BlockNestingMode,
    #[serde(default)]
    min_items: u32,
    #[serde(default)]
    max_items: u32,
    #[serde(default)]
    force_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pulumi_name: Option<String>,
}

impl From<NestedBlockRepr> for NestedBlock {
    fn from(repr: NestedBlockRepr) -> Self {
        Self {
            block: Block {
                attributes: repr.attributes,
                blocks: repr.blocks,
                description: repr.description,
            },
            nesting_mode: repr.nesting_mode,
            min_items: repr.min_items,
            max_items: repr.max_items,
            force_new: repr.force_new,
            pulumi_name: repr.pulumi_name,
            set_hash: None,
        }
    }
}

impl From<NestedBlock> for NestedBlockRepr {
    fn from(nested: NestedBlock) -> Self {
        Self {
            attributes: nested.block.attributes,
            blocks: nested.block.blocks,
            description: nested.block.description,
            nesting_mode: nested.nesting_mode,
            min_items: nested.min_items,
            max_items: nested.max_items,
            force_new: nested.force_new,
            pulumi_name: nested.pulumi_name,
        }
    }
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
            force_new: false,
            pulumi_name: None,
            set_hash: None,
        }
    }

    /// Create a single nested block (0 or 1 allowed).
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    /// Create a list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    /// Create a set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    /// Create a map of nested blocks.
    pub fn map(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Map, 0)
    }

    /// Set the minimum number of blocks required.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks allowed.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Mark this block as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Use `name` as the Pulumi property name.
    pub fn with_pulumi_name(mut self, name: impl Into<String>) -> Self {
        self.pulumi_name = Some(name.into());
        self
    }

    /// Use `hasher` to identify set elements.
    pub fn with_set_hash(mut self, hasher: fn(&PropertyValue) -> i64) -> Self {
        self.set_hash = Some(SetHasher(hasher));
        self
    }

    /// A list or set block limited to one element, surfaced to Pulumi as an object.
    pub fn is_max_items_one(&self) -> bool {
        matches!(
            self.nesting_mode,
            BlockNestingMode::List | BlockNestingMode::Set
        ) && self.max_items == 1
    }

    /// The type of the collection holding this block's values.
    pub fn implied_type(&self) -> cty::Type {
        let object = self.block.implied_type();
        match self.nesting_mode {
            BlockNestingMode::Single => object,
            BlockNestingMode::List => cty::Type::list(object),
            BlockNestingMode::Set => cty::Type::set(object),
            BlockNestingMode::Map => cty::Type::map(object),
        }
    }
}

/// Schema for a resource or data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SchemaRepr", into = "SchemaRepr")]
pub struct Schema {
    /// The version of this schema (for state upgrades).
    pub version: u64,
    /// The root block containing all attributes and nested blocks.
    pub block: Block,
}

#[derive(Serialize, Deserialize)]
struct SchemaRepr {
    #[serde(default)]
    version: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    blocks: BTreeMap<String, NestedBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl From<SchemaRepr> for Schema {
    fn from(repr: SchemaRepr) -> Self {
        Self {
            version: repr.version,
            block: Block {
                attributes: repr.attributes,
                blocks: repr.blocks,
                description: repr.description,
            },
        }
    }
}

impl From<Schema> for SchemaRepr {
    fn from(schema: Schema) -> Self {
        Self {
            version: schema.version,
            attributes: schema.block.attributes,
            blocks: schema.block.blocks,
            description: schema.block.description,
        }
    }
}

impl Schema {
    /// Create a new schema with the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Create a schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to the schema.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Schema for the whole provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    #[serde(default)]
    pub provider: Schema,
    /// Schemas for each resource type, keyed by Terraform token.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Schemas for each data source type, keyed by Terraform token.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Create a new empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Add a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_by_name(v: &PropertyValue) -> i64 {
        match v.as_object().and_then(|m| m.get("name")) {
            Some(PropertyValue::String(s)) => s.len() as i64,
            _ => 0,
        }
    }

    #[test]
    fn test_attribute_flags() {
        let computed = AttributeFlags::computed();
        assert!(computed.is_computed_only());

        let optional_computed = AttributeFlags::optional_computed();
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);
        assert!(!optional_computed.is_computed_only());

        let sensitive = AttributeFlags::required().sensitive();
        assert!(sensitive.sensitive);
    }

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::new(
            AttributeType::list(AttributeType::String),
            AttributeFlags::optional(),
        )
        .with_description("Zones")
        .with_max_items(1)
        .with_force_new();

        assert!(attr.force_new);
        assert!(attr.is_max_items_one());
        assert!(!Attribute::optional_string().with_max_items(1).is_max_items_one());
    }

    #[test]
    fn test_block_fields_and_implied_type() {
        let block = Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("count", Attribute::optional_int64())
            .with_block(
                "rule",
                NestedBlock::set(Block::new().with_attribute("port", Attribute::optional_int64())),
            );

        let names: Vec<&str> = block.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["count", "name", "rule"]);
        assert!(matches!(block.field("rule"), Some(Field::Block(_))));
        assert!(block.field("missing").is_none());

        let expected = cty::Type::Object(BTreeMap::from([
            ("count".to_string(), cty::Type::Number),
            ("name".to_string(), cty::Type::String),
            (
                "rule".to_string(),
                cty::Type::set(cty::Type::Object(BTreeMap::from([(
                    "port".to_string(),
                    cty::Type::Number,
                )]))),
            ),
        ]));
        assert_eq!(block.implied_type(), expected);
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new());
        assert_eq!(single.nesting_mode, BlockNestingMode::Single);
        assert!(!single.is_max_items_one());

        let list = NestedBlock::list(Block::new()).with_max_items(1);
        assert!(list.is_max_items_one());

        let set = NestedBlock::set(Block::new()).with_set_hash(hash_by_name);
        let element = PropertyValue::from(serde_json::json!({"name": "abc"}));
        assert_eq!(set.set_hash.map(|h| h.hash(&element)), Some(3));
    }

    #[test]
    fn test_schema_serde() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_block("config", NestedBlock::list(Block::new()).with_max_items(1));

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["attributes"]["name"]["type"], "string");
        assert_eq!(json["attributes"]["name"]["force_new"], true);

        let back: Schema = serde_json::from_value(json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_schema_serde_keeps_wide_number_defaults() {
        let text = r#"{
            "version": 2,
            "attributes": {
                "limit": {"type": "number", "optional": true, "default": 123456789012345678901234567890}
            },
            "blocks": {
                "rule": {
                    "nesting_mode": "list",
                    "max_items": 3,
                    "attributes": {
                        "ratio": {"type": "number", "computed": true, "default": 0.1000000000000000000001}
                    }
                }
            }
        }"#;
        let schema: Schema = serde_json::from_str(text).unwrap();

        assert_eq!(schema.version, 2);
        let limit = &schema.block.attributes["limit"];
        assert!(limit.flags.optional);
        assert_eq!(
            limit.default.as_ref().unwrap().to_string(),
            "123456789012345678901234567890"
        );
        let rule = &schema.block.blocks["rule"];
        assert_eq!(rule.nesting_mode, BlockNestingMode::List);
        assert_eq!(rule.max_items, 3);
        let ratio = &rule.block.attributes["ratio"];
        assert!(ratio.flags.computed);
        assert_eq!(
            ratio.default.as_ref().unwrap().to_string(),
            "0.1000000000000000000001"
        );

        let back: Schema = serde_json::from_str(&serde_json::to_string(&schema).unwrap()).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_provider_schema() {
        let provider_schema = ProviderSchema::new()
            .with_provider_config(
                Schema::v0().with_attribute("api_key", Attribute::required_string().sensitive()),
            )
            .with_resource("example_resource", Schema::v0())
            .with_data_source("example_data", Schema::v0());

        assert!(provider_schema.provider.block.attributes.contains_key("api_key"));
        assert!(provider_schema.resources.contains_key("example_resource"));
        assert!(provider_schema.data_sources.contains_key("example_data"));
    }
}
