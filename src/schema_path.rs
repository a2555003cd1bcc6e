//! Locations inside a schema tree.
//!
//! A [`SchemaPath`] is a sequence of [`SchemaPathStep`]s: `GetAttr(name)`
//! selects an attribute or nested block, `Element` selects the element type of
//! a collection. Paths are immutable; every builder returns a new path.
//!
//! The flat encoding joins steps with `.` and writes `Element` as `$`, so
//! `rule.$.port` addresses the `port` attribute of each `rule` block.

use crate::cty;
use crate::error::BridgeError;
use crate::naming;
use crate::property::{PathSegment, PropertyPath};
use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Field, NestedBlock};
use std::cmp::Ordering;
use std::fmt;

const ELEMENT: &str = "$";

/// One step of a [`SchemaPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaPathStep {
    /// Select the named attribute or nested block.
    GetAttr(String),
    /// Select the element of a list, set or map.
    Element,
}

/// An immutable path into a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SchemaPath(Vec<SchemaPathStep>);

impl SchemaPath {
    /// The empty path, addressing the root.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// A new path selecting attribute `name` below this one.
    pub fn get_attr(&self, name: impl Into<String>) -> Self {
        self.with_step(SchemaPathStep::GetAttr(name.into()))
    }

    /// A new path selecting the collection element below this one.
    pub fn element(&self) -> Self {
        self.with_step(SchemaPathStep::Element)
    }

    /// A new path with `step` appended.
    pub fn with_step(&self, step: SchemaPathStep) -> Self {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(step);
        Self(steps)
    }

    /// The steps of this path.
    pub fn steps(&self) -> &[SchemaPathStep] {
        &self.0
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as a flat string.
    ///
    /// Fails for attribute names that contain `.`, are `$` or are empty, since
    /// those cannot be decoded back unambiguously.
    pub fn encode(&self) -> Result<String, BridgeError> {
        for step in &self.0 {
            if let SchemaPathStep::GetAttr(name) = step {
                if name.contains('.') {
                    return Err(BridgeError::MalformedPath(format!(
                        "cannot encode attribute name {:?} containing '.'",
                        name
                    )));
                }
                if name == ELEMENT || name.is_empty() {
                    return Err(BridgeError::MalformedPath(format!(
                        "cannot encode attribute name {:?}",
                        name
                    )));
                }
            }
        }
        Ok(self.encode_lossy())
    }

    /// Decode a flat string. Every string decodes; the empty string is the root.
    pub fn decode(encoded: &str) -> Self {
        if encoded.is_empty() {
            return Self::new();
        }
        Self(
            encoded
                .split('.')
                .map(|frag| {
                    if frag == ELEMENT {
                        SchemaPathStep::Element
                    } else {
                        SchemaPathStep::GetAttr(frag.to_string())
                    }
                })
                .collect(),
        )
    }

    fn encode_lossy(&self) -> String {
        self.0
            .iter()
            .map(|step| match step {
                SchemaPathStep::GetAttr(name) => name.as_str(),
                SchemaPathStep::Element => ELEMENT,
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Ord for SchemaPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encode_lossy()
            .cmp(&other.encode_lossy())
            .then_with(|| self.0.len().cmp(&other.0.len()))
            .then_with(|| {
                // Only reachable for names containing '.', which do not encode.
                format!("{:?}", self.0).cmp(&format!("{:?}", other.0))
            })
    }
}

impl PartialOrd for SchemaPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode_lossy())
    }
}

/// What a [`SchemaPath`] resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode<'a> {
    /// An object-shaped block: the root, a single block or a collection element.
    Block(&'a Block),
    /// A nested block collection.
    NestedBlock(&'a NestedBlock),
    /// A schema attribute.
    Attribute(&'a Attribute),
    /// A location inside an attribute's type.
    Type(cty::Type),
}

impl<'a> SchemaNode<'a> {
    fn from_field(field: Field<'a>) -> Self {
        match field {
            Field::Attribute(attr) => Self::Attribute(attr),
            Field::Block(block) => Self::NestedBlock(block),
        }
    }

    /// Whether changing the value at this node forces replacement.
    pub fn force_new(&self) -> bool {
        match self {
            Self::Attribute(attr) => attr.force_new,
            Self::NestedBlock(block) => block.force_new,
            _ => false,
        }
    }

    /// Whether this node is a list, set or map, either attribute or block.
    pub fn is_collection(&self) -> bool {
        match self {
            Self::Attribute(attr) => matches!(
                attr.attr_type,
                AttributeType::List(_) | AttributeType::Set(_) | AttributeType::Map(_)
            ),
            Self::NestedBlock(block) => block.nesting_mode != BlockNestingMode::Single,
            Self::Type(ty) => matches!(ty, cty::Type::List(_) | cty::Type::Set(_) | cty::Type::Map(_)),
            Self::Block(_) => false,
        }
    }

    /// Whether this node is set-valued.
    pub fn is_set(&self) -> bool {
        match self {
            Self::Attribute(attr) => matches!(attr.attr_type, AttributeType::Set(_)),
            Self::NestedBlock(block) => block.nesting_mode == BlockNestingMode::Set,
            Self::Type(ty) => matches!(ty, cty::Type::Set(_)),
            Self::Block(_) => false,
        }
    }

    fn step(&self, step: &SchemaPathStep) -> Result<SchemaNode<'a>, String> {
        match (self, step) {
            (Self::Block(block), SchemaPathStep::GetAttr(name)) => block
                .field(name)
                .map(Self::from_field)
                .ok_or_else(|| format!("no attribute or block named '{}'", name)),
            (Self::Block(_), SchemaPathStep::Element) => {
                Err("element step is not applicable to an object".to_string())
            },
            (Self::NestedBlock(nested), SchemaPathStep::Element) => match nested.nesting_mode {
                BlockNestingMode::Single => {
                    Err("element step is not applicable to a single block".to_string())
                },
                _ => Ok(Self::Block(&nested.block)),
            },
            (Self::NestedBlock(nested), SchemaPathStep::GetAttr(_))
                if nested.nesting_mode == BlockNestingMode::Single =>
            {
                Self::Block(&nested.block).step(step)
            },
            (Self::NestedBlock(_), SchemaPathStep::GetAttr(name)) => Err(format!(
                "attribute step '{}' is not applicable to a block collection",
                name
            )),
            (Self::Attribute(attr), _) => Self::Type(attr.attr_type.cty_type()).step(step),
            (Self::Type(ty), step) => type_step(ty, step).map(Self::Type),
        }
    }
}

fn type_step(ty: &cty::Type, step: &SchemaPathStep) -> Result<cty::Type, String> {
    match (ty, step) {
        (cty::Type::Dynamic, _) => Ok(cty::Type::Dynamic),
        (cty::Type::List(elem) | cty::Type::Set(elem) | cty::Type::Map(elem), SchemaPathStep::Element) => {
            Ok((**elem).clone())
        },
        (cty::Type::Object(attrs), SchemaPathStep::GetAttr(name)) => attrs
            .get(name)
            .cloned()
            .ok_or_else(|| format!("object type has no attribute '{}'", name)),
        (cty::Type::Object(_), SchemaPathStep::Element) => {
            Err("element step is not applicable to object types".to_string())
        },
        (ty, SchemaPathStep::Element) => Err(format!(
            "element step is not applicable to {}",
            ty.friendly_name()
        )),
        (ty, SchemaPathStep::GetAttr(name)) => Err(format!(
            "attribute step '{}' is not applicable to {}",
            name,
            ty.friendly_name()
        )),
    }
}

/// Resolve `path` against `block`.
///
/// On failure the error carries the deepest prefix of `path` that resolved.
pub fn lookup_schema_path<'a>(
    path: &SchemaPath,
    block: &'a Block,
) -> Result<SchemaNode<'a>, BridgeError> {
    let mut resolved = SchemaPath::new();
    let mut node = SchemaNode::Block(block);
    for step in path.steps() {
        node = node
            .step(step)
            .map_err(|reason| BridgeError::SchemaLookup {
                path: resolved.to_string(),
                reason,
            })?;
        resolved = resolved.with_step(step.clone());
    }
    Ok(node)
}

/// Visit every attribute, nested block and element type below `block`.
///
/// Parents are visited before children and fields in name order. Single
/// nested blocks are entered without an element step.
pub fn visit_schema<F>(block: &Block, mut visitor: F)
where
    F: FnMut(&SchemaPath, &SchemaNode<'_>),
{
    visit_block(&SchemaPath::new(), block, &mut visitor);
}

fn visit_block<F>(path: &SchemaPath, block: &Block, visitor: &mut F)
where
    F: FnMut(&SchemaPath, &SchemaNode<'_>),
{
    for (name, field) in block.fields() {
        let field_path = path.get_attr(name);
        let node = SchemaNode::from_field(field);
        visitor(&field_path, &node);
        match field {
            Field::Attribute(attr) => visit_type(&field_path, &attr.attr_type.cty_type(), visitor),
            Field::Block(nested) => match nested.nesting_mode {
                BlockNestingMode::Single => visit_block(&field_path, &nested.block, visitor),
                _ => {
                    let elem_path = field_path.element();
                    visitor(&elem_path, &SchemaNode::Block(&nested.block));
                    visit_block(&elem_path, &nested.block, visitor);
                },
            },
        }
    }
}

fn visit_type<F>(path: &SchemaPath, ty: &cty::Type, visitor: &mut F)
where
    F: FnMut(&SchemaPath, &SchemaNode<'_>),
{
    match ty {
        cty::Type::List(elem) | cty::Type::Set(elem) | cty::Type::Map(elem) => {
            let elem_path = path.element();
            visitor(&elem_path, &SchemaNode::Type((**elem).clone()));
            visit_type(&elem_path, elem, visitor);
        },
        cty::Type::Object(attrs) => {
            for (name, attr_ty) in attrs {
                let attr_path = path.get_attr(name.as_str());
                visitor(&attr_path, &SchemaNode::Type(attr_ty.clone()));
                visit_type(&attr_path, attr_ty, visitor);
            }
        },
        _ => {},
    }
}

/// Translate a Pulumi property path into the schema path it addresses.
///
/// Keys are mapped back to Terraform names (verbatim with `raw_names`), indexes,
/// map keys and wildcards become element steps, and fields collapsed from
/// one-element lists get their implicit element step.
pub fn property_path_to_schema_path<'a>(
    path: &PropertyPath,
    block: &'a Block,
    raw_names: bool,
) -> Result<SchemaPath, BridgeError> {
    let mut result = SchemaPath::new();
    let mut node: SchemaNode<'a> = SchemaNode::Block(block);

    for segment in path.segments() {
        let resolved = result.to_string();
        let lookup_err = |reason: String| BridgeError::SchemaLookup {
            path: resolved.clone(),
            reason,
        };

        let (step, next) = match (&node, segment) {
            (SchemaNode::Block(b), PathSegment::Key(key)) => {
                let b: &'a Block = *b;
                let (tf_name, field) = naming::terraform_field(b, key, raw_names)
                    .ok_or_else(|| lookup_err(format!("no property named '{}'", key)))?;
                result = result.get_attr(tf_name);
                match SchemaNode::from_field(field) {
                    collapsed if field.is_max_items_one() => {
                        (Some(SchemaPathStep::Element), collapsed)
                    },
                    SchemaNode::NestedBlock(nested)
                        if nested.nesting_mode == BlockNestingMode::Single =>
                    {
                        (None, SchemaNode::Block(&nested.block))
                    },
                    other => (None, other),
                }
            },
            (SchemaNode::Type(cty::Type::Object(_)), PathSegment::Key(key)) => {
                (Some(SchemaPathStep::GetAttr(key.clone())), node.clone())
            },
            (SchemaNode::Attribute(attr), PathSegment::Key(key))
                if matches!(attr.attr_type, AttributeType::Object(_)) =>
            {
                (Some(SchemaPathStep::GetAttr(key.clone())), node.clone())
            },
            (_, PathSegment::Key(_) | PathSegment::Index(_) | PathSegment::Wildcard) => {
                (Some(SchemaPathStep::Element), node.clone())
            },
        };

        node = match step {
            Some(step) => {
                let stepped = next.step(&step).map_err(lookup_err)?;
                result = result.with_step(step);
                stepped
            },
            None => next,
        };
    }

    Ok(result)
}
