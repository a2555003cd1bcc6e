//! Translation between Terraform and Pulumi property names.

use crate::schema::{AttributeType, Block, BlockNestingMode, Field};

/// Convert a Terraform `snake_case` name into Pulumi `camelCase`.
///
/// Leading underscores are kept, runs of inner underscores capitalize the
/// next letter and a trailing underscore survives.
pub fn terraform_to_pulumi_name(name: &str) -> String {
    camel_case(name, false)
}

/// Convert a Terraform `snake_case` name into `UpperCamelCase`.
pub fn upper_camel_case(name: &str) -> String {
    camel_case(name, true)
}

fn camel_case(name: &str, upper: bool) -> String {
    let mut result = String::with_capacity(name.len());
    let mut next_cap = false;
    let mut casing_active = false;
    let mut prev = None;

    for (i, c) in name.chars().enumerate() {
        if c == '_' && casing_active {
            next_cap = true;
        } else {
            if c != '_' {
                casing_active = true;
            }
            if ((i == 0 && upper) || next_cap) && c.is_ascii_lowercase() {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
            next_cap = false;
        }
        prev = Some(c);
    }
    if prev == Some('_') && casing_active {
        result.push('_');
    }
    result
}

/// Lowercase the first character of `name`.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pluralize(name: &str) -> String {
    if name.ends_with('s') {
        return name.to_string();
    }
    if name.ends_with('x') || name.ends_with('z') || name.ends_with("ch") || name.ends_with("sh") {
        return format!("{}es", name);
    }
    if let Some(stem) = name.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", name)
}

fn is_array_shaped(field: Field<'_>) -> bool {
    match field {
        Field::Attribute(attr) => {
            matches!(
                attr.attr_type,
                AttributeType::List(_) | AttributeType::Set(_)
            ) && !attr.is_max_items_one()
        },
        Field::Block(block) => {
            matches!(
                block.nesting_mode,
                BlockNestingMode::List | BlockNestingMode::Set
            ) && !block.is_max_items_one()
        },
    }
}

/// The Pulumi name of the field `name` within `block`.
///
/// Explicit overrides win. Array-shaped fields are pluralized unless the plural
/// collides with another field of the block.
pub fn pulumi_name_in(block: &Block, name: &str) -> String {
    let Some(field) = block.field(name) else {
        return terraform_to_pulumi_name(name);
    };
    if let Some(explicit) = field.pulumi_name() {
        return explicit.to_string();
    }

    if is_array_shaped(field) {
        let plural = pluralize(name);
        let conflicting = plural != name
            && block.field(&plural).is_some_and(|other| {
                other
                    .pulumi_name()
                    .map_or(true, |explicit| explicit == plural)
            });
        if !conflicting {
            return terraform_to_pulumi_name(&plural);
        }
    }
    terraform_to_pulumi_name(name)
}

/// Find the Terraform field of `block` whose Pulumi name is `key`.
///
/// With `raw_names` the key is taken as a Terraform name verbatim.
pub fn terraform_field<'a>(
    block: &'a Block,
    key: &str,
    raw_names: bool,
) -> Option<(&'a str, Field<'a>)> {
    if raw_names {
        return block.fields().find(|(name, _)| *name == key);
    }
    block
        .fields()
        .find(|(name, _)| pulumi_name_in(block, name) == key)
}

/// The Pulumi name for `name` in `block`, or the raw name when `raw_names` is set.
pub fn property_name(block: &Block, name: &str, raw_names: bool) -> String {
    if raw_names {
        name.to_string()
    } else {
        pulumi_name_in(block, name)
    }
}
