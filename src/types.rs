//! Shared diff types and wire constants.
//!
//! [`InstanceDiff`] is Terraform's flat per-attribute diff; [`DetailedDiff`] and
//! [`DiffChanges`] are what the bridge reports back to Pulumi.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel Pulumi uses for values that are unknown during preview.
pub const UNKNOWN_VALUE: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

/// Sentinel Terraform uses for unknown values in flattened attributes.
pub const TF_UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// The change to a single flattened Terraform attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttrDiff {
    /// The prior flattened value.
    #[serde(default)]
    pub old: String,
    /// The planned flattened value.
    #[serde(default)]
    pub new: String,
    /// The new value will only be known after apply.
    #[serde(default)]
    pub new_computed: bool,
    /// The attribute is being removed.
    #[serde(default)]
    pub new_removed: bool,
    /// Changing this attribute forces replacement.
    #[serde(default)]
    pub requires_new: bool,
    /// The attribute holds sensitive data.
    #[serde(default)]
    pub sensitive: bool,
}

impl ResourceAttrDiff {
    /// A plain value change.
    pub fn update(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            ..Default::default()
        }
    }

    /// A removal of the attribute.
    pub fn removed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_removed: true,
            ..Default::default()
        }
    }

    /// A change to a value that is unknown until apply.
    pub fn computed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_computed: true,
            ..Default::default()
        }
    }

    /// Mark this change as forcing replacement.
    pub fn with_requires_new(mut self) -> Self {
        self.requires_new = true;
        self
    }

    /// Whether this entry describes an actual change.
    pub fn is_change(&self) -> bool {
        self.old != self.new || self.new_computed || self.new_removed
    }
}

/// Terraform's flat diff: encoded attribute key to change.
///
/// Keys look like `name`, `items.0.weight`, `items.#`, `labels.%` or
/// `rules.1234567.port` (set elements are keyed by hash).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDiff {
    /// Per-attribute changes.
    #[serde(default)]
    pub attributes: BTreeMap<String, ResourceAttrDiff>,
    /// The whole resource is being destroyed.
    #[serde(default)]
    pub destroy: bool,
}

impl InstanceDiff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute change.
    pub fn with_attribute(mut self, key: impl Into<String>, diff: ResourceAttrDiff) -> Self {
        self.attributes.insert(key.into(), diff);
        self
    }

    /// Look up the change at `key`.
    pub fn attribute(&self, key: &str) -> Option<&ResourceAttrDiff> {
        self.attributes.get(key)
    }

    /// Whether any attribute requires replacement.
    pub fn requires_new(&self) -> bool {
        self.attributes.values().any(|d| d.requires_new)
    }

    /// Drop every entry whose key equals an ignored key or is nested under one.
    pub fn ignore_changes(&mut self, ignored: &BTreeSet<String>) {
        self.attributes.retain(|key, _| {
            !ignored.iter().any(|ignored| {
                key == ignored
                    || key
                        .strip_prefix(ignored.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
        });
    }
}

/// The kind of change at a single property path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// The property is being added.
    Add,
    /// The property is being added and forces replacement.
    AddReplace,
    /// The property is being removed.
    Delete,
    /// The property is being removed and forces replacement.
    DeleteReplace,
    /// The property value changes.
    Update,
    /// The property value changes and forces replacement.
    UpdateReplace,
}

impl DiffKind {
    /// Whether this change forces replacement.
    pub fn is_replace(self) -> bool {
        matches!(
            self,
            Self::AddReplace | Self::DeleteReplace | Self::UpdateReplace
        )
    }

    /// The replacing variant of this kind.
    pub fn to_replace(self) -> Self {
        match self {
            Self::Add | Self::AddReplace => Self::AddReplace,
            Self::Delete | Self::DeleteReplace => Self::DeleteReplace,
            Self::Update | Self::UpdateReplace => Self::UpdateReplace,
        }
    }
}

/// Property path (Pulumi syntax) to change kind.
pub type DetailedDiff = BTreeMap<String, DiffKind>;

/// Overall magnitude of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffChanges {
    /// Nothing changes.
    #[default]
    None,
    /// Something changes in place.
    Some,
    /// Something changes and the resource must be replaced.
    SomeReplacing,
}

/// The result of translating a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Per-path changes.
    pub detailed_diff: DetailedDiff,
    /// Overall magnitude.
    pub changes: DiffChanges,
}

impl DiffResult {
    /// A result with no changes.
    pub fn no_changes() -> Self {
        Self::default()
    }

    /// Build a result from per-path changes, deriving the magnitude.
    pub fn from_detailed(detailed_diff: DetailedDiff) -> Self {
        let changes = if detailed_diff.is_empty() {
            DiffChanges::None
        } else if detailed_diff.values().any(|k| k.is_replace()) {
            DiffChanges::SomeReplacing
        } else {
            DiffChanges::Some
        };
        Self {
            detailed_diff,
            changes,
        }
    }

    /// Paths whose change forces replacement.
    pub fn replaces(&self) -> Vec<&str> {
        self.detailed_diff
            .iter()
            .filter(|(_, kind)| kind.is_replace())
            .map(|(path, _)| path.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_diff_is_change() {
        assert!(!ResourceAttrDiff::update("1", "1").is_change());
        assert!(ResourceAttrDiff::update("1", "2").is_change());
        assert!(ResourceAttrDiff::computed("1").is_change());
        assert!(ResourceAttrDiff::removed("1").is_change());
    }

    #[test]
    fn test_instance_diff_ignore_changes() {
        let mut diff = InstanceDiff::new()
            .with_attribute("items.0.weight", ResourceAttrDiff::update("200", "100"))
            .with_attribute("items.0.weightx", ResourceAttrDiff::update("1", "2"))
            .with_attribute("items.0.weight.x", ResourceAttrDiff::update("1", "2"))
            .with_attribute("name", ResourceAttrDiff::update("a", "b"));

        let ignored = BTreeSet::from(["items.0.weight".to_string()]);
        diff.ignore_changes(&ignored);

        let keys: Vec<_> = diff.attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["items.0.weightx", "name"]);
    }

    #[test]
    fn test_diff_result_magnitude() {
        assert_eq!(
            DiffResult::from_detailed(DetailedDiff::new()).changes,
            DiffChanges::None
        );

        let mut detailed = DetailedDiff::new();
        detailed.insert("name".to_string(), DiffKind::Update);
        assert_eq!(
            DiffResult::from_detailed(detailed.clone()).changes,
            DiffChanges::Some
        );

        detailed.insert("zone".to_string(), DiffKind::UpdateReplace);
        let result = DiffResult::from_detailed(detailed);
        assert_eq!(result.changes, DiffChanges::SomeReplacing);
        assert_eq!(result.replaces(), vec!["zone"]);
    }

    #[test]
    fn test_diff_kind_serde() {
        let json = serde_json::to_string(&DiffKind::UpdateReplace).unwrap();
        assert_eq!(json, "\"update_replace\"");
        assert_eq!(DiffKind::Delete.to_replace(), DiffKind::DeleteReplace);
    }
}
