//! Testing utilities for bridged resources.
//!
//! [`BridgeTester`] drives the planner and the diff translators for a single
//! resource schema with plain JSON inputs, so tests can exercise a resource's
//! diff behavior without building property maps by hand.
//!
//! # Example
//!
//! ```
//! use tf_bridge_sdk::schema::{Attribute, Schema};
//! use tf_bridge_sdk::testing::{assert_diff_kind, BridgeTester};
//! use tf_bridge_sdk::types::DiffKind;
//! use serde_json::json;
//!
//! let tester = BridgeTester::new(
//!     Schema::v0().with_attribute("name", Attribute::required_string().with_force_new()),
//! );
//!
//! let result = tester.diff(json!({"name": "a"}), json!({"name": "b"})).unwrap();
//! assert_diff_kind(&result, "name", DiffKind::UpdateReplace);
//! ```

use crate::detailed_diff::compute_detailed_diff;
use crate::diff::{make_detailed_diff, DiffOptions};
use crate::error::BridgeError;
use crate::ignore_changes::apply_ignore_changes;
use crate::plan::propose_property_value;
use crate::property::{property_map_from_json, PropertyMap, PropertyValue};
use crate::schema::{Block, ProviderSchema, Schema};
use crate::types::{DiffChanges, DiffKind, DiffResult, InstanceDiff};
use serde_json::Value;

/// A test harness around one resource schema.
///
/// Inputs and outputs are JSON keyed by Pulumi names, unless
/// [`BridgeTester::with_raw_names`] is set.
#[derive(Debug, Clone)]
pub struct BridgeTester {
    schema: Schema,
    options: DiffOptions,
}

impl BridgeTester {
    /// Create a tester for the given resource schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            options: DiffOptions::new(),
        }
    }

    /// Create a tester for a resource of a provider schema.
    pub fn for_resource(provider: &ProviderSchema, resource_type: &str) -> Option<Self> {
        provider.resources.get(resource_type).cloned().map(Self::new)
    }

    /// Ignore changes at these paths in every diff.
    pub fn with_ignore_changes<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.with_ignore_changes(paths);
        self
    }

    /// Key inputs by Terraform names instead of Pulumi names.
    pub fn with_raw_names(mut self, raw_names: bool) -> Self {
        self.options = self.options.with_raw_names(raw_names);
        self
    }

    /// The resource schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The root block of the resource schema.
    pub fn block(&self) -> &Block {
        &self.schema.block
    }

    /// The options every diff runs with.
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    // =========================================================================
    // Planning
    // =========================================================================

    /// Predict the planned state for `config` given `prior` state.
    pub fn plan(&self, prior: Value, config: Value) -> Result<Value, BridgeError> {
        let planned = propose_property_value(
            self.block(),
            &PropertyValue::from(prior),
            &PropertyValue::from(config),
        )?;
        Ok(planned.to_json())
    }

    /// Plan a creation (no prior state).
    pub fn plan_create(&self, config: Value) -> Result<Value, BridgeError> {
        self.plan(Value::Null, config)
    }

    // =========================================================================
    // Diffing
    // =========================================================================

    /// Diff prior state against new inputs directly.
    pub fn diff(&self, olds: Value, news: Value) -> Result<DiffResult, BridgeError> {
        compute_detailed_diff(self.block(), &map(&olds), &map(&news), &self.options)
    }

    /// Translate a Terraform instance diff for the given prior state and inputs.
    pub fn diff_instance(
        &self,
        olds: Value,
        news: Value,
        tf_diff: &InstanceDiff,
    ) -> Result<DiffResult, BridgeError> {
        make_detailed_diff(self.block(), &map(&olds), &map(&news), tf_diff, &self.options)
    }

    /// Plan `config` over `prior`, then diff the prior state against the plan.
    pub fn plan_and_diff(&self, prior: Value, config: Value) -> Result<DiffResult, BridgeError> {
        let planned = self.plan(prior.clone(), config)?;
        self.diff(prior, planned)
    }

    /// Restore the ignored paths of `news` from `olds`.
    pub fn apply_ignore_changes(&self, olds: Value, news: Value) -> Result<Value, BridgeError> {
        let result = apply_ignore_changes(&map(&olds), &map(&news), &self.options.ignore_changes)?;
        Ok(PropertyValue::Object(result).to_json())
    }
}

fn map(value: &Value) -> PropertyMap {
    property_map_from_json(value)
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a diff reports nothing.
///
/// # Panics
///
/// Panics if the diff has any change.
pub fn assert_no_changes(result: &DiffResult) {
    assert!(
        result.detailed_diff.is_empty() && result.changes == DiffChanges::None,
        "Expected no changes, but got {} change(s): {:?}",
        result.detailed_diff.len(),
        result.detailed_diff
    );
}

/// Assert that a diff reports at least one change.
///
/// # Panics
///
/// Panics if the diff is empty.
pub fn assert_has_changes(result: &DiffResult) {
    assert!(
        !result.detailed_diff.is_empty(),
        "Expected changes, but got no changes"
    );
}

/// Assert the change kind reported at `path`.
///
/// # Panics
///
/// Panics if `path` is not reported or is reported with another kind.
pub fn assert_diff_kind(result: &DiffResult, path: &str, kind: DiffKind) {
    match result.detailed_diff.get(path) {
        Some(actual) => assert_eq!(
            *actual, kind,
            "Expected {:?} at '{}', but got {:?}",
            kind, path, actual
        ),
        None => panic!(
            "Expected {:?} at '{}', but it is not in the diff: {:?}",
            kind, path, result.detailed_diff
        ),
    }
}

/// Assert that nothing is reported at `path`.
///
/// # Panics
///
/// Panics if `path` is in the diff.
pub fn assert_unchanged(result: &DiffResult, path: &str) {
    assert!(
        !result.detailed_diff.contains_key(path),
        "Expected no change at '{}', but got {:?}",
        path,
        result.detailed_diff[path]
    );
}

/// Assert that the diff replaces the resource.
///
/// # Panics
///
/// Panics if no change forces replacement.
pub fn assert_replaces(result: &DiffResult) {
    assert_eq!(
        result.changes,
        DiffChanges::SomeReplacing,
        "Expected replacement, but got {:?}: {:?}",
        result.changes,
        result.detailed_diff
    );
}

/// Assert that the diff updates the resource in place.
///
/// # Panics
///
/// Panics if the diff is empty or forces replacement.
pub fn assert_updates_in_place(result: &DiffResult) {
    assert_eq!(
        result.changes,
        DiffChanges::Some,
        "Expected an in-place update, but got {:?}: replacing paths {:?}",
        result.changes,
        result.replaces()
    );
}
