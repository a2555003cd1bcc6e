//! TF Bridge SDK
//!
//! This crate provides the core machinery for exposing a Terraform-style
//! provider as a Pulumi resource provider: schema-aware paths, property tree
//! walking, planned state prediction, diff translation and token naming.
//! It does not speak any wire protocol itself; a host process decodes requests,
//! calls into these functions and encodes the results.
//!
//! # Overview
//!
//! The SDK provides:
//!
//! - **Schema types**: Attribute and block schemas with nesting modes, `force_new` and set hashing
//! - **Schema paths**: Encodable references to locations in a schema ([`schema_path`])
//! - **Property values**: Pulumi's property trees and paths ([`property`])
//! - **Walking**: Co-traversal of two property trees ([`walk`])
//! - **Planning**: Terraform's proposed new state computation ([`plan`])
//! - **Diffs**: Terraform instance diffs and structural diffs translated to
//!   Pulumi detailed diffs, honoring `ignoreChanges` ([`diff`], [`detailed_diff`])
//! - **Tokens**: Resource token assignment with case-insensitive deduplication
//!   that stays stable across runs ([`tokens`], [`metadata`])
//! - **Error types**: One error enum for the whole crate
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```
//! use tf_bridge_sdk::{
//!     make_detailed_diff, DiffChanges, DiffOptions, InstanceDiff, ResourceAttrDiff,
//!     schema::{Attribute, Block, NestedBlock},
//!     property::property_map_from_json,
//! };
//! use serde_json::json;
//!
//! let block = Block::new().with_block(
//!     "items",
//!     NestedBlock::list(Block::new().with_attribute("weight", Attribute::optional_int64())),
//! );
//! let olds = property_map_from_json(&json!({"items": [{"weight": 200}]}));
//! let news = property_map_from_json(&json!({"items": [{"weight": 100}]}));
//! let tf_diff = InstanceDiff::new()
//!     .with_attribute("items.0.weight", ResourceAttrDiff::update("200", "100"));
//!
//! let options = DiffOptions::new().with_ignore_changes(["items[0].weight"]);
//! let result = make_detailed_diff(&block, &olds, &news, &tf_diff, &options).unwrap();
//! assert!(result.detailed_diff.is_empty());
//! assert_eq!(result.changes, DiffChanges::None);
//! ```
//!
//! # Unknown Values
//!
//! Pulumi marks values that are unknown during preview with [`UNKNOWN_VALUE`],
//! which property values decode to [`PropertyValue::Computed`]. Typed values
//! in their envelope use Terraform's [`TF_UNKNOWN_VALUE`] instead.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod cty;
pub mod detailed_diff;
pub mod diff;
pub mod error;
pub mod hash;
pub mod ignore_changes;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod plan;
pub mod property;
pub mod schema;
pub mod schema_path;
pub mod testing;
pub mod tokens;
pub mod types;
pub mod walk;

// Re-export main types at crate root
pub use detailed_diff::compute_detailed_diff;
pub use diff::{make_detailed_diff, DiffOptions};
pub use error::BridgeError;
pub use ignore_changes::{apply_ignore_changes, IgnoreChanges};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use metadata::{AliasHistory, ProviderMetadata, TokenKind};
pub use plan::{plan_proposed_new, proposed_new};
pub use property::{PathSegment, PropertyMap, PropertyPath, PropertyValue};
pub use schema::ProviderSchema;
pub use schema_path::{lookup_schema_path, SchemaPath, SchemaPathStep};
pub use tokens::{compute_tokens, make_standard, CaseInsensitiveDedup, TokenDeduper};
pub use types::{
    DetailedDiff, DiffChanges, DiffKind, DiffResult, InstanceDiff, ResourceAttrDiff,
    TF_UNKNOWN_VALUE, UNKNOWN_VALUE,
};
pub use walk::{walk_two_property_values, WalkSignal};

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
