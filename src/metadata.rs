//! Persisted provider metadata and the token alias history kept inside it.
//!
//! Metadata is a JSON object of named sections that survives between token
//! generation runs. The `auto-aliasing` section records, for every Terraform
//! resource and data source, the token currently published for it and every
//! token it was published under before.

use crate::error::BridgeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Metadata section holding the [`AliasHistory`].
pub const ALIAS_METADATA_KEY: &str = "auto-aliasing";

/// Which kind of element a token names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    /// A managed resource.
    Resource,
    /// A data source.
    DataSource,
}

impl TokenKind {
    /// Lowercase label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::DataSource => "datasource",
        }
    }
}

/// A JSON object of named metadata sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderMetadata {
    sections: BTreeMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse metadata from JSON text. Blank text is empty metadata.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Load metadata from a file. A missing file is empty metadata.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no metadata file, starting empty");
                Ok(Self::default())
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Write metadata to a file as indented JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BridgeError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Serialize as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode the section stored under `key`, if present.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BridgeError> {
        self.sections
            .get(key)
            .map(T::deserialize)
            .transpose()
            .map_err(BridgeError::from)
    }

    /// Store `value` under `key`, replacing any previous section.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<(), BridgeError> {
        self.sections.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Drop the section stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.sections.remove(key)
    }

    /// Section names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// A token an element was published under before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAlias {
    /// The previous token.
    pub name: String,
    /// Whether the old token was generated as a full resource, not only a schema alias.
    pub in_codegen: bool,
    /// Provider major version at the time of the rename.
    pub major_version: u64,
}

/// Publication history of a single Terraform element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHistory {
    /// The token currently published.
    pub current: String,
    /// Earlier tokens, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub past: Vec<TokenAlias>,
    /// Provider major version this entry was last recorded under.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub major_version: u64,
    /// Per-field history written by other tooling, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl TokenHistory {
    /// Whether `token` is the current or any past token of this element.
    pub fn knows(&self, token: &str) -> bool {
        self.current == token || self.past.iter().any(|alias| alias.name == token)
    }
}

/// Alias history for every resource and data source of a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasHistory {
    /// Resource histories keyed by Terraform token.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, TokenHistory>,
    /// Data source histories keyed by Terraform token.
    #[serde(default, rename = "datasources", skip_serializing_if = "BTreeMap::is_empty")]
    pub data_sources: BTreeMap<String, TokenHistory>,
}

impl AliasHistory {
    /// Read the history from `metadata`, or an empty history if it has none.
    pub fn from_metadata(metadata: &ProviderMetadata) -> Result<Self, BridgeError> {
        Ok(metadata.get(ALIAS_METADATA_KEY)?.unwrap_or_default())
    }

    /// Write the history back into `metadata`.
    pub fn store(&self, metadata: &mut ProviderMetadata) -> Result<(), BridgeError> {
        metadata.set(ALIAS_METADATA_KEY, self)
    }

    /// Histories of one kind.
    pub fn entries(&self, kind: TokenKind) -> &BTreeMap<String, TokenHistory> {
        match kind {
            TokenKind::Resource => &self.resources,
            TokenKind::DataSource => &self.data_sources,
        }
    }

    fn entries_mut(&mut self, kind: TokenKind) -> &mut BTreeMap<String, TokenHistory> {
        match kind {
            TokenKind::Resource => &mut self.resources,
            TokenKind::DataSource => &mut self.data_sources,
        }
    }

    /// Record that `tf_token` is now published as `token`.
    ///
    /// A new element starts a fresh history. When the token of a known element
    /// changes, the previous token becomes an alias. Returns whether the
    /// history changed.
    pub fn record(&mut self, kind: TokenKind, tf_token: &str, token: &str, major_version: u64) -> bool {
        let entries = self.entries_mut(kind);
        let Some(history) = entries.get_mut(tf_token) else {
            entries.insert(
                tf_token.to_string(),
                TokenHistory {
                    current: token.to_string(),
                    major_version,
                    ..TokenHistory::default()
                },
            );
            return true;
        };

        let mut changed = false;
        if history.current != token {
            let previous = std::mem::replace(&mut history.current, token.to_string());
            if !history.past.iter().any(|alias| alias.name == previous) {
                debug!(kind = kind.label(), tf_token, from = %previous, to = token, "token renamed");
                history.past.push(TokenAlias {
                    name: previous,
                    in_codegen: true,
                    major_version,
                });
            }
            changed = true;
        }
        if history.major_version < major_version {
            // Field history is only valid within a major version.
            history.major_version = major_version;
            history.fields = None;
            changed = true;
        }
        changed
    }

    /// The Terraform token published under `token`, now or in the past.
    pub fn resolve_alias(&self, kind: TokenKind, token: &str) -> Option<&str> {
        let entries = self.entries(kind);
        entries
            .iter()
            .find(|(_, history)| history.current == token)
            .or_else(|| entries.iter().find(|(_, history)| history.knows(token)))
            .map(|(tf_token, _)| tf_token.as_str())
    }

    /// Highest major version mentioned by any alias.
    ///
    /// Used as the current version when the provider does not state one.
    pub fn latest_major_version(&self) -> u64 {
        self.resources
            .values()
            .chain(self.data_sources.values())
            .flat_map(|history| history.past.iter())
            .map(|alias| alias.major_version)
            .max()
            .unwrap_or(0)
    }
}
