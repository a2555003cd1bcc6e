//! Pulumi token assignment and case-insensitive deduplication.
//!
//! Terraform names resources like `aws_s3_bucket`; Pulumi names them with
//! tokens like `aws:s3/bucket:Bucket`. A naming strategy derives tokens from
//! Terraform names, but two distinct Terraform names can map to tokens that
//! only differ by case, which breaks SDKs on case-insensitive filesystems.
//! [`CaseInsensitiveDedup`] wraps a strategy and suffixes later collisions with
//! `V2`, `V3`, ... When provider metadata from an earlier run is supplied, every
//! element keeps the token it was published under, so suffixes never move
//! between elements as new ones are added.
//!
//! ```
//! use tf_bridge_sdk::tokens::{make_standard, TokenDeduper};
//! use tf_bridge_sdk::metadata::TokenKind;
//!
//! let mut deduper = TokenDeduper::new(make_standard("pkg"), None, TokenKind::Resource);
//! assert_eq!(deduper.ensure_unique("pkg:index/fooBar:FooBar").unwrap(), "pkg:index/fooBar:FooBar");
//! assert_eq!(deduper.ensure_unique("pkg:index/foobar:Foobar").unwrap(), "pkg:index/foobarV2:FoobarV2");
//! ```

use crate::error::BridgeError;
use crate::metadata::{AliasHistory, ProviderMetadata, TokenKind, ALIAS_METADATA_KEY};
use crate::naming::{lower_first, upper_camel_case};
use crate::schema::ProviderSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Suffix handed to the first collision of a name.
const FIRST_VARIANT: u32 = 2;

/// Joins a module and a name into a token.
pub type Finalize = Arc<dyn Fn(&str, &str) -> Result<String, BridgeError> + Send + Sync>;

/// The standard token layout: `(module, Name)` becomes `package:module/name:Name`.
pub fn make_standard(package: impl Into<String>) -> Finalize {
    let package = package.into();
    Arc::new(move |module: &str, name: &str| {
        if name.is_empty() {
            return Err(BridgeError::TokenFormat(format!(
                "empty name in module '{}' of package '{}'",
                module, package
            )));
        }
        Ok(format!("{}:{}/{}:{}", package, module, lower_first(name), name))
    })
}

/// The parts of a standard token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParts {
    /// Package, the first segment.
    pub package: String,
    /// Module, the middle segment without its `/name` suffix.
    pub module: String,
    /// Member name, the last segment.
    pub name: String,
}

impl TokenParts {
    /// Identity of the token when compared case-insensitively.
    pub fn normalized_key(&self) -> String {
        format!("{}:{}", self.module.to_lowercase(), self.name.to_lowercase())
    }
}

/// Split a `package:module/name:Name` token.
///
/// Returns `None` for anything that does not have three non-empty segments.
/// A module without `/` is used as a whole.
pub fn parse_standard_token(token: &str) -> Option<TokenParts> {
    let mut segments = token.split(':');
    let (Some(package), Some(module), Some(name), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return None;
    };
    if package.is_empty() || module.is_empty() || name.is_empty() {
        return None;
    }
    let module = module.split_once('/').map_or(module, |(namespace, _)| namespace);
    Some(TokenParts {
        package: package.to_string(),
        module: module.to_string(),
        name: name.to_string(),
    })
}

/// Tracks the tokens handed out for one kind of element and suffixes
/// case-insensitive collisions.
pub struct TokenDeduper {
    finalize: Finalize,
    kind: TokenKind,
    next_variant: BTreeMap<String, u32>,
    last_published: BTreeMap<String, String>,
    init_error: Option<String>,
}

impl std::fmt::Debug for TokenDeduper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDeduper")
            .field("kind", &self.kind)
            .field("next_variant", &self.next_variant)
            .field("last_published", &self.last_published)
            .field("init_error", &self.init_error)
            .finish_non_exhaustive()
    }
}

impl TokenDeduper {
    /// Create a deduper, seeded from the alias history in `metadata` if given.
    ///
    /// `finalize` must be the same function the naming strategy uses. A
    /// history that cannot be read is remembered and returned by every later
    /// call.
    pub fn new(finalize: Finalize, metadata: Option<&ProviderMetadata>, kind: TokenKind) -> Self {
        let mut deduper = Self {
            finalize,
            kind,
            next_variant: BTreeMap::new(),
            last_published: BTreeMap::new(),
            init_error: None,
        };
        if let Some(metadata) = metadata {
            deduper.seed(metadata);
        }
        deduper
    }

    fn seed(&mut self, metadata: &ProviderMetadata) {
        let history = match AliasHistory::from_metadata(metadata) {
            Ok(history) => history,
            Err(err) => {
                warn!(kind = self.kind.label(), error = %err, "unreadable alias history");
                self.init_error = Some(format!("reading \"{}\" metadata: {}", ALIAS_METADATA_KEY, err));
                return;
            },
        };
        for (tf_token, entry) in history.entries(self.kind) {
            if entry.current.is_empty() {
                continue;
            }
            self.last_published.insert(tf_token.clone(), entry.current.clone());
            self.register(&entry.current);
        }
        debug!(
            kind = self.kind.label(),
            seeded = self.last_published.len(),
            "seeded token deduper"
        );
    }

    /// The seeding failure, if any.
    pub fn check(&self) -> Result<(), BridgeError> {
        match &self.init_error {
            Some(msg) => Err(BridgeError::DedupInit(msg.clone())),
            None => Ok(()),
        }
    }

    /// Which kind of element this deduper names.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Mark `token` as taken. Repeated calls are harmless; unparseable tokens
    /// are ignored.
    pub fn register(&mut self, token: &str) {
        if let Some(parts) = parse_standard_token(token) {
            self.next_variant.entry(parts.normalized_key()).or_insert(FIRST_VARIANT);
        }
    }

    /// Forget `token`.
    pub fn unregister(&mut self, token: &str) {
        if let Some(parts) = parse_standard_token(token) {
            self.next_variant.remove(&parts.normalized_key());
        }
    }

    /// The token published for `tf_token` by an earlier run.
    pub fn prior_token(&self, tf_token: &str) -> Option<&str> {
        self.last_published.get(tf_token).map(String::as_str)
    }

    /// Return `token` if no taken token matches it case-insensitively, or the
    /// first free `V<n>` variant of it otherwise. The result is marked taken.
    pub fn ensure_unique(&mut self, token: &str) -> Result<String, BridgeError> {
        self.check()?;
        let Some(parts) = parse_standard_token(token) else {
            return Ok(token.to_string());
        };
        let key = parts.normalized_key();
        let Some(&next) = self.next_variant.get(&key) else {
            self.register(token);
            return Ok(token.to_string());
        };

        let mut variant = next;
        loop {
            let candidate = (self.finalize)(&parts.module, &format!("{}V{}", parts.name, variant))?;
            let candidate_key = parse_standard_token(&candidate)
                .ok_or_else(|| {
                    BridgeError::TokenFormat(format!(
                        "unexpected token format from finalize: {:?}",
                        candidate
                    ))
                })?
                .normalized_key();
            if !self.next_variant.contains_key(&candidate_key) {
                self.next_variant.insert(key, variant + 1);
                self.next_variant.insert(candidate_key, FIRST_VARIANT);
                debug!(kind = self.kind.label(), token, %candidate, "deduplicated token");
                return Ok(candidate);
            }
            variant += 1;
        }
    }
}

/// What a strategy knows about one Terraform element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    /// The assigned token, if any.
    pub token: Option<String>,
}

impl ElementInfo {
    /// An element with a token fixed by the user.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Assigns tokens to Terraform elements.
///
/// Implementations leave an element that already has a token alone.
pub trait TokenStrategy {
    /// Assign a token to the element named `tf_token`.
    fn assign(&mut self, kind: TokenKind, tf_token: &str, element: &mut ElementInfo) -> Result<(), BridgeError>;
}

/// Puts every element in one module.
///
/// The provider prefix is stripped from the Terraform name and the rest is
/// upper camel cased. Data sources get a `get` prefix.
pub struct SingleModule {
    prefix: String,
    module: String,
    finalize: Finalize,
}

impl SingleModule {
    /// Strip `prefix` (for example `aws_`) and place elements in `module`.
    pub fn new(prefix: impl Into<String>, module: impl Into<String>, finalize: Finalize) -> Self {
        Self {
            prefix: prefix.into(),
            module: module.into(),
            finalize,
        }
    }
}

impl TokenStrategy for SingleModule {
    fn assign(&mut self, kind: TokenKind, tf_token: &str, element: &mut ElementInfo) -> Result<(), BridgeError> {
        if element.token.is_some() {
            return Ok(());
        }
        let Some(rest) = tf_token.strip_prefix(&self.prefix) else {
            return Err(BridgeError::TokenFormat(format!(
                "token '{}' missing package prefix '{}'",
                tf_token, self.prefix
            )));
        };
        let name = match kind {
            TokenKind::Resource => upper_camel_case(rest),
            TokenKind::DataSource => format!("get{}", upper_camel_case(rest)),
        };
        element.token = Some((self.finalize)(&self.module, &name)?);
        Ok(())
    }
}

/// Wraps a strategy so that generated tokens never collide case-insensitively.
///
/// Tokens published by an earlier run are replayed first. User supplied tokens
/// are kept as given and only reserve their name.
pub struct CaseInsensitiveDedup<S> {
    base: S,
    resources: TokenDeduper,
    data_sources: TokenDeduper,
}

impl<S: TokenStrategy> CaseInsensitiveDedup<S> {
    /// Wrap `base`. `finalize` must be the function `base` builds tokens with.
    pub fn new(base: S, finalize: Finalize, metadata: Option<&ProviderMetadata>) -> Self {
        Self {
            base,
            resources: TokenDeduper::new(finalize.clone(), metadata, TokenKind::Resource),
            data_sources: TokenDeduper::new(finalize, metadata, TokenKind::DataSource),
        }
    }

    /// The deduper for `kind`.
    pub fn deduper(&self, kind: TokenKind) -> &TokenDeduper {
        match kind {
            TokenKind::Resource => &self.resources,
            TokenKind::DataSource => &self.data_sources,
        }
    }
}

impl<S: TokenStrategy> TokenStrategy for CaseInsensitiveDedup<S> {
    fn assign(&mut self, kind: TokenKind, tf_token: &str, element: &mut ElementInfo) -> Result<(), BridgeError> {
        let deduper = match kind {
            TokenKind::Resource => &mut self.resources,
            TokenKind::DataSource => &mut self.data_sources,
        };
        deduper.check()?;

        if element.token.is_none() {
            element.token = deduper.prior_token(tf_token).map(str::to_string);
        }
        let user_override = element.token.clone();
        if let Some(token) = &user_override {
            deduper.register(token);
        }

        self.base.assign(kind, tf_token, element)?;
        let Some(current) = &element.token else {
            return Ok(());
        };

        if let Some(user_override) = user_override {
            if &user_override != current {
                deduper.unregister(&user_override);
                deduper.register(current);
            }
            return Ok(());
        }

        let unique = deduper.ensure_unique(current).map_err(|err| match err {
            BridgeError::TokenFormat(msg) => {
                BridgeError::TokenFormat(format!("{} {:?}: {}", kind.label(), tf_token, msg))
            },
            other => other,
        })?;
        element.token = Some(unique);
        Ok(())
    }
}

/// Tokens per Terraform name, for resources and data sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMap {
    /// Resource tokens keyed by Terraform name.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    /// Data source tokens keyed by Terraform name.
    #[serde(default, rename = "datasources")]
    pub data_sources: BTreeMap<String, String>,
}

impl TokenMap {
    /// Tokens of one kind.
    pub fn entries(&self, kind: TokenKind) -> &BTreeMap<String, String> {
        match kind {
            TokenKind::Resource => &self.resources,
            TokenKind::DataSource => &self.data_sources,
        }
    }

    fn entries_mut(&mut self, kind: TokenKind) -> &mut BTreeMap<String, String> {
        match kind {
            TokenKind::Resource => &mut self.resources,
            TokenKind::DataSource => &mut self.data_sources,
        }
    }

    /// Record every token in `history` under the current major version.
    pub fn record_into(&self, history: &mut AliasHistory, major_version: u64) {
        for kind in [TokenKind::Resource, TokenKind::DataSource] {
            for (tf_token, token) in self.entries(kind) {
                history.record(kind, tf_token, token, major_version);
            }
        }
    }
}

/// Assign a token to every resource and data source of `schema`.
///
/// Names are visited in sorted order, so the first of two colliding names
/// always keeps the plain token. Tokens in `overrides` are passed to the
/// strategy as fixed. Every failing element is reported.
#[instrument(skip_all, fields(resources = schema.resources.len(), data_sources = schema.data_sources.len()))]
pub fn compute_tokens<S: TokenStrategy + ?Sized>(
    schema: &ProviderSchema,
    strategy: &mut S,
    overrides: &TokenMap,
) -> Result<TokenMap, BridgeError> {
    let mut tokens = TokenMap::default();
    let mut errors = Vec::new();

    let kinds = [
        (TokenKind::Resource, schema.resources.keys()),
        (TokenKind::DataSource, schema.data_sources.keys()),
    ];
    for (kind, names) in kinds {
        for tf_token in names {
            let mut element = ElementInfo {
                token: overrides.entries(kind).get(tf_token).cloned(),
            };
            if let Err(err) = strategy.assign(kind, tf_token, &mut element) {
                if matches!(err, BridgeError::DedupInit(_)) {
                    return Err(err);
                }
                errors.push(err);
                continue;
            }
            if let Some(token) = element.token {
                tokens.entries_mut(kind).insert(tf_token.clone(), token);
            }
        }
    }

    match errors.len() {
        0 => Ok(tokens),
        1 => Err(errors.remove(0)),
        _ => Err(BridgeError::TokenFormat(
            errors.iter().map(BridgeError::message).collect::<Vec<_>>().join("; "),
        )),
    }
}
