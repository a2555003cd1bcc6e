//! Error types for the bridge core.

use thiserror::Error;

/// Errors that can occur while walking, planning, diffing or naming resources.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A schema path could not be encoded.
    #[error("Malformed schema path: {0}")]
    MalformedPath(String),

    /// A property path string could not be parsed.
    #[error("Invalid property path: {0}")]
    InvalidPropertyPath(String),

    /// A schema path does not resolve against the schema.
    ///
    /// `path` is the deepest prefix that did resolve.
    #[error("Schema lookup failed after '{path}': {reason}")]
    SchemaLookup {
        /// The encoded prefix that resolved successfully.
        path: String,
        /// Why the next step failed.
        reason: String,
    },

    /// Two values co-traversed at the same path have incompatible shapes.
    #[error("Type mismatch at '{path}': {left} vs {right}")]
    TypeMismatch {
        /// The property path where the shapes diverge.
        path: String,
        /// The kind of the left-hand value.
        left: &'static str,
        /// The kind of the right-hand value.
        right: &'static str,
    },

    /// A type encoding is not recognized.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A value could not be converted between representations.
    #[error("Failed to convert {context}: {source}")]
    Conversion {
        /// Which value was being converted and in which direction.
        context: String,
        /// The underlying failure.
        #[source]
        source: Box<BridgeError>,
    },

    /// A resource token is not in `pkg:module:Name` form.
    #[error("Invalid token: {0}")]
    TokenFormat(String),

    /// The token deduplicator could not be seeded from provider metadata.
    #[error("Token deduplication unavailable: {0}")]
    DedupInit(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading persisted metadata failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Get the error message as a string.
    ///
    /// Returns the most specific detail available for the variant.
    pub fn message(&self) -> &str {
        match self {
            Self::MalformedPath(msg) => msg,
            Self::InvalidPropertyPath(msg) => msg,
            Self::SchemaLookup { reason, .. } => reason,
            Self::TypeMismatch { path, .. } => path,
            Self::UnsupportedType(msg) => msg,
            Self::Conversion { context, .. } => context,
            Self::TokenFormat(msg) => msg,
            Self::DedupInit(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Io(_err) => "i/o error (see Debug output)",
        }
    }

    /// Wrap this error with a description of the conversion that failed.
    pub fn in_context(self, context: impl Into<String>) -> Self {
        Self::Conversion {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<BridgeError> for tonic::Status {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::MalformedPath(msg) => tonic::Status::invalid_argument(msg),
            BridgeError::InvalidPropertyPath(msg) => tonic::Status::invalid_argument(msg),
            err @ BridgeError::SchemaLookup { .. } => tonic::Status::not_found(err.to_string()),
            err @ BridgeError::TypeMismatch { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            },
            BridgeError::UnsupportedType(msg) => tonic::Status::unimplemented(msg),
            err @ BridgeError::Conversion { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            },
            BridgeError::TokenFormat(msg) => tonic::Status::invalid_argument(msg),
            BridgeError::DedupInit(msg) => tonic::Status::failed_precondition(msg),
            BridgeError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            BridgeError::Io(err) => tonic::Status::internal(format!("I/O error: {}", err)),
        }
    }
}
