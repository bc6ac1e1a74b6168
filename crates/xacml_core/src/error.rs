//! Error taxonomy for policy construction and marshalling.
//!
//! Every error surfaces synchronously to the caller of the operation that
//! raised it. Nothing here is retried.

use crate::capability::ConstructorCapability;
use crate::kind::ArtifactKind;
use crate::version::VersionError;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Umbrella error for registry and bridge operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Candidate constructor or configuration rejected
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Named constructor could not be found
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Active constructor failed to build an artifact
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// Reference lookup failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Node graph could not be serialized
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

/// Registration or configuration was rejected; prior state is untouched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Constructor does not declare the full capability contract
    #[error("Constructor {constructor} is missing capabilities: {}", list_capabilities(.missing))]
    MissingCapabilities {
        /// Constructor name
        constructor: String,
        /// Capabilities it failed to declare
        missing: Vec<ConstructorCapability>,
    },

    /// A constructor with the same name is already in the catalog
    #[error("Constructor already registered: {name}")]
    AlreadyRegistered {
        /// Constructor name
        name: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: String,
        /// What was wrong with it
        reason: String,
    },
}

fn list_capabilities(caps: &[ConstructorCapability]) -> String {
    caps.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A constructor name did not resolve to a registered constructor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No policy constructor registered under {name:?}")]
pub struct LoadError {
    /// The name that was looked up
    pub name: String,
}

/// The active constructor failed to build an artifact
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    /// Reading the input stream failed
    #[error("Failed to read policy document: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well formed
    #[error("Malformed policy document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The document is well formed but not a valid policy document
    #[error("Schema violation: {reason}")]
    Schema {
        /// Description of the violation
        reason: String,
    },

    /// Root element disagrees with the requested artifact kind
    #[error("Expected a {expected} document, found root element {actual}")]
    KindMismatch {
        /// Kind requested by the caller
        expected: ArtifactKind,
        /// Root element name found in the document
        actual: String,
    },

    /// Document exceeded the configured size limit
    #[error("Policy document exceeds limit of {limit} bytes")]
    TooLarge {
        /// Configured limit
        limit: u64,
    },

    /// The constructor does not implement the requested operation
    #[error("Constructor {constructor} does not support {capability}")]
    Unsupported {
        /// Constructor name
        constructor: String,
        /// Operation that was requested
        capability: ConstructorCapability,
    },

    /// Eager reference resolution failed
    #[error("Reference resolution failed during construction: {0}")]
    Resolution(#[from] ResolutionError),

    /// Marshalling a node graph before construction failed
    #[error("Failed to marshal node graph: {0}")]
    Marshal(#[from] MarshalError),
}

/// A policy reference could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The artifact holds a reference but was built without a resolver
    #[error("No resolver available for reference {id}")]
    NoResolver {
        /// Referenced id
        id: String,
    },

    /// The resolver has no artifact for the reference
    #[error("Referenced policy not found: {id}{}", .version.as_deref().map(|v| format!(" (version {})", v)).unwrap_or_default())]
    NotFound {
        /// Referenced id
        id: String,
        /// Version pattern, if any
        version: Option<String>,
    },

    /// The resolver returned an artifact of the wrong kind
    #[error("Reference {id} expected a {expected}, resolved a {actual}")]
    KindMismatch {
        /// Referenced id
        id: String,
        /// Kind named by the reference element
        expected: ArtifactKind,
        /// Kind of the resolved artifact
        actual: ArtifactKind,
    },

    /// Version attribute on the reference is not a valid pattern
    #[error("Invalid version on reference: {0}")]
    InvalidVersion(#[from] VersionError),

    /// The reference leads back to an artifact already being evaluated
    #[error("Circular policy reference through {id}")]
    Circular {
        /// Id of the artifact reached twice
        id: String,
    },

    /// The chain of resolved references is longer than allowed
    #[error("Reference chain through {id} exceeds {limit} artifacts")]
    TooDeep {
        /// Id of the artifact that crossed the limit
        id: String,
        /// Maximum chain length
        limit: usize,
    },
}

/// A node graph could not be serialized
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    /// A required attribute or child is empty
    #[error("{element} is missing required {field}")]
    MissingField {
        /// Element local name
        element: &'static str,
        /// Attribute or child name
        field: &'static str,
    },

    /// A sequence that needs at least one member is empty
    #[error("{element} requires at least one {child}")]
    EmptySequence {
        /// Element local name
        element: &'static str,
        /// Child element local name
        child: &'static str,
    },

    /// Serializer failure
    #[error("Encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Writing the output stream failed
    #[error("Failed to write document: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported through the evaluation seam
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// A referenced artifact could not be resolved
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The decision engine reported a failure
    #[error("Evaluation failed: {message}")]
    Engine {
        /// Engine message
        message: String,
    },
}
