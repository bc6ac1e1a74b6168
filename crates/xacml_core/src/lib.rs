//! XACML Policy Factory Core Types
//!
//! Pure types shared by the element model and the construction registry.
//! Nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capability;
pub mod error;
pub mod kind;
pub mod version;

// Re-exports
pub use capability::{CapabilitySet, ConstructorCapability};
pub use error::{
    ConfigurationError, ConstructionError, CoreError, CoreResult, EvaluationError, LoadError,
    MarshalError, ResolutionError,
};
pub use kind::ArtifactKind;
pub use version::{PolicyVersion, VersionError, VersionMatch};
