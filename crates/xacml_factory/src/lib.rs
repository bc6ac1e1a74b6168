//! XACML Policy Factory
//!
//! Turns policy documents into evaluable artifacts through a replaceable
//! constructing type. The standard constructor is active by default; any
//! replacement must declare the full capability contract before it is
//! accepted.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod config;
pub mod constructor;
pub mod registry;
pub mod resolver;
pub mod standard;

pub use artifact::{
    Decision, EvaluationChain, MAX_EVALUATION_DEPTH, PolicyArtifact, PolicyEvaluator,
};
pub use config::{DEFAULT_MAX_DOCUMENT_BYTES, FactoryConfig, ResolutionMode};
pub use constructor::PolicyConstructor;
pub use registry::{ConstructorCatalog, PolicyFactory, validate_constructor};
pub use resolver::{PolicyResolver, PolicyStore};
pub use standard::{STANDARD_CONSTRUCTOR, StandardConstructor, StandardPolicy};
