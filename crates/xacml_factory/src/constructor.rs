//! Constructing-type contract.
//!
//! A constructor turns a policy document stream into a [`PolicyArtifact`].
//! It declares the operations it implements as a [`CapabilitySet`]; the
//! registry refuses to activate one that does not declare them all.

use crate::artifact::PolicyArtifact;
use crate::resolver::PolicyResolver;
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use xacml_core::{ArtifactKind, CapabilitySet, ConstructionError, ConstructorCapability};

/// A pluggable policy constructing type
pub trait PolicyConstructor: Send + Sync + fmt::Debug {
    /// Registration name
    fn name(&self) -> &str;

    /// Operations this constructor implements
    fn capabilities(&self) -> CapabilitySet;

    /// Build an artifact of `kind` from a document stream
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be read or is not a `kind` document
    fn construct(
        &self,
        input: &mut dyn Read,
        kind: ArtifactKind,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError>;

    /// Build an artifact of `kind` that resolves references through `resolver`
    ///
    /// # Errors
    ///
    /// Returns error if the document is invalid or the operation is unsupported
    fn construct_with_resolver(
        &self,
        _input: &mut dyn Read,
        _kind: ArtifactKind,
        _resolver: Arc<dyn PolicyResolver>,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        Err(self.unsupported(ConstructorCapability::ConstructWithResolver))
    }

    /// Build an artifact whose kind is taken from the document's root element
    ///
    /// # Errors
    ///
    /// Returns error if the document is invalid or the operation is unsupported
    fn construct_inferred(
        &self,
        _input: &mut dyn Read,
        _resolver: Arc<dyn PolicyResolver>,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        Err(self.unsupported(ConstructorCapability::ConstructInferred))
    }

    /// Error for an operation this constructor does not implement
    fn unsupported(&self, capability: ConstructorCapability) -> ConstructionError {
        ConstructionError::Unsupported {
            constructor: self.name().to_string(),
            capability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct StreamOnly;

    impl PolicyConstructor for StreamOnly {
        fn name(&self) -> &str {
            "stream-only"
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new().with(ConstructorCapability::ConstructFromStream)
        }

        fn construct(
            &self,
            _input: &mut dyn Read,
            _kind: ArtifactKind,
        ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
            Err(ConstructionError::Schema {
                reason: "not needed".to_string(),
            })
        }
    }

    #[test]
    fn test_default_operations_are_unsupported() {
        let resolver: Arc<dyn PolicyResolver> = Arc::new(crate::resolver::PolicyStore::new());
        let err = StreamOnly
            .construct_inferred(&mut "{}".as_bytes(), resolver)
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::Unsupported {
                capability: ConstructorCapability::ConstructInferred,
                ..
            }
        ));
        assert!(!StreamOnly.capabilities().satisfies_contract());
    }
}
