//! Policy reference resolution.

use crate::artifact::PolicyArtifact;
use indexmap::IndexMap;
use std::sync::Arc;
use xacml_core::{PolicyVersion, ResolutionError, VersionMatch};

/// Looks up referenced policies and policy sets by id
pub trait PolicyResolver: Send + Sync {
    /// Find the artifact for `id`, optionally constrained to a version pattern
    ///
    /// # Errors
    ///
    /// Returns error if nothing matches
    fn resolve(
        &self,
        id: &str,
        version: Option<&VersionMatch>,
    ) -> Result<Arc<dyn PolicyArtifact>, ResolutionError>;
}

impl<F> PolicyResolver for F
where
    F: Fn(&str, Option<&VersionMatch>) -> Result<Arc<dyn PolicyArtifact>, ResolutionError>
        + Send
        + Sync,
{
    fn resolve(
        &self,
        id: &str,
        version: Option<&VersionMatch>,
    ) -> Result<Arc<dyn PolicyArtifact>, ResolutionError> {
        self(id, version)
    }
}

#[derive(Debug, Clone)]
struct StoredArtifact {
    version: PolicyVersion,
    artifact: Arc<dyn PolicyArtifact>,
}

/// In-memory resolver holding several versions per id
#[derive(Debug, Default)]
pub struct PolicyStore {
    entries: IndexMap<String, Vec<StoredArtifact>>,
}

impl PolicyStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact, replacing any entry with the same id and version
    ///
    /// # Errors
    ///
    /// Returns error if the artifact's version is not a valid version number
    pub fn insert(&mut self, artifact: Arc<dyn PolicyArtifact>) -> Result<(), ResolutionError> {
        let version = PolicyVersion::parse(artifact.version())?;
        let versions = self.entries.entry(artifact.id().to_string()).or_default();
        versions.retain(|stored| stored.version != version);
        versions.push(StoredArtifact { version, artifact });
        Ok(())
    }

    /// Whether any version of `id` is stored
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Stored ids in insertion order
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Total number of stored artifacts across all versions
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PolicyResolver for PolicyStore {
    fn resolve(
        &self,
        id: &str,
        version: Option<&VersionMatch>,
    ) -> Result<Arc<dyn PolicyArtifact>, ResolutionError> {
        self.entries
            .get(id)
            .and_then(|versions| {
                versions
                    .iter()
                    .filter(|stored| version.is_none_or(|pattern| pattern.matches(&stored.version)))
                    .max_by(|a, b| a.version.cmp(&b.version))
            })
            .map(|stored| Arc::clone(&stored.artifact))
            .ok_or_else(|| ResolutionError::NotFound {
                id: id.to_string(),
                version: version.map(|pattern| pattern.as_str().to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Decision, PolicyEvaluator};
    use xacml_core::EvaluationError;
    use xacml_model::{Policy, PolicyDocument};

    #[derive(Debug)]
    struct Stub(PolicyDocument);

    impl PolicyArtifact for Stub {
        fn document(&self) -> &PolicyDocument {
            &self.0
        }

        fn evaluate(&self, _evaluator: &dyn PolicyEvaluator) -> Result<Decision, EvaluationError> {
            Ok(Decision::Permit)
        }
    }

    fn stub(id: &str, version: &str) -> Arc<dyn PolicyArtifact> {
        Arc::new(Stub(PolicyDocument::from(
            Policy::new(id, "urn:alg").with_version(version),
        )))
    }

    fn store() -> PolicyStore {
        let mut store = PolicyStore::new();
        for v in ["1.0", "1.2", "2.0", "1.10"] {
            store.insert(stub("p", v)).unwrap();
        }
        store
    }

    #[test]
    fn test_store_picks_highest_version() {
        let found = store().resolve("p", None).unwrap();
        assert_eq!(found.version(), "2.0");
    }

    #[test]
    fn test_store_picks_highest_match() {
        let pattern = VersionMatch::parse("1.*").unwrap();
        let found = store().resolve("p", Some(&pattern)).unwrap();
        assert_eq!(found.version(), "1.10");
    }

    #[test]
    fn test_store_not_found() {
        let pattern = VersionMatch::parse("3.+").unwrap();
        let err = store().resolve("p", Some(&pattern)).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::NotFound {
                id: "p".to_string(),
                version: Some("3.+".to_string()),
            }
        );
        assert!(store().resolve("missing", None).is_err());
    }

    #[test]
    fn test_store_replaces_same_version() {
        let mut store = store();
        store.insert(stub("p", "2.0")).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.ids(), vec!["p".to_string()]);
    }

    #[test]
    fn test_store_rejects_bad_version() {
        let mut store = PolicyStore::new();
        let err = store.insert(stub("p", "one")).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidVersion(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |id: &str, _: Option<&VersionMatch>| -> Result<Arc<dyn PolicyArtifact>, ResolutionError> {
            Ok(stub(id, "1.0"))
        };
        let found = resolver.resolve("any", None).unwrap();
        assert_eq!(found.id(), "any");
    }
}
