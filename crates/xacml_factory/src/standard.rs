//! The default constructing type.

use crate::artifact::{Decision, EvaluationChain, PolicyArtifact, PolicyEvaluator};
use crate::config::{DEFAULT_MAX_DOCUMENT_BYTES, FactoryConfig, ResolutionMode};
use crate::constructor::PolicyConstructor;
use crate::resolver::PolicyResolver;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;
use xacml_core::{
    ArtifactKind, CapabilitySet, ConstructionError, EvaluationError, PolicyVersion,
    ResolutionError, VersionMatch,
};
use xacml_model::{
    validate, ElementKind, IdReference, PolicyDocument, PolicySet, PolicySetContent,
    XACML_NAMESPACE,
};

/// Catalog name of the standard constructor
pub const STANDARD_CONSTRUCTOR: &str = "standard";

/// Constructor for JSON policy documents
#[derive(Debug, Clone)]
pub struct StandardConstructor {
    resolution: ResolutionMode,
    max_document_bytes: u64,
}

impl StandardConstructor {
    /// Create with lazy resolution and the default size limit
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolution: ResolutionMode::Lazy,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    /// Create from configuration
    #[must_use]
    pub fn from_config(config: &FactoryConfig) -> Self {
        Self::new()
            .with_resolution(config.resolution)
            .with_max_document_bytes(config.max_document_bytes)
    }

    /// Set the resolution mode
    #[must_use]
    pub fn with_resolution(mut self, resolution: ResolutionMode) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the document size limit
    #[must_use]
    pub fn with_max_document_bytes(mut self, limit: u64) -> Self {
        self.max_document_bytes = limit;
        self
    }

    /// Resolution mode in effect
    #[must_use]
    pub fn resolution(&self) -> ResolutionMode {
        self.resolution
    }

    fn read_document(
        &self,
        input: &mut dyn Read,
        expected: Option<ArtifactKind>,
    ) -> Result<PolicyDocument, ConstructionError> {
        let mut bytes = Vec::new();
        input
            .take(self.max_document_bytes.saturating_add(1))
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > self.max_document_bytes {
            return Err(ConstructionError::TooLarge {
                limit: self.max_document_bytes,
            });
        }

        let mut envelope: Map<String, Value> = serde_json::from_slice(&bytes)?;
        match envelope.remove("xmlns") {
            Some(Value::String(ns)) if ns == XACML_NAMESPACE => {}
            Some(other) => {
                return Err(schema(format!("unexpected namespace {other}")));
            }
            None => return Err(schema("document has no xmlns".to_string())),
        }

        let mut entries = envelope.into_iter();
        let (root, body) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => return Err(schema("document has no root element".to_string())),
            (Some(_), Some(_)) => {
                return Err(schema("document has more than one root element".to_string()));
            }
        };

        let kind = ArtifactKind::from_element_name(&root).ok_or_else(|| {
            if ElementKind::from_local_name(&root).is_some() {
                schema(format!("{root} cannot be a document root"))
            } else {
                schema(format!("unknown element {root}"))
            }
        })?;
        if let Some(expected) = expected.filter(|expected| *expected != kind) {
            return Err(ConstructionError::KindMismatch {
                expected,
                actual: root,
            });
        }

        let document = match kind {
            ArtifactKind::Policy => PolicyDocument::Policy(serde_json::from_value(body)?),
            ArtifactKind::PolicySet => PolicyDocument::PolicySet(serde_json::from_value(body)?),
        };
        validate(&document).map_err(|err| schema(err.to_string()))?;
        PolicyVersion::parse(document.version())
            .map_err(|err| schema(format!("{} has an invalid Version: {err}", document.id())))?;
        Ok(document)
    }

    fn build(
        &self,
        document: PolicyDocument,
        resolver: Option<Arc<dyn PolicyResolver>>,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let artifact = StandardPolicy::new(document, resolver);
        if self.resolution == ResolutionMode::Eager {
            artifact.resolve_all()?;
        }
        debug!(
            kind = %artifact.kind(),
            id = %artifact.id(),
            version = %artifact.version(),
            resolution = %self.resolution,
            "Constructed policy artifact"
        );
        Ok(Arc::new(artifact))
    }
}

impl Default for StandardConstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyConstructor for StandardConstructor {
    fn name(&self) -> &str {
        STANDARD_CONSTRUCTOR
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn construct(
        &self,
        input: &mut dyn Read,
        kind: ArtifactKind,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let document = self.read_document(input, Some(kind))?;
        self.build(document, None)
    }

    fn construct_with_resolver(
        &self,
        input: &mut dyn Read,
        kind: ArtifactKind,
        resolver: Arc<dyn PolicyResolver>,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let document = self.read_document(input, Some(kind))?;
        self.build(document, Some(resolver))
    }

    fn construct_inferred(
        &self,
        input: &mut dyn Read,
        resolver: Arc<dyn PolicyResolver>,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let document = self.read_document(input, None)?;
        self.build(document, Some(resolver))
    }
}

fn schema(reason: String) -> ConstructionError {
    ConstructionError::Schema { reason }
}

type ReferenceKey = (ArtifactKind, String, Option<String>);

/// Artifact built by [`StandardConstructor`]
///
/// Referenced artifacts are fetched from the resolver at most once per
/// (kind, id, version) and kept for the artifact's lifetime.
pub struct StandardPolicy {
    document: PolicyDocument,
    resolver: Option<Arc<dyn PolicyResolver>>,
    resolved: Mutex<IndexMap<ReferenceKey, Arc<dyn PolicyArtifact>>>,
}

impl StandardPolicy {
    fn new(document: PolicyDocument, resolver: Option<Arc<dyn PolicyResolver>>) -> Self {
        Self {
            document,
            resolver,
            resolved: Mutex::new(IndexMap::new()),
        }
    }

    /// Number of references resolved so far
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.lock().len()
    }

    fn resolve_all(&self) -> Result<(), ResolutionError> {
        for reference in self.document.references() {
            self.resolve_reference(reference.kind, reference.reference)?;
        }
        Ok(())
    }

    fn resolve_reference(
        &self,
        kind: ArtifactKind,
        reference: &IdReference,
    ) -> Result<Arc<dyn PolicyArtifact>, ResolutionError> {
        let key = (kind, reference.value.clone(), reference.version.clone());
        if let Some(cached) = self.resolved.lock().get(&key) {
            return Ok(Arc::clone(cached));
        }

        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| ResolutionError::NoResolver {
                id: reference.value.clone(),
            })?;
        let pattern = reference
            .version
            .as_deref()
            .map(VersionMatch::parse)
            .transpose()?;

        debug!(
            kind = %kind,
            id = %reference.value,
            version = ?reference.version,
            "Resolving policy reference"
        );
        let artifact = resolver.resolve(&reference.value, pattern.as_ref())?;
        if artifact.kind() != kind {
            return Err(ResolutionError::KindMismatch {
                id: reference.value.clone(),
                expected: kind,
                actual: artifact.kind(),
            });
        }

        let mut resolved = self.resolved.lock();
        Ok(Arc::clone(resolved.entry(key).or_insert(artifact)))
    }

    fn evaluate_set(
        &self,
        set: &PolicySet,
        evaluator: &dyn PolicyEvaluator,
        chain: &mut EvaluationChain,
    ) -> Result<Decision, EvaluationError> {
        if !evaluator.matches(set.target.as_ref())? {
            return Ok(Decision::NotApplicable);
        }

        let mut decisions = Vec::with_capacity(set.content.len());
        for member in &set.content {
            let decision = match member {
                PolicySetContent::Policy(policy) => evaluator.evaluate_policy(policy)?,
                PolicySetContent::PolicySet(inner) => self.evaluate_set(inner, evaluator, chain)?,
                PolicySetContent::PolicyIdReference(reference) => self
                    .resolve_reference(ArtifactKind::Policy, reference)?
                    .evaluate_in(evaluator, chain)?,
                PolicySetContent::PolicySetIdReference(reference) => self
                    .resolve_reference(ArtifactKind::PolicySet, reference)?
                    .evaluate_in(evaluator, chain)?,
                PolicySetContent::CombinerParameters(_)
                | PolicySetContent::PolicyCombinerParameters(_)
                | PolicySetContent::PolicySetCombinerParameters(_) => continue,
            };
            decisions.push(decision);
        }
        evaluator.combine(&set.policy_combining_alg_id, &decisions)
    }
}

impl fmt::Debug for StandardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardPolicy")
            .field("kind", &self.document.kind())
            .field("id", &self.document.id())
            .field("version", &self.document.version())
            .field("has_resolver", &self.resolver.is_some())
            .field("resolved", &self.resolved_count())
            .finish()
    }
}

impl PolicyArtifact for StandardPolicy {
    fn document(&self) -> &PolicyDocument {
        &self.document
    }

    fn evaluate(&self, evaluator: &dyn PolicyEvaluator) -> Result<Decision, EvaluationError> {
        self.evaluate_in(evaluator, &mut EvaluationChain::new())
    }

    fn evaluate_in(
        &self,
        evaluator: &dyn PolicyEvaluator,
        chain: &mut EvaluationChain,
    ) -> Result<Decision, EvaluationError> {
        chain.enter(self)?;
        let decision = match &self.document {
            PolicyDocument::Policy(policy) => evaluator.evaluate_policy(policy),
            PolicyDocument::PolicySet(set) => self.evaluate_set(set, evaluator, chain),
        };
        chain.leave();
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PolicyStore;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xacml_core::MarshalError;
    use xacml_model::{Effect, Marshal, Policy, Rule};

    const POLICY_DOC: &str = r#"{"xmlns":"urn:oasis:names:tc:xacml:2.0:policy:schema:os","Policy":{"PolicyId":"samplePolicy1","RuleCombiningAlgId":"urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:deny-overrides","Content":[{"Rule":{"RuleId":"r1","Effect":"Permit"}}]}}"#;

    const SET_DOC: &str = r#"{"xmlns":"urn:oasis:names:tc:xacml:2.0:policy:schema:os","PolicySet":{"PolicySetId":"set1","PolicyCombiningAlgId":"urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:permit-overrides","Content":[{"PolicyIdReference":{"Value":"samplePolicy1"}},{"Policy":{"PolicyId":"inline","RuleCombiningAlgId":"urn:alg"}}]}}"#;

    /// Returns the policy's first rule effect and the first decision when combining
    struct FirstEffect;

    impl PolicyEvaluator for FirstEffect {
        fn matches(&self, _target: Option<&xacml_model::Target>) -> Result<bool, EvaluationError> {
            Ok(true)
        }

        fn evaluate_policy(&self, policy: &Policy) -> Result<Decision, EvaluationError> {
            Ok(match policy.rules().next().map(|r| r.effect) {
                Some(Effect::Permit) => Decision::Permit,
                Some(Effect::Deny) => Decision::Deny,
                None => Decision::NotApplicable,
            })
        }

        fn combine(&self, _algorithm: &str, decisions: &[Decision]) -> Result<Decision, EvaluationError> {
            Ok(decisions.first().copied().unwrap_or(Decision::NotApplicable))
        }
    }

    fn store_with_sample() -> Arc<PolicyStore> {
        let artifact = StandardConstructor::new()
            .construct(&mut POLICY_DOC.as_bytes(), ArtifactKind::Policy)
            .unwrap();
        let mut store = PolicyStore::new();
        store.insert(artifact).unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_construct_policy() {
        let artifact = StandardConstructor::new()
            .construct(&mut POLICY_DOC.as_bytes(), ArtifactKind::Policy)
            .unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::Policy);
        assert_eq!(artifact.id(), "samplePolicy1");
        assert_eq!(artifact.version(), "1.0");
        assert_eq!(artifact.evaluate(&FirstEffect).unwrap(), Decision::Permit);
    }

    #[test]
    fn test_kind_mismatch() {
        let err = StandardConstructor::new()
            .construct(&mut POLICY_DOC.as_bytes(), ArtifactKind::PolicySet)
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::KindMismatch { expected: ArtifactKind::PolicySet, ref actual } if actual == "Policy"
        ));
    }

    #[test]
    fn test_schema_errors() {
        let c = StandardConstructor::new();

        let wrong_ns = r#"{"xmlns":"urn:other","Policy":{}}"#;
        assert!(matches!(
            c.construct(&mut wrong_ns.as_bytes(), ArtifactKind::Policy),
            Err(ConstructionError::Schema { .. })
        ));

        let bad_root = r#"{"xmlns":"urn:oasis:names:tc:xacml:2.0:policy:schema:os","Rule":{"RuleId":"r","Effect":"Deny"}}"#;
        let err = c.construct(&mut bad_root.as_bytes(), ArtifactKind::Policy).unwrap_err();
        assert!(err.to_string().contains("Rule cannot be a document root"));

        let empty_id = r#"{"xmlns":"urn:oasis:names:tc:xacml:2.0:policy:schema:os","Policy":{"PolicyId":"","RuleCombiningAlgId":"a"}}"#;
        assert!(matches!(
            c.construct(&mut empty_id.as_bytes(), ArtifactKind::Policy),
            Err(ConstructionError::Schema { .. })
        ));
    }

    #[test]
    fn test_malformed_input() {
        let err = StandardConstructor::new()
            .construct(&mut "{not json".as_bytes(), ArtifactKind::Policy)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::Malformed(_)));
    }

    #[test]
    fn test_too_large() {
        let err = StandardConstructor::new()
            .with_max_document_bytes(16)
            .construct(&mut POLICY_DOC.as_bytes(), ArtifactKind::Policy)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::TooLarge { limit: 16 }));
    }

    #[test]
    fn test_inferred_kind() {
        let resolver: Arc<dyn PolicyResolver> = store_with_sample();
        let c = StandardConstructor::new();

        let policy = c
            .construct_inferred(&mut POLICY_DOC.as_bytes(), Arc::clone(&resolver))
            .unwrap();
        assert_eq!(policy.kind(), ArtifactKind::Policy);

        let set = c.construct_inferred(&mut SET_DOC.as_bytes(), resolver).unwrap();
        assert_eq!(set.kind(), ArtifactKind::PolicySet);
    }

    #[test]
    fn test_lazy_resolution_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_with_sample();
        let counter = Arc::clone(&calls);
        let resolver = move |id: &str, version: Option<&VersionMatch>| -> Result<Arc<dyn PolicyArtifact>, ResolutionError> {
            counter.fetch_add(1, Ordering::SeqCst);
            store.resolve(id, version)
        };

        let set = StandardConstructor::new()
            .construct_with_resolver(&mut SET_DOC.as_bytes(), ArtifactKind::PolicySet, Arc::new(resolver))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(set.evaluate(&FirstEffect).unwrap(), Decision::Permit);
        assert_eq!(set.evaluate(&FirstEffect).unwrap(), Decision::Permit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_eager_resolution_fails_at_construction() {
        let empty: Arc<dyn PolicyResolver> = Arc::new(PolicyStore::new());
        let err = StandardConstructor::new()
            .with_resolution(ResolutionMode::Eager)
            .construct_with_resolver(&mut SET_DOC.as_bytes(), ArtifactKind::PolicySet, empty)
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::Resolution(ResolutionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_missing_resolver_surfaces_on_evaluate() {
        let set = StandardConstructor::new()
            .construct(&mut SET_DOC.as_bytes(), ArtifactKind::PolicySet)
            .unwrap();
        let err = set.evaluate(&FirstEffect).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::Resolution(ResolutionError::NoResolver {
                id: "samplePolicy1".to_string()
            })
        );
    }

    #[test]
    fn test_resolved_kind_checked() {
        let doc = r#"{"xmlns":"urn:oasis:names:tc:xacml:2.0:policy:schema:os","PolicySet":{"PolicySetId":"s","PolicyCombiningAlgId":"a","Content":[{"PolicySetIdReference":{"Value":"samplePolicy1"}}]}}"#;
        let set = StandardConstructor::new()
            .construct_with_resolver(&mut doc.as_bytes(), ArtifactKind::PolicySet, store_with_sample())
            .unwrap();
        let err = set.evaluate(&FirstEffect).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Resolution(ResolutionError::KindMismatch {
                expected: ArtifactKind::PolicySet,
                actual: ArtifactKind::Policy,
                ..
            })
        ));
    }

    fn looping_set(id: &str, next: &str) -> String {
        format!(
            r#"{{"xmlns":"urn:oasis:names:tc:xacml:2.0:policy:schema:os","PolicySet":{{"PolicySetId":"{id}","PolicyCombiningAlgId":"a","Content":[{{"PolicySetIdReference":{{"Value":"{next}"}}}}]}}}}"#
        )
    }

    type Slots = Arc<Mutex<IndexMap<String, Arc<dyn PolicyArtifact>>>>;

    fn slot_resolver(slots: &Slots) -> Arc<dyn PolicyResolver> {
        let slots = Arc::clone(slots);
        Arc::new(
            move |id: &str, _version: Option<&VersionMatch>| -> Result<Arc<dyn PolicyArtifact>, ResolutionError> {
                slots
                    .lock()
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ResolutionError::NotFound {
                        id: id.to_string(),
                        version: None,
                    })
            },
        )
    }

    #[test]
    fn test_self_reference_is_circular() {
        let slots: Slots = Arc::new(Mutex::new(IndexMap::new()));
        let set = StandardConstructor::new()
            .construct_with_resolver(
                &mut looping_set("loop", "loop").as_bytes(),
                ArtifactKind::PolicySet,
                slot_resolver(&slots),
            )
            .unwrap();
        slots.lock().insert("loop".to_string(), Arc::clone(&set));

        let err = set.evaluate(&FirstEffect).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::Resolution(ResolutionError::Circular {
                id: "loop".to_string()
            })
        );
    }

    #[test]
    fn test_mutual_reference_is_circular() {
        let slots: Slots = Arc::new(Mutex::new(IndexMap::new()));
        let c = StandardConstructor::new();
        for (id, next) in [("a", "b"), ("b", "a")] {
            let set = c
                .construct_with_resolver(
                    &mut looping_set(id, next).as_bytes(),
                    ArtifactKind::PolicySet,
                    slot_resolver(&slots),
                )
                .unwrap();
            slots.lock().insert(id.to_string(), set);
        }

        let a = slots.lock().get("a").cloned().unwrap();
        assert!(matches!(
            a.evaluate(&FirstEffect),
            Err(EvaluationError::Resolution(ResolutionError::Circular { ref id })) if id == "a"
        ));
        // the path unwinds after every evaluation
        let d = c
            .construct_with_resolver(
                &mut SET_DOC.as_bytes(),
                ArtifactKind::PolicySet,
                store_with_sample(),
            )
            .unwrap();
        assert_eq!(d.evaluate(&FirstEffect).unwrap(), Decision::Permit);
        assert_eq!(d.evaluate(&FirstEffect).unwrap(), Decision::Permit);
    }

    #[test]
    fn test_signed_version_rejected() {
        let doc = r#"{"xmlns":"urn:oasis:names:tc:xacml:2.0:policy:schema:os","Policy":{"PolicyId":"p","Version":"+1.0","RuleCombiningAlgId":"a"}}"#;
        let err = StandardConstructor::new()
            .construct(&mut doc.as_bytes(), ArtifactKind::Policy)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::Schema { .. }));
    }

    #[test]
    fn test_construct_marshal_roundtrip() {
        let c = StandardConstructor::new();
        let first = c
            .construct(&mut POLICY_DOC.as_bytes(), ArtifactKind::Policy)
            .unwrap();
        let mut bytes = Vec::new();
        first.marshal(&mut bytes).unwrap();

        let second = c.construct(&mut bytes.as_slice(), ArtifactKind::Policy).unwrap();
        assert_eq!(first.document(), second.document());
        assert_eq!(
            first.evaluate(&FirstEffect).unwrap(),
            second.evaluate(&FirstEffect).unwrap()
        );
    }

    #[test]
    fn test_construct_from_built_document() {
        let doc = PolicyDocument::from(
            Policy::new("p", "urn:alg").with_rule(Rule::new("r", Effect::Deny)),
        );
        let bytes = doc.marshal().unwrap();
        let artifact = StandardConstructor::new()
            .construct(&mut bytes.as_slice(), ArtifactKind::Policy)
            .unwrap();
        let result: Result<(), MarshalError> = artifact.marshal(&mut Vec::new());
        assert!(result.is_ok());
    }

    proptest! {
        #[test]
        fn prop_construct_marshal_is_stable(
            id in "[a-z][a-z0-9]{0,10}",
            major in 0u64..5,
            minor in 0u64..20,
            deny in any::<bool>(),
        ) {
            let effect = if deny { Effect::Deny } else { Effect::Permit };
            let policy = Policy::new(id, "urn:alg")
                .with_version(format!("{major}.{minor}"))
                .with_rule(Rule::new("r", effect));
            let bytes = PolicyDocument::from(policy.clone()).marshal().unwrap();

            let artifact = StandardConstructor::new()
                .construct(&mut bytes.as_slice(), ArtifactKind::Policy)
                .unwrap();
            let mut again = Vec::new();
            artifact.marshal(&mut again).unwrap();

            prop_assert_eq!(&again, &bytes);
            prop_assert_eq!(artifact.document(), &PolicyDocument::Policy(policy));
        }
    }
}
