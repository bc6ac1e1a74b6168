//! Top-level policy documents.

use crate::element::{Node, QualifiedElement};
use crate::node::{IdReference, Policy, PolicySet, PolicySetContent};
use serde::{Deserialize, Serialize};
use xacml_core::ArtifactKind;

/// Root node of a policy artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDocument {
    /// Single policy
    Policy(Policy),
    /// Policy set
    PolicySet(PolicySet),
}

/// An id reference found in a document, with the kind it must resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyReference<'a> {
    /// Kind named by the reference element
    pub kind: ArtifactKind,
    /// The reference itself
    pub reference: &'a IdReference,
}

impl PolicyDocument {
    /// Artifact kind of the root
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Policy(_) => ArtifactKind::Policy,
            Self::PolicySet(_) => ArtifactKind::PolicySet,
        }
    }

    /// Root identifier
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Policy(p) => &p.policy_id,
            Self::PolicySet(s) => &s.policy_set_id,
        }
    }

    /// Root version string
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::Policy(p) => &p.version,
            Self::PolicySet(s) => &s.version,
        }
    }

    /// Wrap a copy of the root as a qualified element
    #[must_use]
    pub fn to_element(&self) -> QualifiedElement {
        QualifiedElement::new(self.clone())
    }

    /// Wrap the root as a qualified element
    #[must_use]
    pub fn into_element(self) -> QualifiedElement {
        QualifiedElement::new(self)
    }

    /// Every id reference reachable without resolving anything
    ///
    /// Inline policy sets are walked depth first in document order.
    #[must_use]
    pub fn references(&self) -> Vec<PolicyReference<'_>> {
        let mut out = Vec::new();
        if let Self::PolicySet(set) = self {
            collect_references(set, &mut out);
        }
        out
    }
}

fn collect_references<'a>(set: &'a PolicySet, out: &mut Vec<PolicyReference<'a>>) {
    for member in &set.content {
        match member {
            PolicySetContent::PolicySet(inner) => collect_references(inner, out),
            PolicySetContent::PolicyIdReference(reference) => out.push(PolicyReference {
                kind: ArtifactKind::Policy,
                reference,
            }),
            PolicySetContent::PolicySetIdReference(reference) => out.push(PolicyReference {
                kind: ArtifactKind::PolicySet,
                reference,
            }),
            _ => {}
        }
    }
}

impl From<PolicyDocument> for Node {
    fn from(document: PolicyDocument) -> Self {
        match document {
            PolicyDocument::Policy(p) => Node::Policy(p),
            PolicyDocument::PolicySet(s) => Node::PolicySet(s),
        }
    }
}

impl From<Policy> for PolicyDocument {
    fn from(policy: Policy) -> Self {
        Self::Policy(policy)
    }
}

impl From<PolicySet> for PolicyDocument {
    fn from(set: PolicySet) -> Self {
        Self::PolicySet(set)
    }
}

impl TryFrom<Node> for PolicyDocument {
    type Error = Node;

    fn try_from(node: Node) -> Result<Self, Self::Error> {
        match node {
            Node::Policy(p) => Ok(Self::Policy(p)),
            Node::PolicySet(s) => Ok(Self::PolicySet(s)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Rule;

    fn nested_set() -> PolicySet {
        let inner = PolicySet::new("inner", "urn:alg")
            .with_policy_set_reference(IdReference::new("remote-set").with_version("2.+"));
        PolicySet::new("outer", "urn:alg")
            .with_policy_reference(IdReference::new("samplePolicy1"))
            .with_policy(Policy::new("inline", "urn:alg"))
            .with_policy_set(inner)
            .with_policy_reference(IdReference::new("samplePolicy2"))
    }

    #[test]
    fn test_document_accessors() {
        let doc = PolicyDocument::from(Policy::new("p1", "urn:alg").with_version("3.1"));
        assert_eq!(doc.kind(), ArtifactKind::Policy);
        assert_eq!(doc.id(), "p1");
        assert_eq!(doc.version(), "3.1");
        assert_eq!(doc.to_element().name().local_name, "Policy");
    }

    #[test]
    fn test_references_in_document_order() {
        let set = nested_set();
        let doc = PolicyDocument::PolicySet(set);
        let refs: Vec<_> = doc
            .references()
            .iter()
            .map(|r| (r.kind, r.reference.value.as_str()))
            .collect();
        assert_eq!(
            refs,
            vec![
                (ArtifactKind::Policy, "samplePolicy1"),
                (ArtifactKind::PolicySet, "remote-set"),
                (ArtifactKind::Policy, "samplePolicy2"),
            ]
        );
    }

    #[test]
    fn test_policy_has_no_references() {
        let doc = PolicyDocument::from(
            Policy::new("p", "urn:alg").with_rule(Rule::new("r", crate::node::Effect::Permit)),
        );
        assert!(doc.references().is_empty());
    }

    #[test]
    fn test_try_from_node() {
        let node = Node::from(PolicySet::new("s", "urn:alg"));
        let doc = PolicyDocument::try_from(node).unwrap();
        assert_eq!(doc.kind(), ArtifactKind::PolicySet);

        let node = Node::Description("x".to_string());
        assert!(PolicyDocument::try_from(node).is_err());
    }
}
