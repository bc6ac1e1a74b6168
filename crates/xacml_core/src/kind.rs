//! Top-level artifact kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of top-level policy artifact.
///
/// Fixed when an artifact is constructed and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// A single policy holding rules
    Policy,
    /// A policy set aggregating policies and other policy sets
    PolicySet,
}

impl ArtifactKind {
    /// Local name of the root element for this kind
    #[must_use]
    pub const fn element_name(self) -> &'static str {
        match self {
            Self::Policy => "Policy",
            Self::PolicySet => "PolicySet",
        }
    }

    /// Look up the kind whose root element carries `name`
    #[must_use]
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "Policy" => Some(Self::Policy),
            "PolicySet" => Some(Self::PolicySet),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_element_names() {
        assert_eq!(ArtifactKind::Policy.element_name(), "Policy");
        assert_eq!(ArtifactKind::PolicySet.element_name(), "PolicySet");
    }

    #[test]
    fn test_kind_from_element_name() {
        assert_eq!(ArtifactKind::from_element_name("Policy"), Some(ArtifactKind::Policy));
        assert_eq!(
            ArtifactKind::from_element_name("PolicySet"),
            Some(ArtifactKind::PolicySet)
        );
        assert_eq!(ArtifactKind::from_element_name("Rule"), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(format!("{}", ArtifactKind::PolicySet), "PolicySet");
    }
}
