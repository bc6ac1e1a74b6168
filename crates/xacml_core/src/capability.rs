//! Capability contract for policy constructors.
//!
//! A constructor declares which construction operations it supports. The
//! registry compares the declaration against [`CapabilitySet::full`] before a
//! constructor may become active.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A construction operation a policy constructor can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstructorCapability {
    /// Build from (stream, kind)
    ConstructFromStream,
    /// Build from (stream, kind, resolver)
    ConstructWithResolver,
    /// Build from (stream, resolver), kind taken from the document
    ConstructInferred,
}

impl ConstructorCapability {
    /// Every capability the registry requires
    pub const ALL: [ConstructorCapability; 3] = [
        Self::ConstructFromStream,
        Self::ConstructWithResolver,
        Self::ConstructInferred,
    ];

    /// Get a string representation of the capability
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ConstructFromStream => "ConstructFromStream",
            Self::ConstructWithResolver => "ConstructWithResolver",
            Self::ConstructInferred => "ConstructInferred",
        }
    }
}

impl fmt::Display for ConstructorCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstructFromStream => write!(f, "build-from(stream, kind)"),
            Self::ConstructWithResolver => write!(f, "build-from(stream, kind, resolver)"),
            Self::ConstructInferred => write!(f, "build-from(stream, resolver)"),
        }
    }
}

/// A set of capabilities declared by a constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: BTreeSet<ConstructorCapability>,
}

impl CapabilitySet {
    /// Create a new empty capability set
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::new(),
        }
    }

    /// The complete contract required for registration
    #[must_use]
    pub fn full() -> Self {
        ConstructorCapability::ALL.into_iter().collect()
    }

    /// Grant a capability
    pub fn grant(&mut self, capability: ConstructorCapability) {
        self.capabilities.insert(capability);
    }

    /// Grant a capability, builder style
    #[must_use]
    pub fn with(mut self, capability: ConstructorCapability) -> Self {
        self.grant(capability);
        self
    }

    /// Check if a specific capability is declared
    #[must_use]
    pub fn has(&self, capability: ConstructorCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Capabilities of `required` absent from this set, in contract order
    #[must_use]
    pub fn missing(&self, required: &CapabilitySet) -> Vec<ConstructorCapability> {
        required
            .capabilities
            .difference(&self.capabilities)
            .copied()
            .collect()
    }

    /// Whether this set covers the full registration contract
    #[must_use]
    pub fn satisfies_contract(&self) -> bool {
        self.missing(&Self::full()).is_empty()
    }

    /// Number of capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Iterate over declared capabilities
    pub fn iter(&self) -> impl Iterator<Item = &ConstructorCapability> {
        self.capabilities.iter()
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<ConstructorCapability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = ConstructorCapability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}
