//! The Expression substitution group.
//!
//! Any slot typed as an expression holds one [`Expression`]. The enum is
//! externally tagged, so a member is always written under its concrete
//! element name (`Apply`, `AttributeValue`, ...) and the abstract head name
//! never reaches the wire.

use crate::element::ElementKind;
use crate::node::{
    Apply, AttributeDesignator, AttributeSelector, AttributeValue, Function,
    SubjectAttributeDesignator, VariableReference,
};
use serde::{Deserialize, Serialize};

/// A member of the Expression substitution group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// Function application
    Apply(Apply),
    /// Function reference
    Function(Function),
    /// Subject attribute lookup
    SubjectAttributeDesignator(SubjectAttributeDesignator),
    /// Resource attribute lookup
    ResourceAttributeDesignator(AttributeDesignator),
    /// Action attribute lookup
    ActionAttributeDesignator(AttributeDesignator),
    /// Environment attribute lookup
    EnvironmentAttributeDesignator(AttributeDesignator),
    /// XPath lookup
    AttributeSelector(AttributeSelector),
    /// Literal
    AttributeValue(AttributeValue),
    /// Variable reference
    VariableReference(VariableReference),
}

impl Expression {
    /// Concrete element kind of this member
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Apply(_) => ElementKind::Apply,
            Self::Function(_) => ElementKind::Function,
            Self::SubjectAttributeDesignator(_) => ElementKind::SubjectAttributeDesignator,
            Self::ResourceAttributeDesignator(_) => ElementKind::ResourceAttributeDesignator,
            Self::ActionAttributeDesignator(_) => ElementKind::ActionAttributeDesignator,
            Self::EnvironmentAttributeDesignator(_) => {
                ElementKind::EnvironmentAttributeDesignator
            }
            Self::AttributeSelector(_) => ElementKind::AttributeSelector,
            Self::AttributeValue(_) => ElementKind::AttributeValue,
            Self::VariableReference(_) => ElementKind::VariableReference,
        }
    }

    /// Shorthand for a literal
    #[must_use]
    pub fn value(data_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttributeValue(AttributeValue::new(data_type, value))
    }

    /// Shorthand for a variable reference
    #[must_use]
    pub fn variable(variable_id: impl Into<String>) -> Self {
        Self::VariableReference(VariableReference {
            variable_id: variable_id.into(),
        })
    }
}

impl From<Apply> for Expression {
    fn from(value: Apply) -> Self {
        Self::Apply(value)
    }
}

impl From<Function> for Expression {
    fn from(value: Function) -> Self {
        Self::Function(value)
    }
}

impl From<SubjectAttributeDesignator> for Expression {
    fn from(value: SubjectAttributeDesignator) -> Self {
        Self::SubjectAttributeDesignator(value)
    }
}

impl From<AttributeSelector> for Expression {
    fn from(value: AttributeSelector) -> Self {
        Self::AttributeSelector(value)
    }
}

impl From<AttributeValue> for Expression {
    fn from(value: AttributeValue) -> Self {
        Self::AttributeValue(value)
    }
}

impl From<VariableReference> for Expression {
    fn from(value: VariableReference) -> Self {
        Self::VariableReference(value)
    }
}

/// Request-side operand of a target match
///
/// The schema allows a designator or a selector here, not the full group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    /// Subject attribute lookup
    SubjectAttributeDesignator(SubjectAttributeDesignator),
    /// Resource attribute lookup
    ResourceAttributeDesignator(AttributeDesignator),
    /// Action attribute lookup
    ActionAttributeDesignator(AttributeDesignator),
    /// Environment attribute lookup
    EnvironmentAttributeDesignator(AttributeDesignator),
    /// XPath lookup
    AttributeSelector(AttributeSelector),
}

impl MatchSource {
    /// Concrete element kind of the operand
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        Expression::from(self.clone()).kind()
    }
}

impl From<MatchSource> for Expression {
    fn from(source: MatchSource) -> Self {
        match source {
            MatchSource::SubjectAttributeDesignator(d) => Self::SubjectAttributeDesignator(d),
            MatchSource::ResourceAttributeDesignator(d) => Self::ResourceAttributeDesignator(d),
            MatchSource::ActionAttributeDesignator(d) => Self::ActionAttributeDesignator(d),
            MatchSource::EnvironmentAttributeDesignator(d) => {
                Self::EnvironmentAttributeDesignator(d)
            }
            MatchSource::AttributeSelector(s) => Self::AttributeSelector(s),
        }
    }
}
