//! XACML Policy Grammar Model
//!
//! Typed nodes for every element of the XACML 2.0 policy schema, the
//! Expression substitution group, and the marshalling bridge that turns a
//! node graph back into a policy document.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod element;
pub mod expression;
pub mod marshal;
pub mod node;

pub use document::{PolicyDocument, PolicyReference};
pub use element::{ElementKind, Node, QName, QualifiedElement, XACML_NAMESPACE};
pub use expression::{Expression, MatchSource};
pub use marshal::{marshal, marshal_to, validate, Marshal};
pub use node::{
    Action, Actions, Apply, AttributeAssignment, AttributeDesignator, AttributeSelector,
    AttributeValue, CombinerParameter, CombinerParameters, Condition, Defaults, Effect,
    Environment, Environments, Function, IdReference, Obligation, Obligations, Policy,
    PolicyCombinerParameters, PolicyContent, PolicySet, PolicySetCombinerParameters,
    PolicySetContent, Resource, Resources, Rule, RuleCombinerParameters, Subject,
    SubjectAttributeDesignator, Subjects, Target, TargetMatch, VariableDefinition,
    VariableReference, ACCESS_SUBJECT_CATEGORY, DEFAULT_VERSION,
};
