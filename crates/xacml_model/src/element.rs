//! Schema element factory.
//!
//! [`ElementKind`] is the side table binding every grammar element to its
//! canonical qualified name and, for Expression group members, to the
//! abstract substitution head. [`Node`] carries one variant per concrete
//! element and [`QualifiedElement`] wraps a node together with its name.
//!
//! Several kinds share one data shape (the designator shape, the match shape,
//! the id-reference shape). The variant chosen on [`Node`] decides the name,
//! so a `ResourceAttributeDesignator` and an `ActionAttributeDesignator` built
//! from the same [`AttributeDesignator`] value stay distinct.

use crate::expression::{Expression, MatchSource};
use crate::node::{
    Action, Actions, Apply, AttributeAssignment, AttributeDesignator, AttributeSelector,
    AttributeValue, CombinerParameter, CombinerParameters, Condition, Defaults, Environment,
    Environments, Function, IdReference, Obligation, Obligations, Policy,
    PolicyCombinerParameters, PolicySet, PolicySetCombinerParameters, Resource, Resources, Rule,
    RuleCombinerParameters, Subject, SubjectAttributeDesignator, Subjects, Target, TargetMatch,
    VariableDefinition, VariableReference,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace shared by every element of the policy grammar
pub const XACML_NAMESPACE: &str = "urn:oasis:names:tc:xacml:2.0:policy:schema:os";

/// Namespace-qualified element name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI
    pub namespace: &'static str,
    /// Local name
    pub local_name: &'static str,
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

/// Every element kind of the policy grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum ElementKind {
    Policy,
    PolicySet,
    Description,
    XPathVersion,
    PolicyDefaults,
    PolicySetDefaults,
    Target,
    Subjects,
    Subject,
    SubjectMatch,
    Resources,
    Resource,
    ResourceMatch,
    Actions,
    Action,
    ActionMatch,
    Environments,
    Environment,
    EnvironmentMatch,
    Rule,
    Condition,
    Apply,
    Function,
    SubjectAttributeDesignator,
    ResourceAttributeDesignator,
    ActionAttributeDesignator,
    EnvironmentAttributeDesignator,
    AttributeSelector,
    AttributeValue,
    VariableDefinition,
    VariableReference,
    Obligations,
    Obligation,
    AttributeAssignment,
    CombinerParameters,
    CombinerParameter,
    RuleCombinerParameters,
    PolicyCombinerParameters,
    PolicySetCombinerParameters,
    PolicyIdReference,
    PolicySetIdReference,
    /// Abstract substitution head; never instantiated
    Expression,
}

static BY_LOCAL_NAME: Lazy<IndexMap<&'static str, ElementKind>> = Lazy::new(|| {
    ElementKind::ALL
        .iter()
        .map(|kind| (kind.local_name(), *kind))
        .collect()
});

impl ElementKind {
    /// All kinds in schema declaration order
    pub const ALL: [ElementKind; 42] = [
        Self::Policy,
        Self::PolicySet,
        Self::Description,
        Self::XPathVersion,
        Self::PolicyDefaults,
        Self::PolicySetDefaults,
        Self::Target,
        Self::Subjects,
        Self::Subject,
        Self::SubjectMatch,
        Self::Resources,
        Self::Resource,
        Self::ResourceMatch,
        Self::Actions,
        Self::Action,
        Self::ActionMatch,
        Self::Environments,
        Self::Environment,
        Self::EnvironmentMatch,
        Self::Rule,
        Self::Condition,
        Self::Apply,
        Self::Function,
        Self::SubjectAttributeDesignator,
        Self::ResourceAttributeDesignator,
        Self::ActionAttributeDesignator,
        Self::EnvironmentAttributeDesignator,
        Self::AttributeSelector,
        Self::AttributeValue,
        Self::VariableDefinition,
        Self::VariableReference,
        Self::Obligations,
        Self::Obligation,
        Self::AttributeAssignment,
        Self::CombinerParameters,
        Self::CombinerParameter,
        Self::RuleCombinerParameters,
        Self::PolicyCombinerParameters,
        Self::PolicySetCombinerParameters,
        Self::PolicyIdReference,
        Self::PolicySetIdReference,
        Self::Expression,
    ];

    /// Local part of the canonical name
    #[must_use]
    pub const fn local_name(self) -> &'static str {
        match self {
            Self::Policy => "Policy",
            Self::PolicySet => "PolicySet",
            Self::Description => "Description",
            Self::XPathVersion => "XPathVersion",
            Self::PolicyDefaults => "PolicyDefaults",
            Self::PolicySetDefaults => "PolicySetDefaults",
            Self::Target => "Target",
            Self::Subjects => "Subjects",
            Self::Subject => "Subject",
            Self::SubjectMatch => "SubjectMatch",
            Self::Resources => "Resources",
            Self::Resource => "Resource",
            Self::ResourceMatch => "ResourceMatch",
            Self::Actions => "Actions",
            Self::Action => "Action",
            Self::ActionMatch => "ActionMatch",
            Self::Environments => "Environments",
            Self::Environment => "Environment",
            Self::EnvironmentMatch => "EnvironmentMatch",
            Self::Rule => "Rule",
            Self::Condition => "Condition",
            Self::Apply => "Apply",
            Self::Function => "Function",
            Self::SubjectAttributeDesignator => "SubjectAttributeDesignator",
            Self::ResourceAttributeDesignator => "ResourceAttributeDesignator",
            Self::ActionAttributeDesignator => "ActionAttributeDesignator",
            Self::EnvironmentAttributeDesignator => "EnvironmentAttributeDesignator",
            Self::AttributeSelector => "AttributeSelector",
            Self::AttributeValue => "AttributeValue",
            Self::VariableDefinition => "VariableDefinition",
            Self::VariableReference => "VariableReference",
            Self::Obligations => "Obligations",
            Self::Obligation => "Obligation",
            Self::AttributeAssignment => "AttributeAssignment",
            Self::CombinerParameters => "CombinerParameters",
            Self::CombinerParameter => "CombinerParameter",
            Self::RuleCombinerParameters => "RuleCombinerParameters",
            Self::PolicyCombinerParameters => "PolicyCombinerParameters",
            Self::PolicySetCombinerParameters => "PolicySetCombinerParameters",
            Self::PolicyIdReference => "PolicyIdReference",
            Self::PolicySetIdReference => "PolicySetIdReference",
            Self::Expression => "Expression",
        }
    }

    /// Canonical qualified name
    #[must_use]
    pub const fn qualified_name(self) -> QName {
        QName {
            namespace: XACML_NAMESPACE,
            local_name: self.local_name(),
        }
    }

    /// Substitution group head, if this kind is a group member
    #[must_use]
    pub const fn substitution_head(self) -> Option<ElementKind> {
        match self {
            Self::Apply
            | Self::Function
            | Self::SubjectAttributeDesignator
            | Self::ResourceAttributeDesignator
            | Self::ActionAttributeDesignator
            | Self::EnvironmentAttributeDesignator
            | Self::AttributeSelector
            | Self::AttributeValue
            | Self::VariableReference => Some(Self::Expression),
            _ => None,
        }
    }

    /// Whether this kind can never be instantiated
    #[must_use]
    pub const fn is_abstract(self) -> bool {
        matches!(self, Self::Expression)
    }

    /// Look up a kind by its local name
    #[must_use]
    pub fn from_local_name(name: &str) -> Option<Self> {
        BY_LOCAL_NAME.get(name).copied()
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

/// A grammar node tagged with its concrete element kind
///
/// Variant names are the canonical local names, which is also how the node
/// is keyed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Node {
    Policy(Policy),
    PolicySet(PolicySet),
    Description(String),
    XPathVersion(String),
    PolicyDefaults(Defaults),
    PolicySetDefaults(Defaults),
    Target(Target),
    Subjects(Subjects),
    Subject(Subject),
    SubjectMatch(TargetMatch),
    Resources(Resources),
    Resource(Resource),
    ResourceMatch(TargetMatch),
    Actions(Actions),
    Action(Action),
    ActionMatch(TargetMatch),
    Environments(Environments),
    Environment(Environment),
    EnvironmentMatch(TargetMatch),
    Rule(Rule),
    Condition(Condition),
    Apply(Apply),
    Function(Function),
    SubjectAttributeDesignator(SubjectAttributeDesignator),
    ResourceAttributeDesignator(AttributeDesignator),
    ActionAttributeDesignator(AttributeDesignator),
    EnvironmentAttributeDesignator(AttributeDesignator),
    AttributeSelector(AttributeSelector),
    AttributeValue(AttributeValue),
    VariableDefinition(VariableDefinition),
    VariableReference(VariableReference),
    Obligations(Obligations),
    Obligation(Obligation),
    AttributeAssignment(AttributeAssignment),
    CombinerParameters(CombinerParameters),
    CombinerParameter(CombinerParameter),
    RuleCombinerParameters(RuleCombinerParameters),
    PolicyCombinerParameters(PolicyCombinerParameters),
    PolicySetCombinerParameters(PolicySetCombinerParameters),
    PolicyIdReference(IdReference),
    PolicySetIdReference(IdReference),
}

macro_rules! node_kind {
    ($node:expr; $($variant:ident),* $(,)?) => {
        match $node {
            $(Node::$variant(_) => ElementKind::$variant,)*
        }
    };
}

impl Node {
    /// Concrete element kind of this node
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        node_kind!(self;
            Policy, PolicySet, Description, XPathVersion, PolicyDefaults, PolicySetDefaults,
            Target, Subjects, Subject, SubjectMatch, Resources, Resource, ResourceMatch,
            Actions, Action, ActionMatch, Environments, Environment, EnvironmentMatch,
            Rule, Condition, Apply, Function, SubjectAttributeDesignator,
            ResourceAttributeDesignator, ActionAttributeDesignator,
            EnvironmentAttributeDesignator, AttributeSelector, AttributeValue,
            VariableDefinition, VariableReference, Obligations, Obligation,
            AttributeAssignment, CombinerParameters, CombinerParameter,
            RuleCombinerParameters, PolicyCombinerParameters, PolicySetCombinerParameters,
            PolicyIdReference, PolicySetIdReference,
        )
    }

    /// View this node as an Expression group member
    #[must_use]
    pub fn as_expression(&self) -> Option<Expression> {
        let expression = match self {
            Self::Apply(v) => Expression::Apply(v.clone()),
            Self::Function(v) => Expression::Function(v.clone()),
            Self::SubjectAttributeDesignator(v) => Expression::SubjectAttributeDesignator(v.clone()),
            Self::ResourceAttributeDesignator(v) => {
                Expression::ResourceAttributeDesignator(v.clone())
            }
            Self::ActionAttributeDesignator(v) => Expression::ActionAttributeDesignator(v.clone()),
            Self::EnvironmentAttributeDesignator(v) => {
                Expression::EnvironmentAttributeDesignator(v.clone())
            }
            Self::AttributeSelector(v) => Expression::AttributeSelector(v.clone()),
            Self::AttributeValue(v) => Expression::AttributeValue(v.clone()),
            Self::VariableReference(v) => Expression::VariableReference(v.clone()),
            _ => return None,
        };
        Some(expression)
    }
}

macro_rules! node_from {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::$variant(value)
                }
            }
        )*
    };
}

node_from! {
    Policy => Policy,
    PolicySet => PolicySet,
    Target => Target,
    Subjects => Subjects,
    Subject => Subject,
    Resources => Resources,
    Resource => Resource,
    Actions => Actions,
    Action => Action,
    Environments => Environments,
    Environment => Environment,
    Rule => Rule,
    Condition => Condition,
    Apply => Apply,
    Function => Function,
    SubjectAttributeDesignator => SubjectAttributeDesignator,
    AttributeSelector => AttributeSelector,
    AttributeValue => AttributeValue,
    VariableDefinition => VariableDefinition,
    VariableReference => VariableReference,
    Obligations => Obligations,
    Obligation => Obligation,
    AttributeAssignment => AttributeAssignment,
    CombinerParameters => CombinerParameters,
    CombinerParameter => CombinerParameter,
    RuleCombinerParameters => RuleCombinerParameters,
    PolicyCombinerParameters => PolicyCombinerParameters,
    PolicySetCombinerParameters => PolicySetCombinerParameters,
}

impl From<Expression> for Node {
    fn from(expression: Expression) -> Self {
        match expression {
            Expression::Apply(v) => Self::Apply(v),
            Expression::Function(v) => Self::Function(v),
            Expression::SubjectAttributeDesignator(v) => Self::SubjectAttributeDesignator(v),
            Expression::ResourceAttributeDesignator(v) => Self::ResourceAttributeDesignator(v),
            Expression::ActionAttributeDesignator(v) => Self::ActionAttributeDesignator(v),
            Expression::EnvironmentAttributeDesignator(v) => {
                Self::EnvironmentAttributeDesignator(v)
            }
            Expression::AttributeSelector(v) => Self::AttributeSelector(v),
            Expression::AttributeValue(v) => Self::AttributeValue(v),
            Expression::VariableReference(v) => Self::VariableReference(v),
        }
    }
}

impl From<MatchSource> for Node {
    fn from(source: MatchSource) -> Self {
        Expression::from(source).into()
    }
}

/// A node bound to its canonical qualified name
///
/// Built only through [`QualifiedElement::new`], so the name always agrees
/// with the node's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedElement {
    name: QName,
    substitution_head: Option<QName>,
    node: Node,
}

impl QualifiedElement {
    /// Wrap a node under its canonical name
    #[must_use]
    pub fn new(node: impl Into<Node>) -> Self {
        let node = node.into();
        let kind = node.kind();
        Self {
            name: kind.qualified_name(),
            substitution_head: kind.substitution_head().map(ElementKind::qualified_name),
            node,
        }
    }

    /// Concrete element kind
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.node.kind()
    }

    /// Canonical qualified name; always the concrete one
    #[must_use]
    pub fn name(&self) -> QName {
        self.name
    }

    /// Name of the abstract position this element may occupy, if any
    #[must_use]
    pub fn substitution_head(&self) -> Option<QName> {
        self.substitution_head
    }

    /// Whether this element may appear where `position` is declared
    #[must_use]
    pub fn is_substitutable_for(&self, position: ElementKind) -> bool {
        let kind = self.kind();
        kind == position || kind.substitution_head() == Some(position)
    }

    /// Wrapped node
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Unwrap the node
    #[must_use]
    pub fn into_node(self) -> Node {
        self.node
    }

    /// The node as an Expression group member, if it is one
    #[must_use]
    pub fn as_expression(&self) -> Option<Expression> {
        self.node.as_expression()
    }
}

impl From<Node> for QualifiedElement {
    fn from(node: Node) -> Self {
        Self::new(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Effect;
    use std::collections::HashSet;

    #[test]
    fn test_all_kinds_have_unique_names() {
        let names: HashSet<_> = ElementKind::ALL.iter().map(|k| k.local_name()).collect();
        assert_eq!(names.len(), ElementKind::ALL.len());
    }

    #[test]
    fn test_from_local_name_roundtrip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_local_name(kind.local_name()), Some(kind));
        }
        assert_eq!(ElementKind::from_local_name("Request"), None);
    }

    #[test]
    fn test_substitution_group_members() {
        let members: Vec<_> = ElementKind::ALL
            .iter()
            .filter(|k| k.substitution_head() == Some(ElementKind::Expression))
            .collect();
        assert_eq!(members.len(), 9);
        assert!(ElementKind::Expression.is_abstract());
        assert_eq!(ElementKind::VariableDefinition.substitution_head(), None);
    }

    #[test]
    fn test_qname_display() {
        let name = ElementKind::Apply.qualified_name();
        assert_eq!(
            name.to_string(),
            "{urn:oasis:names:tc:xacml:2.0:policy:schema:os}Apply"
        );
    }

    #[test]
    fn test_node_tag_matches_kind() {
        let nodes = vec![
            Node::from(Rule::new("r", Effect::Deny)),
            Node::ActionAttributeDesignator(AttributeDesignator::new("a", "s")),
            Node::PolicySetIdReference(IdReference::new("ps")),
            Node::Description("text".to_string()),
        ];
        for node in nodes {
            let value = serde_json::to_value(&node).unwrap();
            let key = value.as_object().unwrap().keys().next().unwrap().clone();
            assert_eq!(key, node.kind().local_name());
        }
    }

    #[test]
    fn test_shared_shape_keeps_distinct_names() {
        let d = AttributeDesignator::new("id", "s");
        let resource = QualifiedElement::new(Node::ResourceAttributeDesignator(d.clone()));
        let action = QualifiedElement::new(Node::ActionAttributeDesignator(d));
        assert_ne!(resource.name(), action.name());
        assert_eq!(resource.name().local_name, "ResourceAttributeDesignator");
    }

    #[test]
    fn test_wrap_expression_keeps_concrete_kind() {
        let e = Expression::value("string", "x");
        let elem = QualifiedElement::new(e.clone());

        assert_eq!(elem.name().local_name, "AttributeValue");
        assert_eq!(
            elem.substitution_head(),
            Some(ElementKind::Expression.qualified_name())
        );
        assert!(elem.is_substitutable_for(ElementKind::Expression));
        assert!(elem.is_substitutable_for(ElementKind::AttributeValue));
        assert!(!elem.is_substitutable_for(ElementKind::Apply));
        assert_eq!(elem.as_expression(), Some(e));
    }

    #[test]
    fn test_non_member_has_no_head() {
        let elem = QualifiedElement::new(Target::any());
        assert_eq!(elem.substitution_head(), None);
        assert!(!elem.is_substitutable_for(ElementKind::Expression));
        assert!(elem.as_expression().is_none());
    }
}
