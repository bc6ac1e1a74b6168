//! Policy grammar node types.
//!
//! One plain data type per node shape of the XACML 2.0 policy schema. Field
//! order is the declared schema order, attributes first and child elements
//! after, and serialization preserves it. Optional children that are absent
//! and optional sequences that are empty are left out of the output.

use crate::expression::{Expression, MatchSource};
use serde::{Deserialize, Serialize};

/// Version assumed for a Policy or PolicySet that does not state one
pub const DEFAULT_VERSION: &str = "1.0";

/// Subject category assumed by a SubjectAttributeDesignator that omits it
pub const ACCESS_SUBJECT_CATEGORY: &str =
    "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_subject_category() -> String {
    ACCESS_SUBJECT_CATEGORY.to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Effect of a rule, or the decision an obligation is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Permit
    Permit,
    /// Deny
    Deny,
}

/// A policy: rules combined by a rule-combining algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    /// Policy identifier
    pub policy_id: String,
    /// Policy version
    #[serde(default = "default_version")]
    pub version: String,
    /// Rule-combining algorithm identifier
    pub rule_combining_alg_id: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Policy-wide defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_defaults: Option<Defaults>,
    /// Leading combiner parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combiner_parameters: Option<CombinerParameters>,
    /// Applicability predicate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Rules, variable definitions and parameters in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<PolicyContent>,
    /// Obligations returned with the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obligations: Option<Obligations>,
}

impl Policy {
    /// Create an empty policy
    #[must_use]
    pub fn new(policy_id: impl Into<String>, rule_combining_alg_id: impl Into<String>) -> Self {
        Self {
            policy_id: policy_id.into(),
            version: default_version(),
            rule_combining_alg_id: rule_combining_alg_id.into(),
            description: None,
            policy_defaults: None,
            combiner_parameters: None,
            target: None,
            content: Vec::new(),
            obligations: None,
        }
    }

    /// Set the version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the XPath version default
    #[must_use]
    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.policy_defaults = Some(defaults);
        self
    }

    /// Set the target
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Append a rule
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.content.push(PolicyContent::Rule(rule));
        self
    }

    /// Append a variable definition
    #[must_use]
    pub fn with_variable(mut self, definition: VariableDefinition) -> Self {
        self.content.push(PolicyContent::VariableDefinition(definition));
        self
    }

    /// Append an obligation, creating the Obligations element if needed
    #[must_use]
    pub fn with_obligation(mut self, obligation: Obligation) -> Self {
        self.obligations
            .get_or_insert_with(Obligations::default)
            .obligations
            .push(obligation);
        self
    }

    /// Rules in document order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.content.iter().filter_map(|c| match c {
            PolicyContent::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    /// Variable definitions in document order
    pub fn variable_definitions(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.content.iter().filter_map(|c| match c {
            PolicyContent::VariableDefinition(def) => Some(def),
            _ => None,
        })
    }
}

/// Member of a policy's ordered content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyContent {
    /// Parameters for the rule-combining algorithm
    CombinerParameters(CombinerParameters),
    /// Parameters scoped to one rule
    RuleCombinerParameters(RuleCombinerParameters),
    /// Named expression
    VariableDefinition(VariableDefinition),
    /// Rule
    Rule(Rule),
}

/// A policy set: policies and policy sets combined by an algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicySet {
    /// Policy set identifier
    pub policy_set_id: String,
    /// Policy set version
    #[serde(default = "default_version")]
    pub version: String,
    /// Policy-combining algorithm identifier
    pub policy_combining_alg_id: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set-wide defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_set_defaults: Option<Defaults>,
    /// Applicability predicate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Members and parameters in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<PolicySetContent>,
    /// Obligations returned with the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obligations: Option<Obligations>,
}

impl PolicySet {
    /// Create an empty policy set
    #[must_use]
    pub fn new(
        policy_set_id: impl Into<String>,
        policy_combining_alg_id: impl Into<String>,
    ) -> Self {
        Self {
            policy_set_id: policy_set_id.into(),
            version: default_version(),
            policy_combining_alg_id: policy_combining_alg_id.into(),
            description: None,
            policy_set_defaults: None,
            target: None,
            content: Vec::new(),
            obligations: None,
        }
    }

    /// Set the version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the target
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Append an inline policy
    #[must_use]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.content.push(PolicySetContent::Policy(policy));
        self
    }

    /// Append an inline policy set
    #[must_use]
    pub fn with_policy_set(mut self, set: PolicySet) -> Self {
        self.content.push(PolicySetContent::PolicySet(set));
        self
    }

    /// Append a reference to a policy
    #[must_use]
    pub fn with_policy_reference(mut self, reference: IdReference) -> Self {
        self.content.push(PolicySetContent::PolicyIdReference(reference));
        self
    }

    /// Append a reference to a policy set
    #[must_use]
    pub fn with_policy_set_reference(mut self, reference: IdReference) -> Self {
        self.content
            .push(PolicySetContent::PolicySetIdReference(reference));
        self
    }
}

/// Member of a policy set's ordered content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicySetContent {
    /// Inline policy set
    PolicySet(PolicySet),
    /// Inline policy
    Policy(Policy),
    /// Reference to a policy set by id
    PolicySetIdReference(IdReference),
    /// Reference to a policy by id
    PolicyIdReference(IdReference),
    /// Parameters for the policy-combining algorithm
    CombinerParameters(CombinerParameters),
    /// Parameters scoped to one policy
    PolicyCombinerParameters(PolicyCombinerParameters),
    /// Parameters scoped to one policy set
    PolicySetCombinerParameters(PolicySetCombinerParameters),
}

/// Defaults shared by the PolicyDefaults and PolicySetDefaults elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// XPath version used by attribute selectors
    #[serde(rename = "XPathVersion")]
    pub xpath_version: String,
}

/// A rule: an effect guarded by a target and condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rule {
    /// Rule identifier
    pub rule_id: String,
    /// Effect when the rule applies
    pub effect: Effect,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Applicability predicate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Boolean guard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Rule {
    /// Create a rule with no target or condition
    #[must_use]
    pub fn new(rule_id: impl Into<String>, effect: Effect) -> Self {
        Self {
            rule_id: rule_id.into(),
            effect,
            description: None,
            target: None,
            condition: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the target
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the condition
    #[must_use]
    pub fn with_condition(mut self, expression: impl Into<Expression>) -> Self {
        self.condition = Some(Condition::new(expression));
        self
    }
}

/// Boolean guard of a rule; holds any Expression group member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition {
    /// Guard expression
    pub expression: Expression,
}

impl Condition {
    /// Create a condition
    #[must_use]
    pub fn new(expression: impl Into<Expression>) -> Self {
        Self {
            expression: expression.into(),
        }
    }
}

/// Applicability predicate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Target {
    /// Subject matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Subjects>,
    /// Resource matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    /// Action matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
    /// Environment matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environments: Option<Environments>,
}

impl Target {
    /// Target matching every request
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Add a subject alternative
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects
            .get_or_insert_with(Subjects::default)
            .subjects
            .push(subject);
        self
    }

    /// Add a resource alternative
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources
            .get_or_insert_with(Resources::default)
            .resources
            .push(resource);
        self
    }

    /// Add an action alternative
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions
            .get_or_insert_with(Actions::default)
            .actions
            .push(action);
        self
    }

    /// Add an environment alternative
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environments
            .get_or_insert_with(Environments::default)
            .environments
            .push(environment);
        self
    }
}

/// Disjunction of subjects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subjects {
    /// Alternatives
    #[serde(rename = "Subject")]
    pub subjects: Vec<Subject>,
}

/// Conjunction of subject matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Matches that must all hold
    #[serde(rename = "SubjectMatch")]
    pub matches: Vec<TargetMatch>,
}

/// Disjunction of resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Alternatives
    #[serde(rename = "Resource")]
    pub resources: Vec<Resource>,
}

/// Conjunction of resource matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Matches that must all hold
    #[serde(rename = "ResourceMatch")]
    pub matches: Vec<TargetMatch>,
}

/// Disjunction of actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actions {
    /// Alternatives
    #[serde(rename = "Action")]
    pub actions: Vec<Action>,
}

/// Conjunction of action matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Matches that must all hold
    #[serde(rename = "ActionMatch")]
    pub matches: Vec<TargetMatch>,
}

/// Disjunction of environments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environments {
    /// Alternatives
    #[serde(rename = "Environment")]
    pub environments: Vec<Environment>,
}

/// Conjunction of environment matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Matches that must all hold
    #[serde(rename = "EnvironmentMatch")]
    pub matches: Vec<TargetMatch>,
}

/// Shape shared by SubjectMatch, ResourceMatch, ActionMatch and EnvironmentMatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetMatch {
    /// Matching function identifier
    pub match_id: String,
    /// Literal compared against the request
    pub attribute_value: AttributeValue,
    /// Where the request value comes from
    #[serde(flatten)]
    pub source: MatchSource,
}

impl TargetMatch {
    /// Create a match
    #[must_use]
    pub fn new(
        match_id: impl Into<String>,
        attribute_value: AttributeValue,
        source: MatchSource,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            attribute_value,
            source,
        }
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeValue {
    /// Data type URI
    pub data_type: String,
    /// Text content
    pub value: String,
}

impl AttributeValue {
    /// Create a literal
    #[must_use]
    pub fn new(data_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            value: value.into(),
        }
    }
}

/// Shape shared by the resource, action and environment designators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDesignator {
    /// Attribute identifier
    pub attribute_id: String,
    /// Data type URI
    pub data_type: String,
    /// Expected issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Whether absence is an error
    #[serde(default, skip_serializing_if = "is_false")]
    pub must_be_present: bool,
}

impl AttributeDesignator {
    /// Create a designator
    #[must_use]
    pub fn new(attribute_id: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            data_type: data_type.into(),
            issuer: None,
            must_be_present: false,
        }
    }

    /// Require the attribute to be present
    #[must_use]
    pub fn required(mut self) -> Self {
        self.must_be_present = true;
        self
    }
}

/// Subject designator; adds a subject category to the designator shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubjectAttributeDesignator {
    /// Attribute identifier
    pub attribute_id: String,
    /// Data type URI
    pub data_type: String,
    /// Expected issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Whether absence is an error
    #[serde(default, skip_serializing_if = "is_false")]
    pub must_be_present: bool,
    /// Subject category URI
    #[serde(default = "default_subject_category")]
    pub subject_category: String,
}

impl SubjectAttributeDesignator {
    /// Create a designator for the access subject
    #[must_use]
    pub fn new(attribute_id: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            data_type: data_type.into(),
            issuer: None,
            must_be_present: false,
            subject_category: default_subject_category(),
        }
    }
}

/// XPath lookup into the request context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeSelector {
    /// XPath expression
    pub request_context_path: String,
    /// Data type URI
    pub data_type: String,
    /// Whether absence is an error
    #[serde(default, skip_serializing_if = "is_false")]
    pub must_be_present: bool,
}

/// Function application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Apply {
    /// Function identifier
    pub function_id: String,
    /// Arguments in order
    #[serde(rename = "Content", default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Expression>,
}

impl Apply {
    /// Create an application with no arguments
    #[must_use]
    pub fn new(function_id: impl Into<String>) -> Self {
        Self {
            function_id: function_id.into(),
            arguments: Vec::new(),
        }
    }

    /// Append an argument
    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<Expression>) -> Self {
        self.arguments.push(argument.into());
        self
    }
}

/// Function passed as an argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Function {
    /// Function identifier
    pub function_id: String,
}

/// Named expression scoped to a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VariableDefinition {
    /// Variable identifier
    pub variable_id: String,
    /// Defining expression
    #[serde(flatten)]
    pub expression: Expression,
}

impl VariableDefinition {
    /// Create a definition
    #[must_use]
    pub fn new(variable_id: impl Into<String>, expression: impl Into<Expression>) -> Self {
        Self {
            variable_id: variable_id.into(),
            expression: expression.into(),
        }
    }
}

/// Reference to a variable definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VariableReference {
    /// Variable identifier
    pub variable_id: String,
}

/// Obligations attached to a policy or policy set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligations {
    /// Members
    #[serde(rename = "Obligation")]
    pub obligations: Vec<Obligation>,
}

/// Action the enforcement point must carry out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Obligation {
    /// Obligation identifier
    pub obligation_id: String,
    /// Decision this obligation accompanies
    pub fulfill_on: Effect,
    /// Arguments
    #[serde(
        rename = "AttributeAssignment",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub assignments: Vec<AttributeAssignment>,
}

/// Obligation argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeAssignment {
    /// Data type URI
    pub data_type: String,
    /// Attribute identifier
    pub attribute_id: String,
    /// Text content
    pub value: String,
}

/// Parameters for a combining algorithm
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinerParameters {
    /// Parameters
    #[serde(
        rename = "CombinerParameter",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<CombinerParameter>,
}

/// Single named combining parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CombinerParameter {
    /// Parameter name
    pub parameter_name: String,
    /// Parameter value
    pub attribute_value: AttributeValue,
}

/// Combiner parameters scoped to one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleCombinerParameters {
    /// Rule the parameters apply to
    pub rule_id_ref: String,
    /// Parameters
    #[serde(
        rename = "CombinerParameter",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<CombinerParameter>,
}

/// Combiner parameters scoped to one policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyCombinerParameters {
    /// Policy the parameters apply to
    pub policy_id_ref: String,
    /// Parameters
    #[serde(
        rename = "CombinerParameter",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<CombinerParameter>,
}

/// Combiner parameters scoped to one policy set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicySetCombinerParameters {
    /// Policy set the parameters apply to
    pub policy_set_id_ref: String,
    /// Parameters
    #[serde(
        rename = "CombinerParameter",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<CombinerParameter>,
}

/// Reference by id, shared by PolicyIdReference and PolicySetIdReference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdReference {
    /// Referenced identifier
    pub value: String,
    /// Version pattern the target must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Lower bound pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_version: Option<String>,
    /// Upper bound pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

impl IdReference {
    /// Reference any version of `id`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            value: id.into(),
            version: None,
            earliest_version: None,
            latest_version: None,
        }
    }

    /// Constrain the referenced version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}
