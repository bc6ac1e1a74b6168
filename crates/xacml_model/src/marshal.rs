//! Marshalling bridge.
//!
//! Serializes a qualified element, with everything nested under it, into a
//! policy document. Output is deterministic: the same node graph always
//! produces the same bytes. Required attributes and children are checked
//! before anything is written.

use crate::document::PolicyDocument;
use crate::element::{Node, QualifiedElement, XACML_NAMESPACE};
use crate::expression::{Expression, MatchSource};
use crate::node::{
    Actions, Apply, AttributeAssignment, AttributeDesignator, AttributeSelector, AttributeValue,
    CombinerParameter, CombinerParameters, Defaults, Environments, IdReference, Obligation,
    Obligations, Policy, PolicyContent, PolicySet, PolicySetContent, Resources, Rule,
    SubjectAttributeDesignator, Subjects, Target, TargetMatch, VariableDefinition,
};
use serde::Serialize;
use std::io::Write;
use xacml_core::MarshalError;

/// Document envelope: namespace first, then the root keyed by its name
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    xmlns: &'static str,
    #[serde(flatten)]
    root: &'a T,
}

/// Types that can be written out as a complete policy document
pub trait Marshal {
    /// Serialize to bytes
    ///
    /// # Errors
    ///
    /// Returns error if a required field is empty or encoding fails
    fn marshal(&self) -> Result<Vec<u8>, MarshalError>;

    /// Serialize into `writer`
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    fn marshal_to(&self, writer: &mut dyn Write) -> Result<(), MarshalError> {
        let bytes = self.marshal()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

/// Serialize a qualified element
///
/// # Errors
///
/// Returns error if a required field is empty or encoding fails
pub fn marshal(element: &QualifiedElement) -> Result<Vec<u8>, MarshalError> {
    encode_node(element.node())
}

/// Serialize a qualified element into `writer`
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn marshal_to<W: Write>(element: &QualifiedElement, mut writer: W) -> Result<(), MarshalError> {
    element.marshal_to(&mut writer)
}

impl Marshal for QualifiedElement {
    fn marshal(&self) -> Result<Vec<u8>, MarshalError> {
        encode_node(self.node())
    }
}

impl Marshal for Node {
    fn marshal(&self) -> Result<Vec<u8>, MarshalError> {
        encode_node(self)
    }
}

impl Marshal for PolicyDocument {
    fn marshal(&self) -> Result<Vec<u8>, MarshalError> {
        validate(self)?;
        encode(self)
    }
}

/// Check every required attribute and child of a document without encoding it
///
/// # Errors
///
/// Returns the first missing field or empty required sequence, in document order
pub fn validate(document: &PolicyDocument) -> Result<(), MarshalError> {
    match document {
        PolicyDocument::Policy(p) => check_policy(p),
        PolicyDocument::PolicySet(s) => check_policy_set(s),
    }
}

fn encode_node(node: &Node) -> Result<Vec<u8>, MarshalError> {
    check_node(node)?;
    encode(node)
}

fn encode<T: Serialize>(root: &T) -> Result<Vec<u8>, MarshalError> {
    let envelope = Envelope {
        xmlns: XACML_NAMESPACE,
        root,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

fn require(element: &'static str, field: &'static str, value: &str) -> Result<(), MarshalError> {
    if value.trim().is_empty() {
        return Err(MarshalError::MissingField { element, field });
    }
    Ok(())
}

fn require_some<T>(
    element: &'static str,
    child: &'static str,
    items: &[T],
) -> Result<(), MarshalError> {
    if items.is_empty() {
        return Err(MarshalError::EmptySequence { element, child });
    }
    Ok(())
}

fn check_node(node: &Node) -> Result<(), MarshalError> {
    match node {
        Node::Policy(v) => check_policy(v),
        Node::PolicySet(v) => check_policy_set(v),
        Node::Description(_) => Ok(()),
        Node::XPathVersion(v) => require("XPathVersion", "Value", v),
        Node::PolicyDefaults(v) => check_defaults("PolicyDefaults", v),
        Node::PolicySetDefaults(v) => check_defaults("PolicySetDefaults", v),
        Node::Target(v) => check_target(v),
        Node::Subjects(v) => check_subjects(v),
        Node::Subject(v) => check_matches("Subject", "SubjectMatch", &v.matches),
        Node::SubjectMatch(v) => check_match("SubjectMatch", v),
        Node::Resources(v) => check_resources(v),
        Node::Resource(v) => check_matches("Resource", "ResourceMatch", &v.matches),
        Node::ResourceMatch(v) => check_match("ResourceMatch", v),
        Node::Actions(v) => check_actions(v),
        Node::Action(v) => check_matches("Action", "ActionMatch", &v.matches),
        Node::ActionMatch(v) => check_match("ActionMatch", v),
        Node::Environments(v) => check_environments(v),
        Node::Environment(v) => check_matches("Environment", "EnvironmentMatch", &v.matches),
        Node::EnvironmentMatch(v) => check_match("EnvironmentMatch", v),
        Node::Rule(v) => check_rule(v),
        Node::Condition(v) => check_expression(&v.expression),
        Node::Apply(v) => check_apply(v),
        Node::Function(v) => require("Function", "FunctionId", &v.function_id),
        Node::SubjectAttributeDesignator(v) => check_subject_designator(v),
        Node::ResourceAttributeDesignator(v) => check_designator("ResourceAttributeDesignator", v),
        Node::ActionAttributeDesignator(v) => check_designator("ActionAttributeDesignator", v),
        Node::EnvironmentAttributeDesignator(v) => {
            check_designator("EnvironmentAttributeDesignator", v)
        }
        Node::AttributeSelector(v) => check_selector(v),
        Node::AttributeValue(v) => check_attribute_value(v),
        Node::VariableDefinition(v) => check_variable_definition(v),
        Node::VariableReference(v) => require("VariableReference", "VariableId", &v.variable_id),
        Node::Obligations(v) => check_obligations(v),
        Node::Obligation(v) => check_obligation(v),
        Node::AttributeAssignment(v) => check_assignment(v),
        Node::CombinerParameters(v) => check_combiner_parameters(v),
        Node::CombinerParameter(v) => check_combiner_parameter(v),
        Node::RuleCombinerParameters(v) => check_scoped_parameters(
            "RuleCombinerParameters",
            "RuleIdRef",
            &v.rule_id_ref,
            &v.parameters,
        ),
        Node::PolicyCombinerParameters(v) => check_scoped_parameters(
            "PolicyCombinerParameters",
            "PolicyIdRef",
            &v.policy_id_ref,
            &v.parameters,
        ),
        Node::PolicySetCombinerParameters(v) => check_scoped_parameters(
            "PolicySetCombinerParameters",
            "PolicySetIdRef",
            &v.policy_set_id_ref,
            &v.parameters,
        ),
        Node::PolicyIdReference(v) => check_reference("PolicyIdReference", v),
        Node::PolicySetIdReference(v) => check_reference("PolicySetIdReference", v),
    }
}

fn check_policy(policy: &Policy) -> Result<(), MarshalError> {
    require("Policy", "PolicyId", &policy.policy_id)?;
    require("Policy", "Version", &policy.version)?;
    require("Policy", "RuleCombiningAlgId", &policy.rule_combining_alg_id)?;
    if let Some(defaults) = &policy.policy_defaults {
        check_defaults("PolicyDefaults", defaults)?;
    }
    if let Some(params) = &policy.combiner_parameters {
        check_combiner_parameters(params)?;
    }
    if let Some(target) = &policy.target {
        check_target(target)?;
    }
    for member in &policy.content {
        match member {
            PolicyContent::CombinerParameters(v) => check_combiner_parameters(v)?,
            PolicyContent::RuleCombinerParameters(v) => check_scoped_parameters(
                "RuleCombinerParameters",
                "RuleIdRef",
                &v.rule_id_ref,
                &v.parameters,
            )?,
            PolicyContent::VariableDefinition(v) => check_variable_definition(v)?,
            PolicyContent::Rule(v) => check_rule(v)?,
        }
    }
    if let Some(obligations) = &policy.obligations {
        check_obligations(obligations)?;
    }
    Ok(())
}

fn check_policy_set(set: &PolicySet) -> Result<(), MarshalError> {
    require("PolicySet", "PolicySetId", &set.policy_set_id)?;
    require("PolicySet", "Version", &set.version)?;
    require("PolicySet", "PolicyCombiningAlgId", &set.policy_combining_alg_id)?;
    if let Some(defaults) = &set.policy_set_defaults {
        check_defaults("PolicySetDefaults", defaults)?;
    }
    if let Some(target) = &set.target {
        check_target(target)?;
    }
    for member in &set.content {
        match member {
            PolicySetContent::PolicySet(v) => check_policy_set(v)?,
            PolicySetContent::Policy(v) => check_policy(v)?,
            PolicySetContent::PolicySetIdReference(v) => {
                check_reference("PolicySetIdReference", v)?
            }
            PolicySetContent::PolicyIdReference(v) => check_reference("PolicyIdReference", v)?,
            PolicySetContent::CombinerParameters(v) => check_combiner_parameters(v)?,
            PolicySetContent::PolicyCombinerParameters(v) => check_scoped_parameters(
                "PolicyCombinerParameters",
                "PolicyIdRef",
                &v.policy_id_ref,
                &v.parameters,
            )?,
            PolicySetContent::PolicySetCombinerParameters(v) => check_scoped_parameters(
                "PolicySetCombinerParameters",
                "PolicySetIdRef",
                &v.policy_set_id_ref,
                &v.parameters,
            )?,
        }
    }
    if let Some(obligations) = &set.obligations {
        check_obligations(obligations)?;
    }
    Ok(())
}

fn check_defaults(element: &'static str, defaults: &Defaults) -> Result<(), MarshalError> {
    require(element, "XPathVersion", &defaults.xpath_version)
}

fn check_target(target: &Target) -> Result<(), MarshalError> {
    if let Some(subjects) = &target.subjects {
        check_subjects(subjects)?;
    }
    if let Some(resources) = &target.resources {
        check_resources(resources)?;
    }
    if let Some(actions) = &target.actions {
        check_actions(actions)?;
    }
    if let Some(environments) = &target.environments {
        check_environments(environments)?;
    }
    Ok(())
}

fn check_subjects(subjects: &Subjects) -> Result<(), MarshalError> {
    require_some("Subjects", "Subject", &subjects.subjects)?;
    subjects
        .subjects
        .iter()
        .try_for_each(|s| check_matches("Subject", "SubjectMatch", &s.matches))
}

fn check_resources(resources: &Resources) -> Result<(), MarshalError> {
    require_some("Resources", "Resource", &resources.resources)?;
    resources
        .resources
        .iter()
        .try_for_each(|r| check_matches("Resource", "ResourceMatch", &r.matches))
}

fn check_actions(actions: &Actions) -> Result<(), MarshalError> {
    require_some("Actions", "Action", &actions.actions)?;
    actions
        .actions
        .iter()
        .try_for_each(|a| check_matches("Action", "ActionMatch", &a.matches))
}

fn check_environments(environments: &Environments) -> Result<(), MarshalError> {
    require_some("Environments", "Environment", &environments.environments)?;
    environments
        .environments
        .iter()
        .try_for_each(|e| check_matches("Environment", "EnvironmentMatch", &e.matches))
}

fn check_matches(
    element: &'static str,
    child: &'static str,
    matches: &[TargetMatch],
) -> Result<(), MarshalError> {
    require_some(element, child, matches)?;
    matches.iter().try_for_each(|m| check_match(child, m))
}

fn check_match(element: &'static str, target_match: &TargetMatch) -> Result<(), MarshalError> {
    require(element, "MatchId", &target_match.match_id)?;
    check_attribute_value(&target_match.attribute_value)?;
    match &target_match.source {
        MatchSource::SubjectAttributeDesignator(d) => check_subject_designator(d),
        MatchSource::ResourceAttributeDesignator(d) => {
            check_designator("ResourceAttributeDesignator", d)
        }
        MatchSource::ActionAttributeDesignator(d) => check_designator("ActionAttributeDesignator", d),
        MatchSource::EnvironmentAttributeDesignator(d) => {
            check_designator("EnvironmentAttributeDesignator", d)
        }
        MatchSource::AttributeSelector(s) => check_selector(s),
    }
}

fn check_rule(rule: &Rule) -> Result<(), MarshalError> {
    require("Rule", "RuleId", &rule.rule_id)?;
    if let Some(target) = &rule.target {
        check_target(target)?;
    }
    if let Some(condition) = &rule.condition {
        check_expression(&condition.expression)?;
    }
    Ok(())
}

fn check_expression(expression: &Expression) -> Result<(), MarshalError> {
    match expression {
        Expression::Apply(v) => check_apply(v),
        Expression::Function(v) => require("Function", "FunctionId", &v.function_id),
        Expression::SubjectAttributeDesignator(v) => check_subject_designator(v),
        Expression::ResourceAttributeDesignator(v) => {
            check_designator("ResourceAttributeDesignator", v)
        }
        Expression::ActionAttributeDesignator(v) => check_designator("ActionAttributeDesignator", v),
        Expression::EnvironmentAttributeDesignator(v) => {
            check_designator("EnvironmentAttributeDesignator", v)
        }
        Expression::AttributeSelector(v) => check_selector(v),
        Expression::AttributeValue(v) => check_attribute_value(v),
        Expression::VariableReference(v) => {
            require("VariableReference", "VariableId", &v.variable_id)
        }
    }
}

fn check_apply(apply: &Apply) -> Result<(), MarshalError> {
    require("Apply", "FunctionId", &apply.function_id)?;
    apply.arguments.iter().try_for_each(check_expression)
}

fn check_designator(
    element: &'static str,
    designator: &AttributeDesignator,
) -> Result<(), MarshalError> {
    require(element, "AttributeId", &designator.attribute_id)?;
    require(element, "DataType", &designator.data_type)
}

fn check_subject_designator(designator: &SubjectAttributeDesignator) -> Result<(), MarshalError> {
    const ELEMENT: &str = "SubjectAttributeDesignator";
    require(ELEMENT, "AttributeId", &designator.attribute_id)?;
    require(ELEMENT, "DataType", &designator.data_type)?;
    require(ELEMENT, "SubjectCategory", &designator.subject_category)
}

fn check_selector(selector: &AttributeSelector) -> Result<(), MarshalError> {
    require(
        "AttributeSelector",
        "RequestContextPath",
        &selector.request_context_path,
    )?;
    require("AttributeSelector", "DataType", &selector.data_type)
}

fn check_attribute_value(value: &AttributeValue) -> Result<(), MarshalError> {
    require("AttributeValue", "DataType", &value.data_type)
}

fn check_variable_definition(definition: &VariableDefinition) -> Result<(), MarshalError> {
    require("VariableDefinition", "VariableId", &definition.variable_id)?;
    check_expression(&definition.expression)
}

fn check_obligations(obligations: &Obligations) -> Result<(), MarshalError> {
    require_some("Obligations", "Obligation", &obligations.obligations)?;
    obligations.obligations.iter().try_for_each(check_obligation)
}

fn check_obligation(obligation: &Obligation) -> Result<(), MarshalError> {
    require("Obligation", "ObligationId", &obligation.obligation_id)?;
    obligation.assignments.iter().try_for_each(check_assignment)
}

fn check_assignment(assignment: &AttributeAssignment) -> Result<(), MarshalError> {
    require("AttributeAssignment", "AttributeId", &assignment.attribute_id)?;
    require("AttributeAssignment", "DataType", &assignment.data_type)
}

fn check_combiner_parameters(params: &CombinerParameters) -> Result<(), MarshalError> {
    params.parameters.iter().try_for_each(check_combiner_parameter)
}

fn check_scoped_parameters(
    element: &'static str,
    field: &'static str,
    scope: &str,
    params: &[CombinerParameter],
) -> Result<(), MarshalError> {
    require(element, field, scope)?;
    params.iter().try_for_each(check_combiner_parameter)
}

fn check_combiner_parameter(param: &CombinerParameter) -> Result<(), MarshalError> {
    require("CombinerParameter", "ParameterName", &param.parameter_name)?;
    check_attribute_value(&param.attribute_value)
}

fn check_reference(element: &'static str, reference: &IdReference) -> Result<(), MarshalError> {
    require(element, "Value", &reference.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Effect, Subject};
    use proptest::prelude::*;
    use serde_json::Value;

    fn sample_policy() -> Policy {
        let condition = Apply::new("urn:oasis:names:tc:xacml:1.0:function:string-equal")
            .with_argument(Expression::ResourceAttributeDesignator(AttributeDesignator::new(
                "urn:oasis:names:tc:xacml:1.0:resource:resource-id",
                "http://www.w3.org/2001/XMLSchema#string",
            )))
            .with_argument(Expression::value(
                "http://www.w3.org/2001/XMLSchema#string",
                "doc",
            ));
        Policy::new(
            "samplePolicy1",
            "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:deny-overrides",
        )
        .with_variable(VariableDefinition::new(
            "v1",
            Expression::value("http://www.w3.org/2001/XMLSchema#boolean", "true"),
        ))
        .with_rule(Rule::new("r1", Effect::Permit).with_condition(condition))
    }

    fn contains_key(value: &Value, key: &str) -> bool {
        match value {
            Value::Object(map) => map
                .iter()
                .any(|(k, v)| k == key || contains_key(v, key)),
            Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
            _ => false,
        }
    }

    #[test]
    fn test_envelope_layout() {
        let elem = QualifiedElement::new(sample_policy());
        let bytes = marshal(&elem).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(
            "{\"xmlns\":\"urn:oasis:names:tc:xacml:2.0:policy:schema:os\",\"Policy\":{"
        ));
    }

    #[test]
    fn test_expression_name_never_emitted() {
        let elem = QualifiedElement::new(sample_policy());
        let value: Value = serde_json::from_slice(&marshal(&elem).unwrap()).unwrap();
        assert!(!contains_key(&value, "Expression"));
        assert!(contains_key(&value, "Apply"));
        assert!(contains_key(&value, "ResourceAttributeDesignator"));
    }

    #[test]
    fn test_member_marshalled_on_its_own() {
        let elem = QualifiedElement::new(Expression::variable("v1"));
        let value: Value = serde_json::from_slice(&marshal(&elem).unwrap()).unwrap();
        assert_eq!(value["VariableReference"]["VariableId"], "v1");
    }

    #[test]
    fn test_missing_required_field() {
        let elem = QualifiedElement::new(Rule::new("", Effect::Deny));
        let err = marshal(&elem).unwrap_err();
        assert!(matches!(
            err,
            MarshalError::MissingField {
                element: "Rule",
                field: "RuleId"
            }
        ));
    }

    #[test]
    fn test_nested_missing_field_is_found() {
        let policy = Policy::new("p", "urn:alg")
            .with_rule(Rule::new("r", Effect::Permit).with_condition(Apply::new("")));
        let err = PolicyDocument::from(policy).marshal().unwrap_err();
        assert!(matches!(
            err,
            MarshalError::MissingField {
                element: "Apply",
                field: "FunctionId"
            }
        ));
    }

    #[test]
    fn test_empty_required_sequence() {
        let elem = QualifiedElement::new(Subjects::default());
        assert!(matches!(
            marshal(&elem).unwrap_err(),
            MarshalError::EmptySequence {
                element: "Subjects",
                child: "Subject"
            }
        ));

        let target = Target::any().with_subject(Subject::default());
        assert!(matches!(
            marshal(&QualifiedElement::new(target)).unwrap_err(),
            MarshalError::EmptySequence {
                element: "Subject",
                child: "SubjectMatch"
            }
        ));
    }

    #[test]
    fn test_marshal_to_matches_bytes() {
        let elem = QualifiedElement::new(sample_policy());
        let mut out = Vec::new();
        marshal_to(&elem, &mut out).unwrap();
        assert_eq!(out, marshal(&elem).unwrap());
    }

    #[test]
    fn test_document_and_element_agree() {
        let doc = PolicyDocument::from(sample_policy());
        assert_eq!(doc.marshal().unwrap(), doc.to_element().marshal().unwrap());
        assert_eq!(
            doc.marshal().unwrap(),
            Node::from(doc.clone()).marshal().unwrap()
        );
    }

    proptest! {
        #[test]
        fn prop_marshal_deterministic_and_parseable(
            id in "[a-zA-Z][a-zA-Z0-9]{0,12}",
            rules in proptest::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..6),
        ) {
            let mut policy = Policy::new(id, "urn:alg");
            for (rule_id, permit) in rules {
                let effect = if permit { Effect::Permit } else { Effect::Deny };
                policy = policy.with_rule(Rule::new(rule_id, effect));
            }
            let elem = QualifiedElement::new(policy.clone());
            let first = marshal(&elem).unwrap();
            let second = marshal(&elem).unwrap();
            prop_assert_eq!(&first, &second);

            let value: Value = serde_json::from_slice(&first).unwrap();
            let back: Policy = serde_json::from_value(value["Policy"].clone()).unwrap();
            prop_assert_eq!(back, policy);
        }
    }
}
