//! Constructed policy artifacts and the evaluation seam.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use xacml_core::{ArtifactKind, EvaluationError, MarshalError, ResolutionError};
use xacml_model::{Marshal, Policy, PolicyDocument, Target};

/// Outcome of evaluating an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Access granted
    Permit,
    /// Access refused
    Deny,
    /// Nothing applied to the request
    NotApplicable,
    /// Evaluation could not reach a decision
    Indeterminate,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => write!(f, "Permit"),
            Self::Deny => write!(f, "Deny"),
            Self::NotApplicable => write!(f, "NotApplicable"),
            Self::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

/// Decision engine the artifacts delegate to.
///
/// Artifacts only walk their structure and resolve references. Target
/// matching, rule evaluation and combining algorithms all live behind this
/// trait.
pub trait PolicyEvaluator {
    /// Whether `target` applies to the current request; `None` always applies
    ///
    /// # Errors
    ///
    /// Returns error if the match cannot be decided
    fn matches(&self, target: Option<&Target>) -> Result<bool, EvaluationError>;

    /// Evaluate a single policy
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails
    fn evaluate_policy(&self, policy: &Policy) -> Result<Decision, EvaluationError>;

    /// Combine member decisions with the named algorithm
    ///
    /// # Errors
    ///
    /// Returns error if the algorithm is unknown or fails
    fn combine(&self, algorithm: &str, decisions: &[Decision]) -> Result<Decision, EvaluationError>;
}

/// Longest chain of nested artifacts a single evaluation may follow
pub const MAX_EVALUATION_DEPTH: usize = 64;

/// Artifacts on the active evaluation path, outermost first
///
/// Entries are keyed by (kind, id, version). Entering an artifact that is
/// already on the path is a circular reference.
#[derive(Debug, Default)]
pub struct EvaluationChain {
    path: Vec<(ArtifactKind, String, String)>,
}

impl EvaluationChain {
    /// Empty chain for a fresh evaluation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `artifact` onto the path
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Circular`] if it is already on the path and
    /// [`ResolutionError::TooDeep`] if the path is full
    pub fn enter(&mut self, artifact: &dyn PolicyArtifact) -> Result<(), ResolutionError> {
        let key = (
            artifact.kind(),
            artifact.id().to_string(),
            artifact.version().to_string(),
        );
        if self.path.contains(&key) {
            return Err(ResolutionError::Circular { id: key.1 });
        }
        if self.path.len() >= MAX_EVALUATION_DEPTH {
            return Err(ResolutionError::TooDeep {
                id: key.1,
                limit: MAX_EVALUATION_DEPTH,
            });
        }
        self.path.push(key);
        Ok(())
    }

    /// Pop the innermost artifact
    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// Number of artifacts on the path
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// A constructed, evaluable policy or policy set
///
/// The kind is fixed at construction. Implementations must be safe to share
/// across threads.
pub trait PolicyArtifact: Send + Sync + fmt::Debug {
    /// The parsed document
    fn document(&self) -> &PolicyDocument;

    /// Artifact kind
    fn kind(&self) -> ArtifactKind {
        self.document().kind()
    }

    /// Root identifier
    fn id(&self) -> &str {
        self.document().id()
    }

    /// Root version string
    fn version(&self) -> &str {
        self.document().version()
    }

    /// Evaluate against the current request
    ///
    /// # Errors
    ///
    /// Returns error if a reference cannot be resolved or the engine fails
    fn evaluate(&self, evaluator: &dyn PolicyEvaluator) -> Result<Decision, EvaluationError>;

    /// Evaluate as a member of an enclosing evaluation
    ///
    /// Artifacts that follow references must enter themselves on `chain` and
    /// pass it on. The default ignores the chain.
    ///
    /// # Errors
    ///
    /// Returns error if a reference is circular or cannot be resolved, or the
    /// engine fails
    fn evaluate_in(
        &self,
        evaluator: &dyn PolicyEvaluator,
        _chain: &mut EvaluationChain,
    ) -> Result<Decision, EvaluationError> {
        self.evaluate(evaluator)
    }

    /// Write the artifact back out as a policy document
    ///
    /// # Errors
    ///
    /// Returns error if marshalling or the write fails
    fn marshal(&self, writer: &mut dyn Write) -> Result<(), MarshalError> {
        self.document().marshal_to(writer)
    }
}
