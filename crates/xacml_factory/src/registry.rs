//! Policy construction registry.
//!
//! [`PolicyFactory`] holds the active constructing type and delegates every
//! construction request to it. The active type can be replaced at runtime;
//! a replacement that fails the capability contract is rejected and the
//! previous type stays active.

use crate::artifact::PolicyArtifact;
use crate::config::FactoryConfig;
use crate::constructor::PolicyConstructor;
use crate::resolver::PolicyResolver;
use crate::standard::{STANDARD_CONSTRUCTOR, StandardConstructor};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};
use xacml_core::{
    ArtifactKind, CapabilitySet, ConfigurationError, ConstructionError, CoreError, LoadError,
};
use xacml_model::{Marshal, Policy, PolicyDocument, PolicySet};

/// Check a constructor against the full capability contract
///
/// # Errors
///
/// Returns error listing every capability the constructor does not declare
pub fn validate_constructor(constructor: &dyn PolicyConstructor) -> Result<(), ConfigurationError> {
    let missing = constructor.capabilities().missing(&CapabilitySet::full());
    if missing.is_empty() {
        return Ok(());
    }
    Err(ConfigurationError::MissingCapabilities {
        constructor: constructor.name().to_string(),
        missing,
    })
}

/// Named constructors selectable by name
pub struct ConstructorCatalog {
    constructors: IndexMap<String, Arc<dyn PolicyConstructor>>,
}

impl ConstructorCatalog {
    /// Catalog holding only the standard constructor
    #[must_use]
    pub fn new() -> Self {
        Self::with_standard(StandardConstructor::new())
    }

    /// Catalog holding the given standard constructor
    #[must_use]
    pub fn with_standard(standard: StandardConstructor) -> Self {
        let mut constructors: IndexMap<String, Arc<dyn PolicyConstructor>> = IndexMap::new();
        constructors.insert(STANDARD_CONSTRUCTOR.to_string(), Arc::new(standard));
        Self { constructors }
    }

    /// Catalog with nothing registered
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// Register a constructor under its own name
    ///
    /// # Errors
    ///
    /// Returns error if the name is taken or the constructor is incomplete
    pub fn register(
        &mut self,
        constructor: Arc<dyn PolicyConstructor>,
    ) -> Result<(), ConfigurationError> {
        let name = constructor.name().to_string();
        if self.constructors.contains_key(&name) {
            return Err(ConfigurationError::AlreadyRegistered { name });
        }
        validate_constructor(constructor.as_ref())?;
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Look up a constructor by name
    ///
    /// # Errors
    ///
    /// Returns error if nothing is registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<dyn PolicyConstructor>, LoadError> {
        self.constructors
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| LoadError {
                name: name.to_string(),
            })
    }

    /// Check if a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Number of registered constructors
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl Default for ConstructorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: Lazy<PolicyFactory> = Lazy::new(PolicyFactory::new);

/// Entry point for building policy artifacts
///
/// Safe to share across threads. Construction calls take a snapshot of the
/// active constructor and never block a concurrent replacement for longer
/// than the pointer swap.
pub struct PolicyFactory {
    catalog: RwLock<ConstructorCatalog>,
    active: RwLock<Arc<dyn PolicyConstructor>>,
}

impl PolicyFactory {
    /// Factory with the default catalog and the standard constructor active
    #[must_use]
    pub fn new() -> Self {
        let standard: Arc<dyn PolicyConstructor> = Arc::new(StandardConstructor::new());
        Self {
            catalog: RwLock::new(ConstructorCatalog::new()),
            active: RwLock::new(standard),
        }
    }

    /// Factory over `catalog` with `active` selected
    ///
    /// # Errors
    ///
    /// Returns error if `active` is not in the catalog
    pub fn with_catalog(catalog: ConstructorCatalog, active: &str) -> Result<Self, LoadError> {
        let constructor = catalog.get(active)?;
        Ok(Self {
            catalog: RwLock::new(catalog),
            active: RwLock::new(constructor),
        })
    }

    /// Factory configured from `config`
    ///
    /// The standard constructor in the catalog honours the configured
    /// resolution mode and size limit.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or names an unknown constructor
    pub fn from_config(config: &FactoryConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let catalog = ConstructorCatalog::with_standard(StandardConstructor::from_config(config));
        let factory = Self::with_catalog(catalog, &config.constructor)?;
        info!(
            constructor = %config.constructor,
            resolution = %config.resolution,
            max_document_bytes = config.max_document_bytes,
            "Policy factory configured"
        );
        Ok(factory)
    }

    /// The process-wide factory
    #[must_use]
    pub fn global() -> &'static PolicyFactory {
        &GLOBAL
    }

    /// Add a constructor to the catalog without activating it
    ///
    /// # Errors
    ///
    /// Returns error if the name is taken or the constructor is incomplete
    pub fn register_constructor(
        &self,
        constructor: Arc<dyn PolicyConstructor>,
    ) -> Result<(), ConfigurationError> {
        let name = constructor.name().to_string();
        match self.catalog.write().register(constructor) {
            Ok(()) => {
                info!(constructor = %name, "Registered policy constructor");
                Ok(())
            }
            Err(err) => {
                warn!(constructor = %name, error = %err, "Rejected policy constructor");
                Err(err)
            }
        }
    }

    /// Replace the active constructor
    ///
    /// # Errors
    ///
    /// Returns error if `constructor` is incomplete; the previous one stays active
    pub fn set_constructor(
        &self,
        constructor: Arc<dyn PolicyConstructor>,
    ) -> Result<(), ConfigurationError> {
        if let Err(err) = validate_constructor(constructor.as_ref()) {
            warn!(constructor = %constructor.name(), error = %err, "Rejected policy constructor");
            return Err(err);
        }

        let name = constructor.name().to_string();
        let previous = std::mem::replace(&mut *self.active.write(), constructor);
        info!(
            constructor = %name,
            previous = %previous.name(),
            "Activated policy constructor"
        );
        Ok(())
    }

    /// Replace the active constructor with one from the catalog
    ///
    /// # Errors
    ///
    /// Returns error if the name is unknown or the constructor is incomplete
    pub fn set_constructor_by_name(&self, name: &str) -> Result<(), CoreError> {
        let constructor = self.catalog.read().get(name).inspect_err(|err| {
            warn!(constructor = %name, error = %err, "Unknown policy constructor");
        })?;
        self.set_constructor(constructor)?;
        Ok(())
    }

    /// Snapshot of the active constructor
    #[must_use]
    pub fn active_constructor(&self) -> Arc<dyn PolicyConstructor> {
        Arc::clone(&self.active.read())
    }

    /// Name of the active constructor
    #[must_use]
    pub fn active_constructor_name(&self) -> String {
        self.active.read().name().to_string()
    }

    /// Names available to [`Self::set_constructor_by_name`]
    #[must_use]
    pub fn constructor_names(&self) -> Vec<String> {
        self.catalog.read().names()
    }

    /// Build a policy from a document stream
    ///
    /// # Errors
    ///
    /// Returns error if the document is invalid or not a Policy
    pub fn create_policy(
        &self,
        mut input: impl Read,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let constructor = self.active_constructor();
        traced(constructor.as_ref(), Some(ArtifactKind::Policy), || {
            constructor.construct(&mut input, ArtifactKind::Policy)
        })
    }

    /// Build a policy set from a document stream
    ///
    /// References in the set have no resolver and fail when evaluated.
    ///
    /// # Errors
    ///
    /// Returns error if the document is invalid or not a PolicySet
    pub fn create_policy_set(
        &self,
        mut input: impl Read,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let constructor = self.active_constructor();
        traced(constructor.as_ref(), Some(ArtifactKind::PolicySet), || {
            constructor.construct(&mut input, ArtifactKind::PolicySet)
        })
    }

    /// Build a policy set whose references resolve through `resolver`
    ///
    /// # Errors
    ///
    /// Returns error if the document is invalid or not a PolicySet
    pub fn create_policy_set_with_resolver(
        &self,
        mut input: impl Read,
        resolver: Arc<dyn PolicyResolver>,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let constructor = self.active_constructor();
        traced(constructor.as_ref(), Some(ArtifactKind::PolicySet), || {
            constructor.construct_with_resolver(&mut input, ArtifactKind::PolicySet, resolver)
        })
    }

    /// Build a policy or policy set, whichever the document's root holds
    ///
    /// # Errors
    ///
    /// Returns error if the document is invalid
    pub fn create(
        &self,
        mut input: impl Read,
        resolver: Arc<dyn PolicyResolver>,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let constructor = self.active_constructor();
        traced(constructor.as_ref(), None, || {
            constructor.construct_inferred(&mut input, resolver)
        })
    }

    /// Build a policy from an in-memory node graph
    ///
    /// The graph is marshalled and then constructed like any other document,
    /// so the result is identical to constructing the marshalled bytes.
    ///
    /// # Errors
    ///
    /// Returns error if marshalling or construction fails
    pub fn create_policy_from(
        &self,
        policy: &Policy,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let bytes = PolicyDocument::Policy(policy.clone()).marshal()?;
        self.create_policy(bytes.as_slice())
    }

    /// Build a policy set from an in-memory node graph
    ///
    /// # Errors
    ///
    /// Returns error if marshalling or construction fails
    pub fn create_policy_set_from(
        &self,
        set: &PolicySet,
    ) -> Result<Arc<dyn PolicyArtifact>, ConstructionError> {
        let bytes = PolicyDocument::PolicySet(set.clone()).marshal()?;
        self.create_policy_set(bytes.as_slice())
    }
}

impl Default for PolicyFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn traced<F>(
    constructor: &dyn PolicyConstructor,
    kind: Option<ArtifactKind>,
    construct: F,
) -> Result<Arc<dyn PolicyArtifact>, ConstructionError>
where
    F: FnOnce() -> Result<Arc<dyn PolicyArtifact>, ConstructionError>,
{
    let requested = kind.map_or("inferred", ArtifactKind::element_name);
    debug!(constructor = %constructor.name(), kind = requested, "Constructing policy artifact");
    match construct() {
        Ok(artifact) => {
            debug!(
                constructor = %constructor.name(),
                kind = %artifact.kind(),
                id = %artifact.id(),
                "Constructed policy artifact"
            );
            Ok(artifact)
        }
        Err(err) => {
            warn!(constructor = %constructor.name(), kind = requested, error = %err, "Policy construction failed");
            Err(err)
        }
    }
}
