//! Factory configuration.
//!
//! Sources are layered: built-in defaults, then an optional JSON file, then
//! `XACML_FACTORY_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use xacml_core::ConfigurationError;

use crate::standard::STANDARD_CONSTRUCTOR;

const ENV_CONSTRUCTOR: &str = "XACML_FACTORY_CONSTRUCTOR";
const ENV_RESOLUTION: &str = "XACML_FACTORY_RESOLUTION";
const ENV_MAX_DOCUMENT_BYTES: &str = "XACML_FACTORY_MAX_DOCUMENT_BYTES";

/// Default upper bound on a policy document, 10 MiB
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// When policy references are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// On first evaluation of each reference
    #[default]
    Lazy,
    /// During construction
    Eager,
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lazy => write!(f, "lazy"),
            Self::Eager => write!(f, "eager"),
        }
    }
}

impl FromStr for ResolutionMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" => Ok(Self::Lazy),
            "eager" => Ok(Self::Eager),
            other => Err(invalid("resolution", format!("expected lazy or eager, got {other:?}"))),
        }
    }
}

/// Policy factory configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactoryConfig {
    /// Catalog name of the constructor to activate
    pub constructor: String,
    /// Reference resolution mode for the standard constructor
    pub resolution: ResolutionMode,
    /// Largest document the standard constructor accepts
    pub max_document_bytes: u64,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            constructor: STANDARD_CONSTRUCTOR.to_string(),
            resolution: ResolutionMode::default(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl FactoryConfig {
    /// Read a JSON configuration file; absent fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = fs::read_to_string(path)
            .map_err(|err| invalid("config file", format!("{}: {}", path.display(), err)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|err| invalid("config file", format!("{}: {}", path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then `path` if given, then the environment
    ///
    /// # Errors
    ///
    /// Returns error if any layer holds an invalid value
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let overrides = [ENV_CONSTRUCTOR, ENV_RESOLUTION, ENV_MAX_DOCUMENT_BYTES]
            .into_iter()
            .filter_map(|key| env::var(key).ok().map(|value| (key, value)));
        base.with_overrides(overrides)
    }

    /// Apply `XACML_FACTORY_*` overrides from `vars`; other keys are ignored
    ///
    /// # Errors
    ///
    /// Returns error if an override value is invalid
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                ENV_CONSTRUCTOR => self.constructor = value.trim().to_string(),
                ENV_RESOLUTION => self.resolution = value.parse()?,
                ENV_MAX_DOCUMENT_BYTES => {
                    self.max_document_bytes = value.trim().parse().map_err(|_| {
                        invalid(
                            "max_document_bytes",
                            format!("expected a byte count, got {value:?}"),
                        )
                    })?;
                }
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Check field values
    ///
    /// # Errors
    ///
    /// Returns error if the constructor name is empty or the size limit is zero
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.constructor.trim().is_empty() {
            return Err(invalid("constructor", "must not be empty".to_string()));
        }
        if self.max_document_bytes == 0 {
            return Err(invalid("max_document_bytes", "must be positive".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ConfigurationError {
    ConfigurationError::Invalid {
        field: field.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = FactoryConfig::default();
        assert_eq!(config.constructor, "standard");
        assert_eq!(config.resolution, ResolutionMode::Lazy);
        assert_eq!(config.max_document_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"resolution":"eager"}}"#).unwrap();

        let config = FactoryConfig::from_file(file.path()).unwrap();
        assert_eq!(config.resolution, ResolutionMode::Eager);
        assert_eq!(config.constructor, "standard");
    }

    #[test]
    fn test_from_file_rejects_unknown_field() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"constructer":"x"}}"#).unwrap();

        let err = FactoryConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid { .. }));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = FactoryConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid { field, .. } if field == "config file"));
    }

    #[test]
    fn test_overrides() {
        let config = FactoryConfig::default()
            .with_overrides([
                ("XACML_FACTORY_CONSTRUCTOR", "custom"),
                ("XACML_FACTORY_RESOLUTION", "Eager"),
                ("XACML_FACTORY_MAX_DOCUMENT_BYTES", "2048"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.constructor, "custom");
        assert_eq!(config.resolution, ResolutionMode::Eager);
        assert_eq!(config.max_document_bytes, 2048);
    }

    #[test]
    fn test_invalid_overrides() {
        let err = FactoryConfig::default()
            .with_overrides([("XACML_FACTORY_RESOLUTION", "sometimes")])
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid { field, .. } if field == "resolution"));

        let err = FactoryConfig::default()
            .with_overrides([("XACML_FACTORY_MAX_DOCUMENT_BYTES", "0")])
            .unwrap_err();
        assert!(
            matches!(err, ConfigurationError::Invalid { field, .. } if field == "max_document_bytes")
        );
    }
}
