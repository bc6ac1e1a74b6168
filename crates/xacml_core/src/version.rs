//! Policy version numbers and version-match patterns.
//!
//! A version is a dot-separated list of non-negative integers (`1.0`,
//! `2.3.1`). A match pattern may use `*` for any single component and a
//! trailing `+` for any remaining components, including none.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version of a policy or policy set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyVersion {
    components: Vec<u64>,
}

impl PolicyVersion {
    /// Create a version from components
    ///
    /// # Errors
    ///
    /// Returns error if `components` is empty
    pub fn new(components: Vec<u64>) -> Result<Self, VersionError> {
        if components.is_empty() {
            return Err(VersionError::InvalidFormat(String::new()));
        }
        Ok(Self { components })
    }

    /// Parse from string
    ///
    /// # Errors
    ///
    /// Returns error if format is invalid
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.is_empty() {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }

        let components = s
            .split('.')
            .map(parse_component)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    /// Get the numeric components
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl Default for PolicyVersion {
    fn default() -> Self {
        Self {
            components: vec![1, 0],
        }
    }
}

impl fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.components {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for PolicyVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A component is one or more ASCII digits; signs and whitespace are rejected
fn parse_component(part: &str) -> Result<u64, VersionError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidComponent(part.to_string()));
    }
    part.parse()
        .map_err(|_| VersionError::InvalidComponent(part.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum MatchPart {
    Exact(u64),
    AnyOne,
    AnyRest,
}

/// Pattern selecting a set of versions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionMatch {
    source: String,
    parts: Vec<MatchPart>,
}

impl VersionMatch {
    /// Parse a pattern such as `1.*.+`
    ///
    /// # Errors
    ///
    /// Returns error if a component is not a number, `*` or a trailing `+`
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.is_empty() {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }

        let raw: Vec<&str> = s.split('.').collect();
        let mut parts = Vec::with_capacity(raw.len());
        for (i, part) in raw.iter().enumerate() {
            let parsed = match *part {
                "*" => MatchPart::AnyOne,
                "+" if i + 1 == raw.len() => MatchPart::AnyRest,
                "+" => return Err(VersionError::MisplacedWildcard(s.to_string())),
                other => MatchPart::Exact(parse_component(other)?),
            };
            parts.push(parsed);
        }

        Ok(Self {
            source: s.to_string(),
            parts,
        })
    }

    /// Pattern matching exactly one version
    #[must_use]
    pub fn exact(version: &PolicyVersion) -> Self {
        Self {
            source: version.to_string(),
            parts: version.components.iter().map(|c| MatchPart::Exact(*c)).collect(),
        }
    }

    /// Check whether `version` is selected by this pattern
    #[must_use]
    pub fn matches(&self, version: &PolicyVersion) -> bool {
        let comps = version.components();
        for (i, part) in self.parts.iter().enumerate() {
            match part {
                MatchPart::AnyRest => return true,
                MatchPart::AnyOne => {
                    if i >= comps.len() {
                        return false;
                    }
                }
                MatchPart::Exact(n) => {
                    if comps.get(i) != Some(n) {
                        return false;
                    }
                }
            }
        }
        comps.len() == self.parts.len()
    }

    /// The pattern as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for VersionMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for VersionMatch {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Version-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// Invalid format
    #[error("Invalid version format: {0:?}")]
    InvalidFormat(String),
    /// Invalid component
    #[error("Invalid version component: {0}")]
    InvalidComponent(String),
    /// `+` used anywhere but the last component
    #[error("Wildcard '+' must be the last component: {0}")]
    MisplacedWildcard(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_version_parse() {
        let v = PolicyVersion::parse("2.3.1").unwrap();
        assert_eq!(v.components(), &[2, 3, 1]);
    }

    #[test]
    fn test_version_display() {
        let v = PolicyVersion::parse("1.0").unwrap();
        assert_eq!(format!("{}", v), "1.0");
    }

    #[test]
    fn test_version_ord() {
        let v1 = PolicyVersion::parse("1.2").unwrap();
        let v2 = PolicyVersion::parse("1.10").unwrap();
        let v3 = PolicyVersion::parse("2.0").unwrap();

        assert!(v1 < v2);
        assert!(v2 < v3);
    }

    #[test]
    fn test_version_parse_error() {
        assert!(matches!(PolicyVersion::parse(""), Err(VersionError::InvalidFormat(_))));
        assert!(matches!(
            PolicyVersion::parse("1.a"),
            Err(VersionError::InvalidComponent(_))
        ));
        assert!(PolicyVersion::new(vec![]).is_err());
    }

    #[test]
    fn test_version_default() {
        assert_eq!(PolicyVersion::default().to_string(), "1.0");
    }

    #[test]
    fn test_match_exact() {
        let m = VersionMatch::parse("1.0").unwrap();
        assert!(m.matches(&PolicyVersion::parse("1.0").unwrap()));
        assert!(!m.matches(&PolicyVersion::parse("1.0.1").unwrap()));
        assert!(!m.matches(&PolicyVersion::parse("1").unwrap()));
    }

    #[test]
    fn test_match_any_one() {
        let m = VersionMatch::parse("1.*").unwrap();
        assert!(m.matches(&PolicyVersion::parse("1.7").unwrap()));
        assert!(!m.matches(&PolicyVersion::parse("1").unwrap()));
        assert!(!m.matches(&PolicyVersion::parse("1.7.2").unwrap()));
    }

    #[test]
    fn test_match_any_rest() {
        let m = VersionMatch::parse("2.+").unwrap();
        assert!(m.matches(&PolicyVersion::parse("2").unwrap()));
        assert!(m.matches(&PolicyVersion::parse("2.4.1").unwrap()));
        assert!(!m.matches(&PolicyVersion::parse("3.0").unwrap()));
    }

    #[test]
    fn test_match_misplaced_plus() {
        assert!(matches!(
            VersionMatch::parse("1.+.2"),
            Err(VersionError::MisplacedWildcard(_))
        ));
    }

    #[test]
    fn test_signed_components_rejected() {
        assert!(matches!(
            PolicyVersion::parse("+1.0"),
            Err(VersionError::InvalidComponent(_))
        ));
        assert!(PolicyVersion::parse("1.-0").is_err());
        assert!(PolicyVersion::parse("1..0").is_err());
        assert!(matches!(
            VersionMatch::parse("+2"),
            Err(VersionError::InvalidComponent(_))
        ));
        assert!(VersionMatch::parse("1.+3").is_err());
    }

    proptest! {
        #[test]
        fn prop_exact_match_selects_itself(comps in proptest::collection::vec(0u64..1000, 1..5)) {
            let v = PolicyVersion::new(comps).unwrap();
            prop_assert!(VersionMatch::exact(&v).matches(&v));
            let reparsed = PolicyVersion::parse(&v.to_string()).unwrap();
            prop_assert_eq!(reparsed, v);
        }
    }
}
