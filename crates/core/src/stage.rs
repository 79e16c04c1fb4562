//! Deployment stage names
//!
//! A stage is a named deployment target (`test`, `prod`, ...) with its own
//! resource namespace. The same [`StageSet`] is handed to the build role and
//! to every build project so the granted permissions always cover the stages
//! that are actually deployed.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::LazyLock;

static STAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-z][a-z0-9-]{0,31}$").unwrap()
});

/// A validated stage name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StageName(String);

impl StageName {
    /// Validate and wrap a stage name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStageName`] unless the name matches
    /// `^[a-z][a-z0-9-]{0,31}$`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if STAGE_NAME.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::InvalidStageName { name })
        }
    }

    /// The pre-production stage, `test`
    #[must_use]
    pub fn test() -> Self {
        Self("test".to_string())
    }

    /// The production stage, `prod`
    #[must_use]
    pub fn prod() -> Self {
        Self("prod".to_string())
    }

    /// The stage name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for StageName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for StageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Ordered, non-empty, duplicate-free set of stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StageSet(Vec<StageName>);

impl StageSet {
    /// Build a stage set from raw names, preserving their order.
    ///
    /// # Errors
    ///
    /// Fails on an empty list, an invalid name or a repeated name.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stages: Vec<StageName> = Vec::new();
        for name in names {
            let stage = StageName::new(name)?;
            if stages.contains(&stage) {
                return Err(Error::DuplicateStage { name: stage.0 });
            }
            stages.push(stage);
        }
        if stages.is_empty() {
            return Err(Error::EmptyStageSet);
        }
        Ok(Self(stages))
    }

    /// Whether the stage is part of this set
    #[must_use]
    pub fn contains(&self, stage: &StageName) -> bool {
        self.0.contains(stage)
    }

    /// Fails with [`Error::UncoveredStage`] when `stage` is not in the set.
    ///
    /// # Errors
    ///
    /// Returns `UncoveredStage` naming the covered stages.
    pub fn ensure_covers(&self, stage: &StageName) -> Result<()> {
        if self.contains(stage) {
            return Ok(());
        }
        Err(Error::UncoveredStage {
            stage: stage.to_string(),
            covered: self
                .iter()
                .map(StageName::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Iterate the stages in configured order
    pub fn iter(&self) -> impl Iterator<Item = &StageName> {
        self.0.iter()
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no stages; a constructed set holds at least one
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StageSet {
    fn default() -> Self {
        Self(vec![StageName::test(), StageName::prod()])
    }
}

impl<'a> IntoIterator for &'a StageSet {
    type Item = &'a StageName;
    type IntoIter = std::slice::Iter<'a, StageName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for StageSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_stage_names() {
        for name in ["test", "prod", "dev2", "feature-x"] {
            assert_eq!(StageName::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_invalid_stage_names() {
        let long = "a".repeat(33);
        for name in ["", "Prod", "1test", "te st", "-prod", "test_1", long.as_str()] {
            assert!(
                matches!(StageName::new(name), Err(Error::InvalidStageName { .. })),
                "expected '{name}' to be rejected"
            );
        }
    }

    #[test]
    fn test_stage_set_preserves_order() {
        let set = StageSet::new(["prod", "test"]).unwrap();
        let names: Vec<_> = set.iter().map(StageName::as_str).collect();
        assert_eq!(names, vec!["prod", "test"]);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_stage_set_rejects_empty_and_duplicates() {
        assert!(matches!(
            StageSet::new(Vec::<String>::new()),
            Err(Error::EmptyStageSet)
        ));
        assert!(matches!(
            StageSet::new(["test", "test"]),
            Err(Error::DuplicateStage { .. })
        ));
    }

    #[test]
    fn test_default_stage_set() {
        let set = StageSet::default();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&StageName::new("test").unwrap()));
        assert!(set.contains(&StageName::new("prod").unwrap()));
    }

    #[test]
    fn test_ensure_covers() {
        let set = StageSet::new(["test"]).unwrap();
        assert!(set.ensure_covers(&StageName::new("test").unwrap()).is_ok());
        let err = set
            .ensure_covers(&StageName::new("prod").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("only covers [test]"));
    }

    #[test]
    fn test_deserialize_validates() {
        let set: StageSet = serde_json::from_str(r#"["test","prod"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(serde_json::from_str::<StageSet>(r#"["Test"]"#).is_err());
        assert!(serde_json::from_str::<StageSet>("[]").is_err());
    }
}
