//! Declarative YAML scenario suites

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::result::{ProbeError, ProbeResult};
use crate::settings::{FieldRef, NavigationTarget, ReloadStrategy, SaveControl};

/// Suite format version understood by this crate
pub const SUITE_VERSION: &str = "1.0";

/// Suite covering the advanced settings and mail notification screens
pub const BUILTIN_SUITE_YAML: &str = include_str!("../suites/admin-settings.yaml");

/// One settings round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name, used for filtering and reporting
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for grouping
    #[serde(default)]
    pub tags: Vec<String>,

    /// Screen hosting the field
    pub navigate: NavigationTarget,

    /// Field under test
    pub field: FieldRef,

    /// Save control of the screen
    pub save: SaveControl,

    /// How UI state is discarded before re-reading
    #[serde(default)]
    pub reload: ReloadStrategy,
}

impl Scenario {
    /// Configuration sections the scenario mutates
    #[must_use]
    pub fn sections(&self) -> Vec<String> {
        vec![self.field.path().section().to_string()]
    }

    /// Check the scenario is runnable
    ///
    /// # Errors
    ///
    /// Returns `InvalidScenario` describing the first problem found
    pub fn validate(&self) -> ProbeResult<()> {
        let invalid = |message: &str| ProbeError::InvalidScenario {
            name: self.name.clone(),
            message: message.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.navigate.path.trim().is_empty() {
            return Err(invalid("navigation path must not be empty"));
        }
        if self.navigate.tab.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(invalid("tab label must not be empty"));
        }
        if self.save.expression().trim().is_empty() {
            return Err(invalid("save control must not be empty"));
        }
        if let ReloadStrategy::Renavigate { via } = &self.reload {
            if via.trim().is_empty() || *via == self.navigate.path {
                return Err(invalid("renavigate must go via a different screen"));
            }
        }
        self.field.validate().map_err(|e| invalid(&e.to_string()))
    }
}

/// A versioned collection of scenarios
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSuite {
    /// Format version
    pub version: String,

    /// Suite name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Scenarios in execution order
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSuite {
    /// Parse and validate a suite from YAML
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed or the suite is invalid
    pub fn from_yaml(yaml: &str) -> ProbeResult<Self> {
        let suite: Self = serde_yaml_ng::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Load a suite from a file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: &Path) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// The built-in admin settings suite
    ///
    /// # Errors
    ///
    /// Returns error only if the embedded suite is malformed
    pub fn builtin() -> ProbeResult<Self> {
        Self::from_yaml(BUILTIN_SUITE_YAML)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check version, names and every scenario
    ///
    /// # Errors
    ///
    /// Returns `InvalidScenario` for the first problem found
    pub fn validate(&self) -> ProbeResult<()> {
        if self.version != SUITE_VERSION {
            return Err(ProbeError::InvalidScenario {
                name: self.name.clone(),
                message: format!(
                    "unsupported suite version '{}' (expected '{SUITE_VERSION}')",
                    self.version
                ),
            });
        }
        if self.scenarios.is_empty() {
            return Err(ProbeError::InvalidScenario {
                name: self.name.clone(),
                message: "suite has no scenarios".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !seen.insert(scenario.name.as_str()) {
                return Err(ProbeError::InvalidScenario {
                    name: scenario.name.clone(),
                    message: "duplicate scenario name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Scenarios whose name contains `pattern` (all when `None`)
    #[must_use]
    pub fn filter(&self, pattern: Option<&str>) -> Vec<&Scenario> {
        self.scenarios
            .iter()
            .filter(|s| pattern.map_or(true, |p| s.name.contains(p)))
            .collect()
    }

    /// Find a scenario by exact name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Number of scenarios
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the suite is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
