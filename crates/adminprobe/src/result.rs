//! Result and error types for adminprobe.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for adminprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Which assertion of a round trip a mismatch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Value displayed before the field was edited
    BeforeEdit,
    /// Value displayed after persisting and reloading
    AfterReload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeEdit => write!(f, "pre-edit"),
            Self::AfterReload => write!(f, "post-reload"),
        }
    }
}

/// Coarse failure taxonomy used in reports.
///
/// Locator, assertion and timeout failures terminate a scenario the same way;
/// the category only tells the operator where to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// A field or control was never found on the page
    Locator,
    /// A displayed value did not match the expected one
    Assertion,
    /// A persist or navigation did not complete in time
    Timeout,
    /// Browser, store, scenario or I/O problems
    Environment,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Locator => "locator",
            Self::Assertion => "assertion",
            Self::Timeout => "timeout",
            Self::Environment => "environment",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while verifying settings
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL or route that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Script evaluation inside the page failed
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// A locator never resolved to an element
    #[error("Locator {locator} did not resolve within {timeout_ms}ms")]
    LocatorNotFound {
        /// Human-readable locator
        locator: String,
        /// How long the lookup waited
        timeout_ms: u64,
    },

    /// A displayed value did not match
    #[error("{phase} assertion failed for {field}: expected {expected}, got {actual}")]
    AssertionMismatch {
        /// Model path of the field
        field: String,
        /// Which assertion failed
        phase: Phase,
        /// Expected displayed value
        expected: String,
        /// Actual displayed value
        actual: String,
    },

    /// An action did not complete in time
    #[error("{action} did not complete within {ms}ms")]
    Timeout {
        /// Action that timed out
        action: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Configuration store error
    #[error("Configuration store error: {message}")]
    Store {
        /// Error message
        message: String,
    },

    /// Fixture error (snapshot/restore failed)
    #[error("Fixture error: {message}")]
    Fixture {
        /// Error message
        message: String,
    },

    /// Scenario definition is invalid
    #[error("Invalid scenario '{name}': {message}")]
    InvalidScenario {
        /// Scenario name
        name: String,
        /// Error message
        message: String,
    },

    /// Model path could not be parsed
    #[error("Invalid model path '{path}': {message}")]
    InvalidModelPath {
        /// Offending path
        path: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Map this error onto the reporting taxonomy
    #[must_use]
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::LocatorNotFound { .. } => FailureCategory::Locator,
            Self::AssertionMismatch { .. } => FailureCategory::Assertion,
            Self::Timeout { .. } => FailureCategory::Timeout,
            _ => FailureCategory::Environment,
        }
    }

    /// Create a store error
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }
}
