//! Field references and navigation targets.
//!
//! A [`FieldRef`] names one editable control by its model path and carries the
//! three values a round trip needs: what the screen should show before the
//! edit, what gets typed or toggled, and what the screen should show after a
//! reload. The last two are the same value; construction enforces that.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::locator::Locator;
use crate::result::{ProbeError, ProbeResult};

// =============================================================================
// MODEL PATH
// =============================================================================

/// Dotted model binding of a form field, e.g. `admin.node.maximum_textsize`.
///
/// The second segment names the configuration section (the REST resource
/// the attribute lives in); the remainder is the attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelPath {
    raw: String,
    section_end: usize,
}

impl ModelPath {
    /// Parse a model path
    ///
    /// # Errors
    ///
    /// Returns error if the path has fewer than three segments or an empty one
    pub fn parse(raw: &str) -> ProbeResult<Self> {
        let invalid = |message: &str| ProbeError::InvalidModelPath {
            path: raw.to_string(),
            message: message.to_string(),
        };

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() < 3 {
            return Err(invalid("expected <scope>.<section>.<attribute>"));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty segment"));
        }
        if let Some(bad) = segments
            .iter()
            .find(|s| !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(invalid(&format!("segment '{bad}' is not an identifier")));
        }

        let section_end = segments[0].len() + 1 + segments[1].len();
        Ok(Self {
            raw: raw.to_string(),
            section_end,
        })
    }

    /// Full dotted path
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Scope segment (`admin`)
    #[must_use]
    pub fn scope(&self) -> &str {
        self.raw.split('.').next().unwrap_or_default()
    }

    /// Section segment (`node`, `notification`)
    #[must_use]
    pub fn section(&self) -> &str {
        let scope_len = self.scope().len();
        &self.raw[scope_len + 1..self.section_end]
    }

    /// Attribute within the section (`maximum_textsize`)
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.raw[self.section_end + 1..]
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ModelPath {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModelPath {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelPath> for String {
    fn from(path: ModelPath) -> Self {
        path.raw
    }
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// How a field displays its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Text or number input, read through its `value`
    #[default]
    Text,
    /// Checkbox, read through its selection state
    Checkbox,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Checkbox => f.write_str("checkbox"),
        }
    }
}

/// A displayed field value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawValue", into = "RawValue")]
pub enum FieldValue {
    /// Text shown in an input
    Text(String),
    /// Whether a checkbox is selected
    Checked(bool),
}

/// YAML-friendly value representation; unquoted numbers are accepted as text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl TryFrom<RawValue> for FieldValue {
    type Error = String;

    fn try_from(raw: RawValue) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawValue::Bool(b) => Self::Checked(b),
            RawValue::Int(i) => Self::Text(i.to_string()),
            RawValue::Float(f) if f.is_finite() => Self::Text(f.to_string()),
            RawValue::Float(f) => return Err(format!("non-finite value {f}")),
            RawValue::Str(s) => Self::Text(s),
        })
    }
}

impl From<FieldValue> for RawValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => Self::Str(s),
            FieldValue::Checked(b) => Self::Bool(b),
        }
    }
}

impl FieldValue {
    /// Create a text value
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Kind of field that can display this value
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Checked(_) => FieldKind::Checkbox,
        }
    }

    /// Render a configuration value the way a form control of `kind` shows it
    #[must_use]
    pub fn from_json(kind: FieldKind, value: &serde_json::Value) -> Self {
        match kind {
            FieldKind::Checkbox => Self::Checked(value.as_bool().unwrap_or(false)),
            FieldKind::Text => Self::Text(match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Checked(true) => f.write_str("selected"),
            Self::Checked(false) => f.write_str("unselected"),
        }
    }
}

// =============================================================================
// FIELD REFERENCE
// =============================================================================

/// One editable control and the values a round trip checks on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FieldRefDef", into = "FieldRefDef")]
pub struct FieldRef {
    path: ModelPath,
    kind: FieldKind,
    expected_before: FieldValue,
    input_after: FieldValue,
    expected_after: FieldValue,
}

impl FieldRef {
    /// Create a field reference; the expected-after value is the input itself
    ///
    /// # Errors
    ///
    /// Returns error if the values do not fit `kind` or the edit leaves the value unchanged
    pub fn new(
        path: ModelPath,
        kind: FieldKind,
        before: FieldValue,
        after: FieldValue,
    ) -> ProbeResult<Self> {
        let field = Self {
            path,
            kind,
            expected_before: before,
            expected_after: after.clone(),
            input_after: after,
        };
        field.validate()?;
        Ok(field)
    }

    /// A text field edited from `before` to `after`
    #[must_use]
    pub fn text(path: ModelPath, before: impl Into<String>, after: impl Into<String>) -> Self {
        let after = FieldValue::Text(after.into());
        Self {
            path,
            kind: FieldKind::Text,
            expected_before: FieldValue::Text(before.into()),
            expected_after: after.clone(),
            input_after: after,
        }
    }

    /// A checkbox toggled once from `before`
    #[must_use]
    pub fn checkbox(path: ModelPath, before: bool) -> Self {
        Self {
            path,
            kind: FieldKind::Checkbox,
            expected_before: FieldValue::Checked(before),
            input_after: FieldValue::Checked(!before),
            expected_after: FieldValue::Checked(!before),
        }
    }

    /// Check the value/kind agreement and the round-trip invariant
    ///
    /// # Errors
    ///
    /// Returns error if a value does not fit the field kind, the expected-after
    /// value differs from the input, or the edit leaves the value unchanged
    pub fn validate(&self) -> ProbeResult<()> {
        let invalid = |message: String| ProbeError::InvalidScenario {
            name: self.path.to_string(),
            message,
        };

        for (label, value) in [
            ("before", &self.expected_before),
            ("after", &self.input_after),
            ("expected after", &self.expected_after),
        ] {
            if value.kind() != self.kind {
                return Err(invalid(format!(
                    "{label} value {value} does not fit a {} field",
                    self.kind
                )));
            }
        }
        if self.expected_after != self.input_after {
            return Err(invalid(format!(
                "expected after-reload value {} must equal the input {}",
                self.expected_after, self.input_after
            )));
        }
        if self.expected_before == self.input_after {
            return Err(invalid(match self.kind {
                FieldKind::Checkbox => "a checkbox edit must toggle the value".to_string(),
                FieldKind::Text => format!(
                    "the edit must change the value; {} is already the initial value",
                    self.input_after
                ),
            }));
        }
        Ok(())
    }

    /// Model path of the field
    #[must_use]
    pub const fn path(&self) -> &ModelPath {
        &self.path
    }

    /// Kind of control
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Value expected before editing
    #[must_use]
    pub const fn expected_before(&self) -> &FieldValue {
        &self.expected_before
    }

    /// Value injected by the edit
    #[must_use]
    pub const fn input_after(&self) -> &FieldValue {
        &self.input_after
    }

    /// Value expected after persisting and reloading
    #[must_use]
    pub const fn expected_after(&self) -> &FieldValue {
        &self.expected_after
    }

    /// Locator for the control
    #[must_use]
    pub fn locator(&self) -> Locator {
        Locator::model(self.path.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldRefDef {
    model: ModelPath,
    #[serde(default)]
    kind: FieldKind,
    before: FieldValue,
    after: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expect_after: Option<FieldValue>,
}

impl TryFrom<FieldRefDef> for FieldRef {
    type Error = ProbeError;

    fn try_from(def: FieldRefDef) -> Result<Self, Self::Error> {
        let field = Self {
            path: def.model,
            kind: def.kind,
            expected_before: def.before,
            expected_after: def.expect_after.unwrap_or_else(|| def.after.clone()),
            input_after: def.after,
        };
        field.validate()?;
        Ok(field)
    }
}

impl From<FieldRef> for FieldRefDef {
    fn from(field: FieldRef) -> Self {
        Self {
            model: field.path,
            kind: field.kind,
            before: field.expected_before,
            after: field.input_after,
            expect_after: None,
        }
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Admin screen (and optional tab) hosting a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTarget {
    /// Route of the screen, e.g. `admin/advanced_settings`
    pub path: String,
    /// Label of the tab to click through to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
}

impl NavigationTarget {
    /// Target a screen without a tab
    #[must_use]
    pub fn screen(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tab: None,
        }
    }

    /// Click through to a tab on the screen
    #[must_use]
    pub fn with_tab(mut self, label: impl Into<String>) -> Self {
        self.tab = Some(label.into());
        self
    }

    /// Locator of the tab header
    #[must_use]
    pub fn tab_locator(&self) -> Option<Locator> {
        self.tab.as_deref().map(Locator::link_text)
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tab {
            Some(tab) => write!(f, "{} > {tab}", self.path),
            None => f.write_str(&self.path),
        }
    }
}

/// Persist control of a screen, identified by its `data-ng-click` expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaveControl(String);

impl SaveControl {
    /// Create a save control from its click expression
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// The click expression, e.g. `updateNode(admin.node)`
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.0
    }

    /// Locator of the button
    #[must_use]
    pub fn locator(&self) -> Locator {
        Locator::ng_click(&self.0)
    }
}

/// How to discard in-memory UI state after persisting
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadStrategy {
    /// Reload the whole page, as a user refresh would
    #[default]
    FullReload,
    /// Visit another screen and come back
    Renavigate {
        /// Screen visited in between
        via: String,
    },
}
