//! Suite reporting: text summary, JSON and JUnit XML.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::result::{FailureCategory, ProbeError, ProbeResult};
use crate::settings::FieldValue;
use crate::verifier::{RoundTripReport, StepRecord};

/// Scenario outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Round trip verified
    Passed,
    /// A step failed
    Failed,
    /// Not run (fail-fast)
    Skipped,
}

impl OutcomeStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Scenario name
    pub name: String,
    /// Outcome status
    pub status: OutcomeStatus,
    /// Duration of the scenario, fixture included
    pub duration: Duration,
    /// Error message if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure taxonomy if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
    /// Value displayed before the edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_before: Option<FieldValue>,
    /// Value displayed after the reload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_after: Option<FieldValue>,
    /// Completed steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
}

impl ScenarioOutcome {
    /// Create a passing outcome from a verified round trip
    #[must_use]
    pub fn passed(report: RoundTripReport, duration: Duration) -> Self {
        Self {
            name: report.scenario,
            status: OutcomeStatus::Passed,
            duration,
            error: None,
            category: None,
            observed_before: Some(report.observed_before),
            observed_after: Some(report.observed_after),
            steps: report.steps,
        }
    }

    /// Create a failing outcome
    #[must_use]
    pub fn failed(name: impl Into<String>, duration: Duration, error: &ProbeError) -> Self {
        Self {
            name: name.into(),
            status: OutcomeStatus::Failed,
            duration,
            error: Some(error.to_string()),
            category: Some(error.category()),
            observed_before: None,
            observed_after: None,
            steps: Vec::new(),
        }
    }

    /// Create a skipped outcome
    #[must_use]
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: OutcomeStatus::Skipped,
            duration: Duration::ZERO,
            error: None,
            category: None,
            observed_before: None,
            observed_after: None,
            steps: Vec::new(),
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
    /// JUnit XML for CI
    Junit,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
            Self::Junit => f.write_str("junit"),
        }
    }
}

/// Outcomes of one suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Suite name
    pub suite: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run
    pub duration: Duration,
    /// Outcomes in execution order
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// Start an empty report
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite: suite.into(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            outcomes: Vec::new(),
        }
    }

    /// Record an outcome
    pub fn record(&mut self, outcome: ScenarioOutcome) {
        self.outcomes.push(outcome);
    }

    /// Number of passed scenarios
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(OutcomeStatus::Passed)
    }

    /// Number of failed scenarios
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    /// Number of skipped scenarios
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(OutcomeStatus::Skipped)
    }

    /// Number of recorded scenarios
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether every recorded scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_passed())
    }

    /// Failed outcomes
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_failed())
            .collect()
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} skipped ({:.2}s)",
            self.suite,
            self.passed(),
            self.failed(),
            self.skipped(),
            self.duration.as_secs_f64()
        )
    }

    /// Render in the given format
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails
    pub fn render(&self, format: ReportFormat) -> ProbeResult<String> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => self.render_json(),
            ReportFormat::Junit => Ok(self.render_junit()),
        }
    }

    /// Render and write to a file
    ///
    /// # Errors
    ///
    /// Returns error if rendering or file writing fails
    pub fn write_to(&self, format: ReportFormat, output_path: &Path) -> ProbeResult<()> {
        let content = self.render(format)?;
        std::fs::write(output_path, content)?;
        Ok(())
    }

    /// Render plain text
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let mark = match outcome.status {
                OutcomeStatus::Passed => "PASS",
                OutcomeStatus::Failed => "FAIL",
                OutcomeStatus::Skipped => "SKIP",
            };
            out.push_str(&format!(
                "{mark} {} ({}ms)\n",
                outcome.name,
                outcome.duration.as_millis()
            ));
            if let (Some(before), Some(after)) = (&outcome.observed_before, &outcome.observed_after) {
                out.push_str(&format!("     {before} -> {after}\n"));
            }
            if let Some(error) = &outcome.error {
                match outcome.category {
                    Some(category) => out.push_str(&format!("     [{category}] {error}\n")),
                    None => out.push_str(&format!("     {error}\n")),
                }
            }
        }
        out.push_str(&self.summary());
        out.push('\n');
        out
    }

    /// Render pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn render_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render JUnit XML content
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}" timestamp="{}">"#,
            escape_xml(&self.suite),
            self.total(),
            self.failed(),
            self.skipped(),
            self.duration.as_secs_f64(),
            self.started_at.format("%Y-%m-%dT%H:%M:%S")
        ));
        xml.push('\n');

        for outcome in &self.outcomes {
            xml.push_str(&format!(
                r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
                escape_xml(&outcome.name),
                escape_xml(&self.suite),
                outcome.duration.as_secs_f64()
            ));
            xml.push('\n');

            match outcome.status {
                OutcomeStatus::Failed => {
                    let error = outcome.error.as_deref().unwrap_or_default();
                    let category = outcome
                        .category
                        .map_or_else(String::new, |c| c.to_string());
                    xml.push_str(&format!(
                        r#"    <failure type="{}" message="{}">{}</failure>"#,
                        escape_xml(&category),
                        escape_xml(error),
                        escape_xml(error)
                    ));
                    xml.push('\n');
                }
                OutcomeStatus::Skipped => xml.push_str("    <skipped/>\n"),
                OutcomeStatus::Passed => {}
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::Phase;
    use crate::verifier::Step;

    fn passing() -> ScenarioOutcome {
        ScenarioOutcome::passed(
            RoundTripReport {
                scenario: "advanced.main_configuration".to_string(),
                steps: vec![StepRecord {
                    step: Step::Navigate,
                    elapsed: Duration::from_millis(3),
                }],
                observed_before: FieldValue::text("4096"),
                observed_after: FieldValue::text("1337"),
                duration: Duration::from_millis(12),
            },
            Duration::from_millis(15),
        )
    }

    fn failing() -> ScenarioOutcome {
        ScenarioOutcome::failed(
            "mail.notification",
            Duration::from_millis(20),
            &ProbeError::AssertionMismatch {
                field: "admin.notification.tip_expiration_threshold".to_string(),
                phase: Phase::AfterReload,
                expected: "\"24\"".to_string(),
                actual: "\"72\"".to_string(),
            },
        )
    }

    fn report() -> SuiteReport {
        let mut report = SuiteReport::new("admin-settings");
        report.record(passing());
        report.record(failing());
        report.record(ScenarioOutcome::skipped("advanced.https_settings"));
        report
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_passed_outcome_keeps_observations() {
            let outcome = passing();
            assert!(outcome.status.is_passed());
            assert_eq!(outcome.observed_after, Some(FieldValue::text("1337")));
            assert_eq!(outcome.steps.len(), 1);
        }

        #[test]
        fn test_failed_outcome_categorised() {
            let outcome = failing();
            assert!(outcome.status.is_failed());
            assert_eq!(outcome.category, Some(FailureCategory::Assertion));
            assert!(outcome.error.unwrap().starts_with("post-reload"));
        }

        #[test]
        fn test_skipped_outcome() {
            let outcome = ScenarioOutcome::skipped("x");
            assert_eq!(outcome.status, OutcomeStatus::Skipped);
            assert_eq!(outcome.duration, Duration::ZERO);
        }
    }

    mod suite_report_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let report = report();
            assert_eq!(report.passed(), 1);
            assert_eq!(report.failed(), 1);
            assert_eq!(report.skipped(), 1);
            assert_eq!(report.total(), 3);
            assert!(!report.all_passed());
            assert_eq!(report.failures()[0].name, "mail.notification");
        }

        #[test]
        fn test_empty_report_passes() {
            assert!(SuiteReport::new("empty").all_passed());
        }

        #[test]
        fn test_text_render() {
            let text = report().render_text();
            assert!(text.contains("PASS advanced.main_configuration"));
            assert!(text.contains("\"4096\" -> \"1337\""));
            assert!(text.contains("FAIL mail.notification"));
            assert!(text.contains("[assertion] post-reload assertion failed"));
            assert!(text.contains("SKIP advanced.https_settings"));
            assert!(text.contains("1 passed, 1 failed, 1 skipped"));
        }

        #[test]
        fn test_json_render_roundtrips() {
            let report = report();
            let json = report.render(ReportFormat::Json).unwrap();
            let back: SuiteReport = serde_json::from_str(&json).unwrap();
            assert_eq!(back, report);
            assert!(json.contains("\"status\": \"skipped\""));
        }

        #[test]
        fn test_junit_render() {
            let xml = report().render_junit();
            assert!(xml.starts_with("<?xml"));
            assert!(xml.contains(r#"tests="3" failures="1" skipped="1""#));
            assert!(xml.contains(r#"<failure type="assertion""#));
            assert!(xml.contains("&quot;24&quot;"));
            assert!(xml.contains("<skipped/>"));
            assert!(xml.trim_end().ends_with("</testsuite>"));
        }

        #[test]
        fn test_write_to_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("report.xml");
            report().write_to(ReportFormat::Junit, &path).unwrap();
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains("<testsuite name=\"admin-settings\""));
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_format_display() {
            assert_eq!(ReportFormat::default(), ReportFormat::Text);
            assert_eq!(ReportFormat::Json.to_string(), "json");
            assert_eq!(ReportFormat::Junit.to_string(), "junit");
        }

        #[test]
        fn test_escape_xml() {
            assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
        }
    }
}
