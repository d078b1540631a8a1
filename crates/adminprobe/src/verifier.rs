//! Settings round-trip verification.
//!
//! A round trip proves that a configuration field persists across a session
//! boundary: open the screen, check the displayed value, change it, save,
//! throw the UI state away, and check the screen now shows the new value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::driver::{AdminDriver, AdminSession};
use crate::result::{Phase, ProbeError, ProbeResult};
use crate::scenario::Scenario;
use crate::settings::{FieldRef, FieldValue};
use crate::wait::{WaitOptions, DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};

/// One step of a round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Go to the screen hosting the field
    Navigate,
    /// Click through to the field's tab
    OpenTab,
    /// Check the initial displayed value
    AssertBefore,
    /// Change the displayed value
    Mutate,
    /// Click save and wait for it to settle
    Persist,
    /// Discard UI state
    Reload,
    /// Check the displayed value after reloading
    AssertAfter,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigate => "navigate",
            Self::OpenTab => "open tab",
            Self::AssertBefore => "assert before",
            Self::Mutate => "mutate",
            Self::Persist => "persist",
            Self::Reload => "reload",
            Self::AssertAfter => "assert after",
        };
        f.write_str(name)
    }
}

/// A completed step and how long it took
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// The step
    pub step: Step,
    /// Time spent
    pub elapsed: Duration,
}

/// Successful round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTripReport {
    /// Scenario name
    pub scenario: String,
    /// Completed steps, in order
    pub steps: Vec<StepRecord>,
    /// Value displayed before the edit
    pub observed_before: FieldValue,
    /// Value displayed after the reload
    pub observed_after: FieldValue,
    /// Total time
    pub duration: Duration,
}

/// Verifier configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Timeout for element lookups and persists
    pub action_timeout: Duration,
    /// Polling interval
    pub poll_interval: Duration,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_millis(DEFAULT_ACTION_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl VerifierOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the action timeout
    #[must_use]
    pub const fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn wait_options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(u64::try_from(self.action_timeout.as_millis()).unwrap_or(u64::MAX))
            .with_poll_interval(u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Runs settings round trips against an [`AdminDriver`]
#[derive(Debug, Clone, Default)]
pub struct RoundTripVerifier {
    options: VerifierOptions,
}

impl RoundTripVerifier {
    /// Create a verifier
    #[must_use]
    pub const fn new(options: VerifierOptions) -> Self {
        Self { options }
    }

    /// Verifier options
    #[must_use]
    pub const fn options(&self) -> &VerifierOptions {
        &self.options
    }

    /// Run one round trip.
    ///
    /// The first failing step ends the scenario; nothing is retried.
    ///
    /// # Errors
    ///
    /// - `LocatorNotFound` if the tab, field or save control never appears
    /// - `AssertionMismatch` if the before or after value is wrong
    /// - `Timeout` if the save never settles
    pub async fn verify<D: AdminDriver + ?Sized>(
        &self,
        driver: &mut D,
        scenario: &Scenario,
    ) -> ProbeResult<RoundTripReport> {
        let started = Instant::now();
        let mut steps = Vec::with_capacity(7);
        let mut session = AdminSession::new(driver, self.options.wait_options());
        let target = &scenario.navigate;
        let field = &scenario.field;

        let at = Instant::now();
        session.navigate(&target.path).await?;
        record(&mut steps, Step::Navigate, at);

        if target.tab.is_some() {
            let at = Instant::now();
            session.open_tab(target).await?;
            record(&mut steps, Step::OpenTab, at);
        }

        let at = Instant::now();
        let observed_before = session.read_field(field).await?;
        expect(field, Phase::BeforeEdit, field.expected_before(), &observed_before)?;
        record(&mut steps, Step::AssertBefore, at);

        let at = Instant::now();
        session.write_field(field, field.input_after()).await?;
        record(&mut steps, Step::Mutate, at);

        let at = Instant::now();
        session.persist(&scenario.save).await?;
        record(&mut steps, Step::Persist, at);

        let at = Instant::now();
        session.refresh(&scenario.reload, target).await?;
        record(&mut steps, Step::Reload, at);

        let at = Instant::now();
        let observed_after = session.read_field(field).await?;
        expect(field, Phase::AfterReload, field.expected_after(), &observed_after)?;
        record(&mut steps, Step::AssertAfter, at);

        tracing::info!(
            scenario = %scenario.name,
            field = %field.path(),
            before = %observed_before,
            after = %observed_after,
            "round trip verified"
        );
        Ok(RoundTripReport {
            scenario: scenario.name.clone(),
            steps,
            observed_before,
            observed_after,
            duration: started.elapsed(),
        })
    }
}

fn record(steps: &mut Vec<StepRecord>, step: Step, at: Instant) {
    let elapsed = at.elapsed();
    tracing::debug!(%step, elapsed_ms = elapsed.as_millis() as u64, "step complete");
    steps.push(StepRecord { step, elapsed });
}

fn expect(
    field: &FieldRef,
    phase: Phase,
    expected: &FieldValue,
    actual: &FieldValue,
) -> ProbeResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ProbeError::AssertionMismatch {
            field: field.path().to_string(),
            phase,
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}
