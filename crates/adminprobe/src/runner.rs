//! Sequential suite execution with per-scenario configuration isolation.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::driver::AdminDriver;
use crate::fixture::ConfigFixture;
use crate::reporter::{ScenarioOutcome, SuiteReport};
use crate::result::ProbeResult;
use crate::scenario::{Scenario, ScenarioSuite};
use crate::store::ConfigStore;
use crate::verifier::{RoundTripVerifier, VerifierOptions};

/// Suite runner options
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Only run scenarios whose name contains this pattern
    pub filter: Option<String>,
    /// Stop after the first failure and skip the rest
    pub fail_fast: bool,
    /// Snapshot and restore touched sections around each scenario
    pub isolate: bool,
    /// Per-scenario verifier options
    pub verifier: VerifierOptions,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            filter: None,
            fail_fast: false,
            isolate: true,
            verifier: VerifierOptions::default(),
        }
    }
}

impl RunnerOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name filter
    #[must_use]
    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    /// Enable or disable fail-fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Enable or disable isolation
    #[must_use]
    pub const fn with_isolation(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    /// Set verifier options
    #[must_use]
    pub const fn with_verifier(mut self, verifier: VerifierOptions) -> Self {
        self.verifier = verifier;
        self
    }
}

/// Runs the scenarios of a suite one after another
#[derive(Debug, Clone, Default)]
pub struct SuiteRunner {
    options: RunnerOptions,
    verifier: RoundTripVerifier,
}

impl SuiteRunner {
    /// Create a runner
    #[must_use]
    pub fn new(options: RunnerOptions) -> Self {
        let verifier = RoundTripVerifier::new(options.verifier);
        Self { options, verifier }
    }

    /// Runner options
    #[must_use]
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Scenarios selected by the filter, in suite order
    #[must_use]
    pub fn select<'s>(&self, suite: &'s ScenarioSuite) -> Vec<&'s Scenario> {
        suite.filter(self.options.filter.as_deref())
    }

    /// Run the selected scenarios
    pub async fn run<D: AdminDriver + ?Sized>(
        &self,
        driver: &mut D,
        store: Option<Arc<dyn ConfigStore>>,
        suite: &ScenarioSuite,
    ) -> SuiteReport {
        self.run_observed(driver, store, suite, |_| {}).await
    }

    /// Run the selected scenarios, calling `observer` after each outcome
    pub async fn run_observed<D, F>(
        &self,
        driver: &mut D,
        store: Option<Arc<dyn ConfigStore>>,
        suite: &ScenarioSuite,
        mut observer: F,
    ) -> SuiteReport
    where
        D: AdminDriver + ?Sized,
        F: FnMut(&ScenarioOutcome),
    {
        let started = Instant::now();
        let mut report = SuiteReport::new(&suite.name);
        let selected = self.select(suite);

        let store = if self.options.isolate {
            if store.is_none() {
                tracing::warn!("isolation requested but no configuration store given; scenarios will not be restored");
            }
            store
        } else {
            None
        };

        tracing::info!(
            suite = %suite.name,
            run_id = %report.run_id,
            scenarios = selected.len(),
            isolate = store.is_some(),
            "suite started"
        );

        let mut halted = false;
        for scenario in selected {
            let outcome = if halted {
                ScenarioOutcome::skipped(&scenario.name)
            } else {
                let span = tracing::info_span!("scenario", name = %scenario.name);
                self.run_scenario(driver, store.clone(), scenario)
                    .instrument(span)
                    .await
            };

            if outcome.status.is_failed() && self.options.fail_fast {
                halted = true;
            }
            observer(&outcome);
            report.record(outcome);
        }

        report.duration = started.elapsed();
        tracing::info!(
            suite = %suite.name,
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "suite finished"
        );
        report
    }

    async fn run_scenario<D: AdminDriver + ?Sized>(
        &self,
        driver: &mut D,
        store: Option<Arc<dyn ConfigStore>>,
        scenario: &Scenario,
    ) -> ScenarioOutcome {
        let started = Instant::now();

        let mut fixture = store.map(|store| ConfigFixture::new(store, scenario.sections()));
        if let Some(fixture) = fixture.as_mut() {
            if let Err(e) = fixture.setup().await {
                tracing::error!(error = %e, "fixture setup failed");
                return ScenarioOutcome::failed(&scenario.name, started.elapsed(), &e);
            }
        }

        let result = self.verifier.verify(driver, scenario).await;
        let restored: ProbeResult<()> = match fixture.as_mut() {
            Some(fixture) => fixture.teardown().await,
            None => Ok(()),
        };

        match (result, restored) {
            (Ok(report), Ok(())) => ScenarioOutcome::passed(report, started.elapsed()),
            (Ok(_), Err(e)) => {
                tracing::error!(error = %e, "scenario passed but configuration was not restored");
                ScenarioOutcome::failed(&scenario.name, started.elapsed(), &e)
            }
            (Err(e), restored) => {
                if let Err(restore_err) = restored {
                    tracing::warn!(error = %restore_err, "configuration not restored after failure");
                }
                tracing::warn!(category = %e.category(), error = %e, "scenario failed");
                ScenarioOutcome::failed(&scenario.name, started.elapsed(), &e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::reporter::OutcomeStatus;
    use crate::result::FailureCategory;
    use crate::settings::ModelPath;
    use crate::simulated::SimulatedAdmin;
    use crate::store::MemoryConfigStore;
    use serde_json::json;
    use std::time::Duration;

    fn fast() -> RunnerOptions {
        RunnerOptions::new().with_verifier(
            VerifierOptions::new()
                .with_action_timeout(Duration::from_millis(40))
                .with_poll_interval(Duration::from_millis(5)),
        )
    }

    fn suite() -> ScenarioSuite {
        ScenarioSuite::builtin().unwrap()
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_defaults_isolate() {
            let options = RunnerOptions::default();
            assert!(options.isolate);
            assert!(!options.fail_fast);
            assert!(options.filter.is_none());
        }

        #[test]
        fn test_select_by_filter() {
            let runner = SuiteRunner::new(fast().with_filter("advanced"));
            let suite = suite();
            let names: Vec<_> = runner.select(&suite).iter().map(|s| s.name.as_str()).collect();
            assert_eq!(
                names,
                [
                    "advanced.main_configuration",
                    "advanced.https_settings",
                    "advanced.anomaly_thresholds",
                ]
            );
        }

        #[tokio::test]
        async fn test_filter_matching_nothing_gives_empty_report() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone());
            let report = SuiteRunner::new(fast().with_filter("nope"))
                .run(&mut admin, Some(Arc::new(store)), &suite())
                .await;
            assert_eq!(report.total(), 0);
            assert!(admin.history().is_empty());
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_builtin_suite_passes_and_restores() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone());
            let report = SuiteRunner::new(fast())
                .run(&mut admin, Some(Arc::new(store.clone())), &suite())
                .await;

            assert!(report.all_passed(), "{}", report.render_text());
            assert_eq!(report.passed(), 4);
            assert_eq!(
                store.attribute(&ModelPath::parse("admin.node.maximum_textsize").unwrap()),
                Some(json!(4096))
            );
            assert_eq!(
                store.section("notification").unwrap()["tip_expiration_threshold"],
                json!(72)
            );
        }

        #[tokio::test]
        async fn test_without_isolation_second_run_fails_pre_edit() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone());
            let runner = SuiteRunner::new(fast().with_isolation(false));

            let first = runner.run(&mut admin, Some(Arc::new(store.clone())), &suite()).await;
            assert!(first.all_passed());

            let second = runner.run(&mut admin, Some(Arc::new(store)), &suite()).await;
            assert_eq!(second.failed(), 4);
            assert!(second
                .outcomes
                .iter()
                .all(|o| o.error.as_deref().is_some_and(|e| e.starts_with("pre-edit"))));
        }

        #[tokio::test]
        async fn test_with_isolation_second_run_passes() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone());
            let runner = SuiteRunner::new(fast());
            let shared: Arc<dyn ConfigStore> = Arc::new(store);

            assert!(runner.run(&mut admin, Some(shared.clone()), &suite()).await.all_passed());
            assert!(runner.run(&mut admin, Some(shared), &suite()).await.all_passed());
        }

        #[tokio::test]
        async fn test_isolation_restores_after_failure() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone()).with_hidden_field("admin.node.threshold_free_disk_percentage_high");
            let report = SuiteRunner::new(fast())
                .run(&mut admin, Some(Arc::new(store.clone())), &suite())
                .await;

            let failed = report.failures();
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].name, "advanced.anomaly_thresholds");
            assert_eq!(failed[0].category, Some(FailureCategory::Locator));
            assert_eq!(
                store.section("node").unwrap()["maximum_textsize"],
                json!(4096)
            );
        }

        #[tokio::test]
        async fn test_fail_fast_skips_remaining() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone()).with_dropped_saves();
            let report = SuiteRunner::new(fast().with_fail_fast(true))
                .run(&mut admin, Some(Arc::new(store)), &suite())
                .await;

            let statuses: Vec<_> = report.outcomes.iter().map(|o| o.status).collect();
            assert_eq!(
                statuses,
                [
                    OutcomeStatus::Failed,
                    OutcomeStatus::Skipped,
                    OutcomeStatus::Skipped,
                    OutcomeStatus::Skipped,
                ]
            );
        }

        #[tokio::test]
        async fn test_without_fail_fast_runs_everything() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone()).with_dropped_saves();
            let report = SuiteRunner::new(fast())
                .run(&mut admin, Some(Arc::new(store)), &suite())
                .await;
            assert_eq!(report.failed(), 4);
            assert_eq!(report.skipped(), 0);
        }

        #[tokio::test]
        async fn test_observer_sees_every_outcome() {
            let store = MemoryConfigStore::with_defaults();
            let mut admin = SimulatedAdmin::new(store.clone());
            let mut seen = Vec::new();
            SuiteRunner::new(fast())
                .run_observed(&mut admin, Some(Arc::new(store)), &suite(), |o| {
                    seen.push(o.name.clone());
                })
                .await;
            assert_eq!(seen.len(), 4);
            assert_eq!(seen[3], "mail.notification");
        }

        #[tokio::test]
        async fn test_isolation_without_store_still_runs() {
            let mut admin = SimulatedAdmin::new(MemoryConfigStore::with_defaults());
            let report = SuiteRunner::new(fast()).run(&mut admin, None, &suite()).await;
            assert!(report.all_passed());
        }
    }
}
