//! adminprobe: round-trip verification of persisted admin settings.
//!
//! Drives an administration UI through a browser and proves that a setting
//! edited on a configuration screen survives a save and a reload.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ YAML suite   │───►│ SuiteRunner  │───►│ AdminDriver  │
//! │ (scenarios)  │    │ + fixture    │    │ CDP / sim    │
//! └──────────────┘    └──────┬───────┘    └──────────────┘
//!                            │ snapshot / restore
//!                     ┌──────▼───────┐
//!                     │ ConfigStore  │
//!                     │ REST / memory│
//!                     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use adminprobe::{MemoryConfigStore, RunnerOptions, ScenarioSuite, SimulatedAdmin, SuiteRunner};
//! use std::sync::Arc;
//!
//! # async fn demo() -> adminprobe::ProbeResult<()> {
//! let store = MemoryConfigStore::with_defaults();
//! let mut admin = SimulatedAdmin::new(store.clone());
//! let suite = ScenarioSuite::builtin()?;
//! let report = SuiteRunner::new(RunnerOptions::default())
//!     .run(&mut admin, Some(Arc::new(store)), &suite)
//!     .await;
//! assert!(report.all_passed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Browser configuration and the CDP-backed driver
pub mod browser;
mod driver;
mod fixture;
mod locator;
mod reporter;
mod result;
/// Sequential suite execution
pub mod runner;
mod scenario;
mod settings;
/// In-process admin application for running suites without a browser
pub mod simulated;
mod store;
mod verifier;
/// Polling waits for elements and page idleness
pub mod wait;

pub use browser::{BrowserConfig, CdpDriver};
pub use driver::{not_found, AdminDriver, AdminSession, MockDriver, MockElement};
pub use fixture::{ConfigFixture, FixtureState};
pub use locator::{
    css_attr_escape, js_string, Locator, LocatorOptions, Selector, MODEL_ATTRIBUTES,
};
pub use reporter::{OutcomeStatus, ReportFormat, ScenarioOutcome, SuiteReport};
pub use result::{FailureCategory, Phase, ProbeError, ProbeResult};
pub use runner::{RunnerOptions, SuiteRunner};
pub use scenario::{Scenario, ScenarioSuite, BUILTIN_SUITE_YAML, SUITE_VERSION};
pub use settings::{
    FieldKind, FieldRef, FieldValue, ModelPath, NavigationTarget, ReloadStrategy, SaveControl,
};
pub use simulated::{admin_screens, SimulatedAdmin, SimulatedFaults};
pub use store::{assign, lookup, ConfigSnapshot, ConfigStore, MemoryConfigStore};
#[cfg(feature = "http")]
pub use store::{HttpConfigStore, API_TOKEN_HEADER};
pub use verifier::{RoundTripReport, RoundTripVerifier, Step, StepRecord, VerifierOptions};
pub use wait::{
    poll_until, WaitOptions, WaitResult, DEFAULT_ACTION_TIMEOUT_MS,
    DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        AdminDriver, BrowserConfig, CdpDriver, ConfigStore, FieldRef, FieldValue,
        MemoryConfigStore, ModelPath, NavigationTarget, ProbeError, ProbeResult, ReloadStrategy,
        ReportFormat, RoundTripVerifier, RunnerOptions, SaveControl, Scenario, ScenarioSuite,
        SimulatedAdmin, SuiteReport, SuiteRunner, VerifierOptions,
    };
}
