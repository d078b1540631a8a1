//! Command execution: suite loading, driver selection and reporting

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use adminprobe::{
    AdminDriver, BrowserConfig, CdpDriver, ConfigStore, HttpConfigStore, MemoryConfigStore,
    ReportFormat, RunnerOptions, ScenarioSuite, SimulatedAdmin, SuiteReport, SuiteRunner,
    VerifierOptions,
};

use crate::commands::{ConfigArgs, DriverArg, ListArgs, RunArgs, ValidateArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

/// Load a suite file, or the built-in suite when no path is given
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a valid suite
pub fn load_suite(path: Option<&Path>) -> CliResult<ScenarioSuite> {
    let suite = match path {
        Some(path) => ScenarioSuite::from_path(path)?,
        None => ScenarioSuite::builtin()?,
    };
    tracing::debug!(suite = %suite.name, scenarios = suite.len(), "suite loaded");
    Ok(suite)
}

/// Executes suites for the `run` command
#[derive(Debug)]
pub struct SuiteCommand {
    config: CliConfig,
    reporter: ProgressReporter,
}

impl SuiteCommand {
    /// Create a command runner
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self { config, reporter }
    }

    /// Build runner options from the configuration and arguments
    #[must_use]
    pub fn runner_options(&self, args: &RunArgs) -> RunnerOptions {
        let mut options = RunnerOptions::new()
            .with_fail_fast(self.config.fail_fast)
            .with_isolation(self.config.isolate)
            .with_verifier(
                VerifierOptions::new().with_action_timeout(Duration::from_millis(args.timeout)),
            );
        if let Some(filter) = &args.filter {
            options = options.with_filter(filter.clone());
        }
        options
    }

    /// Run the selected scenarios and emit the report
    ///
    /// # Errors
    ///
    /// Returns error if nothing matches the filter, the driver cannot start,
    /// the report cannot be written, or any scenario fails
    pub async fn run(&mut self, args: &RunArgs) -> CliResult<SuiteReport> {
        let suite = load_suite(args.suite.as_deref())?;
        let runner = SuiteRunner::new(self.runner_options(args));

        let selected = runner.select(&suite).len();
        if selected == 0 {
            return Err(CliError::invalid_argument(format!(
                "no scenarios match '{}'",
                args.filter.as_deref().unwrap_or_default()
            )));
        }

        self.reporter.header(&format!("Running {}", suite.name));
        let report = match args.driver {
            DriverArg::Simulated => {
                let store = MemoryConfigStore::with_defaults();
                let mut admin = SimulatedAdmin::new(store.clone());
                let store: Arc<dyn ConfigStore> = Arc::new(store);
                self.execute(&runner, &mut admin, Some(store), &suite, selected)
                    .await
            }
            DriverArg::Cdp => {
                let store = self.http_store(args)?;
                let mut driver = CdpDriver::launch(browser_config(args)).await?;
                let report = self
                    .execute(&runner, &mut driver, store, &suite, selected)
                    .await;
                if let Err(e) = driver.close().await {
                    tracing::warn!(error = %e, "browser did not close cleanly");
                }
                report
            }
        };

        self.emit(&report, args.format.into())?;

        if report.all_passed() {
            Ok(report)
        } else {
            Err(CliError::verification(format!(
                "{} of {} scenarios failed",
                report.failed(),
                report.total()
            )))
        }
    }

    async fn execute<D: AdminDriver + ?Sized>(
        &mut self,
        runner: &SuiteRunner,
        driver: &mut D,
        store: Option<Arc<dyn ConfigStore>>,
        suite: &ScenarioSuite,
        selected: usize,
    ) -> SuiteReport {
        self.reporter.start_progress(selected as u64, &suite.name);
        let reporter = &self.reporter;
        let report = runner
            .run_observed(driver, store, suite, |outcome| {
                reporter.scenario_finished(outcome);
            })
            .await;
        self.reporter.finish();
        report
    }

    fn http_store(&self, args: &RunArgs) -> CliResult<Option<Arc<dyn ConfigStore>>> {
        if !self.config.isolate {
            return Ok(None);
        }
        match &args.api_token {
            Some(token) => {
                let store = HttpConfigStore::new(&args.base_url)?.with_api_token(token);
                Ok(Some(Arc::new(store)))
            }
            None => {
                self.reporter
                    .warning("no admin API token; configuration will not be restored");
                Ok(None)
            }
        }
    }

    fn emit(&self, report: &SuiteReport, format: ReportFormat) -> CliResult<()> {
        if let Some(path) = &self.config.output {
            report
                .write_to(format, path)
                .map_err(|e| CliError::report_generation(e.to_string()))?;
            self.reporter
                .info(&format!("{format} report written to {}", path.display()));
        } else if format != ReportFormat::Text || self.config.verbosity.is_verbose() {
            println!("{}", report.render(format)?);
        }
        self.reporter.summary(report);
        Ok(())
    }
}

fn browser_config(args: &RunArgs) -> BrowserConfig {
    let mut config = BrowserConfig::default()
        .with_base_url(&args.base_url)
        .with_headless(args.headless);
    if let Some(path) = &args.chromium_path {
        config = config.with_chromium_path(path.to_string_lossy());
    }
    if args.no_sandbox {
        config = config.with_no_sandbox();
    }
    config
}

/// Print the scenarios of a suite
///
/// # Errors
///
/// Returns error if the suite cannot be loaded or serialized
pub fn list(args: &ListArgs) -> CliResult<()> {
    let suite = load_suite(args.suite.as_deref())?;
    let scenarios = suite.filter(args.filter.as_deref());

    if args.json {
        let json = serde_json::to_string_pretty(&scenarios).map_err(adminprobe::ProbeError::from)?;
        println!("{json}");
        return Ok(());
    }

    for scenario in scenarios {
        println!(
            "{:<32} {} [{}]",
            scenario.name,
            scenario.navigate,
            scenario.field.path()
        );
    }
    Ok(())
}

/// Validate a suite file
///
/// # Errors
///
/// Returns error if the suite is invalid
pub fn validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let suite = ScenarioSuite::from_path(&args.file)?;
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.success(&format!(
        "{}: {} scenarios, suite '{}' is valid",
        args.file.display(),
        suite.len(),
        suite.name
    ));
    Ok(())
}

/// Print the effective configuration as YAML
///
/// # Errors
///
/// Returns error if serialization fails
pub fn show_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let mut browser = BrowserConfig::default().with_base_url(&args.base_url);
    if let Some(path) = &args.chromium_path {
        browser = browser.with_chromium_path(path.to_string_lossy());
    }

    let cli = serde_yaml_ng::to_string(config).map_err(adminprobe::ProbeError::from)?;
    println!("{cli}");
    println!("base_url: {}", browser.base_url);
    println!("route_prefix: {}", browser.route_prefix);
    println!(
        "chromium_path: {}",
        browser.chromium_path.as_deref().unwrap_or("auto")
    );
    println!("headless: {}", browser.headless);
    println!(
        "navigation_timeout_ms: {}",
        browser.navigation_timeout.as_millis()
    );
    println!(
        "browser_support: {}",
        if cfg!(feature = "browser") { "enabled" } else { "disabled" }
    );
    Ok(())
}
