//! Terminal output and progress reporting

use adminprobe::{OutcomeStatus, ScenarioOutcome, SuiteReport};
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter for suite execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Report one finished scenario
    pub fn scenario_finished(&self, outcome: &ScenarioOutcome) {
        let line = format!("{} ({}ms)", outcome.name, outcome.duration.as_millis());
        match &self.progress_bar {
            Some(pb) => {
                pb.suspend(|| self.print_outcome(outcome, &line));
                pb.inc(1);
            }
            None => self.print_outcome(outcome, &line),
        }
    }

    fn print_outcome(&self, outcome: &ScenarioOutcome, line: &str) {
        match outcome.status {
            OutcomeStatus::Passed => self.success(line),
            OutcomeStatus::Skipped => self.skipped(line),
            OutcomeStatus::Failed => {
                self.failure(line);
                if let Some(error) = &outcome.error {
                    let detail = match outcome.category {
                        Some(category) => format!("    [{category}] {error}"),
                        None => format!("    {error}"),
                    };
                    let _ = self.term.write_line(&detail);
                }
            }
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a skipped message
    pub fn skipped(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("-").yellow().to_string()
        } else {
            "SKIP".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print the suite summary
    pub fn summary(&self, report: &SuiteReport) {
        let failed = report.failed();
        if self.quiet && failed == 0 {
            return;
        }

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&self.summary_line(report));
    }

    /// Summary line for a report
    #[must_use]
    pub fn summary_line(&self, report: &SuiteReport) -> String {
        let (passed, failed, skipped) = (report.passed(), report.failed(), report.skipped());
        let total = report.total();
        let duration_secs = report.duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let skipped_style = Style::new().yellow();

            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            format!(
                "{} {} scenarios in {:.2}s ({} passed, {} failed, {} skipped)",
                status,
                total,
                duration_secs,
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
                skipped_style.apply_to(skipped)
            )
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            format!(
                "{status} {total} scenarios in {duration_secs:.2}s ({passed} passed, {failed} failed, {skipped} skipped)"
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use adminprobe::ProbeError;
    use std::time::Duration;

    fn report() -> SuiteReport {
        let mut report = SuiteReport::new("admin-settings");
        report.record(ScenarioOutcome::failed(
            "mail.notification",
            Duration::from_millis(3),
            &ProbeError::store("down"),
        ));
        report.record(ScenarioOutcome::skipped("advanced.https_settings"));
        report
    }

    #[test]
    fn test_plain_summary_line() {
        let reporter = ProgressReporter::new(false, false);
        let line = reporter.summary_line(&report());
        assert!(line.starts_with("FAILED 2 scenarios"));
        assert!(line.contains("(0 passed, 1 failed, 1 skipped)"));
    }

    #[test]
    fn test_passing_summary_line() {
        let reporter = ProgressReporter::new(false, false);
        let line = reporter.summary_line(&SuiteReport::new("empty"));
        assert!(line.starts_with("PASSED 0 scenarios"));
    }

    #[test]
    fn test_quiet_reporter_never_starts_progress() {
        let mut reporter = ProgressReporter::new(false, true);
        reporter.start_progress(4, "running");
        assert!(reporter.progress_bar.is_none());
        reporter.scenario_finished(&report().outcomes[0]);
        reporter.finish();
    }
}
