//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// adminprobe: verify that admin settings survive save and reload
#[derive(Parser, Debug)]
#[command(name = "adminprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run settings round-trip scenarios
    Run(RunArgs),

    /// List the scenarios of a suite
    List(ListArgs),

    /// Validate a suite file without running it
    Validate(ValidateArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Suite file (defaults to the built-in admin settings suite)
    #[arg(short, long)]
    pub suite: Option<PathBuf>,

    /// Only run scenarios whose name contains this pattern
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Stop at the first failing scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Do not snapshot and restore configuration around scenarios
    #[arg(long)]
    pub no_isolate: bool,

    /// Driver used to reach the admin UI
    #[arg(long, default_value = "cdp")]
    pub driver: DriverArg,

    /// Base URL of the application under test
    #[arg(long, env = "ADMINPROBE_BASE_URL", default_value = "http://127.0.0.1:8082")]
    pub base_url: String,

    /// Admin API token used for configuration snapshots
    #[arg(long, env = "ADMINPROBE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Run the browser headless
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Path to the chromium binary
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<PathBuf>,

    /// Disable the chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Action timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub timeout: u64,

    /// Report format
    #[arg(long, default_value = "text")]
    pub format: ReportFormatArg,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite file (defaults to the built-in admin settings suite)
    #[arg(short, long)]
    pub suite: Option<PathBuf>,

    /// Only list scenarios whose name contains this pattern
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Suite file to validate
    pub file: PathBuf,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Base URL of the application under test
    #[arg(long, env = "ADMINPROBE_BASE_URL", default_value = "http://127.0.0.1:8082")]
    pub base_url: String,

    /// Path to the chromium binary
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<PathBuf>,
}

/// Driver selection
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverArg {
    /// Chromium over the DevTools protocol
    #[default]
    Cdp,
    /// In-process simulated admin application
    Simulated,
}

/// Report format selection
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormatArg {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON
    Json,
    /// JUnit XML
    Junit,
}

impl From<ReportFormatArg> for adminprobe::ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Text => Self::Text,
            ReportFormatArg::Json => Self::Json,
            ReportFormatArg::Junit => Self::Junit,
        }
    }
}

/// Color output argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_run_defaults() {
            let cli = Cli::try_parse_from(["adminprobe", "run"]).unwrap();
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.driver, DriverArg::Cdp);
            assert!(args.headless);
            assert!(!args.no_isolate);
            assert_eq!(args.timeout, 5000);
            assert_eq!(args.format, ReportFormatArg::Text);
        }

        #[test]
        fn test_run_all_flags() {
            let cli = Cli::try_parse_from([
                "adminprobe",
                "-vv",
                "run",
                "--filter",
                "mail",
                "--fail-fast",
                "--no-isolate",
                "--driver",
                "simulated",
                "--headless",
                "false",
                "--format",
                "junit",
                "--output",
                "report.xml",
            ])
            .unwrap();
            assert_eq!(cli.verbose, 2);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.filter.as_deref(), Some("mail"));
            assert!(args.fail_fast);
            assert!(args.no_isolate);
            assert_eq!(args.driver, DriverArg::Simulated);
            assert!(!args.headless);
            assert_eq!(args.format, ReportFormatArg::Junit);
            assert_eq!(args.output, Some(PathBuf::from("report.xml")));
        }

        #[test]
        fn test_validate_requires_file() {
            assert!(Cli::try_parse_from(["adminprobe", "validate"]).is_err());
        }

        #[test]
        fn test_unknown_driver_rejected() {
            assert!(Cli::try_parse_from(["adminprobe", "run", "--driver", "selenium"]).is_err());
        }
    }

    #[test]
    fn test_format_conversion() {
        assert_eq!(
            adminprobe::ReportFormat::from(ReportFormatArg::Junit),
            adminprobe::ReportFormat::Junit
        );
    }
}
