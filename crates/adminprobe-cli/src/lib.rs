//! adminprobe CLI library
//!
//! Command-line interface for running settings round-trip suites.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, DriverArg, ListArgs, ReportFormatArg, RunArgs,
    ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::{list, load_suite, show_config, validate, SuiteCommand};
