//! adminprobe: verify admin settings survive save and reload
//!
//! ## Usage
//!
//! ```bash
//! adminprobe run                              # Built-in suite against a live app
//! adminprobe run --driver simulated           # Built-in suite, no browser
//! adminprobe run --filter mail --format junit # One scenario, JUnit report
//! adminprobe list                             # Show scenarios
//! adminprobe validate suite.yaml              # Check a suite file
//! ```

use adminprobe_cli::{
    list, logging, show_config, validate, Cli, CliConfig, CliError, CliResult, ColorChoice,
    Commands, SuiteCommand, Verbosity,
};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    logging::init(config.verbosity, cli.log_json);

    match cli.command {
        Commands::Run(args) => {
            let config = config
                .with_fail_fast(args.fail_fast)
                .with_isolation(!args.no_isolate)
                .with_output(args.output.clone());
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| CliError::config(format!("failed to start async runtime: {e}")))?;
            runtime.block_on(async {
                let mut command = SuiteCommand::new(config);
                command.run(&args).await.map(|_| ())
            })
        }
        Commands::List(args) => list(&args),
        Commands::Validate(args) => validate(&config, &args),
        Commands::Config(args) => show_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}
