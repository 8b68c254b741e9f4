use clap::Parser;
use std::io::{self, IsTerminal};
use toolcheck::cli::commands;
use toolcheck::cli::{Cli, Commands};
use toolcheck::logging::init_logging;
use toolcheck::{HarnessError, StructuredError};

/// Exit code when a suite has failures or a range does not match.
const EXIT_NEGATIVE: i32 = 1;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = cli.overrides();

    let result = match &cli.command {
        Commands::Version => commands::version::execute(cli.json).map(|()| true),
        command => commands::load_config(cli.config.as_deref(), &overrides).and_then(|config| {
            match command {
                Commands::Run(args) => commands::run::execute(args, config, cli.json, cli.quiet),
                Commands::Range(args) => commands::range::execute(args, &config, cli.json),
                Commands::Filter(args) => {
                    commands::filter::execute(args, &config, cli.json).map(|()| true)
                }
                Commands::Clean(args) => {
                    commands::clean::execute(args, &config, cli.json).map(|()| true)
                }
                Commands::Version => Ok(true),
            }
        }),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_NEGATIVE),
        Err(e) => handle_error(&e, cli.json),
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs a human-readable error with optional color.
fn handle_error(err: &HarnessError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}
