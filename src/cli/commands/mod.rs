//! CLI command implementations

mod evaluate;
mod info;
mod stage;
mod validate;

use crate::cli::{init_tracing, LogLevel};
use crate::config::cli::{Cli, Command};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    // Configure output based on verbose/quiet flags
    let log_level = LogLevel::from_flags(cli.verbose, cli.quiet);
    init_tracing(log_level);

    match cli.command {
        Command::Validate(args) => validate::run_validate(args, log_level),
        Command::Info(args) => info::run_info(args, log_level),
        Command::Stage(args) => stage::run_stage(args, log_level),
        Command::Evaluate(args) => evaluate::run_evaluate(args, log_level),
    }
}
