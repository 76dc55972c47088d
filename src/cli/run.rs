//! CLI entry point and dispatch.
//!
//! `run()` parses arguments, discovers configuration, builds the runtime,
//! dispatches the command and prints every error itself. `main` only maps
//! the returned code to the process exit status.

use anyhow::Error;
use clap::Parser;

use super::args::{CheckpointCommands, Cli, Commands};
use super::commands::{self, ResumeHint};
use syllabus_config::Config;
use syllabus_utils::error::{ConfigError, PipelineError};
use syllabus_utils::exit_codes::ExitCode;
use syllabus_utils::logging::init_tracing;

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after the failure has been reported on stderr.
/// Cancellation is not reported; it only yields [`ExitCode::CANCELLED`].
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("✗ Failed to initialise logging: {e}");
    }

    let config = match Config::discover(&cli.config_args()) {
        Ok(config) => config,
        Err(err) => return Err(report(&err)),
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Generate(args) => commands::execute_generate_command(&args, &config).await,
            Commands::Checkpoint(CheckpointCommands::Status { subject, json }) => {
                commands::execute_checkpoint_status_command(&subject, json, &config)
            }
            Commands::Checkpoint(CheckpointCommands::Clear { subject }) => {
                commands::execute_checkpoint_clear_command(&subject, &config)
            }
        }
    });

    result.map_err(|err| report(&err))
}

/// Print `err` for the user and pick the exit code.
fn report(err: &Error) -> ExitCode {
    if let Some(pipeline) = err.downcast_ref::<PipelineError>() {
        if !pipeline.is_cancelled() {
            eprint!("{}", pipeline.display_for_user());
            if let Some(hint) = err.downcast_ref::<ResumeHint>() {
                eprintln!("\n{hint}");
            }
        }
        return ExitCode::from(pipeline);
    }

    eprintln!("Error: {err:#}");
    if err.downcast_ref::<ConfigError>().is_some() {
        ExitCode::CLI_ARGS
    } else {
        ExitCode::INTERNAL
    }
}
