//! Command-line interface for syllabus
//!
//! - `args`: clap definitions
//! - `run`: entry point, configuration and error reporting
//! - `commands`: command implementations

pub mod args;
mod commands;
mod run;

#[cfg(test)]
mod tests;

pub use args::{CheckpointCommands, Cli, Commands, GenerateArgs};
pub use run::run;
