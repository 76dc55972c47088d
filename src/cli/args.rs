//! CLI argument definitions (clap derive).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use syllabus_config::CliArgs;

/// syllabus - resumable curriculum generation from a single subject
#[derive(Parser, Debug)]
#[command(name = "syllabus")]
#[command(about = "Generate a structured curriculum document for a subject using an LLM provider")]
#[command(long_about = r#"
syllabus turns one subject into a curriculum document through four stages:
domain analysis, decision framework, concept content and validation.
Concept content is written in batches with a bounded number in flight.
Every completed stage is checkpointed, so an interrupted run can resume.

EXAMPLES:
  # Generate a document and write it to a file
  syllabus generate "Wound Care" --output wound-care.md

  # Exercise the whole pipeline offline with the simulated provider
  syllabus generate "Wound Care" --dry-run

  # Start over, discarding saved progress
  syllabus generate "Wound Care" --fresh

  # Inspect or discard saved progress
  syllabus checkpoint status "Wound Care"
  syllabus checkpoint clear "Wound Care"

CONFIGURATION:
  Precedence: CLI flags > config file > defaults
  The config file is $SYLLABUS_HOME/config.toml, or the first
  .syllabus/config.toml found searching upward from the current directory.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// LLM provider: anthropic, openrouter or simulated
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model to use for provider calls
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Concepts per content batch
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Content batches in flight at once
    #[arg(long, global = true)]
    pub window: Option<usize>,

    /// Pause between concurrency windows, in milliseconds
    #[arg(long, global = true)]
    pub inter_window_delay_ms: Option<u64>,

    /// Per-call timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Directory holding checkpoints
    #[arg(long, global = true)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Overrides handed to configuration discovery.
    #[must_use]
    pub fn config_args(&self) -> CliArgs {
        let provider = match &self.command {
            Commands::Generate(args) if args.dry_run => Some("simulated".to_string()),
            _ => self.provider.clone(),
        };
        CliArgs {
            config_path: self.config.clone(),
            model: self.model.clone(),
            provider,
            batch_size: self.batch_size,
            window: self.window,
            inter_window_delay_ms: self.inter_window_delay_ms,
            timeout_secs: self.timeout,
            checkpoint_dir: self.checkpoint_dir.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate the curriculum document for a subject
    Generate(GenerateArgs),

    /// Inspect or discard saved progress
    #[command(subcommand)]
    Checkpoint(CheckpointCommands),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Subject to generate a curriculum for
    pub subject: String,

    /// Continue from saved progress when it exists (default)
    #[arg(long, conflicts_with = "fresh")]
    pub resume: bool,

    /// Discard saved progress and run every stage
    #[arg(long)]
    pub fresh: bool,

    /// Use the simulated provider and keep checkpoints in memory
    #[arg(long)]
    pub dry_run: bool,

    /// Write the document to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Show the saved progress for a subject
    Status {
        subject: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the saved progress for a subject
    Clear { subject: String },
}
