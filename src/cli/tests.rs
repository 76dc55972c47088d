use clap::Parser;
use serde_json::json;

use super::args::{CheckpointCommands, Cli, Commands};
use super::commands::{ResumeHint, StderrProgress};
use syllabus_engine::ProgressUpdate;
use syllabus_utils::types::{StageId, StageStatus};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments parse")
}

#[test]
fn test_generate_defaults_to_resume() {
    let cli = parse(&["syllabus", "generate", "Wound Care"]);
    let Commands::Generate(args) = &cli.command else {
        panic!("expected generate");
    };
    assert_eq!(args.subject, "Wound Care");
    assert!(!args.fresh && !args.dry_run && !args.json);
    assert!(cli.config_args().provider.is_none());
}

#[test]
fn test_resume_and_fresh_conflict() {
    let err =
        Cli::try_parse_from(["syllabus", "generate", "x", "--resume", "--fresh"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[test]
fn test_dry_run_forces_simulated_provider() {
    let cli = parse(&["syllabus", "--provider", "anthropic", "generate", "x", "--dry-run"]);
    assert_eq!(cli.config_args().provider.as_deref(), Some("simulated"));
}

#[test]
fn test_global_overrides_reach_config_args() {
    let cli = parse(&[
        "syllabus",
        "checkpoint",
        "status",
        "x",
        "--batch-size",
        "5",
        "--window",
        "3",
        "--inter-window-delay-ms",
        "0",
    ]);
    assert!(matches!(
        cli.command,
        Commands::Checkpoint(CheckpointCommands::Status { json: false, .. })
    ));
    let args = cli.config_args();
    assert_eq!(args.batch_size, Some(5));
    assert_eq!(args.window, Some(3));
    assert_eq!(args.inter_window_delay_ms, Some(0));
}

#[test]
fn test_progress_line_includes_percentage() {
    let update = ProgressUpdate::new(
        StageId::Content,
        StageStatus::InProgress,
        json!({ "message": "Writing concepts 11-12 of 12", "progress": 75.0 }),
    );
    assert_eq!(
        StderrProgress::render(&update),
        "[3/4] content: in_progress - Writing concepts 11-12 of 12 (75%)"
    );
}

#[test]
fn test_resume_hint_names_the_subject() {
    let hint = ResumeHint {
        subject: "Wound Care".to_string(),
    };
    assert!(hint.to_string().contains("syllabus generate \"Wound Care\" --resume"));
}
