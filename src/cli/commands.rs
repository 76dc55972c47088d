//! Command implementations.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::args::GenerateArgs;
use syllabus_checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use syllabus_config::Config;
use syllabus_engine::{GenerationHandle, GenerationOutput, ProgressSink, ProgressUpdate, StartMode};
use syllabus_utils::atomic_write::write_file_atomic;
use syllabus_utils::error::{ConfigError, PipelineError};

/// Attached to a failed run whose progress is saved on disk.
#[derive(Debug)]
pub(crate) struct ResumeHint {
    pub subject: String,
}

impl fmt::Display for ResumeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Completed stages are saved. Run `syllabus generate \"{}\" --resume` to continue.",
            self.subject
        )
    }
}

/// Stage progress on stderr, one line per distinct update.
#[derive(Default)]
pub(crate) struct StderrProgress {
    last: Mutex<Option<String>>,
}

impl StderrProgress {
    pub(crate) fn render(update: &ProgressUpdate) -> String {
        let mut line = format!(
            "[{}/4] {}: {}",
            update.stage.index(),
            update.stage,
            update.status
        );
        if let Some(message) = update.message() {
            line.push_str(" - ");
            line.push_str(message);
        }
        if let Some(progress) = update.progress() {
            line.push_str(&format!(" ({progress:.0}%)"));
        }
        line
    }
}

impl ProgressSink for StderrProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        let line = Self::render(update);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() != Some(line.as_str()) {
            eprintln!("{line}");
            *last = Some(line);
        }
    }
}

fn validated_subject(raw: &str) -> Result<&str, PipelineError> {
    let subject = raw.trim();
    if subject.is_empty() {
        return Err(PipelineError::Config(ConfigError::InvalidValue {
            key: "subject".to_string(),
            value: "subject must not be empty".to_string(),
        }));
    }
    Ok(subject)
}

fn file_store(config: &Config) -> Result<FileCheckpointStore, PipelineError> {
    let dir = Utf8PathBuf::from_path_buf(config.checkpoint_dir()).map_err(|path| {
        PipelineError::Config(ConfigError::InvalidValue {
            key: "checkpoint.dir".to_string(),
            value: path.display().to_string(),
        })
    })?;
    Ok(FileCheckpointStore::new(dir))
}

/// Cancel `cancel` on Ctrl-C.
fn spawn_interrupt_watcher(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    })
}

/// `syllabus generate`
pub async fn execute_generate_command(args: &GenerateArgs, config: &Config) -> Result<()> {
    let subject = validated_subject(&args.subject)?;

    let handle = if args.dry_run {
        let backend = syllabus_llm::from_config(config).map_err(|e| {
            PipelineError::Config(ConfigError::InvalidValue {
                key: "llm.provider".to_string(),
                value: e.to_string(),
            })
        })?;
        GenerationHandle::with_parts(config, backend, Arc::new(MemoryCheckpointStore::new()))
    } else {
        GenerationHandle::from_config(config.clone())?
    };
    let handle = handle.with_progress(Arc::new(StderrProgress::default()));

    let mode = if args.fresh {
        StartMode::Fresh
    } else {
        StartMode::Resume
    };
    if mode == StartMode::Resume
        && let Some(checkpoint) = handle.checkpoint(subject)?
    {
        eprintln!(
            "Resuming '{subject}' after stage {} ({})",
            checkpoint.last_complete_stage.index(),
            checkpoint.last_complete_stage
        );
    }

    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());
    let result = handle.run(subject, mode, cancel).await;
    watcher.abort();

    let output = match result {
        Ok(output) => output,
        Err(err) => {
            let saved = !err.is_cancelled() && handle.has_checkpoint(subject).unwrap_or(false);
            let err = anyhow::Error::new(err);
            return Err(if saved {
                err.context(ResumeHint {
                    subject: subject.to_string(),
                })
            } else {
                err
            });
        }
    };

    deliver(&output, args)
}

fn deliver(output: &GenerationOutput, args: &GenerateArgs) -> Result<()> {
    if let Some(path) = &args.output {
        let path = Utf8PathBuf::from_path_buf(path.clone())
            .map_err(|p| anyhow::anyhow!("Output path is not valid UTF-8: {}", p.display()))?;
        write_file_atomic(&path, &output.document)
            .with_context(|| format!("Failed to write document to {path}"))?;
        eprintln!("✓ Wrote {path}");
    }

    if args.json {
        let json = serde_json::to_string_pretty(output).context("Failed to encode run summary")?;
        println!("{json}");
        return Ok(());
    }

    if args.output.is_none() {
        print!("{}", output.document);
    }

    let v = &output.validation;
    eprintln!(
        "✓ {}: {}/{} concepts, completeness {:.1}%, \
         lifecycle consistency {:.1}%, format consistency {:.1}%",
        output.subject,
        v.found_concepts,
        v.expected_concepts,
        v.completeness,
        v.lifecycle_consistency,
        v.format_consistency
    );
    if let (Some(framing), Some(terminology), Some(domain)) =
        (v.framing_score, v.terminology_score, v.domain_specificity)
    {
        eprintln!(
            "  Review: framing {framing:.0}, terminology {terminology:.0}, \
             domain specificity {domain:.0}"
        );
    }
    if !v.fixes_applied.is_empty() {
        eprintln!("  Fixed sections: {}", v.fixes_applied.join(", "));
    }
    for issue in &v.issues {
        eprintln!("  ⚠ {issue}");
    }
    Ok(())
}

/// `syllabus checkpoint status`
pub fn execute_checkpoint_status_command(subject: &str, json: bool, config: &Config) -> Result<()> {
    let subject = validated_subject(subject)?;
    let store = file_store(config)?;
    let checkpoint = store.load(subject).map_err(PipelineError::from)?;
    let path = store.path_for(subject);

    if json {
        let value = match &checkpoint {
            Some(cp) => serde_json::json!({
                "subject": subject,
                "path": path.as_str(),
                "last_complete_stage": cp.last_complete_stage,
                "next_stage": cp.first_incomplete_stage(),
                "saved_at": cp.saved_at,
            }),
            None => serde_json::json!({
                "subject": subject,
                "path": path.as_str(),
                "checkpoint": null,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Checkpoint for: {subject}");
    match checkpoint {
        Some(cp) => {
            println!(
                "  Last complete stage: {} ({})",
                cp.last_complete_stage.index(),
                cp.last_complete_stage
            );
            match cp.first_incomplete_stage() {
                Some(next) => println!("  Next stage: {} ({next})", next.index()),
                None => println!("  Next stage: none (assembly only)"),
            }
            println!("  Saved at: {}", cp.saved_at.to_rfc3339());
            println!("  File: {path}");
        }
        None => println!("  No saved progress ({path} does not exist)"),
    }
    Ok(())
}

/// `syllabus checkpoint clear`
pub fn execute_checkpoint_clear_command(subject: &str, config: &Config) -> Result<()> {
    let subject = validated_subject(subject)?;
    let store = file_store(config)?;
    store.clear(subject).map_err(PipelineError::from)?;
    println!("✓ Cleared saved progress for '{subject}'");
    Ok(())
}
