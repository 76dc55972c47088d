//! End-to-end pipeline behaviour against the recording backend.
//!
//! Covers batching, ordering, progress monotonicity, cancellation, failure
//! attribution, lifecycle fallback, section fixes and checkpoint resume.

use anyhow::Result;
use camino::Utf8PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use syllabus_checkpoint::{
    Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
use syllabus_config::Config;
use syllabus_engine::{
    EngineSettings, GenerationRun, PassOrchestrator, ProgressSink, ProgressUpdate, ScheduleReport,
};
use syllabus_llm::{LlmBackend, LlmError, ModelClient, RecordingBackend, SimulatedBackend};
use syllabus_utils::error::{CheckpointError, PipelineError};
use syllabus_utils::types::{StageId, StageStatus};

const SUBJECT: &str = "Test Subject";

fn settings() -> EngineSettings {
    EngineSettings::from_config(&Config::builder().provider("simulated").build().unwrap())
}

fn orchestrator(
    backend: &Arc<RecordingBackend>,
    store: Arc<dyn CheckpointStore>,
) -> PassOrchestrator {
    let backend: Arc<dyn LlmBackend> = backend.clone();
    PassOrchestrator::new(ModelClient::new(backend), store, settings())
}

fn collecting_sink() -> (Arc<dyn ProgressSink>, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: Arc<dyn ProgressSink> = Arc::new(move |update: &ProgressUpdate| {
        sink_seen.lock().unwrap().push(update.clone());
    });
    (sink, seen)
}

async fn baseline_document(concepts: usize) -> Result<String> {
    let backend = Arc::new(RecordingBackend::new(SimulatedBackend::new(concepts)));
    let output = orchestrator(&backend, Arc::new(MemoryCheckpointStore::new()))
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;
    Ok(output.document)
}

#[tokio::test(start_paused = true)]
async fn test_twelve_concepts_run_in_one_window() -> Result<()> {
    let backend = Arc::new(RecordingBackend::new(SimulatedBackend::new(12)));
    let store = Arc::new(MemoryCheckpointStore::new());
    let started = tokio::time::Instant::now();

    let output = orchestrator(&backend, store.clone())
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;

    assert_eq!(
        output.schedule,
        Some(ScheduleReport {
            batches: 2,
            windows: 1,
            delays: 0
        })
    );
    assert!(started.elapsed() < Duration::from_millis(2000));
    assert_eq!(
        backend.labels(),
        vec![
            "lifecycle",
            "analysis",
            "framework",
            "content",
            "content",
            "narrative",
            "review"
        ]
    );
    let batch_indices: Vec<Option<usize>> = backend
        .calls()
        .iter()
        .filter(|c| c.label == "content")
        .map(|c| c.batch_index)
        .collect();
    assert_eq!(batch_indices, vec![Some(0), Some(1)]);

    assert_eq!(output.validation.expected_concepts, 12);
    assert_eq!(output.validation.found_concepts, 12);
    assert!((output.validation.completeness - 100.0).abs() < f64::EPSILON);
    assert!((output.validation.lifecycle_consistency - 100.0).abs() < f64::EPSILON);
    assert_eq!(output.validation.framing_score, Some(90.0));
    assert!(output.stages.iter().all(|s| s.status == StageStatus::Complete));

    let doc = &output.document;
    let header = doc.find("## DOMAIN ANALYSIS").unwrap();
    let framework = doc.find("## DECISION FRAMEWORK").unwrap();
    let core = doc.find("## CORE CONCEPTS").unwrap();
    let closing = doc.find("## ASSESSMENT CRITERIA").unwrap();
    assert!(header < framework && framework < core && core < closing);

    assert!(!store.has(SUBJECT)?, "checkpoint is cleared after success");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_windows_beyond_the_first_wait_for_the_delay() -> Result<()> {
    let backend = Arc::new(RecordingBackend::new(SimulatedBackend::new(35)));
    let started = tokio::time::Instant::now();

    let output = orchestrator(&backend, Arc::new(MemoryCheckpointStore::new()))
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;

    let report = output.schedule.unwrap();
    assert_eq!(report.batches, 4);
    assert_eq!(report.windows, 2);
    assert_eq!(report.delays, 1);
    assert!(started.elapsed() >= Duration::from_millis(2000));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_assembly_follows_batch_order_not_completion_order() -> Result<()> {
    let expected = baseline_document(25).await?;

    let backend = Arc::new(
        RecordingBackend::new(SimulatedBackend::new(25))
            .delay_batch(0, Duration::from_millis(500))
            .delay_batch(2, Duration::from_millis(10)),
    );
    let output = orchestrator(&backend, Arc::new(MemoryCheckpointStore::new()))
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;

    assert_eq!(output.document, expected);
    let first = output.document.find("### CONCEPT 1:").unwrap();
    let eleventh = output.document.find("### CONCEPT 11:").unwrap();
    let last = output.document.find("### CONCEPT 25:").unwrap();
    assert!(first < eleventh && eleventh < last);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_content_progress_never_decreases() -> Result<()> {
    // batch 0 is held back so batch 1 streams first
    let backend = Arc::new(
        RecordingBackend::new(SimulatedBackend::new(12).with_fragment_chars(16))
            .delay_batch(0, Duration::from_millis(100)),
    );
    let (sink, seen) = collecting_sink();

    orchestrator(&backend, Arc::new(MemoryCheckpointStore::new()))
        .with_progress(sink)
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;

    let updates = seen.lock().unwrap().clone();
    let values: Vec<f64> = updates
        .iter()
        .filter(|u| u.stage == StageId::Content)
        .filter_map(ProgressUpdate::progress)
        .collect();

    assert!(!values.is_empty());
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
    assert!((values[0] - 75.0).abs() < f64::EPSILON, "batch 0's 25% is never reported");
    assert!((values[values.len() - 1] - 100.0).abs() < f64::EPSILON);

    for stage in StageId::ALL {
        let statuses: Vec<StageStatus> = updates
            .iter()
            .filter(|u| u.stage == stage)
            .map(|u| u.status)
            .collect();
        assert!(statuses.windows(2).all(|w| w[0] <= w[1]), "{stage}: {statuses:?}");
        assert_eq!(statuses.last(), Some(&StageStatus::Complete));
    }
    Ok(())
}

#[tokio::test]
async fn test_cancel_before_dispatch_makes_no_calls() {
    let backend = Arc::new(RecordingBackend::default());
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator(&backend, store.clone())
        .execute(GenerationRun::new(SUBJECT, cancel))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(backend.call_count(), 0);
    assert!(!store.has(SUBJECT).unwrap());
}

#[tokio::test]
async fn test_upstream_failure_names_the_stage_and_keeps_checkpoint() {
    let backend = Arc::new(
        RecordingBackend::default().fail_on("framework", LlmError::ProviderOutage("503".into())),
    );
    let store = Arc::new(MemoryCheckpointStore::new());

    let err = orchestrator(&backend, store.clone())
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::UpstreamFailure {
            stage: StageId::Framework,
            source: LlmError::ProviderOutage(_)
        }
    ));
    let checkpoint = store.load(SUBJECT).unwrap().unwrap();
    assert_eq!(checkpoint.last_complete_stage, StageId::Analysis);
    assert_eq!(backend.count_label("content"), 0);
}

#[tokio::test]
async fn test_failed_lifecycle_inference_falls_back_to_default() -> Result<()> {
    let backend = Arc::new(
        RecordingBackend::default().fail_on("lifecycle", LlmError::Transport("reset".into())),
    );

    let output = orchestrator(&backend, Arc::new(MemoryCheckpointStore::new()))
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;

    assert!(output.document.contains("**PREPARE:**"));
    assert!(!output.document.contains("**ASSESS:**"));
    assert!((output.validation.lifecycle_consistency - 100.0).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn test_unparseable_analysis_is_an_upstream_failure() {
    let backend = Arc::new(RecordingBackend::new(
        SimulatedBackend::default().with_response("analysis", "I could not analyse that."),
    ));

    let err = orchestrator(&backend, Arc::new(MemoryCheckpointStore::new()))
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::UpstreamFailure {
            stage: StageId::Analysis,
            source: LlmError::MalformedResponse(_)
        }
    ));
}

#[tokio::test]
async fn test_review_fixes_are_applied_per_section() -> Result<()> {
    let review = r#"{"framing_score": 60, "terminology_score": 70, "domain_specificity": 80,
        "issues": ["Mistakes section is generic"],
        "fixes": {"COMMON MISTAKES": "Skipping the verification step.",
                  "DOMAIN ANALYSIS": "Not part of the content."}}"#;
    let backend = Arc::new(RecordingBackend::new(
        SimulatedBackend::default().with_response("review", review),
    ));
    let (sink, seen) = collecting_sink();

    let output = orchestrator(&backend, Arc::new(MemoryCheckpointStore::new()))
        .with_progress(sink)
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;

    assert_eq!(output.validation.fixes_applied, vec!["COMMON MISTAKES".to_string()]);
    let fixed_section =
        "## COMMON MISTAKES\n\nSkipping the verification step.\n\n## ASSESSMENT CRITERIA";
    assert!(output.document.contains(fixed_section));
    assert!(!output.document.contains("Not part of the content."));
    assert_eq!(output.validation.found_concepts, 12);

    let fixing = seen
        .lock()
        .unwrap()
        .iter()
        .any(|u| u.stage == StageId::Validation && u.status == StageStatus::Fixing);
    assert!(fixing);
    Ok(())
}

#[tokio::test]
async fn test_resume_after_framework_runs_only_remaining_stages() -> Result<()> {
    let dir = TempDir::new()?;
    let store: Arc<dyn CheckpointStore> = Arc::new(FileCheckpointStore::new(
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
    ));

    // First attempt is cancelled as soon as stage 3 dispatches.
    let cancel = CancellationToken::new();
    let interrupted = Arc::new(RecordingBackend::default().cancel_on("content", cancel.clone()));
    let err = orchestrator(&interrupted, store.clone())
        .execute(GenerationRun::new(SUBJECT, cancel))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    let checkpoint = store.load(SUBJECT)?.unwrap();
    assert_eq!(checkpoint.last_complete_stage, StageId::Framework);

    // A new orchestrator picks up from the checkpoint.
    let resumed = Arc::new(RecordingBackend::default());
    let run = GenerationRun::from_checkpoint(checkpoint, CancellationToken::new())?;
    let output = orchestrator(&resumed, store.clone()).execute(run).await?;

    assert_eq!(
        resumed.labels(),
        vec!["content", "content", "narrative", "review"]
    );
    assert_eq!(output.resumed_from, Some(StageId::Content));
    assert!(output.stages[0].restored && output.stages[1].restored);
    assert!(!output.stages[2].restored);
    assert!(!store.has(SUBJECT)?);

    assert_eq!(output.document, baseline_document(12).await?);
    Ok(())
}

/// Memory store whose `clear` always fails.
#[derive(Default)]
struct UnclearableStore {
    inner: MemoryCheckpointStore,
}

impl CheckpointStore for UnclearableStore {
    fn has(&self, subject: &str) -> Result<bool, CheckpointError> {
        self.inner.has(subject)
    }

    fn load(&self, subject: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        self.inner.load(subject)
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.inner.save(checkpoint)
    }

    fn clear(&self, subject: &str) -> Result<(), CheckpointError> {
        Err(CheckpointError::Io {
            path: format!("checkpoints/{subject}"),
            reason: "read-only file system".to_string(),
        })
    }
}

#[tokio::test]
async fn test_failed_checkpoint_clear_still_returns_document() -> Result<()> {
    let backend = Arc::new(RecordingBackend::default());
    let store = Arc::new(UnclearableStore::default());

    let output = orchestrator(&backend, store.clone())
        .execute(GenerationRun::new(SUBJECT, CancellationToken::new()))
        .await?;

    assert!(output.document.contains("## CORE CONCEPTS"));
    assert_eq!(output.validation.found_concepts, 12);
    let leftover = store.load(SUBJECT)?.unwrap();
    assert_eq!(leftover.last_complete_stage, StageId::Validation);
    Ok(())
}
