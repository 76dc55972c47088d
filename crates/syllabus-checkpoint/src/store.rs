use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::model::Checkpoint;
use syllabus_utils::atomic_write::write_file_atomic;
use syllabus_utils::error::CheckpointError;

/// Durable per-subject progress store.
///
/// Keys are the subject string exactly as given to the run. A save replaces
/// any earlier snapshot for the same subject.
pub trait CheckpointStore: Send + Sync {
    /// Whether a snapshot exists for `subject`.
    fn has(&self, subject: &str) -> Result<bool, CheckpointError>;

    /// The snapshot for `subject`, or `None` when there is none.
    fn load(&self, subject: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Remove the snapshot for `subject`. Clearing a missing snapshot is not an error.
    fn clear(&self, subject: &str) -> Result<(), CheckpointError>;
}

/// Length of the hex subject digest used in file names.
const KEY_HEX_LEN: usize = 16;

/// File name for a subject: a BLAKE3 digest prefix, so any subject string is
/// a safe file name.
#[must_use]
pub fn checkpoint_file_name(subject: &str) -> String {
    let digest = blake3::hash(subject.as_bytes()).to_hex();
    format!("{}.json", &digest[..KEY_HEX_LEN])
}

/// One canonical JSON file per subject under a directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: Utf8PathBuf,
}

impl FileCheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, subject: &str) -> Utf8PathBuf {
        self.dir.join(checkpoint_file_name(subject))
    }

    fn encode(checkpoint: &Checkpoint) -> Result<String, CheckpointError> {
        let value = serde_json::to_value(checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        let bytes = serde_json_canonicalizer::to_vec(&value)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn has(&self, subject: &str) -> Result<bool, CheckpointError> {
        let path = self.path_for(subject);
        path.try_exists().map_err(|e| CheckpointError::Io {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn load(&self, subject: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(subject);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Io {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let corrupt = |reason: String| CheckpointError::Corrupt {
            subject: subject.to_string(),
            reason,
        };

        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if checkpoint.subject != subject {
            warn!(path = %path, stored = %checkpoint.subject, "Checkpoint subject mismatch");
            return Err(corrupt(format!(
                "file belongs to subject '{}'",
                checkpoint.subject
            )));
        }
        checkpoint.check_consistency().map_err(corrupt)?;

        debug!(
            subject = %subject,
            last_complete_stage = checkpoint.last_complete_stage.index(),
            "Loaded checkpoint"
        );
        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(&checkpoint.subject);
        let content = Self::encode(checkpoint)?;
        write_file_atomic(&path, &content).map_err(|e| CheckpointError::Io {
            path: path.to_string(),
            reason: format!("{e:#}"),
        })?;
        debug!(
            subject = %checkpoint.subject,
            stage = checkpoint.last_complete_stage.index(),
            path = %path,
            "Saved checkpoint"
        );
        Ok(())
    }

    fn clear(&self, subject: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(subject);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(subject = %subject, "Cleared checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Io {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Checkpoint>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn has(&self, subject: &str) -> Result<bool, CheckpointError> {
        Ok(self.entries().contains_key(subject))
    }

    fn load(&self, subject: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.entries().get(subject).cloned())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.entries()
            .insert(checkpoint.subject.clone(), checkpoint.clone());
        Ok(())
    }

    fn clear(&self, subject: &str) -> Result<(), CheckpointError> {
        self.entries().remove(subject);
        Ok(())
    }
}
