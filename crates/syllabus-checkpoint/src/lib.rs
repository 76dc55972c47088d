//! Checkpoint persistence for resumable generation runs.
//!
//! After every completed stage the engine saves a [`Checkpoint`] holding all
//! outputs produced so far. A resumed run loads it and starts at the first
//! incomplete stage. Snapshots are canonical JSON (RFC 8785) written
//! atomically, one file per subject.

mod model;
mod store;

pub use model::{CHECKPOINT_VERSION, Checkpoint, StageOutputs};
pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, checkpoint_file_name};
