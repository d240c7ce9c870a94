//! Workflow state machine driving capture, transcription, and drafting.
//!
//! The engine consumes its collaborators through the traits below; the real
//! implementations live in the `capture`, `transcription`, and `generation`
//! modules, and tests substitute doubles.

pub mod engine;
pub mod state;

pub use engine::{next_phase, WorkflowEngine};
pub use state::{Phase, WorkflowState};

use std::path::Path;
use thiserror::Error;

use crate::capture::CaptureResult;
use crate::generation::{ChatPrompt, PreparedInput};

/// Collaborator failure while transcribing a recording.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranscriptionError {
    #[error("Audio file not found: {0}")]
    MissingAudio(String),

    #[error("Transcription failed: {0}")]
    Provider(String),
}

/// Collaborator failure while preparing or generating text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Prompt preparation failed: {0}")]
    Preparation(String),

    #[error("Generation failed: {0}")]
    Provider(String),
}

/// Source of captured audio: one call, one complete capture session.
pub trait AudioSource {
    fn capture(&self) -> CaptureResult;
}

/// Speech-to-text collaborator.
pub trait Transcriber {
    fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError>;
}

/// Text-generation collaborator.
///
/// `prepare` is the expensive step memoized by the prompt cache; `generate`
/// consumes a prepared input and returns the model's text.
pub trait Generator {
    fn prepare(&self, prompt: &ChatPrompt) -> Result<PreparedInput, GenerationError>;
    fn generate(&self, input: &PreparedInput) -> Result<String, GenerationError>;
}
