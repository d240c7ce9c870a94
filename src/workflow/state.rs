//! Shared state record flowing through a workflow run.

use crate::capture::AudioRef;

/// Phase of the drafting workflow. `Completed` and `Error` are terminal for a
/// run; the engine may be re-invoked with the same state for another
/// refinement round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording,
    Transcribing,
    Drafting,
    Refining,
    Completed,
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::Drafting => "drafting",
            Self::Refining => "refining",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Mutable record carried through one workflow run.
///
/// A second, independent state is used when capturing refinement feedback so
/// the primary draft is never clobbered mid-capture.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Handle to the captured recording, set after a successful record step.
    pub audio: Option<AudioRef>,
    pub transcription: Option<String>,
    pub email_draft: Option<String>,
    /// Accumulated user feedback driving refinement.
    pub feedback: Option<String>,
    /// Set only by the external caller between runs, after reviewing a draft.
    pub needs_refinement: bool,
    pub phase: Phase,
    pub failure_reason: Option<String>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            audio: None,
            transcription: None,
            email_draft: None,
            feedback: None,
            needs_refinement: false,
            phase: Phase::Idle,
            failure_reason: None,
        }
    }

    /// Moves the state to the terminal error phase with a human-readable
    /// cause.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!("Workflow failed in phase {}: {}", self.phase, reason);
        self.failure_reason = Some(reason);
        self.phase = Phase::Error;
    }

    /// Merges a new round of feedback into the accumulated feedback field.
    pub fn merge_feedback(&mut self, new_feedback: &str) {
        match &mut self.feedback {
            Some(existing) if !existing.is_empty() => {
                existing.push('\n');
                existing.push_str(new_feedback);
            }
            _ => self.feedback = Some(new_feedback.to_string()),
        }
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}
