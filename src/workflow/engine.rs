//! Workflow engine: explicit state machine over capture, transcription, and
//! generation collaborators.
//!
//! Each step runs inside its phase and either completes or moves the state to
//! the terminal error phase; the success edge to the next phase comes from
//! `next_phase`, evaluated once per step. Collaborator faults never cross the
//! engine boundary as panics or errors — callers observe state. Only genuine
//! environment faults (a failed recording write) propagate as `Err`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::state::{Phase, WorkflowState};
use super::{AudioSource, Generator, Transcriber, TranscriptionError};
use crate::capture::{storage, CaptureConfig, CaptureResult};
use crate::generation::{extract_draft, ChatPrompt, PromptCache};

/// Success-edge transition function.
///
/// The Drafting edge is conditional: Refining is entered only when
/// `needs_refinement` is true at evaluation time, which only an external
/// caller sets between runs. Error edges are taken inside the steps.
pub fn next_phase(phase: Phase, state: &WorkflowState) -> Phase {
    match phase {
        Phase::Idle => Phase::Recording,
        Phase::Recording => Phase::Transcribing,
        Phase::Transcribing => Phase::Drafting,
        Phase::Drafting => {
            if state.needs_refinement {
                Phase::Refining
            } else {
                Phase::Completed
            }
        }
        Phase::Refining => Phase::Completed,
        Phase::Completed => Phase::Completed,
        Phase::Error => Phase::Error,
    }
}

/// Retention policy for captured recordings.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Keep recordings on disk after transcription.
    pub save_recordings: bool,
    pub recordings_dir: PathBuf,
}

pub struct WorkflowEngine<A, T, G> {
    audio: A,
    transcriber: T,
    generator: G,
    cache: PromptCache,
    capture_config: CaptureConfig,
    retention: RetentionPolicy,
}

impl<A, T, G> WorkflowEngine<A, T, G>
where
    A: AudioSource,
    T: Transcriber,
    G: Generator,
{
    pub fn new(
        audio: A,
        transcriber: T,
        generator: G,
        capture_config: CaptureConfig,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            audio,
            transcriber,
            generator,
            cache: PromptCache::new(),
            capture_config,
            retention,
        }
    }

    /// Drives the state machine from its current phase to a terminal phase.
    pub fn run(&self, state: &mut WorkflowState) -> Result<()> {
        if state.phase == Phase::Idle {
            state.phase = next_phase(Phase::Idle, state);
        }

        loop {
            match state.phase {
                Phase::Recording => self.record(state)?,
                Phase::Transcribing => self.transcribe(state),
                Phase::Drafting => self.draft(state),
                Phase::Refining => self.refine(state),
                Phase::Idle | Phase::Completed | Phase::Error => break,
            }
            if state.phase == Phase::Error {
                break;
            }
            state.phase = next_phase(state.phase, state);
            if state.phase == Phase::Completed {
                break;
            }
        }

        Ok(())
    }

    /// Records one capture session and persists the result.
    ///
    /// Capture failures (no device, stream fault, empty or silent signal)
    /// move the state to the error phase; a failed write of a successfully
    /// captured recording is an environment fault and propagates.
    pub fn record(&self, state: &mut WorkflowState) -> Result<()> {
        state.phase = Phase::Recording;
        tracing::info!("Recording started");

        match self.audio.capture() {
            CaptureResult::Success { samples, duration } => {
                let audio = storage::persist(
                    &samples,
                    self.capture_config.sample_rate,
                    self.capture_config.channels,
                    self.retention.save_recordings,
                    &self.retention.recordings_dir,
                )
                .context("Failed to store captured recording")?;
                tracing::info!(
                    "Captured {:.2}s of audio to {}",
                    duration.as_secs_f64(),
                    audio.path.display()
                );
                state.audio = Some(audio);
            }
            CaptureResult::Empty => {
                state.fail("No audio was recorded. Please try again.");
            }
            CaptureResult::Silent => {
                state.fail("Recording appears to be silent. Please check your microphone.");
            }
            CaptureResult::DeviceError { message } => state.fail(message),
            CaptureResult::StreamError { message } => state.fail(message),
        }

        Ok(())
    }

    /// Transcribes the referenced recording. Disposable audio is deleted only
    /// after the transcription call returns successfully.
    pub fn transcribe(&self, state: &mut WorkflowState) {
        state.phase = Phase::Transcribing;

        let Some(audio) = state.audio.clone() else {
            state.fail("No recorded audio to transcribe.");
            return;
        };

        if !audio.path.exists() {
            state.fail(
                TranscriptionError::MissingAudio(audio.path.display().to_string()).to_string(),
            );
            return;
        }

        match self.transcriber.transcribe(&audio.path) {
            Ok(text) => {
                tracing::info!("Transcription completed: {} characters", text.len());
                state.transcription = Some(text);
                audio.discard();
            }
            Err(e) => state.fail(e.to_string()),
        }
    }

    /// Drafts the email from the transcription. Never sets
    /// `needs_refinement`; drafting always forces it false.
    pub fn draft(&self, state: &mut WorkflowState) {
        state.phase = Phase::Drafting;

        let Some(transcription) = state.transcription.clone() else {
            state.fail("No transcription available for drafting.");
            return;
        };

        let prompt = ChatPrompt::draft(&transcription);
        match self.generate_with_cache(&prompt) {
            Ok(response) => {
                state.email_draft = Some(extract_draft(&response));
                state.needs_refinement = false;
            }
            Err(reason) => state.fail(reason),
        }
    }

    /// Replaces the draft with a refined version addressing the accumulated
    /// feedback. Distinct from drafting: a refinement round never re-enters
    /// the draft step.
    pub fn refine(&self, state: &mut WorkflowState) {
        state.phase = Phase::Refining;

        let Some(draft) = state.email_draft.clone() else {
            state.fail("No draft available to refine.");
            return;
        };
        let Some(feedback) = state.feedback.clone() else {
            state.fail("No feedback available to refine with.");
            return;
        };

        let prompt = ChatPrompt::refine(&draft, &feedback);
        match self.generate_with_cache(&prompt) {
            Ok(response) => {
                state.email_draft = Some(response.trim().to_string());
                state.needs_refinement = false;
            }
            Err(reason) => state.fail(reason),
        }
    }

    /// Runs one refinement round on a state whose caller has set
    /// `needs_refinement` and merged in fresh feedback.
    pub fn refine_round(&self, state: &mut WorkflowState) {
        self.refine(state);
        if state.phase != Phase::Error {
            state.phase = next_phase(Phase::Refining, state);
        }
    }

    fn generate_with_cache(&self, prompt: &ChatPrompt) -> std::result::Result<String, String> {
        let input = self
            .cache
            .prepare(&self.generator, prompt)
            .map_err(|e| e.to_string())?;
        self.generator
            .generate(&input)
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::PreparedInput;
    use crate::workflow::GenerationError;
    use std::path::Path;
    use std::time::Duration;

    struct StubAudio {
        result: CaptureResult,
    }

    impl AudioSource for StubAudio {
        fn capture(&self) -> CaptureResult {
            self.result.clone()
        }
    }

    struct StubTranscriber {
        result: Result<String, TranscriptionError>,
    }

    impl Transcriber for StubTranscriber {
        fn transcribe(&self, _audio_path: &Path) -> Result<String, TranscriptionError> {
            self.result.clone()
        }
    }

    /// Deterministic generator: drafting returns a JSON draft derived from
    /// the transcription, refinement echoes draft plus feedback.
    struct StubGenerator;

    impl Generator for StubGenerator {
        fn prepare(&self, prompt: &ChatPrompt) -> Result<PreparedInput, GenerationError> {
            Ok(PreparedInput {
                rendered: prompt.rendered(),
                body: serde_json::Value::Null,
            })
        }

        fn generate(&self, input: &PreparedInput) -> Result<String, GenerationError> {
            if input.rendered.contains("User Feedback:") {
                Ok("Refined email honoring the feedback".to_string())
            } else {
                Ok(r#"{"email_draft": "Subject: Status\n\nDear Team, all good."}"#.to_string())
            }
        }
    }

    fn loud_capture() -> CaptureResult {
        CaptureResult::Success {
            samples: vec![5000; 16000],
            duration: Duration::from_secs(1),
        }
    }

    fn engine(
        capture: CaptureResult,
        transcriber: Result<String, TranscriptionError>,
    ) -> WorkflowEngine<StubAudio, StubTranscriber, StubGenerator> {
        WorkflowEngine::new(
            StubAudio { result: capture },
            StubTranscriber {
                result: transcriber,
            },
            StubGenerator,
            CaptureConfig {
                sample_rate: 16000,
                channels: 1,
                max_duration_secs: 300.0,
            },
            RetentionPolicy {
                save_recordings: false,
                recordings_dir: PathBuf::from("recordings"),
            },
        )
    }

    #[test]
    fn test_round_trip_from_idle_to_completed() {
        let engine = engine(loud_capture(), Ok("Send the report tomorrow".to_string()));
        let mut state = WorkflowState::new();

        engine.run(&mut state).unwrap();

        assert_eq!(state.phase, Phase::Completed);
        assert!(!state.needs_refinement);
        assert_eq!(
            state.transcription.as_deref(),
            Some("Send the report tomorrow")
        );
        let draft = state.email_draft.as_deref().unwrap();
        assert!(!draft.is_empty());
        assert!(draft.starts_with("Subject: Status"));
        // Disposable audio is deleted once transcription completes.
        assert!(!state.audio.unwrap().path.exists());
    }

    #[test]
    fn test_empty_capture_moves_to_error() {
        let engine = engine(CaptureResult::Empty, Ok(String::new()));
        let mut state = WorkflowState::new();

        engine.run(&mut state).unwrap();

        assert_eq!(state.phase, Phase::Error);
        assert!(state
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("No audio was recorded"));
    }

    #[test]
    fn test_silent_capture_moves_to_error() {
        let engine = engine(CaptureResult::Silent, Ok(String::new()));
        let mut state = WorkflowState::new();

        engine.run(&mut state).unwrap();

        assert_eq!(state.phase, Phase::Error);
        assert!(state.failure_reason.as_deref().unwrap().contains("silent"));
    }

    #[test]
    fn test_device_error_moves_to_error() {
        let engine = engine(
            CaptureResult::DeviceError {
                message: "No input devices found.".to_string(),
            },
            Ok(String::new()),
        );
        let mut state = WorkflowState::new();

        engine.run(&mut state).unwrap();

        assert_eq!(state.phase, Phase::Error);
        assert_eq!(
            state.failure_reason.as_deref(),
            Some("No input devices found.")
        );
    }

    #[test]
    fn test_transcription_failure_moves_to_error() {
        let engine = engine(
            loud_capture(),
            Err(TranscriptionError::Provider("rate limited".to_string())),
        );
        let mut state = WorkflowState::new();

        engine.run(&mut state).unwrap();

        assert_eq!(state.phase, Phase::Error);
        assert!(state
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("rate limited"));
    }

    #[test]
    fn test_missing_audio_file_moves_to_error() {
        let engine = engine(loud_capture(), Ok(String::new()));
        let mut state = WorkflowState::new();
        state.audio = Some(crate::capture::AudioRef {
            path: PathBuf::from("/nonexistent/audio_00000000_000000.wav"),
            disposable: true,
        });

        engine.transcribe(&mut state);

        assert_eq!(state.phase, Phase::Error);
        assert!(state
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("Audio file not found"));
    }

    #[test]
    fn test_refinement_round_replaces_draft() {
        let engine = engine(loud_capture(), Ok("transcript".to_string()));
        let mut state = WorkflowState::new();
        engine.run(&mut state).unwrap();
        assert_eq!(state.phase, Phase::Completed);
        let original = state.email_draft.clone().unwrap();

        // External caller reviews the draft and supplies feedback.
        state.merge_feedback("make it shorter");
        state.needs_refinement = true;
        engine.refine_round(&mut state);

        assert_eq!(state.phase, Phase::Completed);
        assert!(!state.needs_refinement);
        let refined = state.email_draft.unwrap();
        assert_ne!(refined, original);
        assert!(refined.contains("Refined"));
    }

    #[test]
    fn test_drafting_edge_is_conditional_on_flag() {
        let state = WorkflowState::new();
        assert_eq!(next_phase(Phase::Drafting, &state), Phase::Completed);

        let mut flagged = WorkflowState::new();
        flagged.needs_refinement = true;
        assert_eq!(next_phase(Phase::Drafting, &flagged), Phase::Refining);
    }

    #[test]
    fn test_refine_without_feedback_is_an_error() {
        let engine = engine(loud_capture(), Ok(String::new()));
        let mut state = WorkflowState::new();
        state.email_draft = Some("Subject: Hi".to_string());
        state.needs_refinement = true;

        engine.refine_round(&mut state);

        assert_eq!(state.phase, Phase::Error);
    }
}
