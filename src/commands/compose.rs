//! The main voice-to-email flow.
//!
//! Records spoken instructions, transcribes them, drafts an email, then loops
//! on voice feedback: each refinement round records and transcribes feedback
//! into a secondary workflow state so the primary draft is never clobbered
//! mid-capture.

use anyhow::{anyhow, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::capture::{self, CaptureConfig, CaptureResult, CpalBackend, KeyPressSource};
use crate::config::AudiomailConfig;
use crate::generation::openai::SamplingSettings;
use crate::generation::OpenAiGenerator;
use crate::transcription::WhisperTranscriber;
use crate::workflow::engine::RetentionPolicy;
use crate::workflow::{AudioSource, Phase, WorkflowEngine, WorkflowState};

/// Key that stops a recording (Enter and Esc work too).
const STOP_KEY: char = 's';

/// Microphone-backed audio source. Holds the terminal in raw mode for the
/// duration of each capture so the stop key can be polled without echo.
struct Microphone {
    backend: CpalBackend,
    config: CaptureConfig,
    stop_source: Arc<KeyPressSource>,
}

impl AudioSource for Microphone {
    fn capture(&self) -> CaptureResult {
        let _raw = RawModeGuard::enable();
        capture::record(&self.backend, &self.config, self.stop_source.clone())
    }
}

/// Puts the terminal in raw mode, restoring it on drop so every capture exit
/// path (including errors) leaves the terminal usable.
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        let enabled = crossterm::terminal::enable_raw_mode().is_ok();
        if !enabled {
            tracing::warn!("Could not enable raw mode; stop key may require Enter");
        }
        Self { enabled }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = crossterm::terminal::disable_raw_mode();
        }
    }
}

/// Runs the full workflow: record, transcribe, draft, then refinement rounds
/// driven by spoken feedback.
pub fn handle_compose() -> Result<()> {
    tracing::info!("=== audiomail compose started ===");

    let config = AudiomailConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {e}");
        anyhow!("Configuration error: {e}. Check your ~/.config/audiomail/audiomail.toml file.")
    })?;

    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, channels={}, max_duration={}s",
        config.audio.device,
        config.audio.sample_rate,
        config.audio.channels,
        config.audio.max_duration_secs
    );

    let engine = build_engine(&config);
    let mut state = WorkflowState::new();

    announce_recording();
    engine.run(&mut state)?;

    if state.phase == Phase::Error {
        let reason = state
            .failure_reason
            .unwrap_or_else(|| "Unknown failure".to_string());
        eprintln!("\nError: {reason}");
        return Err(anyhow!(reason));
    }

    println!("\nTranscription:");
    println!("{}", state.transcription.as_deref().unwrap_or_default());
    println!("\nDrafted Email:");
    println!("{}", state.email_draft.as_deref().unwrap_or_default());

    // Refinement rounds: each one is a fresh record -> transcribe pass whose
    // transcript becomes feedback for the existing draft.
    loop {
        if !ask_yes_no("\nWould you like to refine the email? (y/n): ")? {
            break;
        }

        println!("\nPlease provide your voice feedback for improving the email...");
        let feedback = match collect_voice_feedback(&engine) {
            Ok(feedback) => feedback,
            Err(reason) => {
                eprintln!("\nError: {reason}");
                continue;
            }
        };

        println!("\nTranscribed Feedback:");
        println!("{feedback}");

        state.merge_feedback(&feedback);
        state.needs_refinement = true;
        engine.refine_round(&mut state);

        if state.phase == Phase::Error {
            let reason = state
                .failure_reason
                .unwrap_or_else(|| "Unknown failure".to_string());
            eprintln!("\nError: {reason}");
            return Err(anyhow!(reason));
        }

        println!("\nRefined Email:");
        println!("{}", state.email_draft.as_deref().unwrap_or_default());
    }

    tracing::info!("=== audiomail compose exited successfully ===");
    Ok(())
}

fn build_engine(
    config: &AudiomailConfig,
) -> WorkflowEngine<Microphone, WhisperTranscriber, OpenAiGenerator> {
    let capture_config = CaptureConfig {
        sample_rate: config.audio.sample_rate,
        channels: config.audio.channels,
        max_duration_secs: config.audio.max_duration_secs,
    };

    let microphone = Microphone {
        backend: CpalBackend::new(config.audio.device.clone()),
        config: capture_config.clone(),
        stop_source: Arc::new(KeyPressSource::new(STOP_KEY)),
    };

    let transcriber = WhisperTranscriber::new(
        config.whisper.base_url.clone(),
        config.whisper.model.clone(),
        AudiomailConfig::api_key(&config.whisper.api_key_env),
    );

    let generator = OpenAiGenerator::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        AudiomailConfig::api_key(&config.llm.api_key_env),
        SamplingSettings {
            max_new_tokens: config.generation.max_new_tokens,
            temperature: config.generation.temperature,
            top_p: config.generation.top_p,
            do_sample: config.generation.do_sample,
        },
    );

    WorkflowEngine::new(
        microphone,
        transcriber,
        generator,
        capture_config,
        RetentionPolicy {
            save_recordings: config.audio.save_recordings,
            recordings_dir: config.audio.recordings_dir.clone(),
        },
    )
}

fn announce_recording() {
    println!("\nRecording... Press '{STOP_KEY}' to stop");
    println!("Speak your message now...");
}

/// Records and transcribes one round of feedback using a secondary state.
///
/// Returns the transcript, or the failure reason when capture or
/// transcription failed.
fn collect_voice_feedback(
    engine: &WorkflowEngine<Microphone, WhisperTranscriber, OpenAiGenerator>,
) -> std::result::Result<String, String> {
    let mut feedback_state = WorkflowState::new();

    announce_recording();
    engine
        .record(&mut feedback_state)
        .map_err(|e| e.to_string())?;
    if feedback_state.phase != Phase::Error {
        engine.transcribe(&mut feedback_state);
    }

    if feedback_state.phase == Phase::Error {
        return Err(feedback_state
            .failure_reason
            .unwrap_or_else(|| "Unknown failure".to_string()));
    }

    feedback_state
        .transcription
        .ok_or_else(|| "Feedback transcription was empty".to_string())
}

/// Line-oriented yes/no prompt, re-asking until the answer is recognizable.
fn ask_yes_no(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    loop {
        print!("{question}");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;

        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer 'yes'/'y' or 'no'/'n'"),
        }
    }
}
