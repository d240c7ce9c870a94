//! Speech-to-text collaborator.
//!
//! Talks to a Whisper-compatible `/audio/transcriptions` endpoint (OpenAI or
//! a local server) with a multipart WAV upload. Synchronous run-to-completion
//! on the caller thread; the workflow never overlaps transcription with
//! capture.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::workflow::{Transcriber, TranscriptionError};

pub struct WhisperTranscriber {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
            base_url,
            model,
            api_key,
        }
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        let audio_data = std::fs::read(audio_path).map_err(|e| {
            TranscriptionError::MissingAudio(format!("{} ({e})", audio_path.display()))
        })?;

        let file_name = audio_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file_part = reqwest::blocking::multipart::Part::bytes(audio_data)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| {
                TranscriptionError::Provider(format!("Failed to create file part for upload: {e}"))
            })?;

        let form = reqwest::blocking::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let url = format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        );
        tracing::debug!(
            "Transcription request: {} (model {}, file {})",
            url,
            self.model,
            audio_path.display()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| {
                let message = if e.is_connect() {
                    format!("Failed to connect to transcription server at {url}. Is it running?")
                } else if e.is_timeout() {
                    "Transcription request timed out. The server is not responding.".to_string()
                } else {
                    format!("Transcription network error: {e}")
                };
                TranscriptionError::Provider(message)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());

            let human_readable = match status.as_u16() {
                401 => "Transcription API key is invalid or expired.".to_string(),
                429 => "Too many requests to the transcription server. Please wait and try again."
                    .to_string(),
                500..=504 => {
                    "Transcription server is experiencing issues. Please try again later."
                        .to_string()
                }
                _ => format!("Transcription API error (status {status}): {error_body}"),
            };
            return Err(TranscriptionError::Provider(human_readable));
        }

        let parsed: TranscriptionResponse = response.json().map_err(|e| {
            TranscriptionError::Provider(format!("Failed to parse response: {e}"))
        })?;

        let text = parsed.text.trim().to_string();
        tracing::debug!("Transcription response: {} characters", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_missing_audio_error() {
        let transcriber = WhisperTranscriber::new(
            "http://localhost:8080/v1".to_string(),
            "whisper-1".to_string(),
            "test-key".to_string(),
        );

        let err = transcriber
            .transcribe(Path::new("/nonexistent/recording.wav"))
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::MissingAudio(_)));
        assert!(err.to_string().contains("/nonexistent/recording.wav"));
    }
}
