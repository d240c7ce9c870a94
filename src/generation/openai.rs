//! OpenAI-compatible chat-completions generator.
//!
//! Works against any endpoint speaking the `/chat/completions` protocol
//! (OpenAI, or a local server in front of a Qwen-class model). Calls are
//! synchronous run-to-completion on the caller thread; capture never overlaps
//! generation.

use serde::Deserialize;
use std::time::Duration;

use super::{ChatPrompt, PreparedInput};
use crate::workflow::{GenerationError, Generator};

/// Sampling policy configured once at startup.
#[derive(Debug, Clone)]
pub struct SamplingSettings {
    pub max_new_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    /// When false, generation is greedy (temperature forced to zero).
    pub do_sample: bool,
}

pub struct OpenAiGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
    sampling: SamplingSettings,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiGenerator {
    pub fn new(
        base_url: String,
        model: String,
        api_key: String,
        sampling: SamplingSettings,
    ) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
            base_url,
            model,
            api_key,
            sampling,
        }
    }
}

impl Generator for OpenAiGenerator {
    fn prepare(&self, prompt: &ChatPrompt) -> Result<PreparedInput, GenerationError> {
        let temperature = if self.sampling.do_sample {
            self.sampling.temperature
        } else {
            0.0
        };

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt.text }],
            "max_tokens": self.sampling.max_new_tokens,
            "temperature": temperature,
            "top_p": self.sampling.top_p,
        });

        Ok(PreparedInput {
            rendered: prompt.rendered(),
            body,
        })
    }

    fn generate(&self, input: &PreparedInput) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        tracing::debug!(
            "Generation request: {} (model {}, {} prompt chars)",
            url,
            self.model,
            input.rendered.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&input.body)
            .send()
            .map_err(|e| {
                let message = if e.is_connect() {
                    format!("Failed to connect to generation server at {url}. Is it running?")
                } else if e.is_timeout() {
                    "Generation request timed out. The server is not responding.".to_string()
                } else {
                    format!("Generation network error: {e}")
                };
                GenerationError::Provider(message)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());

            let human_readable = match status.as_u16() {
                401 => "Generation API key is invalid or expired.".to_string(),
                429 => "Too many requests to the generation server. Please wait and try again."
                    .to_string(),
                500..=504 => {
                    "Generation server is experiencing issues. Please try again later.".to_string()
                }
                _ => format!("Generation API error (status {status}): {error_body}"),
            };
            return Err(GenerationError::Provider(human_readable));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| GenerationError::Provider(format!("Failed to parse response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                GenerationError::Provider("Response contained no choices".to_string())
            })?;

        tracing::debug!("Generation completed: {} characters", text.len());
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(do_sample: bool) -> OpenAiGenerator {
        OpenAiGenerator::new(
            "http://localhost:8080/v1".to_string(),
            "qwen3-4b".to_string(),
            "test-key".to_string(),
            SamplingSettings {
                max_new_tokens: 512,
                temperature: 0.7,
                top_p: 0.95,
                do_sample,
            },
        )
    }

    #[test]
    fn test_prepare_carries_sampling_policy() {
        let input = generator(true)
            .prepare(&ChatPrompt::draft("hello"))
            .unwrap();

        assert_eq!(input.body["model"], "qwen3-4b");
        assert_eq!(input.body["max_tokens"], 512);
        assert_eq!(input.body["temperature"], 0.7);
        assert_eq!(input.body["top_p"], 0.95);
        assert_eq!(input.body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_prepare_without_sampling_is_greedy() {
        let input = generator(false)
            .prepare(&ChatPrompt::draft("hello"))
            .unwrap();
        assert_eq!(input.body["temperature"], 0.0);
    }
}
