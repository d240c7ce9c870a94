//! Email drafting via a text-generation collaborator.
//!
//! Prompt templates and draft extraction live in `prompt`, prepared-input
//! memoization in `cache`, and the OpenAI-compatible HTTP client in `openai`.

pub mod cache;
pub mod openai;
pub mod prompt;

pub use cache::PromptCache;
pub use openai::OpenAiGenerator;
pub use prompt::{extract_draft, ChatPrompt};

/// A prompt in the form the generation collaborator consumes directly.
///
/// Preparation (template rendering plus request-body construction) is
/// expensive enough that repeats are memoized by `PromptCache`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInput {
    /// Canonical rendered prompt text; doubles as the cache key.
    pub rendered: String,
    /// Request body ready for the generation endpoint.
    pub body: serde_json::Value,
}
