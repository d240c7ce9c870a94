//! Prompt templates and model-output extraction.

use regex::Regex;
use std::sync::OnceLock;

/// A single-turn user prompt for the generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    /// The user message content.
    pub text: String,
}

impl ChatPrompt {
    /// Drafting prompt: turn a transcription into a professional email,
    /// returned as JSON so the draft can be extracted reliably.
    pub fn draft(transcription: &str) -> Self {
        let text = format!(
            "You are an expert email assistant. Based on the following \
             transcription, draft a professional email. The email should \
             have a clear subject, a proper salutation, and a body that \
             reflects the transcription's content.\n\n\
             Transcription: \"{transcription}\"\n\n\
             Return the complete email as a JSON object with a single \
             key: 'email_draft'. The value should be a single string \
             containing the entire email, with newlines for formatting."
        );
        Self { text }
    }

    /// Refinement prompt: improve the prior draft using the user's feedback.
    pub fn refine(draft: &str, feedback: &str) -> Self {
        let text = format!(
            "Please refine the following email draft based on the user's feedback:\n\
             Original Draft:\n{draft}\n\n\
             User Feedback:\n{feedback}\n\n\
             Please provide an improved version of the email that addresses \
             the feedback while maintaining professional email etiquette"
        );
        Self { text }
    }

    /// Renders the chat template to its canonical string form. Identical
    /// prompts render identically, so this is the memoization key.
    pub fn rendered(&self) -> String {
        format!("<|user|>\n{}\n<|assistant|>\n", self.text)
    }
}

fn json_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*?\}").expect("valid regex"))
}

/// Extracts the email draft from a model response.
///
/// The drafting prompt asks for a JSON object with an `email_draft` key, but
/// models pad their output; take the last JSON block in the response and fall
/// back to the trimmed raw text when nothing parses.
pub fn extract_draft(response: &str) -> String {
    let last_block = json_block_re().find_iter(response).last();

    if let Some(block) = last_block {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(block.as_str()) {
            if let Some(draft) = value.get("email_draft").and_then(|v| v.as_str()) {
                return draft.trim().to_string();
            }
        }
    }

    response.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_draft_from_json_block() {
        let response = r#"Sure, here is the email:
{"email_draft": "Subject: Hello\n\nDear Team,\n\nBest,\nMe"}"#;
        assert_eq!(
            extract_draft(response),
            "Subject: Hello\n\nDear Team,\n\nBest,\nMe"
        );
    }

    #[test]
    fn test_extract_draft_uses_last_json_block() {
        let response = r#"{"notes": "thinking"} and finally {"email_draft": "Subject: Final"}"#;
        assert_eq!(extract_draft(response), "Subject: Final");
    }

    #[test]
    fn test_extract_draft_falls_back_to_raw_text() {
        let response = "  Subject: Plain text email\n\nNo JSON here.  ";
        assert_eq!(
            extract_draft(response),
            "Subject: Plain text email\n\nNo JSON here."
        );

        let invalid = "{not valid json}";
        assert_eq!(extract_draft(invalid), "{not valid json}");
    }

    #[test]
    fn test_identical_prompts_render_identically() {
        let a = ChatPrompt::draft("send the report by Friday");
        let b = ChatPrompt::draft("send the report by Friday");
        assert_eq!(a.rendered(), b.rendered());

        let c = ChatPrompt::refine("draft", "feedback");
        assert_ne!(a.rendered(), c.rendered());
    }
}
