//! Memoization of prepared prompts.
//!
//! Identical prompt text renders to identical prepared input, so entries are
//! never invalidated within a process. The cache is unbounded; prompt variety
//! within one run is small. A duplicate preparation under a race would be
//! idempotent, so one exclusive lock around read-check-insert is enough.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{ChatPrompt, PreparedInput};
use crate::workflow::{GenerationError, Generator};

#[derive(Default)]
pub struct PromptCache {
    entries: Mutex<HashMap<String, Arc<PreparedInput>>>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the prepared input for a prompt, invoking the generator's
    /// preparation step only on the first sighting of the rendered text.
    pub fn prepare(
        &self,
        generator: &dyn Generator,
        prompt: &ChatPrompt,
    ) -> Result<Arc<PreparedInput>, GenerationError> {
        let key = prompt.rendered();
        let mut entries = self.entries.lock().unwrap();

        if let Some(hit) = entries.get(&key) {
            tracing::debug!("Prompt cache hit ({} entries)", entries.len());
            return Ok(Arc::clone(hit));
        }

        let prepared = Arc::new(generator.prepare(prompt)?);
        entries.insert(key, Arc::clone(&prepared));
        tracing::debug!("Prompt cache miss, now {} entries", entries.len());
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        prepare_calls: AtomicUsize,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                prepare_calls: AtomicUsize::new(0),
            }
        }
    }

    impl Generator for CountingGenerator {
        fn prepare(&self, prompt: &ChatPrompt) -> Result<PreparedInput, GenerationError> {
            self.prepare_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PreparedInput {
                rendered: prompt.rendered(),
                body: serde_json::json!({ "content": prompt.text }),
            })
        }

        fn generate(&self, input: &PreparedInput) -> Result<String, GenerationError> {
            Ok(input.rendered.clone())
        }
    }

    #[test]
    fn test_identical_prompts_prepare_once() {
        let cache = PromptCache::new();
        let generator = CountingGenerator::new();
        let prompt = ChatPrompt::draft("hello");

        let first = cache.prepare(&generator, &prompt).unwrap();
        let second = cache.prepare(&generator, &prompt).unwrap();

        assert_eq!(generator.prepare_calls.load(Ordering::SeqCst), 1);
        // Hits share the same prepared input.
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_differing_prompts_prepare_twice() {
        let cache = PromptCache::new();
        let generator = CountingGenerator::new();

        cache
            .prepare(&generator, &ChatPrompt::draft("hello"))
            .unwrap();
        cache
            .prepare(&generator, &ChatPrompt::draft("goodbye"))
            .unwrap();

        assert_eq!(generator.prepare_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_preparation_failure_is_not_cached() {
        struct FailingOnce {
            calls: AtomicUsize,
        }
        impl Generator for FailingOnce {
            fn prepare(&self, prompt: &ChatPrompt) -> Result<PreparedInput, GenerationError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(GenerationError::Preparation("transient".to_string()))
                } else {
                    Ok(PreparedInput {
                        rendered: prompt.rendered(),
                        body: serde_json::Value::Null,
                    })
                }
            }
            fn generate(&self, _input: &PreparedInput) -> Result<String, GenerationError> {
                Ok(String::new())
            }
        }

        let cache = PromptCache::new();
        let generator = FailingOnce {
            calls: AtomicUsize::new(0),
        };
        let prompt = ChatPrompt::draft("retry me");

        assert!(cache.prepare(&generator, &prompt).is_err());
        assert!(cache.prepare(&generator, &prompt).is_ok());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }
}
