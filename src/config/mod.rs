//! Configuration management for audiomail.
//!
//! All runtime settings come from a TOML file in the user's config directory
//! and are passed down as explicitly constructed objects; there are no
//! ambient singletons.

pub mod file;

pub use file::{
    config_path, AudioConfig, AudiomailConfig, GenerationConfig, LlmConfig, WhisperConfig,
};
