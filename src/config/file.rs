//! Configuration file management for audiomail.
//!
//! Loads application configuration from a TOML file in the user's config
//! directory. A missing file is populated with defaults on first run so the
//! tool works out of the box against a local inference server.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) from `audiomail list-devices`
    /// - device name from `audiomail list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Recording sample rate in Hz (16000 recommended for speech recognition)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Number of recording channels
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Maximum recording duration in seconds before capture is cut off
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,
    /// Keep recordings on disk after transcription
    #[serde(default)]
    pub save_recordings: bool,
    /// Directory for retained recordings
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_max_duration_secs() -> f64 {
    300.0
}

fn default_recordings_dir() -> PathBuf {
    PathBuf::from("recordings")
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            max_duration_secs: default_max_duration_secs(),
            save_recordings: false,
            recordings_dir: default_recordings_dir(),
        }
    }
}

/// Transcription endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Base URL of a Whisper-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

fn default_api_key_env() -> String {
    "AUDIOMAIL_API_KEY".to_string()
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_whisper_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Generation endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_llm_model() -> String {
    "Qwen/Qwen3-4B".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Sampling policy for generation, fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_true")]
    pub do_sample: bool,
}

fn default_max_new_tokens() -> u32 {
    512
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.95
}

fn default_true() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            do_sample: default_true(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudiomailConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl AudiomailConfig {
    /// Loads configuration from the user's config directory, writing the
    /// defaults first if no config file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            tracing::info!("Created default configuration at {}", config_path.display());
            return Ok(config);
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: AudiomailConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    /// Reads the API key for an endpoint from the configured environment
    /// variable. Missing keys fall back to an empty bearer token, which local
    /// servers accept.
    pub fn api_key(env_name: &str) -> String {
        std::env::var(env_name).unwrap_or_default()
    }
}

/// Retrieves the path to the config file, creating the directory if needed.
pub fn config_path() -> Result<PathBuf, std::io::Error> {
    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    let config_path = home.join(".config").join("audiomail").join("audiomail.toml");

    std::fs::create_dir_all(config_path.parent().unwrap())?;

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_positive() {
        let config = AudiomailConfig::default();
        assert!(config.audio.sample_rate > 0);
        assert!(config.audio.channels > 0);
        assert!(config.audio.max_duration_secs > 0.0);
        assert_eq!(config.audio.device, "default");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AudiomailConfig = toml::from_str(
            r#"
            [audio]
            sample_rate = 44100
            save_recordings = true
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.sample_rate, 44100);
        assert!(config.audio.save_recordings);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.generation.max_new_tokens, 512);
        assert_eq!(config.llm.model, "Qwen/Qwen3-4B");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = AudiomailConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let reparsed: AudiomailConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.audio.sample_rate, config.audio.sample_rate);
        assert_eq!(reparsed.generation.top_p, config.generation.top_p);
    }
}
