//! Recording persistence.
//!
//! Saves captured PCM samples as an uncompressed 16-bit WAV file, either under
//! the configured recordings directory (retention on) or in the system temp
//! dir (disposable, deleted once transcription succeeds).

use anyhow::{Context, Result};
use chrono::Local;
use hound::WavWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a stored recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRef {
    pub path: PathBuf,
    /// Disposable recordings are deleted after transcription; retained ones
    /// stay on disk.
    pub disposable: bool,
}

impl AudioRef {
    /// Deletes the file if it is disposable. Deletion failures are logged,
    /// not propagated: a leftover temp file is harmless.
    pub fn discard(&self) {
        if !self.disposable {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temporary audio file: {}", self.path.display()),
            Err(e) => tracing::warn!(
                "Could not delete temp audio file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Writes samples to a timestamped WAV file.
///
/// `recordings_dir` is used when `retain` is set; otherwise the file lands in
/// the system temp dir and is marked disposable.
///
/// # Errors
/// - If the target directory cannot be created
/// - If the WAV file cannot be written
pub fn persist(
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
    retain: bool,
    recordings_dir: &Path,
) -> Result<AudioRef> {
    let path = if retain {
        std::fs::create_dir_all(recordings_dir).with_context(|| {
            format!(
                "Failed to create recordings directory {}",
                recordings_dir.display()
            )
        })?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        recordings_dir.join(format!("audio_{timestamp}.wav"))
    } else {
        // Ephemeral path; pid + sequence keeps concurrent captures apart.
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "audiomail_{}_{}.wav",
            std::process::id(),
            seq
        ))
    };

    write_wav(samples, sample_rate, channels, &path)?;

    if retain {
        tracing::info!("Recording saved to {}", path.display());
    } else {
        tracing::debug!("Temporary recording at {}", path.display());
    }

    Ok(AudioRef {
        path,
        disposable: !retain,
    })
}

fn write_wav(samples: &[i16], sample_rate: u32, channels: u16, path: &Path) -> Result<()> {
    let wav_spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, wav_spec)
        .with_context(|| format!("Failed to create WAV file {}", path.display()))?;

    for &sample in samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    tracing::debug!(
        "WAV written: {} ({} samples at {}Hz)",
        path.display(),
        samples.len(),
        sample_rate
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_disposable_and_discard() {
        let samples: Vec<i16> = (0..1600).map(|i| (i % 100) as i16 * 100).collect();
        let audio = persist(&samples, 16000, 1, false, Path::new("unused")).unwrap();

        assert!(audio.disposable);
        assert!(audio.path.exists());

        audio.discard();
        assert!(!audio.path.exists());
    }

    #[test]
    fn test_persist_retained_is_kept_on_discard() {
        let dir = std::env::temp_dir().join(format!("audiomail_test_{}", std::process::id()));
        let samples = vec![1000i16; 320];
        let audio = persist(&samples, 16000, 1, true, &dir).unwrap();

        assert!(!audio.disposable);
        assert!(audio.path.exists());
        let name = audio.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("audio_"));
        assert!(name.ends_with(".wav"));

        audio.discard();
        assert!(audio.path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wav_roundtrip_preserves_samples() {
        let dir = std::env::temp_dir().join(format!("audiomail_rt_{}", std::process::id()));
        let samples: Vec<i16> = vec![0, 100, -100, i16::MAX, i16::MIN, 42];
        let audio = persist(&samples, 16000, 1, true, &dir).unwrap();

        let mut reader = hound::WavReader::open(&audio.path).unwrap();
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);

        std::fs::remove_dir_all(&dir).ok();
    }
}
