//! A single bounded audio capture attempt.
//!
//! The device callback produces chunks into an unbounded SPSC channel; the
//! caller blocks in a poll loop until the cancellation token is set, then
//! drains the channel in arrival order and classifies the result. No chunk is
//! drained before the token has been observed set, so classification always
//! sees the full-session view of the buffer.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use super::backend::{AudioBackend, FaultReporter, StreamHandle};
use super::token::{CancelReason, CancellationToken};

/// Poll interval shared by the wait loop and the stop watcher, bounding stop
/// latency.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Mean absolute i16 magnitude below which a recording counts as silent
/// (1% of full scale).
const SILENCE_MEAN_ABS: f64 = 327.0;

/// Immutable per-session capture parameters.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Hard cap on recording duration in seconds.
    pub max_duration_secs: f64,
}

/// Outcome of a completed capture session. Exactly one variant per attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureResult {
    /// Usable audio: interleaved i16 frames in arrival order.
    Success {
        samples: Vec<i16>,
        duration: Duration,
    },
    /// The session ended before any chunk arrived.
    Empty,
    /// Chunks arrived but the signal is below the silence threshold.
    Silent,
    /// No usable input device; no stream was opened.
    DeviceError { message: String },
    /// The stream reported a fault mid-capture.
    StreamError { message: String },
}

/// One live recording attempt against an `AudioBackend`.
///
/// Only one session may be active against a given device at a time; the
/// caller enforces this by holding the session for its lifetime.
pub struct AudioCaptureSession {
    config: CaptureConfig,
    token: CancellationToken,
    chunks: Receiver<Vec<i16>>,
    stream: Option<Box<dyn StreamHandle>>,
    started_at: Instant,
}

impl AudioCaptureSession {
    /// Validates device availability and opens the input stream.
    ///
    /// Fails fast without opening a stream when no input-capable device
    /// exists.
    ///
    /// # Errors
    /// - If no input device is available
    /// - If the stream cannot be opened or started
    pub fn start(backend: &dyn AudioBackend, config: CaptureConfig) -> Result<Self> {
        if !backend.has_input_device() {
            return Err(anyhow!(
                "No input devices found. Please connect a microphone."
            ));
        }

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let stream = backend.open_stream(&config, tx, FaultReporter::new(token.clone()))?;

        Ok(Self {
            config,
            token,
            chunks: rx,
            stream: Some(stream),
            started_at: Instant::now(),
        })
    }

    /// A clone of the session's cancellation token, handed to the stop
    /// watcher.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Blocks the caller until the token is set, polling at `POLL_INTERVAL`.
    pub fn wait(&self) {
        while !self.token.is_set() {
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stops the stream, drains all buffered chunks, and classifies the
    /// recording.
    ///
    /// The stream handle is dropped before classification, so the device is
    /// closed on every branch.
    pub fn stop(mut self) -> CaptureResult {
        // Close the stream first; no new chunks arrive after this point.
        self.stream = None;
        let elapsed = self.started_at.elapsed();

        // A stream fault trumps whatever was buffered.
        if let Some(CancelReason::StreamFault(message)) = self.token.reason() {
            return CaptureResult::StreamError { message };
        }

        let mut samples: Vec<i16> = Vec::new();
        for chunk in self.chunks.try_iter() {
            samples.extend_from_slice(&chunk);
        }

        if samples.is_empty() {
            tracing::warn!("Recording stopped with no samples captured");
            return CaptureResult::Empty;
        }

        let mean_abs = samples
            .iter()
            .map(|&s| (s as i64).unsigned_abs() as f64)
            .sum::<f64>()
            / samples.len() as f64;

        if mean_abs < SILENCE_MEAN_ABS {
            tracing::warn!(
                "Recording appears silent (mean magnitude {:.1})",
                mean_abs
            );
            return CaptureResult::Silent;
        }

        let frame_rate = self.config.sample_rate as f64 * self.config.channels as f64;
        let duration = Duration::from_secs_f64(samples.len() as f64 / frame_rate);
        tracing::info!(
            "Recording stopped: {:.2}s ({} samples at {}Hz), elapsed {:.2}s",
            duration.as_secs_f64(),
            samples.len(),
            self.config.sample_rate,
            elapsed.as_secs_f64()
        );

        CaptureResult::Success { samples, duration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::Sender;
    use std::sync::Arc;

    /// Backend double: hands the producer side of the channel to the test so
    /// it can play the role of the device callback.
    struct FakeBackend {
        has_device: bool,
        open_calls: Arc<AtomicUsize>,
        producer_out: std::sync::Mutex<Option<Sender<Sender<Vec<i16>>>>>,
    }

    struct FakeStream;
    impl StreamHandle for FakeStream {}

    impl FakeBackend {
        fn new(has_device: bool) -> (Self, std::sync::mpsc::Receiver<Sender<Vec<i16>>>) {
            let (tx, rx) = mpsc::channel();
            (
                Self {
                    has_device,
                    open_calls: Arc::new(AtomicUsize::new(0)),
                    producer_out: std::sync::Mutex::new(Some(tx)),
                },
                rx,
            )
        }
    }

    impl AudioBackend for FakeBackend {
        fn has_input_device(&self) -> bool {
            self.has_device
        }

        fn open_stream(
            &self,
            _config: &CaptureConfig,
            chunks: Sender<Vec<i16>>,
            _fault: FaultReporter,
        ) -> Result<Box<dyn StreamHandle>> {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(out) = self.producer_out.lock().unwrap().take() {
                out.send(chunks).unwrap();
            }
            Ok(Box::new(FakeStream))
        }
    }

    fn config() -> CaptureConfig {
        CaptureConfig {
            sample_rate: 16000,
            channels: 1,
            max_duration_secs: 300.0,
        }
    }

    #[test]
    fn test_no_device_fails_fast_without_opening_stream() {
        let (backend, _rx) = FakeBackend::new(false);
        let open_calls = backend.open_calls.clone();

        let result = AudioCaptureSession::start(&backend, config());
        assert!(result.is_err());
        assert_eq!(open_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drain_preserves_order_and_sample_count() {
        let (backend, rx) = FakeBackend::new(true);
        let session = AudioCaptureSession::start(&backend, config()).unwrap();
        let producer = rx.recv().unwrap();

        let chunks: Vec<Vec<i16>> = vec![vec![1000; 7], vec![-2000; 3], vec![3000; 5]];
        for chunk in &chunks {
            producer.send(chunk.clone()).unwrap();
        }
        session.token().set(CancelReason::StopRequested);

        match session.stop() {
            CaptureResult::Success { samples, .. } => {
                let expected: Vec<i16> = chunks.into_iter().flatten().collect();
                assert_eq!(samples, expected);
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn test_stop_before_any_chunk_is_empty() {
        let (backend, rx) = FakeBackend::new(true);
        let session = AudioCaptureSession::start(&backend, config()).unwrap();
        let _producer = rx.recv().unwrap();

        session.token().set(CancelReason::StopRequested);
        assert_eq!(session.stop(), CaptureResult::Empty);
    }

    #[test]
    fn test_low_magnitude_recording_is_silent() {
        let (backend, rx) = FakeBackend::new(true);
        let session = AudioCaptureSession::start(&backend, config()).unwrap();
        let producer = rx.recv().unwrap();

        // Many chunks, all well below the threshold.
        for _ in 0..10 {
            producer.send(vec![2; 1600]).unwrap();
        }
        session.token().set(CancelReason::StopRequested);
        assert_eq!(session.stop(), CaptureResult::Silent);
    }

    #[test]
    fn test_stream_fault_wins_over_buffered_content() {
        let (backend, rx) = FakeBackend::new(true);
        let session = AudioCaptureSession::start(&backend, config()).unwrap();
        let producer = rx.recv().unwrap();

        producer.send(vec![5000; 1600]).unwrap();
        session
            .token()
            .set(CancelReason::StreamFault("device unplugged".to_string()));

        assert_eq!(
            session.stop(),
            CaptureResult::StreamError {
                message: "device unplugged".to_string()
            }
        );
    }
}
