//! Concurrent audio capture.
//!
//! Three threads cooperate per capture: the device callback (sole chunk
//! producer), the stop watcher (sets the cancellation token), and the caller
//! (waits for cancellation, then drains and classifies). See `session` for
//! the classification policy and `watcher` for stop-signal handling.

pub mod backend;
pub mod session;
pub mod storage;
pub mod token;
pub mod watcher;

pub use backend::{AudioBackend, CpalBackend};
pub use session::{AudioCaptureSession, CaptureConfig, CaptureResult};
pub use storage::AudioRef;
pub use token::{CancelReason, CancellationToken};
pub use watcher::{FlagSource, KeyPressSource, StopSignalSource, StopWatcher};

use std::sync::Arc;

/// Records one complete session: start, watch, wait, stop.
///
/// Start failures are folded into the `DeviceError` variant so callers see a
/// single result type per attempt. The token and watcher live only for the
/// duration of the session.
pub fn record(
    backend: &dyn AudioBackend,
    config: &CaptureConfig,
    stop_source: Arc<dyn StopSignalSource>,
) -> CaptureResult {
    let session = match AudioCaptureSession::start(backend, config.clone()) {
        Ok(session) => session,
        Err(e) => {
            return CaptureResult::DeviceError {
                message: e.to_string(),
            }
        }
    };

    let watcher = StopWatcher::spawn(session.token(), config.max_duration_secs, stop_source);
    session.wait();
    let result = session.stop();

    if let Err(e) = watcher.join() {
        tracing::warn!("Stop watcher thread panicked: {:?}", e);
    }

    result
}
