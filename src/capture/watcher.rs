//! Background stop watcher.
//!
//! Maps an out-of-band stop signal (key press, UI action, or timeout) into
//! the cancellation token the capture session observes. The watcher never
//! touches captured audio; its only side effect is setting the token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::session::POLL_INTERVAL;
use super::token::{CancelReason, CancellationToken};

/// A source of explicit stop requests.
///
/// The watcher does not know whether it is backed by a terminal key poller, a
/// UI button flag, or a test double.
pub trait StopSignalSource: Send + Sync {
    /// Whether a stop has been requested since the source was armed.
    fn stop_requested(&self) -> bool;
}

/// Watches for stop conditions and sets the token on the first one.
pub struct StopWatcher;

impl StopWatcher {
    /// Spawns the watcher thread.
    ///
    /// Sets the token with StopRequested on an explicit stop, or TimedOut
    /// once `timeout_secs` wall-clock seconds have elapsed. Exits as soon as
    /// the token is set, including when the stream fault path set it first.
    pub fn spawn(
        token: CancellationToken,
        timeout_secs: f64,
        source: Arc<dyn StopSignalSource>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let started = Instant::now();
            loop {
                if token.is_set() {
                    break;
                }
                if source.stop_requested() {
                    token.set(CancelReason::StopRequested);
                    break;
                }
                if started.elapsed() >= Duration::from_secs_f64(timeout_secs) {
                    tracing::info!(
                        "Maximum recording duration ({:.0}s) reached",
                        timeout_secs
                    );
                    token.set(CancelReason::TimedOut);
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        })
    }
}

/// Stop source backed by a shared boolean flag, for UI-driven flows where a
/// button handler requests the stop.
#[derive(Clone, Default)]
pub struct FlagSource {
    flag: Arc<AtomicBool>,
}

impl FlagSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Safe to call from any thread, any number of times.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl StopSignalSource for FlagSource {
    fn stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Stop source polling the terminal for a stop key.
///
/// The terminal must be in raw mode while the watcher runs (the compose
/// command holds a raw-mode guard around the capture session).
pub struct KeyPressSource {
    stop_key: char,
}

impl KeyPressSource {
    pub fn new(stop_key: char) -> Self {
        Self { stop_key }
    }
}

impl StopSignalSource for KeyPressSource {
    fn stop_requested(&self) -> bool {
        // Zero-duration poll: never blocks the watcher loop.
        match event::poll(Duration::from_millis(0)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Enter | KeyCode::Esc => true,
                    KeyCode::Char(c) => c.to_ascii_lowercase() == self.stop_key,
                    _ => false,
                },
                _ => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_source_triggers_stop() {
        let token = CancellationToken::new();
        let source = FlagSource::new();
        let handle = StopWatcher::spawn(token.clone(), 60.0, Arc::new(source.clone()));

        source.request_stop();
        handle.join().unwrap();

        assert_eq!(token.reason(), Some(CancelReason::StopRequested));
    }

    #[test]
    fn test_timeout_fires_within_one_poll_interval() {
        let token = CancellationToken::new();
        let source = FlagSource::new();
        let timeout = 0.3;

        let started = Instant::now();
        let handle = StopWatcher::spawn(token.clone(), timeout, Arc::new(source));
        handle.join().unwrap();
        let elapsed = started.elapsed();

        assert_eq!(token.reason(), Some(CancelReason::TimedOut));
        assert!(elapsed >= Duration::from_secs_f64(timeout));
        // Bounded overshoot: at most one poll interval past the deadline,
        // with slack for scheduling jitter.
        assert!(elapsed < Duration::from_secs_f64(timeout) + POLL_INTERVAL * 3);
    }

    #[test]
    fn test_watcher_exits_when_token_already_set() {
        let token = CancellationToken::new();
        token.set(CancelReason::StreamFault("fault".to_string()));

        let handle = StopWatcher::spawn(token.clone(), 60.0, Arc::new(FlagSource::new()));
        handle.join().unwrap();

        // The pre-existing reason is untouched.
        assert_eq!(
            token.reason(),
            Some(CancelReason::StreamFault("fault".to_string()))
        );
    }
}
