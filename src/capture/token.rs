//! One-shot cancellation primitive shared between a capture session and its
//! stop watcher.
//!
//! The token is set exactly once: the first caller to `set` records the
//! cancellation reason, later callers are no-ops. Capture waits on `is_set`
//! while the watcher and the stream fault path race to set it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Why a capture session was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The user asked to stop (key press or UI action).
    StopRequested,
    /// The maximum recording duration elapsed.
    TimedOut,
    /// The input stream reported an error mid-capture.
    StreamFault(String),
}

/// Thread-safe one-shot flag with a recorded reason.
///
/// Clones share the same underlying state. Once set, the token can never be
/// unset; the first setter wins and later `set` calls are ignored.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
            }),
        }
    }

    /// Sets the token with the given reason.
    ///
    /// Returns true if this call won the race and recorded the reason, false
    /// if the token was already set.
    pub fn set(&self, reason: CancelReason) -> bool {
        let mut slot = self.inner.reason.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        tracing::debug!("Capture cancelled: {:?}", reason);
        *slot = Some(reason);
        // Ordering: the reason is published before the flag flips, so any
        // thread that observes is_set() == true also observes the reason.
        self.inner.cancelled.store(true, Ordering::Release);
        true
    }

    pub fn is_set(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the recorded cancellation reason, if any.
    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.reason.lock().unwrap().clone()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_setter_wins() {
        let token = CancellationToken::new();
        assert!(token.set(CancelReason::StopRequested));
        assert!(!token.set(CancelReason::TimedOut));
        assert_eq!(token.reason(), Some(CancelReason::StopRequested));
    }

    #[test]
    fn test_set_is_idempotent_across_threads() {
        let token = CancellationToken::new();
        let t1 = token.clone();
        let t2 = token.clone();

        let h1 = thread::spawn(move || t1.set(CancelReason::StopRequested));
        let h2 = thread::spawn(move || t2.set(CancelReason::TimedOut));
        let won1 = h1.join().unwrap();
        let won2 = h2.join().unwrap();

        // Exactly one setter wins, and exactly one reason is recorded.
        assert!(won1 ^ won2);
        assert!(token.is_set());
        let reason = token.reason().unwrap();
        assert!(matches!(
            reason,
            CancelReason::StopRequested | CancelReason::TimedOut
        ));
    }

    #[test]
    fn test_unset_token_has_no_reason() {
        let token = CancellationToken::new();
        assert!(!token.is_set());
        assert_eq!(token.reason(), None);
    }
}
