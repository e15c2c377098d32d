//! Ephemeral session marker: the last-activity timestamp.
//!
//! The marker lives outside the session state so a host (browser tab,
//! desktop shell) can keep it in whatever per-session storage it has. It
//! is not a security boundary: losing or forging it can only make the
//! session look expired early, never unlock a locked vault.

use std::sync::Mutex;

use tokio::time::Instant;

/// Storage for the last-activity timestamp of the current session.
pub trait SessionMarker: Send + Sync {
    /// Record activity at `at`.
    fn mark(&self, at: Instant);

    /// Last recorded activity, or `None` when no session is marked.
    fn last_activity(&self) -> Option<Instant>;

    /// Forget the marker (lock, reset).
    fn clear(&self);
}

/// In-process [`SessionMarker`].
#[derive(Debug, Default)]
pub struct MemoryMarker {
    last_activity: Mutex<Option<Instant>>,
}

impl MemoryMarker {
    /// Create an empty marker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionMarker for MemoryMarker {
    fn mark(&self, at: Instant) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Some(at);
        }
    }

    fn last_activity(&self) -> Option<Instant> {
        self.last_activity.lock().ok().and_then(|last| *last)
    }

    fn clear(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = None;
        }
    }
}
