//! Background auto-lock driver.
//!
//! Expiry is only observed when someone asks, so an idle app would keep an
//! expired key in memory until the next call. The watchdog asks on a fixed
//! period and evicts the session through [`VaultSession::tick_timeout`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::marker::SessionMarker;
use crate::session::VaultSession;
use crate::store::VaultStore;

/// Default polling period.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(10);

/// Handle to a running watchdog task. Dropping it stops the task.
#[derive(Debug)]
pub struct Watchdog {
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Spawn a watchdog polling `session` every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S, M>(session: Arc<VaultSession<S, M>>, period: Duration) -> Self
    where
        S: VaultStore + 'static,
        M: SessionMarker + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if session.tick_timeout().await {
                    tracing::info!("auto-lock: session evicted after inactivity");
                }
            }
        });
        Self { handle }
    }

    /// Stop polling.
    pub fn stop(self) {
        self.handle.abort();
    }

    /// `true` once the task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
