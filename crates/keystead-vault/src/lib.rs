//! `keystead-vault`: Vault session layer for Keystead.
//!
//! Owns the master key while unlocked, enforces the inactivity timeout,
//! and routes field encryption through `keystead-crypto-core`. Storage and
//! the activity marker are injected so the session works the same in a
//! browser shell, a desktop app, or a test.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;

pub mod marker;
pub mod store;

pub mod preferences;

pub mod bulk;
pub mod session;

pub mod watchdog;

pub use bulk::FieldOutcome;
pub use error::VaultError;
pub use marker::{MemoryMarker, SessionMarker};
pub use preferences::Preferences;
pub use session::{LockState, SessionConfig, UnlockMethod, VaultSession};
pub use store::{MemoryStore, VaultStore};
pub use watchdog::{Watchdog, WATCHDOG_INTERVAL};
