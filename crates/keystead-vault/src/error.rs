//! Vault error types for `keystead-vault`.

use keystead_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by vault session operations.
///
/// `WrongPassword` and `PasskeyUnlockFailed` describe expected user-input
/// outcomes. The unlock methods report them as `Ok(false)`; only the
/// re-authentication calls return them as errors.
/// `Locked` and crypto failures indicate caller or data-integrity bugs.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Password re-authentication failed against the stored check value.
    #[error("invalid password")]
    WrongPassword,

    /// Vault is locked: operation requires an unlocked vault.
    #[error("vault is locked")]
    Locked,

    /// Passkey re-authentication failed: nothing enrolled, or the stored
    /// blob does not yield the session key.
    #[error("passkey unlock failed")]
    PasskeyUnlockFailed,

    /// No check value is stored for this user: the vault was never set up.
    #[error("vault not set up for user: {0}")]
    NotSetUp(String),

    /// Persistence port failure (transport, document store).
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error from the filesystem (saving preferences).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Background derivation task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),
}
