//! Cryptographic error types for `keystead-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// PBKDF2 derivation failed (invalid iteration count, empty salt).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Plaintext was empty (or whitespace only): empty fields are never encrypted.
    #[error("refusing to encrypt an empty value")]
    EmptyInput,

    /// Authentication tag verification failed: ciphertext tampered or wrong key.
    #[error("decryption failed: authentication tag mismatch")]
    AuthenticationFailure,

    /// Blob is not valid base64, too short to hold an IV and tag, or not UTF-8.
    #[error("malformed encrypted blob: {0}")]
    MalformedInput(String),

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// AES-256-GCM sealing failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Passkey-wrapped key could not be recovered (wrong credential or corrupted blob).
    #[error("passkey unlock failed")]
    PasskeyUnlockFailed,

    /// OS CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
