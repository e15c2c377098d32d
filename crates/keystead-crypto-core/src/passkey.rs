//! Passkey key wrapping for biometric unlock.
//!
//! A platform authenticator (Touch ID, Windows Hello, Android biometrics)
//! releases a credential id only after user verification. The id, bound to
//! the user id, yields a wrapping key that encrypts a copy of the master key.
//!
//! # Key Hierarchy
//!
//! ```text
//! credential id || user id ──► SHA-256 ──► Wrap Key ──► unwraps ──► Master Key
//! ```
//!
//! The wrap key is a plain hash, not a password KDF. That is only sound
//! because the authenticator, not this code, gates access to the credential
//! id with hardware-backed user presence.
//!
//! Wrapped keys use AES-256-GCM with a 12-byte IV:
//! `base64(iv (12) || wrapped key (32) || tag (16))`.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use ring::{aead, digest};
use zeroize::Zeroize;

use crate::blob::{EncryptedBlob, TAG_LEN};
use crate::error::CryptoError;
use crate::kdf::{MasterKey, MASTER_KEY_LEN};
use crate::memory::SecretBytes;

/// Wrap IV length in bytes (96 bits).
pub const WRAP_IV_LEN: usize = aead::NONCE_LEN;

/// Wrapping key length in bytes (256 bits).
pub const WRAP_KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Wrap key
// ---------------------------------------------------------------------------

/// Key that wraps and unwraps the master key for one passkey credential.
pub struct WrapKey(SecretBytes<WRAP_KEY_LEN>);

impl WrapKey {
    /// Raw key bytes.
    #[must_use]
    pub const fn expose(&self) -> &[u8; WRAP_KEY_LEN] {
        self.0.expose()
    }
}

impl fmt::Debug for WrapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WrapKey(***)")
    }
}

/// Derive the wrap key: `SHA-256(credential_id || user_id)`.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` if `credential_id` is empty.
pub fn derive_wrap_key(credential_id: &str, user_id: &str) -> Result<WrapKey, CryptoError> {
    if credential_id.is_empty() {
        return Err(CryptoError::InvalidKeyMaterial(
            "passkey credential id is empty".into(),
        ));
    }

    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(credential_id.as_bytes());
    ctx.update(user_id.as_bytes());
    let hash = ctx.finish();

    SecretBytes::from_slice(hash.as_ref()).map(WrapKey)
}

// ---------------------------------------------------------------------------
// Wrap / unwrap
// ---------------------------------------------------------------------------

/// Encrypt the raw master key under `wrap_key` with a fresh IV.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the AES-256-GCM operation fails.
pub fn wrap(wrap_key: &WrapKey, master_key: &MasterKey) -> Result<EncryptedBlob, CryptoError> {
    let key = sealing_key(wrap_key)
        .map_err(|()| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;

    let mut iv = [0u8; WRAP_IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    let nonce = aead::Nonce::assume_unique_for_key(iv);

    // Encrypt in place: the exported key buffer becomes ciphertext || tag.
    let mut in_out = master_key.expose().to_vec();
    if key
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .is_err()
    {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM key wrap failed".into(),
        ));
    }

    Ok(EncryptedBlob::encode(&iv, &in_out))
}

/// Recover the master key from a wrapped blob.
///
/// # Errors
///
/// Every failure (malformed blob, tag mismatch, unexpected key length)
/// is `CryptoError::PasskeyUnlockFailed`; the caller falls back to the
/// password flow.
pub fn unwrap(wrap_key: &WrapKey, blob: &EncryptedBlob) -> Result<MasterKey, CryptoError> {
    let (iv, mut sealed) = blob
        .decode(WRAP_IV_LEN)
        .map_err(|_| CryptoError::PasskeyUnlockFailed)?;
    if sealed.len() != MASTER_KEY_LEN.saturating_add(TAG_LEN) {
        return Err(CryptoError::PasskeyUnlockFailed);
    }

    let key = sealing_key(wrap_key).map_err(|()| CryptoError::PasskeyUnlockFailed)?;
    let nonce = aead::Nonce::try_assume_unique_for_key(&iv)
        .map_err(|_| CryptoError::PasskeyUnlockFailed)?;

    let recovered = match key.open_in_place(nonce, aead::Aad::empty(), &mut sealed) {
        Ok(plaintext) => MasterKey::from_raw(plaintext),
        Err(_) => Err(CryptoError::PasskeyUnlockFailed),
    };
    sealed.zeroize();
    recovered.map_err(|_| CryptoError::PasskeyUnlockFailed)
}

fn sealing_key(wrap_key: &WrapKey) -> Result<aead::LessSafeKey, ()> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, wrap_key.expose()).map_err(|_| ())?;
    Ok(aead::LessSafeKey::new(unbound))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
