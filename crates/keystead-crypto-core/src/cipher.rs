//! Field-level AES-256-GCM encryption.
//!
//! This module provides:
//! - [`encrypt`]: encrypt one field value under the master key
//! - [`decrypt`]: authenticate and decrypt one [`EncryptedBlob`]
//!
//! # Format
//!
//! `base64(iv (16 bytes) || ciphertext || tag (16 bytes))`. The IV is drawn
//! from `OsRng` on every call and never reused under the same key.
//!
//! Values are stored JSON-string-wrapped (`hunter2` is sealed as
//! `"hunter2"`), the storage form existing vaults were written in. On the
//! way out a JSON string is unwrapped; anything else is returned as the raw
//! decoded text, which keeps older unwrapped values readable.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::blob::EncryptedBlob;
use crate::error::CryptoError;
use crate::kdf::MasterKey;

/// Field cipher IV length in bytes.
pub const IV_LEN: usize = 16;

/// AES-256-GCM with a 128-bit IV.
type FieldAes = AesGcm<Aes256, U16>;

/// Encrypt a single field value.
///
/// # Errors
///
/// - `CryptoError::EmptyInput` if `plaintext` is empty or whitespace only.
///   An absent field and an encrypted empty string must stay distinguishable.
/// - `CryptoError::SecureMemory` if the CSPRNG fails.
/// - `CryptoError::Encryption` if AES-GCM sealing fails.
pub fn encrypt(key: &MasterKey, plaintext: &str) -> Result<EncryptedBlob, CryptoError> {
    if plaintext.trim().is_empty() {
        return Err(CryptoError::EmptyInput);
    }

    let mut wrapped = serde_json::to_string(plaintext)
        .map_err(|e| CryptoError::Encryption(format!("failed to wrap value: {e}")))?;
    let result = seal(key, wrapped.as_bytes());
    wrapped.zeroize();
    result
}

/// Decrypt a single field value.
///
/// # Errors
///
/// - `CryptoError::MalformedInput` if the blob is not base64, is too short
///   to hold an IV and tag, or decrypts to invalid UTF-8.
/// - `CryptoError::AuthenticationFailure` on tag mismatch (wrong key or
///   tampered ciphertext). Never returns unauthenticated data.
pub fn decrypt(key: &MasterKey, blob: &EncryptedBlob) -> Result<String, CryptoError> {
    let (iv, sealed) = blob.decode(IV_LEN)?;

    let plaintext = field_cipher(key)?
        .decrypt(Nonce::<U16>::from_slice(&iv), sealed.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    let text = String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        CryptoError::MalformedInput("decrypted value is not UTF-8".into())
    })?;

    Ok(unwrap_legacy_json(text))
}

/// Seal raw bytes with a fresh IV.
pub(crate) fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<EncryptedBlob, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;

    let sealed = field_cipher(key)?
        .encrypt(Nonce::<U16>::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Encryption("AES-256-GCM encryption failed".into()))?;

    Ok(EncryptedBlob::encode(&iv, &sealed))
}

fn field_cipher(key: &MasterKey) -> Result<FieldAes, CryptoError> {
    FieldAes::new_from_slice(key.expose())
        .map_err(|_| CryptoError::InvalidKeyMaterial("AES-256 key must be 32 bytes".into()))
}

/// `"value"` → `value`; any other text is returned untouched.
fn unwrap_legacy_json(mut text: String) -> String {
    match serde_json::from_str::<String>(&text) {
        Ok(inner) => {
            text.zeroize();
            inner
        }
        Err(_) => text,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use data_encoding::BASE64;

    fn key(byte: u8) -> MasterKey {
        MasterKey::from_raw(&[byte; 32]).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let k = key(0xAA);
        let blob = encrypt(&k, "hunter2").unwrap();
        assert_eq!(decrypt(&k, &blob).unwrap(), "hunter2");
    }

    #[test]
    fn roundtrip_preserves_surrounding_whitespace_and_unicode() {
        let k = key(0xAA);
        for value in ["  padded  ", "päss wörd 🔑", "line\nbreak", "\"quoted\"", "42", "null"] {
            let blob = encrypt(&k, value).unwrap();
            assert_eq!(decrypt(&k, &blob).unwrap(), value);
        }
    }

    #[test]
    fn blob_layout_is_iv_json_tag() {
        let blob = encrypt(&key(0xAA), "abc").unwrap();
        let raw = BASE64.decode(blob.as_str().as_bytes()).unwrap();
        // 16-byte IV + `"abc"` (5 bytes) + 16-byte tag.
        assert_eq!(raw.len(), 16 + 5 + 16);
    }

    #[test]
    fn empty_and_whitespace_are_rejected() {
        let k = key(0xAA);
        assert!(matches!(encrypt(&k, ""), Err(CryptoError::EmptyInput)));
        assert!(matches!(encrypt(&k, " \t\n "), Err(CryptoError::EmptyInput)));
    }

    #[test]
    fn wrong_key_is_authentication_failure() {
        let blob = encrypt(&key(0xAA), "secret").unwrap();
        assert!(matches!(
            decrypt(&key(0xBB), &blob),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn tampered_ciphertext_is_authentication_failure() {
        let k = key(0xAA);
        let blob = encrypt(&k, "secret").unwrap();
        let mut raw = BASE64.decode(blob.as_str().as_bytes()).unwrap();
        raw[IV_LEN] ^= 0x01;
        let tampered = EncryptedBlob::new(BASE64.encode(&raw));
        assert!(matches!(
            decrypt(&k, &tampered),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn tampered_iv_is_authentication_failure() {
        let k = key(0xAA);
        let blob = encrypt(&k, "secret").unwrap();
        let mut raw = BASE64.decode(blob.as_str().as_bytes()).unwrap();
        raw[0] ^= 0xFF;
        let tampered = EncryptedBlob::new(BASE64.encode(&raw));
        assert!(matches!(
            decrypt(&k, &tampered),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn same_plaintext_gives_distinct_blobs() {
        let k = key(0xAA);
        let a = encrypt(&k, "same").unwrap();
        let b = encrypt(&k, "same").unwrap();
        assert_ne!(a, b);
        let iv_a = &BASE64.decode(a.as_str().as_bytes()).unwrap()[..IV_LEN];
        let iv_b = &BASE64.decode(b.as_str().as_bytes()).unwrap()[..IV_LEN];
        assert_ne!(iv_a, iv_b);
    }

    #[test]
    fn malformed_blobs_are_rejected() {
        let k = key(0xAA);
        assert!(matches!(
            decrypt(&k, &EncryptedBlob::new("%%%")),
            Err(CryptoError::MalformedInput(_))
        ));
        let short = EncryptedBlob::new(BASE64.encode(&[0u8; 20]));
        assert!(matches!(
            decrypt(&k, &short),
            Err(CryptoError::MalformedInput(_))
        ));
    }

    #[test]
    fn legacy_unwrapped_value_is_returned_raw() {
        let k = key(0xAA);
        let blob = seal(&k, b"plain legacy text").unwrap();
        assert_eq!(decrypt(&k, &blob).unwrap(), "plain legacy text");
    }

    #[test]
    fn legacy_non_string_json_is_returned_raw() {
        let k = key(0xAA);
        let blob = seal(&k, b"1234").unwrap();
        assert_eq!(decrypt(&k, &blob).unwrap(), "1234");
    }

    #[test]
    fn non_utf8_plaintext_is_malformed() {
        let k = key(0xAA);
        let blob = seal(&k, &[0xFF, 0xFE, 0xFD]).unwrap();
        assert!(matches!(
            decrypt(&k, &blob),
            Err(CryptoError::MalformedInput(_))
        ));
    }
}
