//! [`EncryptedBlob`]: the single-string ciphertext format stored per field.
//!
//! Wire format: `base64(IV || ciphertext || tag)` using the standard padded
//! alphabet. The IV length depends on the producer: 16 bytes for field
//! ciphertext, 12 bytes for passkey-wrapped keys.

use std::fmt;

use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// AES-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Base64-encoded `IV || ciphertext || tag`.
///
/// Ciphertext is not secret, so `Debug` shows the encoded string.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedBlob(String);

impl EncryptedBlob {
    /// Wrap an already-encoded blob (e.g. loaded from the document store).
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encode `iv || sealed` where `sealed` is `ciphertext || tag`.
    pub(crate) fn encode(iv: &[u8], sealed: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(iv.len().saturating_add(sealed.len()));
        raw.extend_from_slice(iv);
        raw.extend_from_slice(sealed);
        Self(BASE64.encode(&raw))
    }

    /// Decode and split into `(iv, ciphertext || tag)`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` if the string is not valid
    /// base64 or is shorter than `iv_len + TAG_LEN` bytes.
    pub(crate) fn decode(&self, iv_len: usize) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let mut raw = BASE64
            .decode(self.0.as_bytes())
            .map_err(|e| CryptoError::MalformedInput(format!("invalid base64: {e}")))?;

        let min_len = iv_len.saturating_add(TAG_LEN);
        if raw.len() < min_len {
            return Err(CryptoError::MalformedInput(format!(
                "blob too short: {} bytes (minimum {min_len})",
                raw.len()
            )));
        }

        let sealed = raw.split_off(iv_len);
        Ok((raw, sealed))
    }

    /// The encoded string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the encoded string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedBlob({})", self.0)
    }
}

impl fmt::Display for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EncryptedBlob {
    fn from(encoded: String) -> Self {
        Self(encoded)
    }
}

impl From<&str> for EncryptedBlob {
    fn from(encoded: &str) -> Self {
        Self(encoded.to_owned())
    }
}

impl AsRef<str> for EncryptedBlob {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_splits_iv() {
        let blob = EncryptedBlob::encode(&[1u8; 16], &[2u8; 20]);
        let (iv, sealed) = blob.decode(16).unwrap();
        assert_eq!(iv, vec![1u8; 16]);
        assert_eq!(sealed, vec![2u8; 20]);
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let blob = EncryptedBlob::new("@@@ not base64 @@@");
        assert!(matches!(
            blob.decode(16),
            Err(CryptoError::MalformedInput(_))
        ));
    }

    #[test]
    fn decode_rejects_short_input() {
        // 31 bytes: one short of a 16-byte IV plus a 16-byte tag.
        let blob = EncryptedBlob::new(BASE64.encode(&[0u8; 31]));
        assert!(matches!(
            blob.decode(16),
            Err(CryptoError::MalformedInput(_))
        ));
        // Same length is enough for a 12-byte IV.
        assert!(blob.decode(12).is_ok());
    }

    #[test]
    fn serde_is_a_plain_string() {
        let blob = EncryptedBlob::new("AAAA");
        assert_eq!(serde_json::to_string(&blob).unwrap(), "\"AAAA\"");
        let parsed: EncryptedBlob = serde_json::from_str("\"QUJD\"").unwrap();
        assert_eq!(parsed.as_str(), "QUJD");
    }
}
