//! PBKDF2-HMAC-SHA256 master key derivation with a versioned salt strategy.
//!
//! This module provides:
//! - [`derive`]: derive the 256-bit [`MasterKey`] from a password + salt
//! - [`legacy_salt`]: the deterministic `SHA-256(user_id)` salt
//! - [`SaltRecord`] / [`SaltVersion`]: which salt a vault was created with
//!
//! # Salt versions
//!
//! - **V1** derives the salt from the public user id. Every vault created
//!   before salt versioning uses it, so it must keep working unchanged. It
//!   separates users from each other but gives no protection against
//!   precomputation aimed at one known user id.
//! - **V2** stores 32 random bytes next to the check value.
//!
//! A vault without a stored [`SaltRecord`] is a V1 vault.

use std::fmt;
use std::num::NonZeroU32;

use data_encoding::BASE64;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::{digest, pbkdf2};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// Fixed PBKDF2 work factor. Not configurable per user.
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// Master key length in bytes (256 bits).
pub const MASTER_KEY_LEN: usize = 32;

/// Length of a V2 random salt in bytes.
pub const RANDOM_SALT_LEN: usize = 32;

// ---------------------------------------------------------------------------
// MasterKey
// ---------------------------------------------------------------------------

/// The symmetric key protecting every encrypted field of one user.
///
/// Never serialized. Zeroized on drop.
pub struct MasterKey(SecretBytes<MASTER_KEY_LEN>);

impl MasterKey {
    /// Generate a random master key (tests and tooling only; vault keys
    /// always come from [`derive`] or a passkey unwrap).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        SecretBytes::random().map(Self)
    }

    /// Import raw key bytes (e.g. recovered from a passkey-wrapped blob).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if `raw` is not 32 bytes.
    pub fn from_raw(raw: &[u8]) -> Result<Self, CryptoError> {
        SecretBytes::from_slice(raw).map(Self)
    }

    /// Raw key bytes, for AES and key wrapping only.
    #[must_use]
    pub const fn expose(&self) -> &[u8; MASTER_KEY_LEN] {
        self.0.expose()
    }

    /// Constant-time comparison of two keys.
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0)
    }
}

impl From<SecretBytes<MASTER_KEY_LEN>> for MasterKey {
    fn from(bytes: SecretBytes<MASTER_KEY_LEN>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Salt strategy
// ---------------------------------------------------------------------------

/// Salt scheme a vault was created with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaltVersion {
    /// Deterministic `SHA-256(user_id)`.
    #[default]
    V1,
    /// Random salt stored in the [`SaltRecord`].
    V2,
}

/// Persisted description of the salt a vault uses.
///
/// Stored by the persistence port beside the check value. Contains no
/// secrets: for V2 the salt itself is public material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaltRecord {
    /// Salt scheme.
    pub version: SaltVersion,
    /// Base64 random salt (V2 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl SaltRecord {
    /// Record for a legacy deterministic-salt vault.
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            version: SaltVersion::V1,
            salt: None,
        }
    }

    /// Record holding a freshly generated random salt.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut salt = [0u8; RANDOM_SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        Ok(Self {
            version: SaltVersion::V2,
            salt: Some(BASE64.encode(&salt)),
        })
    }

    /// Build a new record for the given version.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if a V2 salt cannot be generated.
    pub fn new(version: SaltVersion) -> Result<Self, CryptoError> {
        match version {
            SaltVersion::V1 => Ok(Self::legacy()),
            SaltVersion::V2 => Self::random(),
        }
    }

    /// Resolve the salt bytes to feed into [`derive`] for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if a V2 record has no salt or
    /// the stored salt is not valid base64.
    pub fn salt_bytes(&self, user_id: &str) -> Result<Vec<u8>, CryptoError> {
        match self.version {
            SaltVersion::V1 => Ok(legacy_salt(user_id).to_vec()),
            SaltVersion::V2 => {
                let encoded = self.salt.as_deref().ok_or_else(|| {
                    CryptoError::KeyDerivation("v2 salt record has no salt".into())
                })?;
                let salt = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                    CryptoError::KeyDerivation(format!("stored salt is not base64: {e}"))
                })?;
                if salt.is_empty() {
                    return Err(CryptoError::KeyDerivation("stored salt is empty".into()));
                }
                Ok(salt)
            }
        }
    }
}

impl Default for SaltRecord {
    fn default() -> Self {
        Self::legacy()
    }
}

/// Deterministic V1 salt: `SHA-256(user_id)`.
#[must_use]
pub fn legacy_salt(user_id: &str) -> [u8; 32] {
    let hash = digest::digest(&digest::SHA256, user_id.as_bytes());
    let mut salt = [0u8; 32];
    salt.copy_from_slice(hash.as_ref());
    salt
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Derive the master key from a password and salt.
///
/// PBKDF2-HMAC-SHA256 with [`PBKDF2_ITERATIONS`] rounds; the 32-byte output
/// is the AES-256 key itself. This is deliberately slow (hundreds of
/// milliseconds): callers in async code should run it on a blocking pool.
///
/// Password strength is the caller's concern; any password is accepted.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the salt is empty.
pub fn derive(password: &str, salt: &[u8]) -> Result<MasterKey, CryptoError> {
    derive_with_iterations(password.as_bytes(), salt, PBKDF2_ITERATIONS)
}

/// PBKDF2 core, parameterized for known-answer tests.
pub(crate) fn derive_with_iterations(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<MasterKey, CryptoError> {
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("salt must not be empty".into()));
    }
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| CryptoError::KeyDerivation("iteration count must be non-zero".into()))?;

    let mut output = [0u8; MASTER_KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password,
        &mut output,
    );

    let key = MasterKey(SecretBytes::new(output));
    output.zeroize();
    Ok(key)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        data_encoding::HEXLOWER.encode(bytes)
    }

    /// RFC 7914 §11 style vectors for PBKDF2-HMAC-SHA256 (dkLen = 32).
    #[test]
    fn pbkdf2_known_answer_one_iteration() {
        let key = derive_with_iterations(b"password", b"salt", 1).unwrap();
        assert_eq!(
            hex(key.expose()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn pbkdf2_known_answer_4096_iterations() {
        let key = derive_with_iterations(b"password", b"salt", 4096).unwrap();
        assert_eq!(
            hex(key.expose()),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn legacy_salt_is_sha256_of_user_id() {
        assert_eq!(
            hex(&legacy_salt("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn legacy_salt_differs_per_user() {
        assert_ne!(legacy_salt("u1"), legacy_salt("u2"));
    }

    #[test]
    fn derive_is_deterministic() {
        let salt = legacy_salt("u1");
        let a = derive("Tr0ub4dor&3", &salt).unwrap();
        let b = derive("Tr0ub4dor&3", &salt).unwrap();
        assert!(a.ct_eq(&b));
    }

    #[test]
    fn derive_rejects_empty_salt() {
        let result = derive("pw", &[]);
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
    }

    #[test]
    fn zero_iterations_rejected() {
        let result = derive_with_iterations(b"pw", b"salt", 0);
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
    }

    #[test]
    fn legacy_record_uses_deterministic_salt() {
        let record = SaltRecord::legacy();
        assert_eq!(record.salt_bytes("u1").unwrap(), legacy_salt("u1").to_vec());
    }

    #[test]
    fn random_records_are_unique_and_user_independent() {
        let a = SaltRecord::random().unwrap();
        let b = SaltRecord::random().unwrap();
        assert_eq!(a.version, SaltVersion::V2);
        assert_ne!(a.salt, b.salt);
        assert_eq!(a.salt_bytes("u1").unwrap(), a.salt_bytes("u2").unwrap());
        assert_eq!(a.salt_bytes("u1").unwrap().len(), RANDOM_SALT_LEN);
    }

    #[test]
    fn v2_record_without_salt_is_rejected() {
        let record = SaltRecord {
            version: SaltVersion::V2,
            salt: None,
        };
        assert!(matches!(
            record.salt_bytes("u1"),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn v2_record_with_garbage_salt_is_rejected() {
        let record = SaltRecord {
            version: SaltVersion::V2,
            salt: Some("not base64!!".into()),
        };
        assert!(record.salt_bytes("u1").is_err());
    }

    #[test]
    fn salt_record_serde_shape() {
        let json = serde_json::to_string(&SaltRecord::legacy()).unwrap();
        assert_eq!(json, r#"{"version":"v1"}"#);

        let parsed: SaltRecord = serde_json::from_str(r#"{"version":"v2","salt":"AAAA"}"#).unwrap();
        assert_eq!(parsed.version, SaltVersion::V2);
        assert_eq!(parsed.salt.as_deref(), Some("AAAA"));
    }

    #[test]
    fn master_key_debug_is_masked() {
        let key = MasterKey::random().unwrap();
        assert_eq!(format!("{key:?}"), "MasterKey(***)");
    }

    #[test]
    fn master_key_from_raw_checks_length() {
        assert!(MasterKey::from_raw(&[0u8; 16]).is_err());
        let key = MasterKey::from_raw(&[7u8; 32]).unwrap();
        assert_eq!(key.expose(), &[7u8; 32]);
    }
}
