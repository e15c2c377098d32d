//! Check value: an encrypted copy of the user id used to test a candidate key.
//!
//! The check value is stored once per user at vault setup. On every later
//! password unlock the freshly derived key must decrypt it back to the same
//! user id. It carries no confidential data of its own.

use subtle::ConstantTimeEq;

use crate::blob::EncryptedBlob;
use crate::cipher;
use crate::error::CryptoError;
use crate::kdf::MasterKey;

/// Encrypt the check value for `user_id`.
///
/// # Errors
///
/// Returns `CryptoError::EmptyInput` for a blank user id, or any error
/// from [`cipher::encrypt`].
pub fn encrypt_check(key: &MasterKey, user_id: &str) -> Result<EncryptedBlob, CryptoError> {
    cipher::encrypt(key, user_id)
}

/// Returns `true` only if `blob` decrypts under `key` to exactly `user_id`.
///
/// A wrong password is the common case here, so every failure (tag
/// mismatch, malformed blob, different plaintext) is `false` rather than an
/// error.
#[must_use]
pub fn verify_check(key: &MasterKey, blob: &EncryptedBlob, user_id: &str) -> bool {
    cipher::decrypt(key, blob).is_ok_and(|plaintext| {
        bool::from(plaintext.as_bytes().ct_eq(user_id.as_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> MasterKey {
        MasterKey::from_raw(&[byte; 32]).unwrap()
    }

    #[test]
    fn verify_accepts_same_key_and_user() {
        let k = key(0x11);
        let check = encrypt_check(&k, "u1").unwrap();
        assert!(verify_check(&k, &check, "u1"));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let check = encrypt_check(&key(0x11), "u1").unwrap();
        assert!(!verify_check(&key(0x22), &check, "u1"));
    }

    #[test]
    fn verify_rejects_other_user() {
        let k = key(0x11);
        let check = encrypt_check(&k, "u1").unwrap();
        assert!(!verify_check(&k, &check, "u2"));
        assert!(!verify_check(&k, &check, "u1 "));
    }

    #[test]
    fn verify_rejects_garbage_without_error() {
        let k = key(0x11);
        assert!(!verify_check(&k, &EncryptedBlob::new("not a blob"), "u1"));
        assert!(!verify_check(&k, &EncryptedBlob::new(""), "u1"));
    }

    #[test]
    fn blank_user_id_cannot_be_checked() {
        assert!(matches!(
            encrypt_check(&key(0x11), "  "),
            Err(CryptoError::EmptyInput)
        ));
    }
}
