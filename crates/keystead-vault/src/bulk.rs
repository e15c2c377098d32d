//! Per-field results for bulk decryption.

use keystead_crypto_core::{cipher, CryptoError, EncryptedBlob, MasterKey};
use serde::Serialize;

use crate::error::VaultError;

/// Outcome of decrypting one field in a batch.
///
/// A record list can hold fields written under an old key or corrupted in
/// transit. Those come back as `Failed` so the caller can show a
/// placeholder for that field and still render the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum FieldOutcome {
    /// Field decrypted to this plaintext.
    Decrypted(String),
    /// Authentication tag did not verify under the current key.
    Failed,
}

impl FieldOutcome {
    /// Plaintext if the field decrypted.
    #[must_use]
    pub fn as_decrypted(&self) -> Option<&str> {
        match self {
            Self::Decrypted(value) => Some(value),
            Self::Failed => None,
        }
    }

    /// `true` for [`FieldOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Decrypt every blob under `key`, in order.
///
/// Only an authentication failure is recorded per field. A malformed blob
/// or any other error aborts the batch.
pub(crate) fn decrypt_all<'a, I>(key: &MasterKey, blobs: I) -> Result<Vec<FieldOutcome>, VaultError>
where
    I: IntoIterator<Item = &'a EncryptedBlob>,
{
    let blobs = blobs.into_iter();
    let mut outcomes = Vec::with_capacity(blobs.size_hint().0);
    let mut failed = 0usize;

    for blob in blobs {
        match cipher::decrypt(key, blob) {
            Ok(value) => outcomes.push(FieldOutcome::Decrypted(value)),
            Err(CryptoError::AuthenticationFailure) => {
                failed = failed.saturating_add(1);
                outcomes.push(FieldOutcome::Failed);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if failed > 0 {
        tracing::warn!(failed, total = outcomes.len(), "bulk decrypt: fields failed authentication");
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> MasterKey {
        MasterKey::from_raw(&[byte; 32]).unwrap()
    }

    #[test]
    fn decrypts_in_order() {
        let k = key(0x11);
        let blobs = vec![
            cipher::encrypt(&k, "one").unwrap(),
            cipher::encrypt(&k, "two").unwrap(),
        ];
        let outcomes = decrypt_all(&k, &blobs).unwrap();
        assert_eq!(
            outcomes,
            vec![
                FieldOutcome::Decrypted("one".into()),
                FieldOutcome::Decrypted("two".into()),
            ]
        );
    }

    #[test]
    fn foreign_key_field_is_failed_not_fatal() {
        let k = key(0x11);
        let blobs = vec![
            cipher::encrypt(&k, "mine").unwrap(),
            cipher::encrypt(&key(0x22), "theirs").unwrap(),
            cipher::encrypt(&k, "also mine").unwrap(),
        ];
        let outcomes = decrypt_all(&k, &blobs).unwrap();
        assert_eq!(outcomes[0].as_decrypted(), Some("mine"));
        assert!(outcomes[1].is_failed());
        assert_eq!(outcomes[2].as_decrypted(), Some("also mine"));
    }

    #[test]
    fn malformed_blob_aborts_batch() {
        let k = key(0x11);
        let blobs = vec![
            cipher::encrypt(&k, "fine").unwrap(),
            EncryptedBlob::new("%%% not base64 %%%"),
        ];
        assert!(matches!(
            decrypt_all(&k, &blobs),
            Err(VaultError::Crypto(CryptoError::MalformedInput(_)))
        ));
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(decrypt_all(&key(0x11), &Vec::<EncryptedBlob>::new()).unwrap().is_empty());
    }

    #[test]
    fn serializes_as_tagged_union() {
        let json = serde_json::to_string(&vec![
            FieldOutcome::Decrypted("x".into()),
            FieldOutcome::Failed,
        ])
        .unwrap();
        assert_eq!(
            json,
            r#"[{"status":"decrypted","value":"x"},{"status":"failed"}]"#
        );
    }
}
