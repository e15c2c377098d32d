//! Persistence port for vault metadata.
//!
//! The session never talks to a database or network directly. Everything it
//! needs to survive a restart (check value, salt record, passkey-wrapped
//! keys) goes through [`VaultStore`]. None of it is secret: every value is
//! either ciphertext or public salt material.

use std::collections::HashMap;
use std::future::Future;

use keystead_crypto_core::{EncryptedBlob, SaltRecord};
use tokio::sync::RwLock;

use crate::error::VaultError;

/// Async persistence port injected into [`VaultSession`](crate::VaultSession).
///
/// Implementations map transport failures to [`VaultError::Storage`].
pub trait VaultStore: Send + Sync {
    /// Stored check value for `user_id`, if the vault was set up.
    fn get_check_value(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<EncryptedBlob>, VaultError>> + Send;

    /// Store (or replace) the check value for `user_id`.
    fn set_check_value(
        &self,
        user_id: &str,
        value: EncryptedBlob,
    ) -> impl Future<Output = Result<(), VaultError>> + Send;

    /// Remove the check value for `user_id`. Missing is not an error.
    fn clear_check_value(&self, user_id: &str)
        -> impl Future<Output = Result<(), VaultError>> + Send;

    /// Passkey-wrapped master key for one credential.
    fn get_wrapped_key(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> impl Future<Output = Result<Option<EncryptedBlob>, VaultError>> + Send;

    /// Store (or replace) the wrapped key for one credential.
    fn set_wrapped_key(
        &self,
        user_id: &str,
        credential_id: &str,
        blob: EncryptedBlob,
    ) -> impl Future<Output = Result<(), VaultError>> + Send;

    /// Remove the wrapped key for one credential. Missing is not an error.
    fn remove_wrapped_key(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> impl Future<Output = Result<(), VaultError>> + Send;

    /// Salt record for `user_id`. `None` means a legacy V1 vault.
    fn get_salt_record(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<SaltRecord>, VaultError>> + Send;

    /// Store (or replace) the salt record for `user_id`.
    fn set_salt_record(
        &self,
        user_id: &str,
        record: SaltRecord,
    ) -> impl Future<Output = Result<(), VaultError>> + Send;

    /// Remove the salt record for `user_id`. Missing is not an error.
    fn clear_salt_record(&self, user_id: &str)
        -> impl Future<Output = Result<(), VaultError>> + Send;
}

// ── In-memory implementation ───────────────────────────────────────

/// In-process [`VaultStore`] backed by hash maps.
///
/// Used by tests and by embedders that persist nothing between runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    check_values: RwLock<HashMap<String, EncryptedBlob>>,
    salt_records: RwLock<HashMap<String, SaltRecord>>,
    wrapped_keys: RwLock<HashMap<(String, String), EncryptedBlob>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of wrapped keys stored for `user_id`.
    pub async fn wrapped_key_count(&self, user_id: &str) -> usize {
        self.wrapped_keys
            .read()
            .await
            .keys()
            .filter(|(user, _)| user == user_id)
            .count()
    }
}

fn wrapped_key_id(user_id: &str, credential_id: &str) -> (String, String) {
    (user_id.to_owned(), credential_id.to_owned())
}

impl VaultStore for MemoryStore {
    async fn get_check_value(&self, user_id: &str) -> Result<Option<EncryptedBlob>, VaultError> {
        Ok(self.check_values.read().await.get(user_id).cloned())
    }

    async fn set_check_value(&self, user_id: &str, value: EncryptedBlob) -> Result<(), VaultError> {
        self.check_values
            .write()
            .await
            .insert(user_id.to_owned(), value);
        Ok(())
    }

    async fn clear_check_value(&self, user_id: &str) -> Result<(), VaultError> {
        self.check_values.write().await.remove(user_id);
        Ok(())
    }

    async fn get_wrapped_key(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<Option<EncryptedBlob>, VaultError> {
        Ok(self
            .wrapped_keys
            .read()
            .await
            .get(&wrapped_key_id(user_id, credential_id))
            .cloned())
    }

    async fn set_wrapped_key(
        &self,
        user_id: &str,
        credential_id: &str,
        blob: EncryptedBlob,
    ) -> Result<(), VaultError> {
        self.wrapped_keys
            .write()
            .await
            .insert(wrapped_key_id(user_id, credential_id), blob);
        Ok(())
    }

    async fn remove_wrapped_key(&self, user_id: &str, credential_id: &str) -> Result<(), VaultError> {
        self.wrapped_keys
            .write()
            .await
            .remove(&wrapped_key_id(user_id, credential_id));
        Ok(())
    }

    async fn get_salt_record(&self, user_id: &str) -> Result<Option<SaltRecord>, VaultError> {
        Ok(self.salt_records.read().await.get(user_id).cloned())
    }

    async fn set_salt_record(&self, user_id: &str, record: SaltRecord) -> Result<(), VaultError> {
        self.salt_records
            .write()
            .await
            .insert(user_id.to_owned(), record);
        Ok(())
    }

    async fn clear_salt_record(&self, user_id: &str) -> Result<(), VaultError> {
        self.salt_records.write().await.remove(user_id);
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
