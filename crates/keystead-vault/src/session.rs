//! Vault session: the only owner of the master key.
//!
//! ```text
//!             unlock / unlock_with_wrapped_key
//!   Locked ───────────────────────────────────► Unlocked
//!     ▲                                            │
//!     └──────── lock / tick_timeout / reset ───────┘
//! ```
//!
//! The key lives in memory only while `Unlocked`. Leaving that state drops
//! the last owned handle and `MasterKey` zeroizes itself. A field operation
//! already in flight keeps its own `Arc` clone until it returns.
//!
//! Expiry is cooperative: [`VaultSession::is_unlocked`] and the field
//! operations treat a session idle past the timeout as locked, and
//! [`VaultSession::tick_timeout`] (driven by the watchdog) actually evicts it.

use std::sync::Arc;
use std::time::Duration;

use keystead_crypto_core::{
    cipher, encrypt_check, kdf, passkey, verify_check, EncryptedBlob, MasterKey, SaltRecord,
    SaltVersion,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::Instant;

use crate::bulk::{self, FieldOutcome};
use crate::error::VaultError;
use crate::marker::{MemoryMarker, SessionMarker};
use crate::preferences::Preferences;
use crate::store::VaultStore;

/// Minimum spacing between two activity marks.
pub const ACTIVITY_THROTTLE: Duration = Duration::from_secs(1);

// ── Configuration ──────────────────────────────────────────────────

/// Runtime settings for a [`VaultSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Inactivity window after which the session counts as locked.
    pub timeout: Duration,
    /// `touch_activity` calls closer together than this are ignored.
    pub activity_throttle: Duration,
    /// Salt scheme used when a vault is set up for the first time.
    pub salt_version: SaltVersion,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Preferences::default())
    }
}

impl From<&Preferences> for SessionConfig {
    fn from(prefs: &Preferences) -> Self {
        Self {
            timeout: prefs.timeout(),
            activity_throttle: ACTIVITY_THROTTLE,
            salt_version: prefs.new_vault_salt_version,
        }
    }
}

// ── Public state types ─────────────────────────────────────────────

/// Coarse session state, broadcast on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LockState {
    /// No key in memory.
    Locked,
    /// Master key held.
    Unlocked,
}

/// How the current session was unlocked.
///
/// Informational only. Re-authentication always asks for the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnlockMethod {
    /// Unlocked with the master password.
    Password,
    /// Unlocked with a passkey-wrapped key.
    Passkey,
}

impl UnlockMethod {
    /// String representation for display and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Passkey => "passkey",
        }
    }
}

struct ActiveSession {
    key: Arc<MasterKey>,
    user_id: String,
    method: UnlockMethod,
}

enum State {
    Locked,
    Unlocked(ActiveSession),
}

// ── Session ────────────────────────────────────────────────────────

/// Unlock/lock state machine over an injected [`VaultStore`].
///
/// Share one instance per process through an `Arc`. Transitions are
/// serialized; field operations run concurrently with each other.
pub struct VaultSession<S, M = MemoryMarker> {
    store: S,
    marker: M,
    config: SessionConfig,
    /// Held for the whole of unlock, lock, tick and reset.
    transition: Mutex<()>,
    state: RwLock<State>,
    status: watch::Sender<LockState>,
}

impl<S, M> VaultSession<S, M>
where
    S: VaultStore,
    M: SessionMarker,
{
    /// Create a locked session.
    pub fn new(store: S, marker: M, config: SessionConfig) -> Self {
        let (status, _) = watch::channel(LockState::Locked);
        Self {
            store,
            marker,
            config,
            transition: Mutex::new(()),
            state: RwLock::new(State::Locked),
            status,
        }
    }

    /// Persistence port this session writes through.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ── Unlock ─────────────────────────────────────────────────────

    /// Unlock with the master password.
    ///
    /// With `is_first_time` the vault is set up: a salt record and a fresh
    /// check value are persisted for `user_id`. Otherwise the derived key is
    /// verified against the stored check value.
    ///
    /// Returns `Ok(false)` for a wrong password; the state is unchanged.
    ///
    /// # Errors
    ///
    /// - `VaultError::NotSetUp` if no check value exists for `user_id`
    /// - `VaultError::Storage` if the persistence port fails
    /// - `VaultError::Task` if the derivation task dies
    /// - `VaultError::Crypto` for a corrupt salt record or CSPRNG failure
    pub async fn unlock(
        &self,
        password: &str,
        user_id: &str,
        is_first_time: bool,
    ) -> Result<bool, VaultError> {
        let _transition = self.transition.lock().await;

        if is_first_time {
            // Step 1: Fresh salt record for the configured scheme.
            let record = SaltRecord::new(self.config.salt_version)?;
            let salt = record.salt_bytes(user_id)?;

            // Step 2: Derive, then persist what later unlocks verify against.
            let key = derive_key(password, salt).await?;
            let check = encrypt_check(&key, user_id)?;

            // Step 3: Salt record first, then the check value. A failed
            // second write puts the previous record back.
            let previous = self.store.get_salt_record(user_id).await?;
            self.store.set_salt_record(user_id, record).await?;
            if let Err(e) = self.store.set_check_value(user_id, check).await {
                self.restore_salt_record(user_id, previous).await;
                return Err(e);
            }

            tracing::debug!(user_id, "vault set up");
            self.enter_unlocked(key, user_id, UnlockMethod::Password)
                .await;
            return Ok(true);
        }

        // Step 1: Load what the key must verify against.
        let Some(check) = self.store.get_check_value(user_id).await? else {
            tracing::warn!(user_id, "unlock attempted for a vault that was never set up");
            return Err(VaultError::NotSetUp(user_id.to_owned()));
        };
        let record = self
            .store
            .get_salt_record(user_id)
            .await?
            .unwrap_or_default();

        // Step 2: Derive and verify.
        let key = derive_key(password, record.salt_bytes(user_id)?).await?;
        if !verify_check(&key, &check, user_id) {
            tracing::info!(user_id, "unlock rejected: wrong password");
            return Ok(false);
        }

        self.enter_unlocked(key, user_id, UnlockMethod::Password)
            .await;
        Ok(true)
    }

    /// Unlock with a passkey-wrapped master key.
    ///
    /// The recovered key is trusted as-is; the check value is not consulted.
    /// Returns `Ok(false)` if the blob does not unwrap under this credential.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Crypto` if `credential_id` is empty.
    pub async fn unlock_with_wrapped_key(
        &self,
        blob: &EncryptedBlob,
        credential_id: &str,
        user_id: &str,
    ) -> Result<bool, VaultError> {
        let _transition = self.transition.lock().await;

        let wrap_key = passkey::derive_wrap_key(credential_id, user_id)?;
        let Ok(key) = passkey::unwrap(&wrap_key, blob) else {
            tracing::warn!(user_id, "passkey unlock failed");
            return Ok(false);
        };

        self.enter_unlocked(key, user_id, UnlockMethod::Passkey)
            .await;
        Ok(true)
    }

    /// Unlock with the wrapped key stored for `credential_id`.
    ///
    /// Returns `Ok(false)` when nothing is enrolled for the credential.
    ///
    /// # Errors
    ///
    /// Same as [`Self::unlock_with_wrapped_key`], plus `VaultError::Storage`.
    pub async fn unlock_with_passkey(
        &self,
        credential_id: &str,
        user_id: &str,
    ) -> Result<bool, VaultError> {
        let Some(blob) = self.store.get_wrapped_key(user_id, credential_id).await? else {
            tracing::warn!(user_id, "no passkey enrolled for credential");
            return Ok(false);
        };
        self.unlock_with_wrapped_key(&blob, credential_id, user_id)
            .await
    }

    // ── Passkey enrollment ─────────────────────────────────────────

    /// Wrap the current master key for `credential_id` and store it.
    ///
    /// # Errors
    ///
    /// - `VaultError::Locked` if the session is locked or expired
    /// - `VaultError::Crypto` if `credential_id` is empty or wrapping fails
    /// - `VaultError::Storage` if the blob cannot be stored
    pub async fn enroll_passkey(&self, credential_id: &str) -> Result<EncryptedBlob, VaultError> {
        let (key, user_id) = self.current().await?;
        let wrap_key = passkey::derive_wrap_key(credential_id, &user_id)?;
        let blob = passkey::wrap(&wrap_key, &key)?;
        self.store
            .set_wrapped_key(&user_id, credential_id, blob.clone())
            .await?;
        tracing::debug!(user_id = %user_id, "passkey enrolled");
        Ok(blob)
    }

    /// Remove the wrapped key stored for `credential_id`.
    ///
    /// # Errors
    ///
    /// `VaultError::Locked` if locked, `VaultError::Storage` on port failure.
    pub async fn revoke_passkey(&self, credential_id: &str) -> Result<(), VaultError> {
        let (_, user_id) = self.current().await?;
        self.store.remove_wrapped_key(&user_id, credential_id).await?;
        tracing::debug!(user_id = %user_id, "passkey revoked");
        Ok(())
    }

    // ── Lock & expiry ──────────────────────────────────────────────

    /// Drop the master key and clear the marker. Idempotent.
    pub async fn lock(&self) {
        let _transition = self.transition.lock().await;
        self.evict("manual lock").await;
    }

    /// `true` while unlocked, marked, and inside the timeout window.
    ///
    /// Never changes state; see [`Self::tick_timeout`].
    pub async fn is_unlocked(&self) -> bool {
        let state = self.state.read().await;
        matches!(*state, State::Unlocked(_)) && self.is_fresh()
    }

    /// Lock the session if it has expired. Returns whether it evicted.
    pub async fn tick_timeout(&self) -> bool {
        let _transition = self.transition.lock().await;
        let expired = {
            let state = self.state.read().await;
            matches!(*state, State::Unlocked(_)) && !self.is_fresh()
        };
        if expired {
            self.evict("inactivity timeout").await;
        }
        expired
    }

    /// Record user activity.
    ///
    /// Calls inside the throttle window are dropped. Does nothing while
    /// locked or once the session has already expired.
    pub async fn touch_activity(&self) {
        // Read lock held so a concurrent lock cannot be re-marked.
        let state = self.state.read().await;
        if !matches!(*state, State::Unlocked(_)) {
            return;
        }
        let Some(last) = self.marker.last_activity() else {
            return;
        };
        let now = Instant::now();
        let idle = now.saturating_duration_since(last);
        if idle < self.config.timeout && idle >= self.config.activity_throttle {
            self.marker.mark(now);
        }
    }

    // ── Field operations ───────────────────────────────────────────

    /// Encrypt one field under the session key.
    ///
    /// # Errors
    ///
    /// `VaultError::Locked` if locked or expired; `VaultError::Crypto` for
    /// blank input or a cipher failure.
    pub async fn encrypt_field(&self, plaintext: &str) -> Result<EncryptedBlob, VaultError> {
        let key = self.current_key().await?;
        Ok(cipher::encrypt(&key, plaintext)?)
    }

    /// Decrypt one field under the session key.
    ///
    /// # Errors
    ///
    /// `VaultError::Locked` if locked or expired; `VaultError::Crypto` for
    /// malformed or unauthenticated input.
    pub async fn decrypt_field(&self, blob: &EncryptedBlob) -> Result<String, VaultError> {
        let key = self.current_key().await?;
        Ok(cipher::decrypt(&key, blob)?)
    }

    /// Decrypt a batch of fields, marking unauthenticated ones as failed.
    ///
    /// # Errors
    ///
    /// `VaultError::Locked` if locked or expired. A malformed blob aborts the
    /// whole batch with `VaultError::Crypto`.
    pub async fn decrypt_fields<'a, I>(&self, blobs: I) -> Result<Vec<FieldOutcome>, VaultError>
    where
        I: IntoIterator<Item = &'a EncryptedBlob>,
    {
        let key = self.current_key().await?;
        bulk::decrypt_all(&key, blobs)
    }

    // ── Re-authentication & reset ──────────────────────────────────

    /// Confirm the master password while unlocked, before a sensitive action.
    ///
    /// # Errors
    ///
    /// - `VaultError::WrongPassword` on mismatch
    /// - `VaultError::Locked` if locked or expired
    /// - `VaultError::NotSetUp` if the check value is gone
    pub async fn reauthenticate(&self, password: &str) -> Result<(), VaultError> {
        let (_, user_id) = self.current().await?;

        let Some(check) = self.store.get_check_value(&user_id).await? else {
            return Err(VaultError::NotSetUp(user_id));
        };
        let record = self
            .store
            .get_salt_record(&user_id)
            .await?
            .unwrap_or_default();

        let key = derive_key(password, record.salt_bytes(&user_id)?).await?;
        if verify_check(&key, &check, &user_id) {
            Ok(())
        } else {
            tracing::info!(user_id = %user_id, "re-authentication rejected: wrong password");
            Err(VaultError::WrongPassword)
        }
    }

    /// Confirm presence with an enrolled passkey while unlocked.
    ///
    /// # Errors
    ///
    /// - `VaultError::PasskeyUnlockFailed` if nothing is enrolled for
    ///   `credential_id` or the stored blob does not yield the session key
    /// - `VaultError::Locked` if locked or expired
    /// - `VaultError::Storage` if the port fails
    pub async fn reauthenticate_with_passkey(&self, credential_id: &str) -> Result<(), VaultError> {
        let (key, user_id) = self.current().await?;

        let Some(blob) = self.store.get_wrapped_key(&user_id, credential_id).await? else {
            tracing::warn!(user_id = %user_id, "passkey re-authentication: nothing enrolled");
            return Err(VaultError::PasskeyUnlockFailed);
        };
        let recovered = passkey::derive_wrap_key(credential_id, &user_id)
            .and_then(|wrap_key| passkey::unwrap(&wrap_key, &blob));
        match recovered {
            Ok(recovered) if recovered.ct_eq(&key) => Ok(()),
            _ => {
                tracing::warn!(user_id = %user_id, "passkey re-authentication rejected");
                Err(VaultError::PasskeyUnlockFailed)
            }
        }
    }

    /// Lock and forget the vault setup for `user_id`.
    ///
    /// # Errors
    ///
    /// `VaultError::Storage` if the port fails; the session is locked
    /// regardless.
    pub async fn reset(&self, user_id: &str) -> Result<(), VaultError> {
        let _transition = self.transition.lock().await;
        self.evict("vault reset").await;
        self.store.clear_check_value(user_id).await?;
        self.store.clear_salt_record(user_id).await?;
        tracing::debug!(user_id, "vault reset");
        Ok(())
    }

    // ── Observers ──────────────────────────────────────────────────

    /// State as of the last transition.
    ///
    /// An expired session still reports `Unlocked` here until evicted.
    pub fn status(&self) -> LockState {
        *self.status.borrow()
    }

    /// Receiver notified on every lock/unlock transition.
    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.status.subscribe()
    }

    /// User of the current session, if unlocked.
    pub async fn user_id(&self) -> Option<String> {
        match &*self.state.read().await {
            State::Unlocked(active) => Some(active.user_id.clone()),
            State::Locked => None,
        }
    }

    /// How the current session was unlocked, if unlocked.
    pub async fn unlock_method(&self) -> Option<UnlockMethod> {
        match &*self.state.read().await {
            State::Unlocked(active) => Some(active.method),
            State::Locked => None,
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    fn is_fresh(&self) -> bool {
        self.marker.last_activity().is_some_and(|last| {
            Instant::now().saturating_duration_since(last) < self.config.timeout
        })
    }

    async fn current(&self) -> Result<(Arc<MasterKey>, String), VaultError> {
        let state = self.state.read().await;
        match &*state {
            State::Unlocked(active) if self.is_fresh() => {
                Ok((Arc::clone(&active.key), active.user_id.clone()))
            }
            _ => Err(VaultError::Locked),
        }
    }

    async fn current_key(&self) -> Result<Arc<MasterKey>, VaultError> {
        self.current().await.map(|(key, _)| key)
    }

    async fn restore_salt_record(&self, user_id: &str, previous: Option<SaltRecord>) {
        let restored = match previous {
            Some(record) => self.store.set_salt_record(user_id, record).await,
            None => self.store.clear_salt_record(user_id).await,
        };
        if let Err(e) = restored {
            tracing::warn!(user_id, "failed to roll back salt record: {e}");
        }
    }

    /// Caller must hold the transition guard.
    async fn enter_unlocked(&self, key: MasterKey, user_id: &str, method: UnlockMethod) {
        let mut state = self.state.write().await;
        self.marker.mark(Instant::now());
        *state = State::Unlocked(ActiveSession {
            key: Arc::new(key),
            user_id: user_id.to_owned(),
            method,
        });
        drop(state);

        self.status.send_replace(LockState::Unlocked);
        tracing::debug!(user_id, method = method.as_str(), "vault unlocked");
    }

    /// Caller must hold the transition guard.
    async fn evict(&self, reason: &str) {
        let mut state = self.state.write().await;
        let previous = std::mem::replace(&mut *state, State::Locked);
        self.marker.clear();
        drop(state);

        if matches!(previous, State::Unlocked(_)) {
            self.status.send_replace(LockState::Locked);
            tracing::debug!(reason, "vault locked");
        }
    }
}

/// Run PBKDF2 on the blocking pool.
async fn derive_key(password: &str, salt: Vec<u8>) -> Result<MasterKey, VaultError> {
    let password = SecretString::from(password.to_owned());
    let key = tokio::task::spawn_blocking(move || kdf::derive(password.expose_secret(), &salt))
        .await
        .map_err(|e| VaultError::Task(format!("key derivation task failed: {e}")))??;
    Ok(key)
}

// ── Tests ──────────────────────────────────────────────────────────
