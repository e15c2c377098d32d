//! Non-sensitive session preferences: stored as plain JSON outside the vault.
//!
//! Readable before unlock so the auto-lock window is known before the
//! first session starts.

use std::fs;
use std::path::Path;
use std::time::Duration;

use keystead_crypto_core::SaltVersion;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Shortest accepted auto-lock window, in minutes.
pub const MIN_TIMEOUT_MINUTES: u32 = 1;

/// Longest accepted auto-lock window, in minutes.
pub const MAX_TIMEOUT_MINUTES: u32 = 120;

/// Auto-lock window used when nothing is configured.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 10;

/// Non-sensitive vault preferences.
///
/// Persisted to `{data_dir}/preferences.json`. All fields have defaults
/// via [`Default`], so partial or older files still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Minutes of inactivity before the vault auto-locks (1–120).
    #[serde(default = "default_timeout")]
    pub vault_timeout_minutes: u32,

    /// Salt scheme for vaults created from now on. Existing vaults keep
    /// whatever their stored salt record says.
    #[serde(default)]
    pub new_vault_salt_version: SaltVersion,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            vault_timeout_minutes: default_timeout(),
            new_vault_salt_version: SaltVersion::default(),
        }
    }
}

const fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_MINUTES
}

impl Preferences {
    /// Configured timeout clamped into `1..=120` minutes.
    #[must_use]
    pub fn timeout_minutes(&self) -> u32 {
        self.vault_timeout_minutes
            .clamp(MIN_TIMEOUT_MINUTES, MAX_TIMEOUT_MINUTES)
    }

    /// Auto-lock window as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_minutes()).saturating_mul(60))
    }
}

// ── File I/O ───────────────────────────────────────────────────────

const PREFERENCES_FILE: &str = "preferences.json";

impl Preferences {
    /// Load preferences from `{data_dir}/preferences.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or
    /// contains invalid JSON.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(PREFERENCES_FILE);
        let prefs = fs::read_to_string(&path).map_or_else(
            |_| Self::default(),
            |contents| {
                serde_json::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("preferences.json is corrupt, using defaults: {e}");
                    Self::default()
                })
            },
        );
        if prefs.vault_timeout_minutes != prefs.timeout_minutes() {
            tracing::warn!(
                configured = prefs.vault_timeout_minutes,
                "vault timeout out of range, clamping"
            );
        }
        prefs
    }

    /// Persist preferences to `{data_dir}/preferences.json`.
    ///
    /// Writes to a `.tmp` sibling and renames it into place.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Io` if the directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> Result<(), VaultError> {
        let path = data_dir.join(PREFERENCES_FILE);
        let tmp = data_dir.join(".preferences.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
