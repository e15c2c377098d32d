//! `keystead-crypto-core`: Pure cryptographic primitives for Keystead.
//!
//! This crate is the audit target: zero network, zero async, zero storage.
//! Everything here is a function of its inputs plus the OS CSPRNG.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;

pub mod blob;
pub mod cipher;

pub mod check_value;

pub mod passkey;

pub use blob::EncryptedBlob;
pub use check_value::{encrypt_check, verify_check};
pub use error::CryptoError;
pub use kdf::{derive, legacy_salt, MasterKey, SaltRecord, SaltVersion, PBKDF2_ITERATIONS};
pub use memory::SecretBytes;
pub use passkey::{derive_wrap_key, WrapKey};
