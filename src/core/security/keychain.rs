//! OS-native keychain integration.
//!
//! This module stores the application's credential entries in the platform
//! credential store via the `keyring` crate:
//! - Windows: Credential Manager (DPAPI encryption)
//! - macOS: Keychain
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//!
//! Each entry is addressed by the fixed service name plus the storage key,
//! so values never touch disk in plaintext.

use keyring::Entry;

use super::storage::{SecureStorageError, SecureStorageProvider, SecureStorageResult};

const SERVICE_NAME: &str = "CaseNotes";

/// Key used only to probe backend reachability at construction time.
const PROBE_KEY: &str = "backend.probe";

/// Secure storage backed by the OS keychain.
pub struct KeyringStorageProvider {
    service: String,
}

impl KeyringStorageProvider {
    /// Creates a provider for the default application service name.
    pub fn new() -> SecureStorageResult<Self> {
        Self::with_service(SERVICE_NAME)
    }

    /// Creates a provider for a custom service name.
    ///
    /// Performs a cheap read against the backend so that an unusable
    /// platform store surfaces here instead of on first real use.
    pub fn with_service(service: &str) -> SecureStorageResult<Self> {
        let probe = Entry::new(service, PROBE_KEY).map_err(|e| {
            SecureStorageError::Unavailable(format!("keychain backend unavailable: {e}"))
        })?;

        match probe.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(Self {
                service: service.to_string(),
            }),
            Err(e) => Err(SecureStorageError::Unavailable(format!(
                "keychain backend unreachable: {e}"
            ))),
        }
    }

    fn entry(&self, key: &str) -> SecureStorageResult<Entry> {
        Entry::new(&self.service, key).map_err(|e| {
            SecureStorageError::Operation(format!("failed to open keychain entry {key:?}: {e}"))
        })
    }
}

impl SecureStorageProvider for KeyringStorageProvider {
    fn store(&self, key: &str, value: &str) -> SecureStorageResult<()> {
        self.entry(key)?.set_password(value).map_err(|e| {
            SecureStorageError::Operation(format!("failed to write keychain entry {key:?}: {e}"))
        })
    }

    fn retrieve(&self, key: &str) -> SecureStorageResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SecureStorageError::Operation(format!(
                "failed to read keychain entry {key:?}: {e}"
            ))),
        }
    }

    fn delete(&self, key: &str) -> SecureStorageResult<()> {
        match self.entry(key)?.delete_password() {
            // 幂等：条目不存在视为成功
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecureStorageError::Operation(format!(
                "failed to delete keychain entry {key:?}: {e}"
            ))),
        }
    }

    fn exists(&self, key: &str) -> bool {
        matches!(self.retrieve(key), Ok(Some(_)))
    }

    fn is_available(&self) -> bool {
        // Construction already proved the backend reachable.
        true
    }
}
