//! OS keychain adapter over the `keyring` crate.
//!
//! Key tokens are plain base64 text, so they are stored as ordinary
//! password entries under a fixed service name.

use cloak_core::ports::{Keychain, KeychainError};

pub const SERVICE_NAME: &str = "cloak";

pub struct SystemKeychain {
    service: String,
}

impl SystemKeychain {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    /// Whether this host has a keychain backend at all. On hosts without
    /// one the `keychain` flag never enters the option vocabulary.
    pub fn available() -> bool {
        cfg!(any(target_os = "macos", target_os = "linux", target_os = "windows"))
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry, KeychainError> {
        keyring::Entry::new(&self.service, name)
            .map_err(|e| KeychainError::Platform(e.to_string()))
    }
}

impl Default for SystemKeychain {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl Keychain for SystemKeychain {
    fn read(&self, name: &str) -> Result<Option<String>, KeychainError> {
        match self.entry(name)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                tracing::debug!(name, "no keychain entry with that name");
                Ok(None)
            }
            Err(e) => Err(KeychainError::Platform(e.to_string())),
        }
    }

    fn write(&self, name: &str, value: &str) -> Result<(), KeychainError> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| KeychainError::Platform(e.to_string()))
    }

    fn delete(&self, name: &str) -> Result<(), KeychainError> {
        match self.entry(name)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::Platform(e.to_string())),
        }
    }
}
