//! Capability ports the core calls into.
//!
//! Concrete adapters (AEAD cipher, OS keychain, terminal, $EDITOR) live in
//! the cloak-crypto and cloak-cli crates. The core only ever talks to these
//! traits, which keeps every decision path testable with stubs.

use secrecy::SecretString;
use thiserror::Error;
use zeroize::Zeroizing;

/// Failures surfaced by the cipher collaborator. The core never generates
/// these itself; it propagates them.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed - wrong key, wrong password, or corrupt data")]
    Decrypt,

    #[error("Invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },
}

/// Symmetric cipher contract.
///
/// Key material is raw bytes; password variants derive a key from the
/// password internally so the core never sees derived key bytes.
pub trait Cipher {
    /// Generate a fresh random private key.
    fn generate_key(&self) -> Zeroizing<Vec<u8>>;

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError>;

    fn encrypt_with_password(
        &self,
        plaintext: &[u8],
        password: &SecretString,
    ) -> Result<Vec<u8>, CipherError>;

    fn decrypt_with_password(
        &self,
        ciphertext: &[u8],
        password: &SecretString,
    ) -> Result<Zeroizing<Vec<u8>>, CipherError>;
}

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("No keychain available on this host")]
    Unavailable,

    #[error("Keychain platform error: {0}")]
    Platform(String),
}

/// Named-secret storage provided by the host when available. Hosts without
/// one simply pass no implementation, and the `keychain` flag never enters
/// the option vocabulary.
pub trait Keychain {
    fn read(&self, name: &str) -> Result<Option<String>, KeychainError>;

    fn write(&self, name: &str, value: &str) -> Result<(), KeychainError>;

    fn delete(&self, name: &str) -> Result<(), KeychainError>;
}

/// Blocking interactive input. There is no timeout: waiting on a human is
/// the one operation allowed to block indefinitely.
pub trait InteractiveInput {
    /// Prompt for a visible line of input.
    fn prompt(&self, message: &str) -> std::io::Result<String>;

    /// Prompt for a masked secret.
    fn prompt_secret(&self, message: &str) -> std::io::Result<SecretString>;

    /// Show the user a notice (e.g. a retry warning) without asking for input.
    fn report(&self, message: &str);
}

/// External-editor hand-off used by the edit-in-place command.
pub trait Editor {
    /// Present `initial` to the user for editing and return the edited bytes.
    fn edit(&self, initial: &[u8]) -> std::io::Result<Vec<u8>>;
}
