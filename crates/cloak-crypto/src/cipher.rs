//! ChaCha20-Poly1305 authenticated encryption
//!
//! The wire layout is nonce || ciphertext || tag; the nonce is prepended so
//! decryption needs no external state. Password-wrapped data uses the same
//! layout with a key derived from the password.

use chacha20poly1305::{
    aead::{Aead, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use cloak_core::ports::{Cipher, CipherError};

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;
/// 96-bit nonce (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Generate a cryptographically secure random key
pub fn generate_key() -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; KEY_SIZE]);
    OsRng.fill_bytes(key.as_mut());
    key
}

fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Derive a cipher key from a password. One-way; the password itself never
/// becomes key material directly.
fn derive_password_key(password: &SecretString) -> Zeroizing<[u8; KEY_SIZE]> {
    let digest = Sha256::digest(password.expose_secret().as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&digest);
    key
}

/// Encrypt plaintext with ChaCha20-Poly1305.
///
/// Returns: nonce || ciphertext || tag
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    if key.len() != KEY_SIZE {
        return Err(CipherError::InvalidKey {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| CipherError::InvalidKey {
        expected: KEY_SIZE,
        actual: key.len(),
    })?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::Encrypt)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt ciphertext produced by [`encrypt`].
///
/// Expects: nonce || ciphertext || tag
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    if key.len() != KEY_SIZE {
        return Err(CipherError::InvalidKey {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }

    if ciphertext.len() < NONCE_SIZE {
        return Err(CipherError::Decrypt);
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| CipherError::InvalidKey {
        expected: KEY_SIZE,
        actual: key.len(),
    })?;

    let (nonce_bytes, encrypted) = ciphertext.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, encrypted)
        .map_err(|_| CipherError::Decrypt)?;

    Ok(Zeroizing::new(plaintext))
}

/// The cipher collaborator handed to the core.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaChaCipher;

impl Cipher for ChaChaCipher {
    fn generate_key(&self) -> Zeroizing<Vec<u8>> {
        generate_key()
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        encrypt(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        decrypt(ciphertext, key)
    }

    fn encrypt_with_password(
        &self,
        plaintext: &[u8],
        password: &SecretString,
    ) -> Result<Vec<u8>, CipherError> {
        let key = derive_password_key(password);
        encrypt(plaintext, key.as_ref())
    }

    fn decrypt_with_password(
        &self,
        ciphertext: &[u8],
        password: &SecretString,
    ) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        let key = derive_password_key(password);
        decrypt(ciphertext, key.as_ref())
    }
}
