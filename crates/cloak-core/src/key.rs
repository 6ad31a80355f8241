//! Private key resolution: candidate sources, encoding checks, password
//! unlock.
//!
//! Source precedence is fixed: the `key` option (with file/env detection on
//! its value), then `keyfile`, then `keychain`, then `interactive`. Once raw
//! material is found it must base64url-decode, and material that looks
//! password-wrapped goes through a bounded-retry unlock loop backed by the
//! password cache.

use std::env;
use std::fs;
use std::io;
use std::path::Path;

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::cache::{self, PasswordCache};
use crate::options::{Flag, OptionSet};
use crate::ports::{Cipher, InteractiveInput, Keychain, KeychainError};

/// Private keys are 256-bit.
pub const KEY_BYTES: usize = 32;

/// Length of the url-safe token for a bare 32-byte key. Raw material longer
/// than this is treated as a password-wrapped blob. Policy constant, not a
/// contract; revisit if the token format ever changes.
pub const BARE_TOKEN_MAX_LEN: usize = 44;

/// Total interactive attempts at a key-unlock password.
pub const PASSWORD_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Literal,
    File,
    Keychain,
    Environment,
    Interactive,
}

/// Raw key material plus where it came from. Transient; never persisted.
pub struct KeyCandidate {
    pub source: KeySource,
    pub material: Zeroizing<String>,
}

impl KeyCandidate {
    fn new(source: KeySource, material: impl Into<String>) -> Self {
        let material: String = material.into();
        Self {
            source,
            material: Zeroizing::new(material.trim().to_string()),
        }
    }
}

/// The decoded, validated key handed to cipher operations. The raw token
/// base64url-decoded successfully before this value was constructed.
pub struct ResolvedKey {
    bytes: Zeroizing<Vec<u8>>,
    pub source: KeySource,
    pub was_password_protected: bool,
}

impl ResolvedKey {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The key re-encoded as its url-safe token.
    pub fn token(&self) -> String {
        URL_SAFE.encode(&self.bytes)
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("No private key was supplied or found")]
    NotFound,

    #[error("Encryption key file {path} was not found")]
    FileNotFound { path: String },

    #[error("Private key does not appear to be properly encoded.{hint}")]
    InvalidEncoding { hint: &'static str },

    #[error("Invalid password: private key can not be decrypted")]
    InvalidPassword,

    #[error("Keychain error: {0}")]
    Keychain(#[from] KeychainError),

    #[error("Input error: {0}")]
    Input(#[from] io::Error),
}

/// Resolves a usable private key from the option set and its collaborators.
pub struct KeyResolver<'a> {
    options: &'a OptionSet,
    input: &'a dyn InteractiveInput,
    keychain: Option<&'a dyn Keychain>,
    cipher: &'a dyn Cipher,
}

impl<'a> KeyResolver<'a> {
    pub fn new(
        options: &'a OptionSet,
        input: &'a dyn InteractiveInput,
        keychain: Option<&'a dyn Keychain>,
        cipher: &'a dyn Cipher,
    ) -> Self {
        Self {
            options,
            input,
            keychain,
            cipher,
        }
    }

    pub fn resolve(&self, cache: &mut PasswordCache) -> Result<ResolvedKey, KeyError> {
        let candidate = self.locate()?.ok_or(KeyError::NotFound)?;
        tracing::debug!(source = ?candidate.source, "private key material located");
        self.unlock(candidate, cache)
    }

    /// Walk the sources in their fixed precedence order; first present wins.
    fn locate(&self) -> Result<Option<KeyCandidate>, KeyError> {
        if let Some(spec) = self.options.get_str(Flag::Key) {
            return detect(spec).map(Some);
        }

        if let Some(path) = self.options.get_str(Flag::Keyfile) {
            let material = read_key_file(path)?;
            return Ok(Some(KeyCandidate::new(KeySource::File, material)));
        }

        if let (Some(name), Some(keychain)) = (self.options.get_str(Flag::Keychain), self.keychain)
        {
            // an absent entry falls through to the next source
            if let Some(value) = keychain.read(name)? {
                return Ok(Some(KeyCandidate::new(KeySource::Keychain, value)));
            }
        }

        if self.options.is_set(Flag::Interactive) {
            let entered = self.input.prompt("Private key: ")?;
            if entered.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(KeyCandidate::new(KeySource::Interactive, entered)));
        }

        Ok(None)
    }

    /// Verify the encoding of the raw material and, when it looks
    /// password-wrapped, drive the unlock loop.
    fn unlock(
        &self,
        candidate: KeyCandidate,
        cache: &mut PasswordCache,
    ) -> Result<ResolvedKey, KeyError> {
        let raw = candidate.material.as_str();
        let decoded = URL_SAFE
            .decode(raw)
            .map_err(|_| self.invalid_encoding())?;

        let wrapped = raw.len() > BARE_TOKEN_MAX_LEN || self.options.is_set(Flag::Password);
        if !wrapped {
            return Ok(ResolvedKey {
                bytes: Zeroizing::new(decoded),
                source: candidate.source,
                was_password_protected: false,
            });
        }

        let blob = Zeroizing::new(decoded);
        let fp = cache::fingerprint(raw.as_bytes());

        // a cached password is tried first and does not consume an attempt
        if let Some(cached) = cache.get(&fp) {
            let password = SecretString::new(String::from_utf8_lossy(&cached).into_owned());
            if let Ok(inner) = self.cipher.decrypt_with_password(&blob, &password) {
                return self.decode_inner(inner, candidate.source);
            }
            tracing::debug!("cached password no longer unlocks this key");
        }

        let mut attempts = 0;
        loop {
            let password = self.input.prompt_secret("Password: ")?;
            match self.cipher.decrypt_with_password(&blob, &password) {
                Ok(inner) => {
                    cache.put(&fp, password.expose_secret().as_bytes());
                    return self.decode_inner(inner, candidate.source);
                }
                Err(_) => {
                    attempts += 1;
                    if attempts >= PASSWORD_ATTEMPTS {
                        return Err(KeyError::InvalidPassword);
                    }
                    self.input.report("Invalid password, try again.");
                }
            }
        }
    }

    /// The unwrapped blob holds the bare key token, which must decode too.
    fn decode_inner(
        &self,
        inner: Zeroizing<Vec<u8>>,
        source: KeySource,
    ) -> Result<ResolvedKey, KeyError> {
        let token =
            std::str::from_utf8(&inner).map_err(|_| KeyError::InvalidEncoding { hint: "" })?;
        let bytes = URL_SAFE
            .decode(token.trim())
            .map_err(|_| KeyError::InvalidEncoding { hint: "" })?;
        Ok(ResolvedKey {
            bytes: Zeroizing::new(bytes),
            source,
            was_password_protected: true,
        })
    }

    fn invalid_encoding(&self) -> KeyError {
        // the hint is for the human only; once a password was supplied it
        // would just be noise
        let hint = if self.options.is_set(Flag::Password) {
            ""
        } else {
            " Perhaps the key is password-protected?"
        };
        KeyError::InvalidEncoding { hint }
    }
}

/// Interpret a `key` option value the way the tool has always advertised it:
/// a path to a key file, the name of an environment variable, or the literal
/// key string.
fn detect(spec: &str) -> Result<KeyCandidate, KeyError> {
    if Path::new(spec).is_file() {
        let material = read_key_file(spec)?;
        return Ok(KeyCandidate::new(KeySource::File, material));
    }
    if let Ok(value) = env::var(spec) {
        if !value.trim().is_empty() {
            return Ok(KeyCandidate::new(KeySource::Environment, value));
        }
    }
    Ok(KeyCandidate::new(KeySource::Literal, spec))
}

fn read_key_file(path: &str) -> Result<String, KeyError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => KeyError::FileNotFound {
            path: path.to_string(),
        },
        _ => KeyError::Input(e),
    })
}
