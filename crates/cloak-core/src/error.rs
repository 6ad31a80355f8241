//! Error taxonomy for the decision layer.
//!
//! Every failure path carries enough context for a human-readable message
//! upstream; nothing here silently succeeds on invalid input. Cache failures
//! are the one category absorbed locally (see `cache`), so they never appear
//! in this enum.

use thiserror::Error;

use crate::key::KeyError;
use crate::ports::{CipherError, KeychainError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to determine what command to run. You provided the following options: {supplied}")]
    CommandNotFound { supplied: String },

    #[error("{0}")]
    Key(#[from] KeyError),

    #[error("{0}. Perhaps either the key is invalid, or the encrypted data is corrupt")]
    Cipher(#[from] CipherError),

    #[error("{0}")]
    Keychain(#[from] KeychainError),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
