//! Cloak crypto - concrete collaborators behind the core's capability ports
//!
//! This crate provides:
//! - ChaCha20-Poly1305 authenticated encryption
//! - Password-derived key wrapping
//! - OS keychain storage for key tokens

pub mod cipher;
pub mod keychain;

pub use cipher::ChaChaCipher;
pub use keychain::SystemKeychain;
