//! Application orchestration: resolve the command, resolve the key, execute.
//!
//! All collaborators arrive through an explicit [`Ports`] bundle; there is no
//! ambient state. The CLI driver builds the option set and the ports, calls
//! [`Application::execute`] once, and renders the returned [`Outcome`].

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use secrecy::{ExposeSecret, SecretString};

use crate::cache::PasswordCache;
use crate::commands::{self, CommandDescriptor, CommandKind};
use crate::error::Error;
use crate::key::{KeyError, KeyResolver, ResolvedKey};
use crate::options::{Flag, OptionSet};
use crate::ports::{Cipher, Editor, InteractiveInput, Keychain, KeychainError};

/// What a command produced. Rendering (stdout, files, help text) is the CLI
/// driver's job; payloads pass through it unmodified.
#[derive(Debug)]
pub enum Outcome {
    /// Encrypt/decrypt result for the selected output sink.
    Payload(Vec<u8>),
    /// A key token: generated, printed, or re-wrapped.
    KeyToken(String),
    /// The key was written to the named keychain entry.
    Stored { name: String },
    /// Re-encrypted content for the file that was edited.
    Edited { ciphertext: Vec<u8> },
    ShowHelp,
    ShowExamples,
    ShowVersion,
}

/// The capability bundle the application runs against.
pub struct Ports<'a> {
    pub cipher: &'a dyn Cipher,
    pub input: &'a dyn InteractiveInput,
    pub keychain: Option<&'a dyn Keychain>,
    pub editor: &'a dyn Editor,
}

pub struct Application<'a> {
    options: OptionSet,
    registry: Vec<CommandDescriptor>,
    ports: Ports<'a>,
    cache: PasswordCache,
}

impl<'a> Application<'a> {
    pub fn new(options: OptionSet, ports: Ports<'a>, cache: PasswordCache) -> Self {
        Self {
            options,
            registry: commands::registry(),
            ports,
            cache,
        }
    }

    /// Run the single operation this invocation asked for. `content` is the
    /// already-loaded input (string flag, file, or stdin), if any.
    pub fn execute(&mut self, content: Option<&[u8]>) -> Result<Outcome, Error> {
        let descriptor = commands::resolve(&self.options, &self.registry)
            .ok_or_else(|| Error::CommandNotFound {
                supplied: self.options.supplied_names(),
            })?
            .clone();
        tracing::debug!(command = ?descriptor.kind, "resolved command");

        let key = if descriptor.needs_key {
            let resolver = KeyResolver::new(
                &self.options,
                self.ports.input,
                self.ports.keychain,
                self.ports.cipher,
            );
            Some(resolver.resolve(&mut self.cache)?)
        } else {
            None
        };

        match descriptor.kind {
            CommandKind::GenerateKey => self.generate_key(),
            CommandKind::Encrypt => self.encrypt(require_key(key)?, content.unwrap_or_default()),
            CommandKind::Decrypt => self.decrypt(require_key(key)?, content.unwrap_or_default()),
            CommandKind::Edit => self.edit(require_key(key)?, content.unwrap_or_default()),
            CommandKind::PasswordProtectKey => self.password_protect_key(require_key(key)?),
            CommandKind::KeychainAddKey => self.keychain_add_key(require_key(key)?),
            CommandKind::PrintKey => Ok(Outcome::KeyToken(require_key(key)?.token())),
            CommandKind::ShowExamples => Ok(Outcome::ShowExamples),
            CommandKind::ShowVersion => Ok(Outcome::ShowVersion),
            CommandKind::ShowHelp => Ok(Outcome::ShowHelp),
        }
    }

    fn generate_key(&self) -> Result<Outcome, Error> {
        let bytes = self.ports.cipher.generate_key();
        let mut token = URL_SAFE.encode(bytes.as_slice());

        if self.options.is_set(Flag::Password) {
            let password = self.prompt_new_password()?;
            let wrapped = self
                .ports
                .cipher
                .encrypt_with_password(token.as_bytes(), &password)?;
            token = URL_SAFE.encode(wrapped);
        }

        if let Some(name) = self.options.get_str(Flag::Keychain) {
            self.keychain()?.write(name, &token)?;
        }

        Ok(Outcome::KeyToken(token))
    }

    fn encrypt(&self, key: ResolvedKey, content: &[u8]) -> Result<Outcome, Error> {
        let ciphertext = self.ports.cipher.encrypt(content, key.bytes())?;
        Ok(Outcome::Payload(URL_SAFE.encode(ciphertext).into_bytes()))
    }

    fn decrypt(&self, key: ResolvedKey, content: &[u8]) -> Result<Outcome, Error> {
        let plaintext = self.decrypt_content(&key, content)?;
        Ok(Outcome::Payload(plaintext))
    }

    fn edit(&self, key: ResolvedKey, content: &[u8]) -> Result<Outcome, Error> {
        let plaintext = self.decrypt_content(&key, content)?;
        let edited = self.ports.editor.edit(&plaintext)?;
        let ciphertext = self.ports.cipher.encrypt(&edited, key.bytes())?;
        Ok(Outcome::Edited {
            ciphertext: URL_SAFE.encode(ciphertext).into_bytes(),
        })
    }

    fn password_protect_key(&self, key: ResolvedKey) -> Result<Outcome, Error> {
        let password = self.prompt_new_password()?;
        let wrapped = self
            .ports
            .cipher
            .encrypt_with_password(key.token().as_bytes(), &password)?;
        Ok(Outcome::KeyToken(URL_SAFE.encode(wrapped)))
    }

    fn keychain_add_key(&self, key: ResolvedKey) -> Result<Outcome, Error> {
        // eligibility guaranteed the flag is present
        let name = self
            .options
            .get_str(Flag::Keychain)
            .ok_or(Error::Keychain(KeychainError::Unavailable))?
            .to_string();
        self.keychain()?.write(&name, &key.token())?;
        Ok(Outcome::Stored { name })
    }

    /// Ciphertext travels as url-safe base64 text; a single trailing newline
    /// from files or pipes is tolerated.
    fn decrypt_content(&self, key: &ResolvedKey, content: &[u8]) -> Result<Vec<u8>, Error> {
        let text = std::str::from_utf8(content)
            .map_err(|_| crate::ports::CipherError::Decrypt)?;
        let bytes = URL_SAFE
            .decode(text.trim_end_matches(|c| c == '\r' || c == '\n'))
            .map_err(|_| crate::ports::CipherError::Decrypt)?;
        let plaintext = self.ports.cipher.decrypt(&bytes, key.bytes())?;
        Ok(plaintext.to_vec())
    }

    fn prompt_new_password(&self) -> Result<SecretString, Error> {
        let first = self
            .ports
            .input
            .prompt_secret("New password: ")
            .map_err(KeyError::Input)?;
        let second = self
            .ports
            .input
            .prompt_secret("Confirm password: ")
            .map_err(KeyError::Input)?;
        if first.expose_secret() != second.expose_secret() {
            return Err(Error::PasswordMismatch);
        }
        Ok(first)
    }

    fn keychain(&self) -> Result<&dyn Keychain, Error> {
        self.ports
            .keychain
            .ok_or(Error::Keychain(KeychainError::Unavailable))
    }
}

fn require_key(key: Option<ResolvedKey>) -> Result<ResolvedKey, Error> {
    key.ok_or(Error::Key(KeyError::NotFound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KEY_BYTES;
    use crate::ports::CipherError;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;
    use zeroize::Zeroizing;

    /// Reversible toy cipher: XOR against the key (or password) repeated.
    /// Good enough to prove the plumbing end to end.
    struct XorCipher;

    fn xor(data: &[u8], pad: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(pad.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }

    impl Cipher for XorCipher {
        fn generate_key(&self) -> Zeroizing<Vec<u8>> {
            Zeroizing::new(vec![5u8; KEY_BYTES])
        }

        fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
            if key.is_empty() {
                return Err(CipherError::InvalidKey {
                    expected: KEY_BYTES,
                    actual: 0,
                });
            }
            Ok(xor(plaintext, key))
        }

        fn decrypt(
            &self,
            ciphertext: &[u8],
            key: &[u8],
        ) -> Result<Zeroizing<Vec<u8>>, CipherError> {
            if key.is_empty() {
                return Err(CipherError::InvalidKey {
                    expected: KEY_BYTES,
                    actual: 0,
                });
            }
            Ok(Zeroizing::new(xor(ciphertext, key)))
        }

        fn encrypt_with_password(
            &self,
            plaintext: &[u8],
            password: &SecretString,
        ) -> Result<Vec<u8>, CipherError> {
            Ok(xor(plaintext, password.expose_secret().as_bytes()))
        }

        fn decrypt_with_password(
            &self,
            ciphertext: &[u8],
            password: &SecretString,
        ) -> Result<Zeroizing<Vec<u8>>, CipherError> {
            Ok(Zeroizing::new(xor(
                ciphertext,
                password.expose_secret().as_bytes(),
            )))
        }
    }

    struct FixedInput {
        secret: &'static str,
    }

    impl InteractiveInput for FixedInput {
        fn prompt(&self, _message: &str) -> io::Result<String> {
            Ok(String::new())
        }

        fn prompt_secret(&self, _message: &str) -> io::Result<SecretString> {
            Ok(SecretString::new(self.secret.to_string()))
        }

        fn report(&self, _message: &str) {}
    }

    #[derive(Default)]
    struct MemoryKeychain {
        entries: Mutex<HashMap<String, String>>,
    }

    impl Keychain for MemoryKeychain {
        fn read(&self, name: &str) -> Result<Option<String>, KeychainError> {
            Ok(self.entries.lock().unwrap().get(name).cloned())
        }

        fn write(&self, name: &str, value: &str) -> Result<(), KeychainError> {
            self.entries
                .lock()
                .unwrap()
                .insert(name.to_string(), value.to_string());
            Ok(())
        }

        fn delete(&self, name: &str) -> Result<(), KeychainError> {
            self.entries.lock().unwrap().remove(name);
            Ok(())
        }
    }

    struct ReplacingEditor {
        replacement: &'static [u8],
    }

    impl Editor for ReplacingEditor {
        fn edit(&self, _initial: &[u8]) -> io::Result<Vec<u8>> {
            Ok(self.replacement.to_vec())
        }
    }

    fn key_token() -> String {
        URL_SAFE.encode([11u8; KEY_BYTES])
    }

    fn run(
        options: OptionSet,
        keychain: Option<&dyn Keychain>,
        content: Option<&[u8]>,
    ) -> Result<Outcome, Error> {
        let cipher = XorCipher;
        let input = FixedInput { secret: "pw" };
        let editor = ReplacingEditor {
            replacement: b"edited",
        };
        let ports = Ports {
            cipher: &cipher,
            input: &input,
            keychain,
            editor: &editor,
        };
        let mut app = Application::new(options, ports, PasswordCache::disabled());
        app.execute(content)
    }

    fn payload(outcome: Outcome) -> Vec<u8> {
        match outcome {
            Outcome::Payload(bytes) => bytes,
            other => panic!("expected payload, got {:?}", other),
        }
    }

    #[test]
    fn test_encrypt_then_decrypt_roundtrip() {
        let encrypt = OptionSet::new()
            .with_flag(Flag::Encrypt)
            .with_str(Flag::Key, key_token())
            .with_str(Flag::String, "hello");
        let ciphertext = payload(run(encrypt, None, Some(b"hello")).unwrap());
        assert_ne!(ciphertext, b"hello");

        let decrypt = OptionSet::new()
            .with_flag(Flag::Decrypt)
            .with_str(Flag::Key, key_token())
            .with_str(Flag::String, String::from_utf8(ciphertext.clone()).unwrap());
        let plaintext = payload(run(decrypt, None, Some(&ciphertext)).unwrap());
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn test_decrypt_tolerates_trailing_newline() {
        let encrypt = OptionSet::new()
            .with_flag(Flag::Encrypt)
            .with_str(Flag::Key, key_token())
            .with_str(Flag::String, "hello");
        let mut ciphertext = payload(run(encrypt, None, Some(b"hello")).unwrap());
        ciphertext.push(b'\n');

        let decrypt = OptionSet::new()
            .with_flag(Flag::Decrypt)
            .with_str(Flag::Key, key_token())
            .with_str(Flag::File, "ignored.enc");
        let plaintext = payload(run(decrypt, None, Some(&ciphertext)).unwrap());
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn test_command_not_found_lists_supplied_options() {
        let options = OptionSet::new().with_flag(Flag::Backup).with_flag(Flag::Quiet);
        match run(options, None, None) {
            Err(Error::CommandNotFound { supplied }) => {
                assert_eq!(supplied, "backup, quiet");
            }
            other => panic!("expected CommandNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_print_key_echoes_the_token() {
        let options = OptionSet::new().with_str(Flag::Key, key_token());
        match run(options, None, None).unwrap() {
            Outcome::KeyToken(token) => assert_eq!(token, key_token()),
            other => panic!("expected key token, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_key_stores_to_keychain() {
        let keychain = MemoryKeychain::default();
        let options = OptionSet::new()
            .with_flag(Flag::Generate)
            .with_str(Flag::Keychain, "staging");
        let outcome = run(options, Some(&keychain), None).unwrap();

        let token = match outcome {
            Outcome::KeyToken(token) => token,
            other => panic!("expected key token, got {:?}", other),
        };
        let stored = keychain.read("staging").unwrap();
        assert_eq!(stored.as_deref(), Some(token.as_str()));
    }

    #[test]
    fn test_generate_password_protected_key_is_wrapped() {
        let options = OptionSet::new()
            .with_flag(Flag::Generate)
            .with_flag(Flag::Password);
        let token = match run(options, None, None).unwrap() {
            Outcome::KeyToken(token) => token,
            other => panic!("expected key token, got {:?}", other),
        };
        // wrapped tokens are longer than a bare 32-byte token
        assert!(token.len() > crate::key::BARE_TOKEN_MAX_LEN);
    }

    #[test]
    fn test_edit_reencrypts_the_edited_content() {
        let encrypt = OptionSet::new()
            .with_flag(Flag::Encrypt)
            .with_str(Flag::Key, key_token())
            .with_str(Flag::String, "original");
        let ciphertext = payload(run(encrypt, None, Some(b"original")).unwrap());

        let edit = OptionSet::new()
            .with_flag(Flag::Edit)
            .with_str(Flag::Key, key_token())
            .with_str(Flag::File, "notes.enc");
        let rewritten = match run(edit, None, Some(&ciphertext)).unwrap() {
            Outcome::Edited { ciphertext } => ciphertext,
            other => panic!("expected edited ciphertext, got {:?}", other),
        };

        let decrypt = OptionSet::new()
            .with_flag(Flag::Decrypt)
            .with_str(Flag::Key, key_token())
            .with_str(Flag::File, "notes.enc");
        let plaintext = payload(run(decrypt, None, Some(&rewritten)).unwrap());
        assert_eq!(plaintext, b"edited");
    }

    #[test]
    fn test_keychain_add_without_capability_fails() {
        // the CLI never builds such an option set on capability-less hosts,
        // but the core still refuses cleanly
        let options = OptionSet::new()
            .with_str(Flag::Keychain, "staging")
            .with_str(Flag::Key, key_token());
        assert!(matches!(
            run(options, None, None),
            Err(Error::Keychain(KeychainError::Unavailable))
        ));
    }

    #[test]
    fn test_version_and_help_markers() {
        let options = OptionSet::new().with_flag(Flag::Version);
        assert!(matches!(run(options, None, None).unwrap(), Outcome::ShowVersion));

        let options = OptionSet::new().with_flag(Flag::Help);
        assert!(matches!(run(options, None, None).unwrap(), Outcome::ShowHelp));
    }
}
