//! Terminal adapter for interactive input.
//!
//! Prompts go to stderr so stdout stays clean for payloads. Secrets are
//! read without echo via `rpassword`.

use std::io::{self, Write};

use cloak_core::ports::InteractiveInput;
use secrecy::SecretString;

pub struct TerminalInput;

impl InteractiveInput for TerminalInput {
    fn prompt(&self, message: &str) -> io::Result<String> {
        eprint!("{message}");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line.trim_end().to_string())
    }

    fn prompt_secret(&self, message: &str) -> io::Result<SecretString> {
        rpassword::prompt_password(message).map(SecretString::new)
    }

    fn report(&self, message: &str) {
        eprintln!("{message}");
    }
}
