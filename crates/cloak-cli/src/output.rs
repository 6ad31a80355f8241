//! Output sinks: stdout, or a file chosen with `-o`.
//!
//! Payloads pass through unmodified; the core hands over opaque bytes and
//! this module only decides where they land.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub enum OutputSink {
    Stdout,
    File(PathBuf),
}

impl OutputSink {
    pub fn for_target(path: Option<&Path>) -> Self {
        match path {
            Some(path) => OutputSink::File(path.to_path_buf()),
            None => OutputSink::Stdout,
        }
    }

    /// Write the payload exactly as produced.
    pub fn write(&self, payload: &[u8]) -> io::Result<()> {
        match self {
            OutputSink::Stdout => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(payload)?;
                handle.flush()
            }
            OutputSink::File(path) => fs::write(path, payload),
        }
    }

    /// Write a line of text (key tokens, confirmations).
    pub fn write_line(&self, text: &str) -> io::Result<()> {
        let mut line = text.to_string();
        line.push('\n');
        self.write(line.as_bytes())
    }
}

pub const EXAMPLES: &str = r#"Examples:

  # generate a new private key, printed to stdout
  cloak -g

  # generate a password-protected key and store it in the OS keychain
  cloak -g -p -x staging -q

  # encrypt a string with a literal key
  cloak -e -k 'bxSGvPiDjpfI5F-AsenQ_gArLeZwqFBSjYp4Phy8DLE=' -s 'hello'

  # encrypt a file, writing the result next to it
  cloak -e -k "$PRIVATE_KEY" -f secrets.yml -o secrets.yml.enc

  # decrypt from stdin with the key read from a file
  cat secrets.yml.enc | cloak -d -K ~/.cloak.key -f -

  # decrypt using the key stored in the keychain, caching the password
  cloak -d -c -x staging -f secrets.yml.enc

  # edit an encrypted file in $EDITOR, keeping a backup
  cloak -t -K ~/.cloak.key -f secrets.yml.enc -b

  # keep common flags in the environment
  export CLOAK_ARGS="-c -x staging"
  cloak -e -f secrets.yml -o secrets.yml.enc
"#;
