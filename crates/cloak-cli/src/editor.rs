//! External $EDITOR hand-off for edit-in-place.
//!
//! Decrypted content is written to a temp file, the editor runs on it, and
//! the edited bytes are read back. The temp file is removed on drop.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::Command;

use cloak_core::ports::Editor;

const DEFAULT_EDITOR: &str = "/bin/vi";

pub struct ExternalEditor {
    command: String,
}

impl ExternalEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(env::var("EDITOR").unwrap_or_else(|_| DEFAULT_EDITOR.to_string()))
    }
}

impl Editor for ExternalEditor {
    fn edit(&self, initial: &[u8]) -> io::Result<Vec<u8>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(initial)?;
        file.flush()?;

        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "EDITOR is empty"))?;
        let status = Command::new(program).args(parts).arg(file.path()).status()?;
        if !status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "editor exited with a failure status",
            ));
        }

        fs::read(file.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noninteractive_editor_leaves_content_unchanged() {
        let editor = ExternalEditor::new("true");
        let edited = editor.edit(b"unchanged content").unwrap();
        assert_eq!(edited, b"unchanged content");
    }

    #[test]
    fn test_empty_editor_command_fails() {
        let editor = ExternalEditor::new("");
        assert!(editor.edit(b"content").is_err());
    }
}
