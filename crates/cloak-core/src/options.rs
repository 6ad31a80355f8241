//! Flag vocabulary and the immutable option set built from parsed flags.
//!
//! The option set is a read-only mapping from flag name to value. Exactly the
//! flags supplied on invocation are present; absence means "not requested",
//! never an error by itself.

use std::collections::BTreeMap;
use std::fmt;

/// The closed flag vocabulary understood by the resolution engines.
///
/// `Keychain` is only placed into an [`OptionSet`] when the host actually
/// provides a keychain capability; on hosts without one the flag is absent
/// from the vocabulary rather than present-but-broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Flag {
    Encrypt,
    Decrypt,
    Edit,
    Generate,
    Password,
    Keychain,
    Key,
    Keyfile,
    Interactive,
    CacheEnabled,
    CacheTimeout,
    CacheProvider,
    String,
    File,
    Output,
    Backup,
    Quiet,
    Verbose,
    Examples,
    Help,
    Version,
}

impl Flag {
    /// The flag name as it appears on the command line (long form).
    pub fn name(&self) -> &'static str {
        match self {
            Flag::Encrypt => "encrypt",
            Flag::Decrypt => "decrypt",
            Flag::Edit => "edit",
            Flag::Generate => "generate",
            Flag::Password => "password",
            Flag::Keychain => "keychain",
            Flag::Key => "key",
            Flag::Keyfile => "keyfile",
            Flag::Interactive => "interactive",
            Flag::CacheEnabled => "cache-passwords",
            Flag::CacheTimeout => "cache-timeout",
            Flag::CacheProvider => "cache-provider",
            Flag::String => "string",
            Flag::File => "file",
            Flag::Output => "output",
            Flag::Backup => "backup",
            Flag::Quiet => "quiet",
            Flag::Verbose => "verbose",
            Flag::Examples => "examples",
            Flag::Help => "help",
            Flag::Version => "version",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value carried by a supplied flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
    Int(u64),
}

impl OptionValue {
    /// Whether the value counts as "supplied" for eligibility checks.
    /// A `Bool(false)` or empty string does not.
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Str(s) => !s.is_empty(),
            OptionValue::Int(_) => true,
        }
    }
}

/// Immutable mapping of flag -> value, produced by the CLI layer once and
/// consumed read-only by everything below it.
#[derive(Debug, Clone, Default)]
pub struct OptionSet {
    values: BTreeMap<Flag, OptionValue>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a boolean flag as supplied.
    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.values.insert(flag, OptionValue::Bool(true));
        self
    }

    /// Supply a string-valued flag.
    pub fn with_str(mut self, flag: Flag, value: impl Into<String>) -> Self {
        self.values.insert(flag, OptionValue::Str(value.into()));
        self
    }

    /// Supply an integer-valued flag.
    pub fn with_int(mut self, flag: Flag, value: u64) -> Self {
        self.values.insert(flag, OptionValue::Int(value));
        self
    }

    /// True when the flag was supplied with a truthy value.
    pub fn is_set(&self, flag: Flag) -> bool {
        self.values.get(&flag).is_some_and(OptionValue::is_truthy)
    }

    pub fn get_str(&self, flag: Flag) -> Option<&str> {
        match self.values.get(&flag) {
            Some(OptionValue::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, flag: Flag) -> Option<u64> {
        match self.values.get(&flag) {
            Some(OptionValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    /// The flags that were actually supplied, in stable order. Used for
    /// "could not determine action" diagnostics.
    pub fn supplied(&self) -> Vec<Flag> {
        self.values
            .iter()
            .filter(|(_, v)| v.is_truthy())
            .map(|(f, _)| *f)
            .collect()
    }

    /// Comma-separated list of supplied flag names.
    pub fn supplied_names(&self) -> String {
        self.supplied()
            .iter()
            .map(Flag::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
