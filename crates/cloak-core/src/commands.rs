//! Command descriptors and the rules that pick exactly one of them.
//!
//! Every operation the tool can perform is described by a static
//! [`CommandDescriptor`]: which option groups it requires, which options
//! disqualify it, and its precedence rank for breaking ties. One generic
//! resolution function evaluates the whole registry; there is no per-command
//! dispatch logic anywhere else.

use crate::options::{Flag, OptionSet};

/// Flags that can supply a private key.
pub const KEY_SOURCE_FLAGS: [Flag; 4] = [Flag::Key, Flag::Keyfile, Flag::Keychain, Flag::Interactive];

/// Flags that can supply content to encrypt or decrypt.
const CONTENT_FLAGS: [Flag; 2] = [Flag::String, Flag::File];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    GenerateKey,
    Encrypt,
    Decrypt,
    Edit,
    PasswordProtectKey,
    KeychainAddKey,
    PrintKey,
    ShowExamples,
    ShowVersion,
    ShowHelp,
}

/// Static eligibility rules for one operation variant.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub kind: CommandKind,
    /// Any-of groups: eligible only if every group has a supplied member.
    pub required_option_groups: Vec<Vec<Flag>>,
    /// Flags that disqualify this command outright.
    pub incompatible_options: Vec<Flag>,
    /// Tie-breaker between eligible descriptors; lower wins. Unique across
    /// the registry (construction-time invariant, checked by tests).
    pub precedence_rank: u32,
    /// Whether execution needs a resolved private key first.
    pub needs_key: bool,
}

impl CommandDescriptor {
    fn eligible(&self, options: &OptionSet) -> bool {
        let disqualified = self
            .incompatible_options
            .iter()
            .any(|flag| options.is_set(*flag));
        if disqualified {
            return false;
        }
        self.required_option_groups
            .iter()
            .all(|group| group.iter().any(|flag| options.is_set(*flag)))
    }
}

/// The full registry, constructed once at startup and immutable thereafter.
///
/// Rank ordering encodes which command wins when several are eligible:
/// key generation beats the data modes, the data modes beat the key-material
/// utilities, and help is the fallback of last resort.
pub fn registry() -> Vec<CommandDescriptor> {
    let key_sources = KEY_SOURCE_FLAGS.to_vec();
    let content = CONTENT_FLAGS.to_vec();
    let modes = vec![Flag::Generate, Flag::Encrypt, Flag::Decrypt, Flag::Edit];

    vec![
        CommandDescriptor {
            kind: CommandKind::GenerateKey,
            required_option_groups: vec![vec![Flag::Generate]],
            incompatible_options: vec![],
            precedence_rank: 10,
            needs_key: false,
        },
        CommandDescriptor {
            kind: CommandKind::Encrypt,
            required_option_groups: vec![vec![Flag::Encrypt], key_sources.clone(), content.clone()],
            incompatible_options: vec![],
            precedence_rank: 20,
            needs_key: true,
        },
        CommandDescriptor {
            kind: CommandKind::Decrypt,
            required_option_groups: vec![vec![Flag::Decrypt], key_sources.clone(), content],
            incompatible_options: vec![],
            precedence_rank: 30,
            needs_key: true,
        },
        CommandDescriptor {
            kind: CommandKind::Edit,
            required_option_groups: vec![vec![Flag::Edit], key_sources.clone(), vec![Flag::File]],
            incompatible_options: vec![],
            precedence_rank: 40,
            needs_key: true,
        },
        CommandDescriptor {
            kind: CommandKind::PasswordProtectKey,
            required_option_groups: vec![vec![Flag::Password], key_sources.clone()],
            incompatible_options: modes.clone(),
            precedence_rank: 50,
            needs_key: true,
        },
        CommandDescriptor {
            kind: CommandKind::KeychainAddKey,
            required_option_groups: vec![
                vec![Flag::Keychain],
                vec![Flag::Key, Flag::Keyfile, Flag::Interactive],
            ],
            incompatible_options: modes,
            precedence_rank: 60,
            needs_key: true,
        },
        CommandDescriptor {
            kind: CommandKind::PrintKey,
            required_option_groups: vec![key_sources],
            incompatible_options: vec![Flag::Examples, Flag::Help, Flag::Version],
            precedence_rank: 70,
            needs_key: true,
        },
        CommandDescriptor {
            kind: CommandKind::ShowExamples,
            required_option_groups: vec![vec![Flag::Examples]],
            incompatible_options: vec![],
            precedence_rank: 80,
            needs_key: false,
        },
        CommandDescriptor {
            kind: CommandKind::ShowVersion,
            required_option_groups: vec![vec![Flag::Version]],
            incompatible_options: vec![],
            precedence_rank: 90,
            needs_key: false,
        },
        CommandDescriptor {
            kind: CommandKind::ShowHelp,
            required_option_groups: vec![vec![Flag::Help]],
            incompatible_options: vec![],
            precedence_rank: 100,
            needs_key: false,
        },
    ]
}

/// Pick the single applicable descriptor for this option set, or `None`.
///
/// Pure function over immutable inputs: the same option set always resolves
/// to the same descriptor.
pub fn resolve<'a>(
    options: &OptionSet,
    registry: &'a [CommandDescriptor],
) -> Option<&'a CommandDescriptor> {
    registry
        .iter()
        .filter(|descriptor| descriptor.eligible(options))
        .min_by_key(|descriptor| descriptor.precedence_rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt_options() -> OptionSet {
        OptionSet::new()
            .with_flag(Flag::Encrypt)
            .with_str(Flag::Key, "abc")
            .with_str(Flag::String, "hello")
    }

    #[test]
    fn test_registry_ranks_are_unique() {
        let registry = registry();
        let mut ranks: Vec<u32> = registry.iter().map(|d| d.precedence_rank).collect();
        ranks.sort_unstable();
        ranks.dedup();
        assert_eq!(ranks.len(), registry.len(), "precedence ranks must be unique");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = registry();
        let sets = [
            OptionSet::new(),
            encrypt_options(),
            OptionSet::new().with_flag(Flag::Generate).with_flag(Flag::Password),
            OptionSet::new().with_str(Flag::Key, "abc"),
            OptionSet::new().with_flag(Flag::Help).with_flag(Flag::Examples),
        ];
        for options in &sets {
            let first = resolve(options, &registry).map(|d| d.kind);
            let second = resolve(options, &registry).map(|d| d.kind);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_no_match_returns_none() {
        let registry = registry();
        let options = OptionSet::new().with_flag(Flag::Verbose);
        assert!(resolve(&options, &registry).is_none());
    }

    #[test]
    fn test_encrypt_resolves() {
        let registry = registry();
        let found = resolve(&encrypt_options(), &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::Encrypt));
    }

    #[test]
    fn test_encrypt_without_content_falls_back_to_print_key() {
        let registry = registry();
        let options = OptionSet::new()
            .with_flag(Flag::Encrypt)
            .with_str(Flag::Key, "abc");
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::PrintKey));
    }

    #[test]
    fn test_rank_breaks_encrypt_decrypt_tie() {
        let registry = registry();
        let options = encrypt_options().with_flag(Flag::Decrypt);
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::Encrypt));
    }

    #[test]
    fn test_generate_wins_over_encrypt() {
        let registry = registry();
        let options = encrypt_options().with_flag(Flag::Generate);
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::GenerateKey));
    }

    #[test]
    fn test_incompatible_option_excludes_descriptor() {
        let registry = registry();
        // print-key would be the only eligible command, but `examples`
        // disqualifies it and wins instead
        let options = OptionSet::new()
            .with_str(Flag::Key, "abc")
            .with_flag(Flag::Examples);
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::ShowExamples));
    }

    #[test]
    fn test_key_alone_prints_the_key() {
        let registry = registry();
        let options = OptionSet::new().with_str(Flag::Key, "abc");
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::PrintKey));
    }

    #[test]
    fn test_keychain_with_key_stores_it() {
        let registry = registry();
        let options = OptionSet::new()
            .with_str(Flag::Keychain, "staging")
            .with_str(Flag::Key, "abc");
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::KeychainAddKey));
    }

    #[test]
    fn test_password_with_key_protects_it() {
        let registry = registry();
        let options = OptionSet::new()
            .with_flag(Flag::Password)
            .with_str(Flag::Key, "abc");
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::PasswordProtectKey));
    }

    #[test]
    fn test_help_is_the_last_resort() {
        let registry = registry();
        let options = OptionSet::new().with_flag(Flag::Help);
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::ShowHelp));

        // anything more specific beats it
        let options = encrypt_options().with_flag(Flag::Help);
        let found = resolve(&options, &registry).map(|d| d.kind);
        assert_eq!(found, Some(CommandKind::Encrypt));
    }
}
