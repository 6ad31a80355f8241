//! Cloak CLI - encrypt/decrypt data with a symmetric private key
//!
//! Usage:
//!   cloak -g [-p] [-x NAME | -o FILE] [-q]        generate a key
//!   cloak -e <key-spec> [-s STRING | -f FILE] [-o FILE]   encrypt
//!   cloak -d <key-spec> [-s STRING | -f FILE] [-o FILE]   decrypt
//!   cloak -t <key-spec> -f FILE [-b]              edit an encrypted file
//!
//! where <key-spec> is -k (literal, file, or env var), -K (key file),
//! -x (keychain entry), or -i (typed interactively).

mod editor;
mod input;
mod output;

use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cloak_core::cache::{CacheConfig, CacheProvider, MemoryProvider, PasswordCache, DEFAULT_TTL};
use cloak_core::ports::Keychain;
use cloak_core::{Application, Flag, OptionSet, Outcome, Ports};
use cloak_crypto::{ChaChaCipher, SystemKeychain};

use output::OutputSink;

/// Extra flags are read from this variable unless `-M` is given.
const ENV_ARGS_VARIABLE: &str = "CLOAK_ARGS";

#[derive(Parser, Debug)]
#[command(
    name = "cloak",
    about = "Encrypt and decrypt data with a symmetric private key",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Encrypt mode
    #[arg(short = 'e', long)]
    encrypt: bool,

    /// Decrypt mode
    #[arg(short = 'd', long)]
    decrypt: bool,

    /// Edit an encrypted file in $EDITOR
    #[arg(short = 't', long)]
    edit: bool,

    /// Generate a new private key
    #[arg(short = 'g', long)]
    generate: bool,

    /// Protect the private key with a password
    #[arg(short = 'p', long)]
    password: bool,

    /// Name of an OS keychain entry to read or store the key
    #[arg(short = 'x', long, value_name = "NAME")]
    keychain: Option<String>,

    /// Private key: literal string, path to a key file, or env var name
    #[arg(short = 'k', long, value_name = "KEY-SPEC")]
    key: Option<String>,

    /// Read the private key from this file
    #[arg(short = 'K', long, value_name = "FILE")]
    keyfile: Option<PathBuf>,

    /// Type or paste the private key interactively
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Enable the password cache
    #[arg(short = 'c', long = "cache-passwords")]
    cache_passwords: bool,

    /// Expire cached passwords after this many seconds
    #[arg(short = 'u', long = "cache-timeout", value_name = "SECONDS")]
    cache_timeout: Option<u64>,

    /// Password cache provider (available: memory)
    #[arg(short = 'r', long = "cache-provider", value_name = "NAME")]
    cache_provider: Option<String>,

    /// String to encrypt or decrypt
    #[arg(short = 's', long, value_name = "STRING")]
    string: Option<String>,

    /// File to read from ("-" for stdin)
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<String>,

    /// File to write the result to
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Keep a backup of the file being edited
    #[arg(short = 'b', long)]
    backup: bool,

    /// Do not print to stdout
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Show additional information
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Ignore flags from the CLOAK_ARGS environment variable
    #[arg(short = 'M', long = "no-environment")]
    no_environment: bool,

    /// Show usage examples
    #[arg(short = 'E', long)]
    examples: bool,

    /// Print the version
    #[arg(short = 'V', long)]
    version: bool,

    /// Show help
    #[arg(short = 'h', long)]
    help: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let argv = merged_args();
    if argv.len() <= 1 {
        print_help()?;
        return Ok(());
    }

    let cli = Cli::parse_from(argv);
    init_tracing(cli.verbose);
    if cli.no_environment {
        tracing::debug!("flags from {ENV_ARGS_VARIABLE} are disabled");
    }

    let options = build_options(&cli);
    let content = load_content(&cli)?;
    let cache = build_cache(&cli)?;

    let cipher = ChaChaCipher;
    let terminal = input::TerminalInput;
    let editor = editor::ExternalEditor::from_env();
    let keychain = SystemKeychain::available().then(SystemKeychain::default);
    let ports = Ports {
        cipher: &cipher,
        input: &terminal,
        keychain: keychain.as_ref().map(|k| k as &dyn Keychain),
        editor: &editor,
    };

    let mut app = Application::new(options, ports, cache);
    let outcome = app.execute(content.as_deref())?;
    render(outcome, &cli)
}

/// argv with the contents of CLOAK_ARGS spliced in after the program name,
/// unless `-M/--no-environment` was given.
fn merged_args() -> Vec<OsString> {
    let mut argv: Vec<OsString> = std::env::args_os().collect();
    let skip = argv
        .iter()
        .any(|a| a == "-M" || a == "--no-environment");
    if skip {
        return argv;
    }
    if let Ok(extra) = std::env::var(ENV_ARGS_VARIABLE) {
        let extras: Vec<OsString> = extra.split_whitespace().map(OsString::from).collect();
        let at = argv.len().min(1);
        argv.splice(at..at, extras);
    }
    argv
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Translate parsed flags into the core's option vocabulary. Only supplied
/// flags enter the set; the keychain flag only exists when the host has a
/// keychain at all.
fn build_options(cli: &Cli) -> OptionSet {
    let mut options = OptionSet::new();

    for (flag, set) in [
        (Flag::Encrypt, cli.encrypt),
        (Flag::Decrypt, cli.decrypt),
        (Flag::Edit, cli.edit),
        (Flag::Generate, cli.generate),
        (Flag::Password, cli.password),
        (Flag::Interactive, cli.interactive),
        (Flag::CacheEnabled, cli.cache_passwords),
        (Flag::Backup, cli.backup),
        (Flag::Quiet, cli.quiet),
        (Flag::Verbose, cli.verbose),
        (Flag::Examples, cli.examples),
        (Flag::Help, cli.help),
        (Flag::Version, cli.version),
    ] {
        if set {
            options = options.with_flag(flag);
        }
    }

    if let Some(key) = &cli.key {
        options = options.with_str(Flag::Key, key);
    }
    if let Some(keyfile) = &cli.keyfile {
        options = options.with_str(Flag::Keyfile, keyfile.to_string_lossy());
    }
    if let Some(name) = &cli.keychain {
        if SystemKeychain::available() {
            options = options.with_str(Flag::Keychain, name);
        } else {
            tracing::warn!("this host has no keychain; ignoring --keychain");
        }
    }
    if let Some(string) = &cli.string {
        options = options.with_str(Flag::String, string);
    }
    if let Some(file) = &cli.file {
        options = options.with_str(Flag::File, file);
    }
    if let Some(out) = &cli.output {
        options = options.with_str(Flag::Output, out.to_string_lossy());
    }
    if let Some(timeout) = cli.cache_timeout {
        options = options.with_int(Flag::CacheTimeout, timeout);
    }
    if let Some(provider) = &cli.cache_provider {
        options = options.with_str(Flag::CacheProvider, provider);
    }

    options
}

/// Load the content to operate on: `-s` string, `-f` file, or stdin via
/// `-f -`. The edit command reads the same `-f` file.
fn load_content(cli: &Cli) -> anyhow::Result<Option<Vec<u8>>> {
    if let Some(string) = &cli.string {
        return Ok(Some(string.clone().into_bytes()));
    }
    match cli.file.as_deref() {
        Some("-") => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Some(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("can not read input file {path}"))?;
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}

fn build_cache(cli: &Cli) -> anyhow::Result<PasswordCache> {
    if !cli.cache_passwords {
        return Ok(PasswordCache::disabled());
    }
    let provider = cache_provider(cli.cache_provider.as_deref())?;
    let ttl = cli.cache_timeout.map(Duration::from_secs).unwrap_or(DEFAULT_TTL);
    Ok(PasswordCache::new(
        provider,
        CacheConfig {
            ttl,
            verbose: cli.verbose,
        },
    ))
}

/// Provider selection is a configuration concern; the core only ever sees
/// the trait object.
fn cache_provider(name: Option<&str>) -> anyhow::Result<Arc<dyn CacheProvider>> {
    match name.unwrap_or("memory") {
        "memory" => Ok(Arc::new(MemoryProvider::default())),
        other => anyhow::bail!("unknown cache provider '{other}' (available: memory)"),
    }
}

fn render(outcome: Outcome, cli: &Cli) -> anyhow::Result<()> {
    let sink = OutputSink::for_target(cli.output.as_deref());
    match outcome {
        Outcome::Payload(bytes) => sink.write(&bytes)?,
        Outcome::KeyToken(token) => {
            if cli.output.is_some() {
                sink.write_line(&token)?;
            } else if !cli.quiet {
                println!("{token}");
            }
        }
        Outcome::Stored { name } => {
            if !cli.quiet {
                eprintln!("Key stored in keychain entry '{name}'.");
            }
        }
        Outcome::Edited { ciphertext } => {
            let path = cli
                .file
                .as_deref()
                .context("the edit command requires a file")?;
            if cli.backup {
                fs::copy(path, format!("{path}.bak"))
                    .with_context(|| format!("can not back up {path}"))?;
            }
            let mut payload = ciphertext;
            payload.push(b'\n');
            fs::write(path, &payload).with_context(|| format!("can not rewrite {path}"))?;
            if !cli.quiet {
                eprintln!("Saved {path}.");
            }
        }
        Outcome::ShowHelp => print_help()?,
        Outcome::ShowExamples => println!("{}", output::EXAMPLES),
        Outcome::ShowVersion => println!("cloak {}", env!("CARGO_PKG_VERSION")),
    }
    Ok(())
}

fn print_help() -> anyhow::Result<()> {
    Cli::command().print_help()?;
    println!();
    Ok(())
}
