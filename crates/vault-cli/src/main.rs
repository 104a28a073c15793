//! passvault: personal vault client CLI
//!
//! Commands:
//!   keys init                  - load the client key pair, generating it on first use
//!   keys show                  - print fingerprint and sizes of the existing key pair
//!   seal <kind> <file>         - encrypt the sensitive fields of a record file (JSON)
//!   open <kind> <file>         - decrypt a sealed record file back to plaintext
//!   config show                - display the active configuration
//!
//! Record files use the vault wire format: sensitive fields are base64
//! strings. `<kind>` may also be `vault` for a whole snapshot
//! (`data_password`, `data_card`, `data_text`, `data_binary`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use vault_core::config::VaultConfig;
use vault_core::{Blob, Card, Credential, Note, Sealed, SealedVaultData, SensitiveFields, VaultData};
use vault_crypto::{decrypt_fields, encrypt_fields, open_vault, seal_vault, KeyPair, KeyStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "passvault",
    version,
    about = "passvault personal vault client",
    long_about = "passvault: manage the client key pair and seal/open vault records"
)]
struct Cli {
    /// Path to passvault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "PASSVAULT_CONFIG",
        default_value = "~/.config/passvault/passvault.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [logging] level
    #[arg(long, env = "PASSVAULT_LOG")]
    log: Option<String>,

    /// Log format; overrides [logging] format
    #[arg(long, env = "PASSVAULT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Client key pair management
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Encrypt the sensitive fields of a plaintext record file
    Seal {
        kind: Kind,
        /// Input JSON file ("-" for stdin)
        input: PathBuf,
        /// Write the result here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Decrypt a sealed record file
    Open {
        kind: Kind,
        /// Input JSON file ("-" for stdin)
        input: PathBuf,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// Load the key pair, generating key files and certificate if absent
    Init,
    /// Show the existing key pair without creating anything
    Show,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum Kind {
    Credential,
    Card,
    Note,
    Blob,
    /// Whole vault snapshot
    Vault,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = VaultConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli
        .log_format
        .unwrap_or_else(|| parse_log_format(&config.logging.format));
    init_logging(&level, format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "passvault starting"
    );

    match cli.command {
        Commands::Keys { action: KeysAction::Init } => cmd_keys_init(&config),
        Commands::Keys { action: KeysAction::Show } => cmd_keys_show(&config),
        Commands::Seal { kind, input, output } => {
            let pair = KeyStore::from_config(&config)
                .load_or_create()
                .context("loading client key pair")?;
            let rendered = seal(kind, &read_input(&input)?, &pair)?;
            write_output(output.as_deref(), &rendered)
        }
        Commands::Open { kind, input, output } => {
            let pair = KeyStore::from_config(&config)
                .load()
                .context("loading client key pair (run `passvault keys init` first)")?;
            let rendered = open(kind, &read_input(&input)?, &pair)?;
            write_output(output.as_deref(), &rendered)
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so sealed/opened JSON on stdout stays clean.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn parse_log_format(value: &str) -> LogFormat {
    if value.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    }
}

// ── `passvault keys` ──────────────────────────────────────────────────────────

fn cmd_keys_init(config: &VaultConfig) -> Result<()> {
    let store = KeyStore::from_config(config);
    let pair = store.load_or_create().context("initializing client key pair")?;
    info!(fingerprint = %pair.fingerprint()?, "client key pair ready");

    println!("private key:  {}", store.private_path().display());
    println!("public key:   {}", store.public_path().display());
    println!("certificate:  {}", store.certificate_path().display());
    println!("fingerprint:  {}", pair.fingerprint()?);
    Ok(())
}

fn cmd_keys_show(config: &VaultConfig) -> Result<()> {
    let store = KeyStore::from_config(config);
    let pair = store
        .load()
        .context("no usable key pair (run `passvault keys init`)")?;

    println!("fingerprint:  {}", pair.fingerprint()?);
    println!("modulus:      {} bits", pair.bits());
    println!("block size:   {} bytes", pair.block_size());
    println!("max chunk:    {} bytes", pair.max_chunk()?);
    println!("private key:  {}", store.private_path().display());
    println!("public key:   {}", store.public_path().display());
    let cert = store.certificate_path();
    if cert.exists() {
        println!("certificate:  {}", cert.display());
    } else {
        println!("certificate:  (missing) {}", cert.display());
    }
    Ok(())
}

// ── `passvault seal` / `passvault open` ───────────────────────────────────────

fn seal(kind: Kind, input: &str, pair: &KeyPair) -> Result<String> {
    match kind {
        Kind::Credential => seal_record::<Credential>(input, pair),
        Kind::Card => seal_record::<Card>(input, pair),
        Kind::Note => seal_record::<Note>(input, pair),
        Kind::Blob => seal_record::<Blob>(input, pair),
        Kind::Vault => {
            let data: VaultData = parse(input)?;
            render(&seal_vault(&data, pair.public_key())?)
        }
    }
}

fn open(kind: Kind, input: &str, pair: &KeyPair) -> Result<String> {
    match kind {
        Kind::Credential => open_record::<Credential>(input, pair),
        Kind::Card => open_record::<Card>(input, pair),
        Kind::Note => open_record::<Note>(input, pair),
        Kind::Blob => open_record::<Blob>(input, pair),
        Kind::Vault => {
            let data: SealedVaultData = parse(input)?;
            render(&open_vault(&data, pair.private_key())?)
        }
    }
}

fn seal_record<R>(input: &str, pair: &KeyPair) -> Result<String>
where
    R: SensitiveFields + Serialize + DeserializeOwned,
{
    let record: R = parse(input)?;
    let sealed = encrypt_fields(&record, pair.public_key())
        .with_context(|| format!("sealing {}", R::KIND))?;
    render(&sealed)
}

fn open_record<R>(input: &str, pair: &KeyPair) -> Result<String>
where
    R: SensitiveFields + Serialize + DeserializeOwned,
{
    let sealed: Sealed<R> = parse(input)?;
    let record = decrypt_fields(&sealed, pair.private_key())
        .with_context(|| format!("opening {}", R::KIND))?;
    render(&record)
}

fn parse<T: DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_str(input).context("parsing record JSON")
}

fn render<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serializing record JSON")
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("reading stdin")
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, format!("{rendered}\n"))
            .with_context(|| format!("writing {}", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

// ── `passvault config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &VaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => PathBuf::from(std::env::var("HOME").unwrap_or_default()).join(rest),
        None => path.to_path_buf(),
    }
}
