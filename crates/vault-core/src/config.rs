use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Smallest RSA modulus accepted from configuration.
pub const MIN_KEY_BITS: usize = 1024;

/// Largest RSA modulus whose public key can be read back (`rsa` 0.9 limit).
pub const MAX_KEY_BITS: usize = 4096;

/// Top-level client configuration (loaded from passvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub keys: KeysConfig,
    pub certificate: CertificateConfig,
    pub logging: LoggingConfig,
}

/// What to do when key files exist but cannot be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidKeyPolicy {
    /// Surface the read/parse error and leave the files alone
    Fail,
    /// Log a warning and mint a fresh key pair over the broken files
    Regenerate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Directory holding the key material (default: ~/.config/passvault/keys)
    pub dir: PathBuf,
    /// Private key file name, relative to `dir` unless absolute
    pub private_key: PathBuf,
    /// Public key file name, relative to `dir` unless absolute
    pub public_key: PathBuf,
    /// Self-signed certificate file name, relative to `dir` unless absolute
    pub certificate: PathBuf,
    /// RSA modulus length in bits (default: 4096)
    pub bits: usize,
    /// Behaviour when existing key files are unreadable or corrupt
    pub on_invalid: InvalidKeyPolicy,
    /// How long to wait for another process holding the generation lock
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Subject organization (O=)
    pub organization: String,
    /// Subject country (C=)
    pub country: String,
    /// Certificate serial number
    pub serial: u64,
    /// Validity window in days (default: 3650)
    pub validity_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/.config/passvault/keys"),
            private_key: PathBuf::from("private.pem"),
            public_key: PathBuf::from("public.pem"),
            certificate: PathBuf::from("cert.pem"),
            bits: 4096,
            on_invalid: InvalidKeyPolicy::Fail,
            lock_timeout_ms: 30_000,
        }
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            organization: "passManager".into(),
            country: "RU".into(),
            serial: 1658,
            validity_days: 3650,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> VaultResult<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| VaultError::Config(format!("parsing {}: {e}", path.display())))?
        } else {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VaultResult<()> {
        let keys = &self.keys;
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&keys.bits) || keys.bits % 8 != 0 {
            return Err(VaultError::Config(format!(
                "keys.bits must be a multiple of 8 in {MIN_KEY_BITS}..={MAX_KEY_BITS}, got {}",
                keys.bits
            )));
        }
        for (name, file) in [
            ("keys.private_key", &keys.private_key),
            ("keys.public_key", &keys.public_key),
            ("keys.certificate", &keys.certificate),
        ] {
            if file.as_os_str().is_empty() {
                return Err(VaultError::Config(format!("{name} must not be empty")));
            }
        }
        if keys.private_key == keys.public_key {
            return Err(VaultError::Config(
                "keys.private_key and keys.public_key must differ".into(),
            ));
        }
        if self.certificate.validity_days == 0 {
            return Err(VaultError::Config(
                "certificate.validity_days must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl KeysConfig {
    /// Key directory with `~/` expanded
    pub fn dir(&self) -> PathBuf {
        expand_tilde(&self.dir)
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.resolve(&self.private_key)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.resolve(&self.public_key)
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.resolve(&self.certificate)
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        let file = expand_tilde(file);
        if file.is_absolute() {
            file
        } else {
            self.dir().join(file)
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(rest) = s.strip_prefix("~/") {
            return home_dir().join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[keys]
dir = "/var/lib/passvault"
private_key = "client.key.pem"
public_key = "client.pub.pem"
certificate = "client.crt"
bits = 2048
on_invalid = "regenerate"
lock_timeout_ms = 500

[certificate]
organization = "Example Org"
country = "DE"
serial = 42
validity_days = 365

[logging]
level = "debug"
format = "json"
"#;
        let config: VaultConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.keys.dir, PathBuf::from("/var/lib/passvault"));
        assert_eq!(config.keys.bits, 2048);
        assert_eq!(config.keys.on_invalid, InvalidKeyPolicy::Regenerate);
        assert_eq!(config.keys.lock_timeout_ms, 500);
        assert_eq!(config.certificate.organization, "Example Org");
        assert_eq!(config.certificate.serial, 42);
        assert_eq!(config.logging.format, "json");
        assert_eq!(
            config.keys.private_key_path(),
            PathBuf::from("/var/lib/passvault/client.key.pem")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let config: VaultConfig = toml::from_str("").unwrap();

        assert_eq!(config.keys.bits, 4096);
        assert_eq!(config.keys.private_key, PathBuf::from("private.pem"));
        assert_eq!(config.keys.public_key, PathBuf::from("public.pem"));
        assert_eq!(config.keys.certificate, PathBuf::from("cert.pem"));
        assert_eq!(config.keys.on_invalid, InvalidKeyPolicy::Fail);
        assert_eq!(config.certificate.validity_days, 3650);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[keys]
bits = 3072
"#;
        let config: VaultConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.keys.bits, 3072);
        assert_eq!(config.keys.public_key, PathBuf::from("public.pem"));
        assert_eq!(config.certificate.organization, "passManager");
    }

    #[test]
    fn test_validate_rejects_small_keys() {
        let mut config = VaultConfig::default();
        config.keys.bits = 512;
        assert!(matches!(config.validate(), Err(VaultError::Config(_))));

        config.keys.bits = 2049;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unreadable_key_sizes() {
        let mut config = VaultConfig::default();
        for bits in [4104, 8192] {
            config.keys.bits = bits;
            assert!(matches!(config.validate(), Err(VaultError::Config(_))), "{bits}");
        }

        config.keys.bits = MAX_KEY_BITS;
        config.validate().unwrap();
    }

    #[test]
    fn test_load_rejects_oversized_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passvault.toml");
        std::fs::write(&path, "[keys]\nbits = 8192\n").unwrap();
        assert!(VaultConfig::load(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_same_key_file() {
        let mut config = VaultConfig::default();
        config.keys.public_key = config.keys.private_key.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolute_key_path_ignores_dir() {
        let mut keys = KeysConfig::default();
        keys.dir = PathBuf::from("/srv/keys");
        keys.public_key = PathBuf::from("/etc/passvault/public.pem");
        assert_eq!(
            keys.public_key_path(),
            PathBuf::from("/etc/passvault/public.pem")
        );
        assert_eq!(keys.certificate_path(), PathBuf::from("/srv/keys/cert.pem"));
    }

    #[test]
    fn test_tilde_expansion() {
        let keys = KeysConfig::default();
        assert!(!keys.dir().to_str().unwrap().starts_with("~/"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.keys.bits, 4096);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passvault.toml");
        std::fs::write(&path, "[keys]\nbits = 128\n").unwrap();
        assert!(VaultConfig::load(&path).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = VaultConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: VaultConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.keys.dir, parsed.keys.dir);
        assert_eq!(config.keys.on_invalid, parsed.keys.on_invalid);
        assert_eq!(config.certificate.serial, parsed.certificate.serial);
    }
}
