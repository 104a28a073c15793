//! Durable key store: load the client key pair or bootstrap a new one
//!
//! Layout of the key directory after bootstrap:
//! ```text
//! <dir>/cert.pem      self-signed X.509 certificate
//! <dir>/public.pem    PKCS#1 RSA PUBLIC KEY
//! <dir>/private.pem   PKCS#1 RSA PRIVATE KEY (mode 0600)
//! ```
//!
//! Each file is written to a temporary name in the same directory, synced,
//! then renamed into place. The private key is renamed last, so its presence
//! marks a completed generation. Generation runs under an exclusive lock file
//! so concurrent processes sharing the directory agree on one key pair.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use vault_core::config::{CertificateConfig, InvalidKeyPolicy, KeysConfig, VaultConfig};

use crate::cert;
use crate::error::{CryptoError, CryptoResult, ErrorKind};
use crate::keys::{self, KeyPair};
use crate::DEFAULT_KEY_BITS;

const LOCK_FILE: &str = ".keys.lock";
const LOCK_POLL: Duration = Duration::from_millis(50);

/// Key material locations plus generation parameters
#[derive(Debug, Clone)]
pub struct KeyStore {
    private_path: PathBuf,
    public_path: PathBuf,
    certificate_path: PathBuf,
    output_dir: PathBuf,
    bits: usize,
    on_invalid: InvalidKeyPolicy,
    lock_timeout: Duration,
    certificate: CertificateConfig,
}

impl KeyStore {
    /// Relative key paths are resolved against `output_dir`, so a pair
    /// written by one run is found again by the next.
    pub fn new(
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let output_dir = output_dir.into();
        let defaults = KeysConfig::default();
        Self {
            private_path: output_dir.join(private_path),
            public_path: output_dir.join(public_path),
            certificate_path: output_dir.join(&defaults.certificate),
            output_dir,
            bits: DEFAULT_KEY_BITS,
            on_invalid: defaults.on_invalid,
            lock_timeout: Duration::from_millis(defaults.lock_timeout_ms),
            certificate: CertificateConfig::default(),
        }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        let keys = &config.keys;
        Self {
            private_path: keys.private_key_path(),
            public_path: keys.public_key_path(),
            certificate_path: keys.certificate_path(),
            output_dir: keys.dir(),
            bits: keys.bits,
            on_invalid: keys.on_invalid,
            lock_timeout: Duration::from_millis(keys.lock_timeout_ms),
            certificate: config.certificate.clone(),
        }
    }

    pub fn with_bits(mut self, bits: usize) -> Self {
        self.bits = bits;
        self
    }

    pub fn with_policy(mut self, on_invalid: InvalidKeyPolicy) -> Self {
        self.on_invalid = on_invalid;
        self
    }

    pub fn with_certificate(mut self, certificate: CertificateConfig) -> Self {
        self.certificate = certificate;
        self
    }

    pub fn with_certificate_path(mut self, path: impl AsRef<Path>) -> Self {
        self.certificate_path = self.output_dir.join(path);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn private_path(&self) -> &Path {
        &self.private_path
    }

    pub fn public_path(&self) -> &Path {
        &self.public_path
    }

    pub fn certificate_path(&self) -> &Path {
        &self.certificate_path
    }

    pub fn lock_path(&self) -> PathBuf {
        self.output_dir.join(LOCK_FILE)
    }

    /// Read an existing key pair without touching the filesystem.
    ///
    /// Fails with `KeyNotFound` if either key file is absent.
    pub fn load(&self) -> CryptoResult<KeyPair> {
        let private = self.read_private()?;
        let public_pem = read_key_file(&self.public_path)?;
        self.pair_with_public(private, &public_pem)
    }

    /// Load the key pair, generating and persisting a new one if none exists.
    pub fn load_or_create(&self) -> CryptoResult<KeyPair> {
        match self.load_or_repair() {
            Ok(pair) => {
                debug!(path = %self.private_path.display(), bits = pair.bits(), "loaded key pair");
                Ok(pair)
            }
            Err(e) if self.may_generate(&e) => self.create(),
            Err(e) => Err(e),
        }
    }

    /// Like [`load`](Self::load), but a private key without its public key
    /// is completed by re-deriving and writing the public key.
    fn load_or_repair(&self) -> CryptoResult<KeyPair> {
        let private = self.read_private()?;
        match read_key_file(&self.public_path) {
            Ok(pem) => self.pair_with_public(private, &pem),
            Err(CryptoError::KeyNotFound { .. }) => {
                warn!(
                    path = %self.public_path.display(),
                    "public key missing, re-deriving from private key"
                );
                let pair = KeyPair::from_private(private);
                write_atomic(&self.public_path, pair.public_pem()?.as_bytes(), 0o644)?;
                Ok(pair)
            }
            Err(e) => Err(e),
        }
    }

    fn may_generate(&self, err: &CryptoError) -> bool {
        match err {
            CryptoError::KeyNotFound { path } => path == &self.private_path,
            _ if self.on_invalid == InvalidKeyPolicy::Regenerate => {
                warn!(error = %err, "existing key material unusable, regenerating");
                true
            }
            _ => false,
        }
    }

    fn create(&self) -> CryptoResult<KeyPair> {
        fs::create_dir_all(&self.output_dir).map_err(|e| CryptoError::io(&self.output_dir, e))?;
        let _lock = GenerationLock::acquire(&self.lock_path(), self.lock_timeout)?;

        // Another process may have finished generating while we waited.
        match self.load_or_repair() {
            Ok(pair) => {
                info!(path = %self.private_path.display(), "key pair created by another process");
                return Ok(pair);
            }
            Err(e) if e.kind() == ErrorKind::KeyNotFound => {}
            Err(e) if self.on_invalid == InvalidKeyPolicy::Regenerate => {
                debug!(error = %e, "replacing unusable key material");
            }
            Err(e) => return Err(e),
        }

        self.generate()
    }

    fn generate(&self) -> CryptoResult<KeyPair> {
        info!(bits = self.bits, dir = %self.output_dir.display(), "generating new key pair");
        let pair = KeyPair::generate(self.bits)?;
        let certificate = cert::self_signed_certificate(&pair, &self.certificate)?;
        let public_pem = pair.public_pem()?;
        let private_pem = pair.private_pem()?;

        write_atomic(&self.certificate_path, certificate.as_bytes(), 0o644)?;
        write_atomic(&self.public_path, public_pem.as_bytes(), 0o644)?;
        write_atomic(&self.private_path, private_pem.as_bytes(), 0o600)?;

        info!(
            fingerprint = %pair.fingerprint()?,
            private = %self.private_path.display(),
            public = %self.public_path.display(),
            certificate = %self.certificate_path.display(),
            "key pair persisted"
        );
        Ok(pair)
    }

    fn read_private(&self) -> CryptoResult<rsa::RsaPrivateKey> {
        let pem = zeroize::Zeroizing::new(read_key_file(&self.private_path)?);
        keys::parse_private_pem(&pem, &self.private_path)
    }

    fn pair_with_public(
        &self,
        private: rsa::RsaPrivateKey,
        public_pem: &str,
    ) -> CryptoResult<KeyPair> {
        let public = keys::parse_public_pem(public_pem, &self.public_path)?;
        KeyPair::from_parts(private, public).map_err(|_| CryptoError::KeyParse {
            path: self.public_path.clone(),
            reason: format!(
                "public key does not match private key {}",
                self.private_path.display()
            ),
        })
    }
}

/// Convenience wrapper for [`KeyStore::load_or_create`] with default
/// generation parameters.
pub fn load_or_create(
    private_path: impl AsRef<Path>,
    public_path: impl AsRef<Path>,
    output_dir: impl Into<PathBuf>,
) -> CryptoResult<KeyPair> {
    KeyStore::new(private_path, public_path, output_dir).load_or_create()
}

fn read_key_file(path: &Path) -> CryptoResult<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CryptoError::KeyNotFound {
            path: path.to_path_buf(),
        },
        _ => CryptoError::io(path, e),
    })
}

/// Write `contents` to `path` via a synced temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> CryptoResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| CryptoError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".passvault-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| CryptoError::io(path, e))?;
    tmp.write_all(contents).map_err(|e| CryptoError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| CryptoError::io(path, e))?;
    set_mode(tmp.as_file(), mode).map_err(|e| CryptoError::io(path, e))?;
    tmp.persist(path).map_err(|e| CryptoError::io(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Exclusive-create lock file, removed on drop
struct GenerationLock {
    path: PathBuf,
}

impl GenerationLock {
    fn acquire(path: &Path, timeout: Duration) -> CryptoResult<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Read back only to name the holder in the timeout error.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(CryptoError::io(path, stale_lock_error(path)));
                    }
                    debug!(path = %path.display(), "waiting for key generation lock");
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(CryptoError::io(path, e)),
            }
        }
    }
}

fn stale_lock_error(path: &Path) -> io::Error {
    let holder = fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .map(|pid| format!("pid {pid}"))
        .unwrap_or_else(|| "an unknown process".into());
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!(
            "timed out waiting for key generation lock held by {holder}; \
             if that process is no longer running, delete {} and retry",
            path.display()
        ),
    )
}

impl Drop for GenerationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), "failed to remove key generation lock: {e}");
        }
    }
}
