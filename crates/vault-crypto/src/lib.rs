//! vault-crypto: client-side field encryption for passvault
//!
//! Architecture: per-field envelope encryption under the client's own RSA key
//!
//! Pipeline: record → sensitive fields → chunked RSA-OAEP → sealed record → blind store
//!
//! Key material:
//! ```text
//! Client Key Pair (RSA, default 4096-bit, PKCS#1 PEM on disk)
//!   ├── private.pem   opens every sealed field (never leaves the client)
//!   ├── public.pem    seals every field
//!   └── cert.pem      self-signed X.509 binding of the public key (loopback SAN)
//! ```
//!
//! The service never holds a key that can open a sealed field.

pub mod cert;
pub mod chunk;
pub mod error;
pub mod fields;
pub mod keys;
pub mod store;

pub use cert::self_signed_certificate;
pub use chunk::{decrypt, encrypt};
pub use error::{CryptoError, CryptoResult, ErrorKind};
pub use fields::{decrypt_fields, encrypt_fields, open_vault, seal_vault};
pub use keys::{KeyPair, SUPPORTED_BITS};
pub use store::{load_or_create, KeyStore};

/// Output size of the OAEP hash (SHA-256)
pub const HASH_SIZE: usize = 32;

/// OAEP label bound into every ciphertext block
pub const OAEP_LABEL: &str = "OAEP Encrypted";

/// Modulus size used when generating a key pair
pub const DEFAULT_KEY_BITS: usize = 4096;
