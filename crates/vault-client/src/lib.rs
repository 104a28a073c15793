//! vault-client: the passvault client and its service boundary
//!
//! ```text
//! VaultClient ── seal/open (vault-crypto, client key pair)
//!     │ sealed records + bearer token
//!     ▼
//! VaultService ── IdentityProvider (token → owner)
//!     │
//!     ▼
//! BlindStore (ciphertext only, keyed by owner/kind/id)
//! ```

pub mod client;
pub mod error;
pub mod identity;
pub mod service;
pub mod store;

pub use client::{Session, VaultClient};
pub use error::{ClientError, ClientResult};
pub use identity::{
    AccountProvider, IdentityProvider, LocalIdentity, PasswordParams, DEFAULT_TOKEN_TTL,
};
pub use service::{LocalService, VaultService};
pub use store::{BlindStore, MemoryStore, SealedRecord, Storable};
