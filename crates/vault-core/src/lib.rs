pub mod config;
pub mod error;
pub mod types;
pub mod wire;

pub use error::{VaultError, VaultResult};
pub use types::{
    Blob, Card, Credential, Note, OwnerId, RecordId, RecordKind, Sealed, SensitiveFields,
};
pub use wire::{BearerToken, SealedVaultData, ServerHello, UserCredentials, VaultData};
