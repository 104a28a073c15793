use std::path::PathBuf;
use thiserror::Error;

use vault_core::RecordKind;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Coarse classification of a [`CryptoError`], stable across context wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    KeyNotFound,
    KeyParseFailure,
    KeyGenerationFailure,
    FileIoFailure,
    CipherTextLengthInvalid,
    EncryptionFailure,
    DecryptionFailure,
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key file not found: {}", path.display())]
    KeyNotFound { path: PathBuf },

    #[error("invalid key file {}: {reason}", path.display())]
    KeyParse { path: PathBuf, reason: String },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("file I/O failed for {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ciphertext length {len} is not a multiple of the {block}-byte block size")]
    CipherTextLength { len: usize, block: usize },

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("{record} field `{field}`: {source}")]
    Field {
        record: RecordKind,
        field: &'static str,
        #[source]
        source: Box<CryptoError>,
    },
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            CryptoError::KeyParse { .. } => ErrorKind::KeyParseFailure,
            CryptoError::KeyGeneration(_) => ErrorKind::KeyGenerationFailure,
            CryptoError::FileIo { .. } => ErrorKind::FileIoFailure,
            CryptoError::CipherTextLength { .. } => ErrorKind::CipherTextLengthInvalid,
            CryptoError::Encryption(_) => ErrorKind::EncryptionFailure,
            CryptoError::Decryption(_) => ErrorKind::DecryptionFailure,
            CryptoError::Field { source, .. } => source.kind(),
        }
    }

    /// Name of the record field that failed, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CryptoError::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    pub(crate) fn in_field(self, record: RecordKind, field: &'static str) -> Self {
        CryptoError::Field {
            record,
            field,
            source: Box::new(self),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CryptoError::FileIo {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_keeps_inner_kind() {
        let err = CryptoError::Decryption("bad block".into()).in_field(RecordKind::Card, "cvc");

        assert_eq!(err.kind(), ErrorKind::DecryptionFailure);
        assert_eq!(err.field(), Some("cvc"));
        assert_eq!(err.to_string(), "card field `cvc`: decryption failed: bad block");
    }

    #[test]
    fn test_io_error_display_names_path() {
        let err = CryptoError::io(
            "/keys/private.pem",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::FileIoFailure);
        assert!(err.to_string().contains("/keys/private.pem"));
    }
}
