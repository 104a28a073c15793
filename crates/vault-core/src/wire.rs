//! JSON payloads exchanged with the vault service

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::{Blob, Card, Credential, Note, Sealed};

/// Registration / login request body
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct UserCredentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Opaque bearer token issued at registration/login
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Registration / login response: the service public key and a bearer token.
///
/// The key is a PKCS#1 PEM string. Field encryption never uses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerHello {
    pub key: String,
    pub token: BearerToken,
}

/// Decrypted view of every collection in a vault
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultData {
    #[serde(rename = "data_password", default)]
    pub credentials: Vec<Credential>,
    #[serde(rename = "data_card", default)]
    pub cards: Vec<Card>,
    #[serde(rename = "data_text", default)]
    pub notes: Vec<Note>,
    #[serde(rename = "data_binary", default)]
    pub blobs: Vec<Blob>,
}

/// Encrypted view of every collection, as stored and transmitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedVaultData {
    #[serde(rename = "data_password", default)]
    pub credentials: Vec<Sealed<Credential>>,
    #[serde(rename = "data_card", default)]
    pub cards: Vec<Sealed<Card>>,
    #[serde(rename = "data_text", default)]
    pub notes: Vec<Sealed<Note>>,
    #[serde(rename = "data_binary", default)]
    pub blobs: Vec<Sealed<Blob>>,
}

impl VaultData {
    pub fn len(&self) -> usize {
        self.credentials.len() + self.cards.len() + self.notes.len() + self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    #[test]
    fn test_vault_data_collection_names() {
        let data = VaultData {
            notes: vec![Note::new("hello")],
            ..VaultData::default()
        };
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["data_text"][0]["text"], "aGVsbG8=");
        assert!(json["data_password"].as_array().unwrap().is_empty());
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_sealed_vault_data_missing_collections() {
        let json = r#"{
            "data_card": [{"UID": 5, "number": "AA==", "name": "AQ==", "cvc": "Ag=="}]
        }"#;
        let data: SealedVaultData = serde_json::from_str(json).unwrap();

        assert_eq!(data.cards.len(), 1);
        assert_eq!(data.cards[0].id(), RecordId(5));
        assert!(data.credentials.is_empty());
        assert!(data.blobs.is_empty());
    }

    #[test]
    fn test_server_hello_roundtrip() {
        let hello = ServerHello {
            key: "-----BEGIN RSA PUBLIC KEY-----\n...".into(),
            token: BearerToken::new("abc.def"),
        };
        let json = serde_json::to_string(&hello).unwrap();
        assert!(json.contains(r#""token":"abc.def""#));

        let parsed: ServerHello = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.token, hello.token);
        assert_eq!(parsed.token.as_str(), "abc.def");
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let creds = UserCredentials {
            login: "alice".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{:?}", BearerToken::new("tok123")).contains("tok123"));
    }
}
