//! Vault record model
//!
//! Four record variants share one shape: a storage-assigned [`RecordId`], an
//! optional [`OwnerId`] filled in by the service, and one or more byte fields
//! that are sensitive. The [`SensitiveFields`] trait exposes exactly those
//! byte fields so they can be transformed without touching the metadata.
//!
//! JSON field names follow the vault service wire format; sensitive fields
//! travel as standard base64 strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the storage collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner identity resolved from a bearer token by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Credential,
    Card,
    Note,
    Blob,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Credential => "credential",
            RecordKind::Card => "card",
            RecordKind::Note => "note",
            RecordKind::Blob => "blob",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record with named sensitive byte fields.
///
/// `sensitive_fields_mut` must list every sensitive field exactly once and
/// nothing else; identifier and owner are never part of it.
pub trait SensitiveFields: Clone {
    const KIND: RecordKind;

    fn id(&self) -> RecordId;
    fn set_id(&mut self, id: RecordId);
    fn owner(&self) -> Option<&OwnerId>;
    fn set_owner(&mut self, owner: Option<OwnerId>);

    fn sensitive_fields(&self) -> Vec<(&'static str, &[u8])>;
    fn sensitive_fields_mut(&mut self) -> Vec<(&'static str, &mut Vec<u8>)>;
}

/// A record whose sensitive fields hold ciphertext.
///
/// Only values of this type are handed to the service side; the plaintext
/// record type never crosses the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sealed<R>(R);

impl<R: SensitiveFields> Sealed<R> {
    /// Wrap a record whose sensitive fields already hold ciphertext, e.g. one
    /// decoded from a service response.
    pub fn from_ciphertext(record: R) -> Self {
        Self(record)
    }

    pub fn kind(&self) -> RecordKind {
        R::KIND
    }

    pub fn id(&self) -> RecordId {
        self.0.id()
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.0.owner()
    }

    /// Metadata updates leave the ciphertext untouched.
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.0.set_id(id);
        self
    }

    pub fn with_owner(mut self, owner: Option<OwnerId>) -> Self {
        self.0.set_owner(owner);
        self
    }

    pub fn as_inner(&self) -> &R {
        &self.0
    }

    pub fn into_inner(self) -> R {
        self.0
    }
}

/// Login/password pair
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "uid_pass", default)]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerId>,
    #[serde(rename = "data_pass", with = "b64")]
    pub login: Vec<u8>,
    #[serde(rename = "pass", with = "b64")]
    pub secret: Vec<u8>,
}

/// Payment card
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "UID", default)]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerId>,
    #[serde(with = "b64")]
    pub number: Vec<u8>,
    #[serde(rename = "name", with = "b64")]
    pub holder: Vec<u8>,
    #[serde(with = "b64")]
    pub cvc: Vec<u8>,
}

/// Free-form text note
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "uid_text", default)]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerId>,
    #[serde(with = "b64")]
    pub text: Vec<u8>,
}

/// Arbitrary binary payload
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(rename = "uid_binary", default)]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerId>,
    #[serde(with = "b64")]
    pub data: Vec<u8>,
}

impl Credential {
    pub fn new(login: impl Into<Vec<u8>>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            login: login.into(),
            secret: secret.into(),
            ..Self::default()
        }
    }
}

impl Card {
    pub fn new(
        number: impl Into<Vec<u8>>,
        holder: impl Into<Vec<u8>>,
        cvc: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            number: number.into(),
            holder: holder.into(),
            cvc: cvc.into(),
            ..Self::default()
        }
    }
}

impl Note {
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

impl Blob {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }
}

macro_rules! impl_sensitive_fields {
    ($ty:ty, $kind:expr, [$($field:ident),+]) => {
        impl SensitiveFields for $ty {
            const KIND: RecordKind = $kind;

            fn id(&self) -> RecordId {
                self.id
            }

            fn set_id(&mut self, id: RecordId) {
                self.id = id;
            }

            fn owner(&self) -> Option<&OwnerId> {
                self.owner.as_ref()
            }

            fn set_owner(&mut self, owner: Option<OwnerId>) {
                self.owner = owner;
            }

            fn sensitive_fields(&self) -> Vec<(&'static str, &[u8])> {
                vec![$((stringify!($field), self.$field.as_slice())),+]
            }

            fn sensitive_fields_mut(&mut self) -> Vec<(&'static str, &mut Vec<u8>)> {
                vec![$((stringify!($field), &mut self.$field)),+]
            }
        }

        // Field contents are never printed, only their length.
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("id", &self.id)
                    .field("owner", &self.owner)
                    $(.field(stringify!($field), &Redacted(self.$field.len())))+
                    .finish()
            }
        }
    };
}

impl_sensitive_fields!(Credential, RecordKind::Credential, [login, secret]);
impl_sensitive_fields!(Card, RecordKind::Card, [number, holder, cvc]);
impl_sensitive_fields!(Note, RecordKind::Note, [text]);
impl_sensitive_fields!(Blob, RecordKind::Blob, [data]);

struct Redacted(usize);

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED; {} bytes]", self.0)
    }
}

/// Standard base64 for byte fields; `null` decodes to an empty field.
pub mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
