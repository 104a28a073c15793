//! Blind record storage
//!
//! The store only ever sees [`SealedRecord`]s: it assigns ids, stamps the
//! owner and hands ciphertext back unchanged. It cannot open any field.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use vault_core::{
    Blob, Card, Credential, Note, OwnerId, RecordId, RecordKind, Sealed, SensitiveFields,
    VaultError,
};

use crate::error::{ClientError, ClientResult};

/// A sealed record of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealedRecord {
    Credential(Sealed<Credential>),
    Card(Sealed<Card>),
    Note(Sealed<Note>),
    Blob(Sealed<Blob>),
}

impl SealedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            SealedRecord::Credential(_) => RecordKind::Credential,
            SealedRecord::Card(_) => RecordKind::Card,
            SealedRecord::Note(_) => RecordKind::Note,
            SealedRecord::Blob(_) => RecordKind::Blob,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            SealedRecord::Credential(r) => r.id(),
            SealedRecord::Card(r) => r.id(),
            SealedRecord::Note(r) => r.id(),
            SealedRecord::Blob(r) => r.id(),
        }
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        match self {
            SealedRecord::Credential(r) => r.owner(),
            SealedRecord::Card(r) => r.owner(),
            SealedRecord::Note(r) => r.owner(),
            SealedRecord::Blob(r) => r.owner(),
        }
    }

    fn stamped(self, id: RecordId, owner: &OwnerId) -> Self {
        let owner = Some(owner.clone());
        match self {
            SealedRecord::Credential(r) => {
                SealedRecord::Credential(r.with_id(id).with_owner(owner))
            }
            SealedRecord::Card(r) => SealedRecord::Card(r.with_id(id).with_owner(owner)),
            SealedRecord::Note(r) => SealedRecord::Note(r.with_id(id).with_owner(owner)),
            SealedRecord::Blob(r) => SealedRecord::Blob(r.with_id(id).with_owner(owner)),
        }
    }
}

/// Record types that can travel through a [`BlindStore`]
pub trait Storable: SensitiveFields {
    fn into_stored(sealed: Sealed<Self>) -> SealedRecord;
    fn from_stored(stored: SealedRecord) -> Option<Sealed<Self>>;
}

macro_rules! impl_storable {
    ($ty:ident) => {
        impl Storable for $ty {
            fn into_stored(sealed: Sealed<Self>) -> SealedRecord {
                SealedRecord::$ty(sealed)
            }

            fn from_stored(stored: SealedRecord) -> Option<Sealed<Self>> {
                match stored {
                    SealedRecord::$ty(sealed) => Some(sealed),
                    _ => None,
                }
            }
        }
    };
}

impl_storable!(Credential);
impl_storable!(Card);
impl_storable!(Note);
impl_storable!(Blob);

/// Storage collaborator holding sealed records per owner.
pub trait BlindStore: Send + Sync {
    /// Store a new record, returning the id assigned to it.
    fn put(&self, owner: &OwnerId, record: SealedRecord) -> ClientResult<RecordId>;
    /// All records of `kind` belonging to `owner`, in id order.
    fn get(&self, owner: &OwnerId, kind: RecordKind) -> ClientResult<Vec<SealedRecord>>;
    /// Replace an existing record, matched by kind and id.
    fn update(&self, owner: &OwnerId, record: SealedRecord) -> ClientResult<()>;
    fn delete(&self, owner: &OwnerId, kind: RecordKind, id: RecordId) -> ClientResult<()>;
}

type RecordKey = (OwnerId, RecordKind, RecordId);

#[derive(Default)]
struct MemoryInner {
    last_id: i64,
    records: BTreeMap<RecordKey, SealedRecord>,
}

/// In-memory [`BlindStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> ClientResult<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| VaultError::Storage("memory store lock poisoned".into()).into())
    }
}

impl BlindStore for MemoryStore {
    fn put(&self, owner: &OwnerId, record: SealedRecord) -> ClientResult<RecordId> {
        let mut inner = self.lock()?;
        inner.last_id += 1;
        let id = RecordId(inner.last_id);
        let key = (owner.clone(), record.kind(), id);
        inner.records.insert(key, record.stamped(id, owner));
        Ok(id)
    }

    fn get(&self, owner: &OwnerId, kind: RecordKind) -> ClientResult<Vec<SealedRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .iter()
            .filter(|((o, k, _), _)| o == owner && *k == kind)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn update(&self, owner: &OwnerId, record: SealedRecord) -> ClientResult<()> {
        let mut inner = self.lock()?;
        let (kind, id) = (record.kind(), record.id());
        match inner.records.get_mut(&(owner.clone(), kind, id)) {
            Some(slot) => {
                *slot = record.stamped(id, owner);
                Ok(())
            }
            None => Err(ClientError::NotFound { kind, id }),
        }
    }

    fn delete(&self, owner: &OwnerId, kind: RecordKind, id: RecordId) -> ClientResult<()> {
        let mut inner = self.lock()?;
        inner
            .records
            .remove(&(owner.clone(), kind, id))
            .map(|_| ())
            .ok_or(ClientError::NotFound { kind, id })
    }
}
