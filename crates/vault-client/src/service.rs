//! The vault service boundary as seen by the client
//!
//! Every call after register/login carries the bearer token; the service
//! resolves it to an owner and forwards sealed records to the blind store.

use vault_core::{BearerToken, RecordId, RecordKind, ServerHello, UserCredentials};

use crate::error::ClientResult;
use crate::identity::{AccountProvider, LocalIdentity};
use crate::store::{BlindStore, MemoryStore, SealedRecord};

pub trait VaultService {
    fn register(&self, credentials: &UserCredentials) -> ClientResult<ServerHello>;
    fn login(&self, credentials: &UserCredentials) -> ClientResult<ServerHello>;

    fn put(&self, token: &BearerToken, record: SealedRecord) -> ClientResult<RecordId>;
    fn list(&self, token: &BearerToken, kind: RecordKind) -> ClientResult<Vec<SealedRecord>>;
    fn update(&self, token: &BearerToken, record: SealedRecord) -> ClientResult<()>;
    fn delete(&self, token: &BearerToken, kind: RecordKind, id: RecordId) -> ClientResult<()>;
}

/// In-process service: an [`AccountProvider`] in front of a [`BlindStore`]
pub struct LocalService<I = LocalIdentity, S = MemoryStore> {
    identity: I,
    store: S,
}

impl<I: AccountProvider> LocalService<I, MemoryStore> {
    pub fn in_memory(identity: I) -> Self {
        Self::new(identity, MemoryStore::new())
    }
}

impl<I: AccountProvider, S: BlindStore> LocalService<I, S> {
    pub fn new(identity: I, store: S) -> Self {
        Self { identity, store }
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<I: AccountProvider, S: BlindStore> VaultService for LocalService<I, S> {
    fn register(&self, credentials: &UserCredentials) -> ClientResult<ServerHello> {
        self.identity.register(credentials)
    }

    fn login(&self, credentials: &UserCredentials) -> ClientResult<ServerHello> {
        self.identity.login(credentials)
    }

    fn put(&self, token: &BearerToken, record: SealedRecord) -> ClientResult<RecordId> {
        let owner = self.identity.verify_token(token)?;
        self.store.put(&owner, record)
    }

    fn list(&self, token: &BearerToken, kind: RecordKind) -> ClientResult<Vec<SealedRecord>> {
        let owner = self.identity.verify_token(token)?;
        self.store.get(&owner, kind)
    }

    fn update(&self, token: &BearerToken, record: SealedRecord) -> ClientResult<()> {
        let owner = self.identity.verify_token(token)?;
        self.store.update(&owner, record)
    }

    fn delete(&self, token: &BearerToken, kind: RecordKind, id: RecordId) -> ClientResult<()> {
        let owner = self.identity.verify_token(token)?;
        self.store.delete(&owner, kind, id)
    }
}

impl<T: VaultService + ?Sized> VaultService for &T {
    fn register(&self, credentials: &UserCredentials) -> ClientResult<ServerHello> {
        (**self).register(credentials)
    }

    fn login(&self, credentials: &UserCredentials) -> ClientResult<ServerHello> {
        (**self).login(credentials)
    }

    fn put(&self, token: &BearerToken, record: SealedRecord) -> ClientResult<RecordId> {
        (**self).put(token, record)
    }

    fn list(&self, token: &BearerToken, kind: RecordKind) -> ClientResult<Vec<SealedRecord>> {
        (**self).list(token, kind)
    }

    fn update(&self, token: &BearerToken, record: SealedRecord) -> ClientResult<()> {
        (**self).update(token, record)
    }

    fn delete(&self, token: &BearerToken, kind: RecordKind, id: RecordId) -> ClientResult<()> {
        (**self).delete(token, kind, id)
    }
}
