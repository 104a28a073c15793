//! Record manager: seals records before they leave the client and opens
//! them after they come back.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use vault_core::{BearerToken, RecordId, ServerHello, UserCredentials, VaultData};
use vault_crypto::{decrypt_fields, encrypt_fields, KeyPair};

use crate::error::{ClientError, ClientResult};
use crate::service::VaultService;
use crate::store::Storable;

/// State retained after a successful register/login
#[derive(Debug, Clone)]
pub struct Session {
    pub token: BearerToken,
    /// Service public key (PKCS#1 PEM). Not used for field encryption.
    pub server_key: String,
}

impl From<ServerHello> for Session {
    fn from(hello: ServerHello) -> Self {
        Self {
            token: hello.token,
            server_key: hello.key,
        }
    }
}

pub struct VaultClient<S> {
    keys: Arc<KeyPair>,
    service: S,
    session: Option<Session>,
}

impl<S: VaultService> VaultClient<S> {
    pub fn new(keys: Arc<KeyPair>, service: S) -> Self {
        Self {
            keys,
            service,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn register(&mut self, login: &str, password: &SecretString) -> ClientResult<()> {
        let hello = self.service.register(&credentials(login, password))?;
        info!(login, "registered with vault service");
        self.session = Some(hello.into());
        Ok(())
    }

    pub fn login(&mut self, login: &str, password: &SecretString) -> ClientResult<()> {
        let hello = self.service.login(&credentials(login, password))?;
        info!(login, "logged in to vault service");
        self.session = Some(hello.into());
        Ok(())
    }

    pub fn logout(&mut self) {
        self.session = None;
    }

    /// Seal `record` and store it, returning the id the service assigned.
    pub fn add<R: Storable>(&self, record: &R) -> ClientResult<RecordId> {
        let token = self.token()?;
        let sealed = encrypt_fields(record, self.keys.public_key())?;
        let id = self.service.put(token, R::into_stored(sealed))?;
        debug!(kind = %R::KIND, %id, "added record");
        Ok(id)
    }

    /// Fetch and open every record of kind `R`.
    pub fn list<R: Storable>(&self) -> ClientResult<Vec<R>> {
        let token = self.token()?;
        let stored = self.service.list(token, R::KIND)?;
        let mut records = Vec::with_capacity(stored.len());
        for item in stored {
            let (kind, id) = (item.kind(), item.id());
            let sealed = R::from_stored(item).ok_or(ClientError::NotFound { kind, id })?;
            records.push(decrypt_fields(&sealed, self.keys.private_key())?);
        }
        debug!(kind = %R::KIND, count = records.len(), "listed records");
        Ok(records)
    }

    /// Re-seal `record` and replace the stored copy with the same id.
    pub fn update<R: Storable>(&self, record: &R) -> ClientResult<()> {
        let token = self.token()?;
        let sealed = encrypt_fields(record, self.keys.public_key())?;
        self.service.update(token, R::into_stored(sealed))?;
        debug!(kind = %R::KIND, id = %record.id(), "updated record");
        Ok(())
    }

    pub fn delete<R: Storable>(&self, id: RecordId) -> ClientResult<()> {
        let token = self.token()?;
        self.service.delete(token, R::KIND, id)?;
        debug!(kind = %R::KIND, %id, "deleted record");
        Ok(())
    }

    /// Every collection, decrypted.
    pub fn snapshot(&self) -> ClientResult<VaultData> {
        Ok(VaultData {
            credentials: self.list()?,
            cards: self.list()?,
            notes: self.list()?,
            blobs: self.list()?,
        })
    }

    fn token(&self) -> ClientResult<&BearerToken> {
        self.session
            .as_ref()
            .map(|s| &s.token)
            .ok_or(ClientError::NotAuthenticated)
    }
}

fn credentials(login: &str, password: &SecretString) -> UserCredentials {
    UserCredentials {
        login: login.to_owned(),
        password: password.expose_secret().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{test_params, LocalIdentity};
    use crate::service::LocalService;
    use std::sync::OnceLock;
    use vault_core::{Card, Note, RecordKind};
    use vault_crypto::ErrorKind;

    fn keys() -> Arc<KeyPair> {
        static KEYS: OnceLock<Arc<KeyPair>> = OnceLock::new();
        KEYS.get_or_init(|| Arc::new(KeyPair::generate(1024).unwrap()))
            .clone()
    }

    fn service() -> LocalService {
        LocalService::in_memory(LocalIdentity::new("server-key", &test_params()).unwrap())
    }

    #[test]
    fn test_requires_login() {
        let svc = service();
        let client = VaultClient::new(keys(), &svc);
        let err = client.add(&Note::new("x")).unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert!(matches!(
            client.list::<Note>().unwrap_err(),
            ClientError::NotAuthenticated
        ));
    }

    #[test]
    fn test_store_never_sees_plaintext() {
        let svc = service();
        let mut client = VaultClient::new(keys(), &svc);
        client
            .register("alice", &SecretString::from("pw"))
            .unwrap();

        client.add(&Card::new("4111111111111111", "J DOE", "123")).unwrap();

        let session = client.session().unwrap();
        let stored = svc.list(&session.token, RecordKind::Card).unwrap();
        let sealed = Card::from_stored(stored[0].clone()).unwrap();
        assert_ne!(sealed.as_inner().number, b"4111111111111111");
        assert_eq!(sealed.as_inner().cvc.len(), keys().block_size());
    }

    #[test]
    fn test_foreign_key_surfaces_decryption_error() {
        let svc = service();
        let mut writer = VaultClient::new(keys(), &svc);
        writer.register("alice", &SecretString::from("pw")).unwrap();
        writer.add(&Note::new("secret")).unwrap();

        let other = Arc::new(KeyPair::generate(1024).unwrap());
        let mut reader = VaultClient::new(other, &svc);
        reader.login("alice", &SecretString::from("pw")).unwrap();

        match reader.list::<Note>().unwrap_err() {
            ClientError::Crypto(e) => {
                assert_eq!(e.kind(), ErrorKind::DecryptionFailure);
                assert_eq!(e.field(), Some("text"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_logout_drops_token() {
        let svc = service();
        let mut client = VaultClient::new(keys(), &svc);
        client.register("alice", &SecretString::from("pw")).unwrap();
        client.logout();
        assert!(client.session().is_none());
        assert!(matches!(
            client.snapshot().unwrap_err(),
            ClientError::NotAuthenticated
        ));
    }
}
