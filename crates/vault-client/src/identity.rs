//! Identity collaborator: registration, login, bearer tokens
//!
//! Passwords are stored as Argon2id PHC strings. Tokens are 256-bit random
//! values, URL-safe base64, mapped in memory to the owner they were issued to.
//! A token expires after the provider's TTL; expired entries are pruned
//! whenever a token is issued or verified.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use tracing::{debug, info};
use vault_core::{BearerToken, OwnerId, ServerHello, UserCredentials, VaultError};
use zeroize::Zeroize;

use crate::error::{ClientError, ClientResult};

const TOKEN_BYTES: usize = 32;

/// Lifetime of a bearer token unless overridden with
/// [`LocalIdentity::with_token_ttl`]
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(12 * 60 * 60);

pub trait IdentityProvider: Send + Sync {
    /// Mint a token for `owner` and return it with the service public key.
    fn issue_token(&self, owner: &OwnerId) -> ClientResult<ServerHello>;
    /// Resolve a token to the owner it was issued to.
    fn verify_token(&self, token: &BearerToken) -> ClientResult<OwnerId>;
}

/// An identity provider that also owns the account table
pub trait AccountProvider: IdentityProvider {
    /// Create an account and return a token for it.
    fn register(&self, credentials: &UserCredentials) -> ClientResult<ServerHello>;
    /// Check a password and return a fresh token.
    fn login(&self, credentials: &UserCredentials) -> ClientResult<ServerHello>;
}

/// Argon2id cost parameters for password hashes
#[derive(Debug, Clone)]
pub struct PasswordParams {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub mem_cost_kib: u32,
    /// Iterations (default: 2)
    pub time_cost: u32,
    /// Parallelism (default: 1)
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

struct Account {
    owner: OwnerId,
    password_hash: String,
}

struct IssuedToken {
    owner: OwnerId,
    expires_at: Instant,
}

/// In-process identity provider backed by hash maps
pub struct LocalIdentity {
    server_key: String,
    argon2: Argon2<'static>,
    token_ttl: Duration,
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<BearerToken, IssuedToken>>,
}

impl LocalIdentity {
    /// `server_key` is the PKCS#1 PEM public key returned in every [`ServerHello`].
    pub fn new(server_key: impl Into<String>, params: &PasswordParams) -> ClientResult<Self> {
        let params = Params::new(params.mem_cost_kib, params.time_cost, params.parallelism, None)
            .map_err(|e| VaultError::Identity(format!("invalid Argon2id params: {e}")))?;
        Ok(Self {
            server_key: server_key.into(),
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            token_ttl: DEFAULT_TOKEN_TTL,
            accounts: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    fn hash_password(&self, password: &str) -> ClientResult<String> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| VaultError::Identity(format!("hashing password: {e}")))?;
        Ok(hash.to_string())
    }
}

impl AccountProvider for LocalIdentity {
    fn register(&self, credentials: &UserCredentials) -> ClientResult<ServerHello> {
        validate(credentials)?;
        let password_hash = self.hash_password(&credentials.password)?;

        let owner = {
            let mut accounts = lock(&self.accounts)?;
            if accounts.contains_key(&credentials.login) {
                return Err(ClientError::Conflict(format!(
                    "login {:?} already registered",
                    credentials.login
                )));
            }
            let owner = OwnerId::new(format!("user-{}", accounts.len() + 1));
            accounts.insert(
                credentials.login.clone(),
                Account {
                    owner: owner.clone(),
                    password_hash,
                },
            );
            owner
        };

        info!(login = %credentials.login, owner = %owner, "registered account");
        self.issue_token(&owner)
    }

    fn login(&self, credentials: &UserCredentials) -> ClientResult<ServerHello> {
        validate(credentials)?;
        let (owner, stored_hash) = {
            let accounts = lock(&self.accounts)?;
            match accounts.get(&credentials.login) {
                Some(account) => (account.owner.clone(), account.password_hash.clone()),
                None => return Err(ClientError::Unauthorized("invalid login or password".into())),
            }
        };

        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| VaultError::Identity(format!("stored password hash: {e}")))?;
        self.argon2
            .verify_password(credentials.password.as_bytes(), &parsed)
            .map_err(|_| ClientError::Unauthorized("invalid login or password".into()))?;

        info!(login = %credentials.login, owner = %owner, "login succeeded");
        self.issue_token(&owner)
    }
}

impl IdentityProvider for LocalIdentity {
    fn issue_token(&self, owner: &OwnerId) -> ClientResult<ServerHello> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = BearerToken::new(URL_SAFE_NO_PAD.encode(bytes));
        bytes.zeroize();

        let now = Instant::now();
        let mut tokens = lock(&self.tokens)?;
        prune_expired(&mut tokens, now);
        tokens.insert(
            token.clone(),
            IssuedToken {
                owner: owner.clone(),
                expires_at: now + self.token_ttl,
            },
        );
        drop(tokens);
        debug!(owner = %owner, ttl_secs = self.token_ttl.as_secs(), "issued bearer token");
        Ok(ServerHello {
            key: self.server_key.clone(),
            token,
        })
    }

    fn verify_token(&self, token: &BearerToken) -> ClientResult<OwnerId> {
        let now = Instant::now();
        let mut tokens = lock(&self.tokens)?;
        let issued = tokens
            .get(token)
            .ok_or_else(|| ClientError::Unauthorized("unknown bearer token".into()))?;
        if issued.expires_at > now {
            return Ok(issued.owner.clone());
        }
        prune_expired(&mut tokens, now);
        Err(ClientError::Unauthorized("bearer token expired".into()))
    }
}

fn prune_expired(tokens: &mut HashMap<BearerToken, IssuedToken>, now: Instant) {
    let before = tokens.len();
    tokens.retain(|_, issued| issued.expires_at > now);
    if tokens.len() < before {
        debug!(pruned = before - tokens.len(), "dropped expired bearer tokens");
    }
}

fn validate(credentials: &UserCredentials) -> ClientResult<()> {
    if credentials.login.is_empty() || credentials.password.is_empty() {
        return Err(ClientError::InvalidCredentials(
            "login and password must not be empty".into(),
        ));
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> ClientResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| VaultError::Identity("identity state lock poisoned".into()).into())
}

#[cfg(test)]
pub(crate) fn test_params() -> PasswordParams {
    PasswordParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> LocalIdentity {
        LocalIdentity::new("-----BEGIN RSA PUBLIC KEY-----\n", &test_params()).unwrap()
    }

    fn creds(login: &str, password: &str) -> UserCredentials {
        UserCredentials {
            login: login.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_register_then_login() {
        let id = identity();
        let registered = id.register(&creds("alice", "hunter2")).unwrap();
        let logged_in = id.login(&creds("alice", "hunter2")).unwrap();

        assert_ne!(registered.token, logged_in.token);
        assert_eq!(
            id.verify_token(&registered.token).unwrap(),
            id.verify_token(&logged_in.token).unwrap()
        );
        assert_eq!(logged_in.key, "-----BEGIN RSA PUBLIC KEY-----\n");
    }

    #[test]
    fn test_duplicate_registration_conflicts() {
        let id = identity();
        id.register(&creds("alice", "a")).unwrap();
        let err = id.register(&creds("alice", "b")).unwrap_err();
        assert!(matches!(err, ClientError::Conflict(_)));
    }

    #[test]
    fn test_wrong_password_unauthorized() {
        let id = identity();
        id.register(&creds("alice", "hunter2")).unwrap();

        let err = id.login(&creds("alice", "hunter3")).unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
        let err = id.login(&creds("mallory", "hunter2")).unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let id = identity();
        for (login, password) in [("", "pw"), ("alice", "")] {
            let err = id.register(&creds(login, password)).unwrap_err();
            assert!(matches!(err, ClientError::InvalidCredentials(_)));
        }
    }

    #[test]
    fn test_unknown_token() {
        let err = identity()
            .verify_token(&BearerToken::new("forged"))
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_unauthorized() {
        let id = identity().with_token_ttl(Duration::ZERO);
        let hello = id.register(&creds("alice", "pw")).unwrap();

        let err = id.verify_token(&hello.token).unwrap_err();
        assert!(matches!(&err, ClientError::Unauthorized(m) if m.contains("expired")));
        // The expired entry is gone, so a second attempt no longer knows it.
        let err = id.verify_token(&hello.token).unwrap_err();
        assert!(matches!(&err, ClientError::Unauthorized(m) if m.contains("unknown")));
    }

    #[test]
    fn test_expired_tokens_pruned_on_issue() {
        let id = identity().with_token_ttl(Duration::ZERO);
        let owner = OwnerId::new("user-1");
        for _ in 0..5 {
            id.issue_token(&owner).unwrap();
        }
        assert_eq!(id.tokens.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_live_token_survives_pruning() {
        let id = identity().with_token_ttl(Duration::from_secs(60));
        let first = id.issue_token(&OwnerId::new("user-1")).unwrap();
        id.issue_token(&OwnerId::new("user-2")).unwrap();

        assert_eq!(id.verify_token(&first.token).unwrap(), OwnerId::new("user-1"));
        assert_eq!(id.tokens.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_distinct_owners() {
        let id = identity();
        let a = id.register(&creds("alice", "pw")).unwrap();
        let b = id.register(&creds("bob", "pw")).unwrap();
        assert_ne!(
            id.verify_token(&a.token).unwrap(),
            id.verify_token(&b.token).unwrap()
        );
    }
}
