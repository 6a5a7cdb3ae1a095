//! In-memory credential store for the client/admin API (C13, §3 `ClientRecord`).
//!
//! Intentionally not persisted: a restart invalidates every registered
//! client, same as the teacher's services hold their tables in Postgres
//! but this surface has "no design novelty" per spec §1 and the SFU
//! itself keeps no durable state either.

use std::collections::HashMap;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use thiserror::Error;
use tokio::sync::RwLock;

const MIN_AUTH_KEY_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientStoreError {
    #[error("authKey too short")]
    AuthKeyTooShort,
    #[error("clientID already registered")]
    Duplicate,
    #[error("unknown clientID")]
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub client_id: String,
    pub is_admin: bool,
    auth_key_hash: String,
}

#[derive(Default)]
pub struct ClientStore {
    clients: RwLock<HashMap<String, ClientRecord>>,
}

impl ClientStore {
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()) }
    }

    /// Seeds the store with a single admin account from config, used when
    /// `api.security.enable_admin` is set (§4.14).
    pub async fn seed_admin(&self, client_id: &str, auth_key: &str) {
        let hash = hash_key(auth_key);
        self.clients.write().await.insert(
            client_id.to_string(),
            ClientRecord { client_id: client_id.to_string(), is_admin: true, auth_key_hash: hash },
        );
    }

    pub async fn register(&self, client_id: &str, auth_key: &str) -> Result<(), ClientStoreError> {
        if auth_key.len() < MIN_AUTH_KEY_LEN {
            return Err(ClientStoreError::AuthKeyTooShort);
        }
        let mut clients = self.clients.write().await;
        if clients.contains_key(client_id) {
            return Err(ClientStoreError::Duplicate);
        }
        clients.insert(
            client_id.to_string(),
            ClientRecord { client_id: client_id.to_string(), is_admin: false, auth_key_hash: hash_key(auth_key) },
        );
        Ok(())
    }

    pub async fn unregister(&self, client_id: &str) -> Result<(), ClientStoreError> {
        self.clients.write().await.remove(client_id).map(|_| ()).ok_or(ClientStoreError::Unknown)
    }

    pub async fn get(&self, client_id: &str) -> Option<ClientRecord> {
        self.clients.read().await.get(client_id).cloned()
    }

    pub async fn verify(&self, client_id: &str, auth_key: &str) -> Option<ClientRecord> {
        let clients = self.clients.read().await;
        let record = clients.get(client_id)?;
        if verify_key(auth_key, &record.auth_key_hash) {
            Some(record.clone())
        } else {
            None
        }
    }
}

fn hash_key(auth_key: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(auth_key.as_bytes(), &salt)
        .expect("argon2 hashing params are static and valid")
        .to_string()
}

fn verify_key(auth_key: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else { return false };
    Argon2::default().verify_password(auth_key.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_short_auth_key() {
        let store = ClientStore::new();
        assert_eq!(store.register("alice", "short").await, Err(ClientStoreError::AuthKeyTooShort));
    }

    #[tokio::test]
    async fn rejects_duplicate_registration() {
        let store = ClientStore::new();
        store.register("alice", "correct-horse-battery").await.unwrap();
        assert_eq!(store.register("alice", "another-secret1").await, Err(ClientStoreError::Duplicate));
    }

    #[tokio::test]
    async fn verifies_registered_credentials() {
        let store = ClientStore::new();
        store.register("alice", "correct-horse-battery").await.unwrap();
        assert!(store.verify("alice", "correct-horse-battery").await.is_some());
        assert!(store.verify("alice", "wrong-password").await.is_none());
    }

    #[tokio::test]
    async fn unregister_removes_client() {
        let store = ClientStore::new();
        store.register("alice", "correct-horse-battery").await.unwrap();
        store.unregister("alice").await.unwrap();
        assert_eq!(store.unregister("alice").await, Err(ClientStoreError::Unknown));
    }
}
