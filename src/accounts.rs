//! Service account store abstraction.
//!
//! The lifecycle manager never persists accounts itself; it drives an
//! implementation of [`ServiceAccountStore`] owned by the wider platform.
//! [`MemoryAccountStore`] is the in-memory implementation used by tests and
//! lightweight embedders.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use crate::model::{Role, ServiceAccount};

/// Error type for account store operations.
#[derive(Debug, Error)]
pub enum AccountStoreError {
    /// An account with the same name already exists in the organization.
    #[error("service account {name} already exists in org {org_id}")]
    AlreadyExists { org_id: i64, name: String },

    /// The referenced account does not exist.
    #[error("service account {account_id} not found in org {org_id}")]
    NotFound { org_id: i64, account_id: i64 },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },
}

/// Abstraction over the platform's service account CRUD store.
///
/// Lookups signal absence with `Ok(None)`; mutations on a missing account
/// return [`AccountStoreError::NotFound`].
#[async_trait]
pub trait ServiceAccountStore: Send + Sync {
    /// Find an account id by its derived name.
    async fn find_id_by_name(
        &self,
        org_id: i64,
        name: &str,
    ) -> Result<Option<i64>, AccountStoreError>;

    /// Fetch a full account record by id.
    async fn retrieve(
        &self,
        org_id: i64,
        account_id: i64,
    ) -> Result<Option<ServiceAccount>, AccountStoreError>;

    /// Create a new service account and return it with its assigned id.
    async fn create(
        &self,
        org_id: i64,
        name: &str,
        role: Role,
        disabled: bool,
    ) -> Result<ServiceAccount, AccountStoreError>;

    /// Enable or disable an account.
    async fn set_enabled(
        &self,
        org_id: i64,
        account_id: i64,
        enabled: bool,
    ) -> Result<(), AccountStoreError>;

    /// Delete an account and everything attached to it in the store.
    async fn delete(&self, org_id: i64, account_id: i64) -> Result<(), AccountStoreError>;

    /// Register a named API token on an account.
    ///
    /// Only the hashed form of the key is handed to the store; the plaintext
    /// lives in the credential store.
    async fn add_token(
        &self,
        account_id: i64,
        token_name: &str,
        hashed_key: &str,
    ) -> Result<(), AccountStoreError>;
}

#[derive(Default)]
struct MemoryAccounts {
    next_id: i64,
    accounts: HashMap<i64, ServiceAccount>,
    tokens: HashMap<i64, Vec<(String, String)>>,
}

/// In-memory service account store for testing and development.
///
/// # Thread Safety
///
/// Uses interior mutability via `RwLock` and is safe to share across threads.
#[derive(Default)]
pub struct MemoryAccountStore {
    data: RwLock<MemoryAccounts>,
}

impl MemoryAccountStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live accounts, for assertions in tests.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.accounts.len()).unwrap_or(0)
    }

    /// Whether the store holds no accounts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the tokens registered on an account.
    pub fn token_names(&self, account_id: i64) -> Vec<String> {
        self.data
            .read()
            .map(|d| {
                d.tokens
                    .get(&account_id)
                    .map(|t| t.iter().map(|(name, _)| name.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock_err(e: impl std::fmt::Display) -> AccountStoreError {
        AccountStoreError::BackendError {
            message: format!("lock poisoned: {e}"),
        }
    }
}

impl std::fmt::Debug for MemoryAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAccountStore")
            .field("accounts_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl ServiceAccountStore for MemoryAccountStore {
    async fn find_id_by_name(
        &self,
        org_id: i64,
        name: &str,
    ) -> Result<Option<i64>, AccountStoreError> {
        let data = self.data.read().map_err(Self::lock_err)?;
        Ok(data
            .accounts
            .values()
            .find(|a| a.org_id == org_id && a.name == name)
            .map(|a| a.id))
    }

    async fn retrieve(
        &self,
        org_id: i64,
        account_id: i64,
    ) -> Result<Option<ServiceAccount>, AccountStoreError> {
        let data = self.data.read().map_err(Self::lock_err)?;
        Ok(data
            .accounts
            .get(&account_id)
            .filter(|a| a.org_id == org_id)
            .cloned())
    }

    async fn create(
        &self,
        org_id: i64,
        name: &str,
        role: Role,
        disabled: bool,
    ) -> Result<ServiceAccount, AccountStoreError> {
        let mut data = self.data.write().map_err(Self::lock_err)?;

        if data
            .accounts
            .values()
            .any(|a| a.org_id == org_id && a.name == name)
        {
            return Err(AccountStoreError::AlreadyExists {
                org_id,
                name: name.to_string(),
            });
        }

        data.next_id += 1;
        let account = ServiceAccount {
            id: data.next_id,
            org_id,
            name: name.to_string(),
            role,
            disabled,
            created_at: Utc::now(),
        };
        data.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn set_enabled(
        &self,
        org_id: i64,
        account_id: i64,
        enabled: bool,
    ) -> Result<(), AccountStoreError> {
        let mut data = self.data.write().map_err(Self::lock_err)?;
        let account = data
            .accounts
            .get_mut(&account_id)
            .filter(|a| a.org_id == org_id)
            .ok_or(AccountStoreError::NotFound { org_id, account_id })?;
        account.disabled = !enabled;
        Ok(())
    }

    async fn delete(&self, org_id: i64, account_id: i64) -> Result<(), AccountStoreError> {
        let mut data = self.data.write().map_err(Self::lock_err)?;
        let exists = data
            .accounts
            .get(&account_id)
            .is_some_and(|a| a.org_id == org_id);
        if !exists {
            return Err(AccountStoreError::NotFound { org_id, account_id });
        }
        data.accounts.remove(&account_id);
        data.tokens.remove(&account_id);
        Ok(())
    }

    async fn add_token(
        &self,
        account_id: i64,
        token_name: &str,
        hashed_key: &str,
    ) -> Result<(), AccountStoreError> {
        let mut data = self.data.write().map_err(Self::lock_err)?;
        if !data.accounts.contains_key(&account_id) {
            return Err(AccountStoreError::NotFound {
                org_id: 0,
                account_id,
            });
        }
        data.tokens
            .entry(account_id)
            .or_default()
            .push((token_name.to_string(), hashed_key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find_by_name() {
        let store = MemoryAccountStore::new();

        let account = store
            .create(1, "extsvc-acme", Role::None, true)
            .await
            .unwrap();
        assert!(account.id > 0);
        assert!(account.disabled);
        assert_eq!(account.role, Role::None);

        let found = store.find_id_by_name(1, "extsvc-acme").await.unwrap();
        assert_eq!(found, Some(account.id));
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let store = MemoryAccountStore::new();
        let found = store.find_id_by_name(1, "extsvc-missing").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_name_fails() {
        let store = MemoryAccountStore::new();
        store
            .create(1, "extsvc-acme", Role::None, true)
            .await
            .unwrap();

        let result = store.create(1, "extsvc-acme", Role::None, true).await;
        assert!(matches!(
            result,
            Err(AccountStoreError::AlreadyExists { .. })
        ));

        // Same name in a different org is fine.
        store
            .create(2, "extsvc-acme", Role::None, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_enabled() {
        let store = MemoryAccountStore::new();
        let account = store
            .create(1, "extsvc-acme", Role::None, true)
            .await
            .unwrap();

        store.set_enabled(1, account.id, true).await.unwrap();
        let fetched = store.retrieve(1, account.id).await.unwrap().unwrap();
        assert!(!fetched.disabled);

        store.set_enabled(1, account.id, false).await.unwrap();
        let fetched = store.retrieve(1, account.id).await.unwrap().unwrap();
        assert!(fetched.disabled);
    }

    #[tokio::test]
    async fn test_set_enabled_missing_account() {
        let store = MemoryAccountStore::new();
        let result = store.set_enabled(1, 42, true).await;
        assert!(matches!(result, Err(AccountStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_removes_tokens() {
        let store = MemoryAccountStore::new();
        let account = store
            .create(1, "extsvc-acme", Role::None, true)
            .await
            .unwrap();
        store
            .add_token(account.id, "extsvc-token-acme", "hashed")
            .await
            .unwrap();
        assert_eq!(store.token_names(account.id).len(), 1);

        store.delete(1, account.id).await.unwrap();
        assert!(store.is_empty());
        assert!(store.token_names(account.id).is_empty());
    }

    #[tokio::test]
    async fn test_org_scoping() {
        let store = MemoryAccountStore::new();
        let account = store
            .create(1, "extsvc-acme", Role::None, true)
            .await
            .unwrap();

        assert!(store.retrieve(2, account.id).await.unwrap().is_none());
        assert!(
            store
                .find_id_by_name(2, "extsvc-acme")
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            store.delete(2, account.id).await,
            Err(AccountStoreError::NotFound { .. })
        ));
    }
}
