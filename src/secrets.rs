//! Encrypted credential key-value storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretsKvStore`] - Trait for the credential storage backend
//! - [`MemorySecretsKv`] - In-memory implementation for testing and embedding
//!
//! Credentials are addressed by the composite key `(org_id, slug, kind)`;
//! the lifecycle manager stores exactly one live credential per external
//! service under the kind `"extsvcauth"`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum SecretsKvError {
    /// Access to the credential was denied by the backend.
    #[error("access denied to credential for {slug}")]
    AccessDenied { slug: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Abstraction over the encrypted credential key-value store.
///
/// Absence is a valid state: `get` returns `Ok(None)` when no credential is
/// stored under the key, and `delete` succeeds even if nothing was there.
#[async_trait]
pub trait SecretsKvStore: Send + Sync {
    /// Retrieve a credential by composite key.
    async fn get(
        &self,
        org_id: i64,
        slug: &str,
        kind: &str,
    ) -> Result<Option<Secret>, SecretsKvError>;

    /// Store a credential, overwriting any existing value under the key.
    async fn set(
        &self,
        org_id: i64,
        slug: &str,
        kind: &str,
        secret: &Secret,
    ) -> Result<(), SecretsKvError>;

    /// Delete a credential by composite key.
    async fn delete(&self, org_id: i64, slug: &str, kind: &str) -> Result<(), SecretsKvError>;
}

/// In-memory credential store for testing and development.
///
/// Not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// Uses interior mutability via `RwLock` and is safe to share across threads.
#[derive(Default)]
pub struct MemorySecretsKv {
    data: RwLock<HashMap<(i64, String, String), Secret>>,
}

impl MemorySecretsKv {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials, for assertions in tests.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Whether the store holds no credentials.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemorySecretsKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySecretsKv")
            .field("keys_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl SecretsKvStore for MemorySecretsKv {
    async fn get(
        &self,
        org_id: i64,
        slug: &str,
        kind: &str,
    ) -> Result<Option<Secret>, SecretsKvError> {
        let data = self.data.read().map_err(|e| SecretsKvError::BackendError {
            message: format!("lock poisoned: {e}"),
        })?;
        Ok(data.get(&(org_id, slug.to_string(), kind.to_string())).cloned())
    }

    async fn set(
        &self,
        org_id: i64,
        slug: &str,
        kind: &str,
        secret: &Secret,
    ) -> Result<(), SecretsKvError> {
        let mut data = self.data.write().map_err(|e| SecretsKvError::BackendError {
            message: format!("lock poisoned: {e}"),
        })?;
        data.insert((org_id, slug.to_string(), kind.to_string()), secret.clone());
        Ok(())
    }

    async fn delete(&self, org_id: i64, slug: &str, kind: &str) -> Result<(), SecretsKvError> {
        let mut data = self.data.write().map_err(|e| SecretsKvError::BackendError {
            message: format!("lock poisoned: {e}"),
        })?;
        data.remove(&(org_id, slug.to_string(), kind.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_memory_kv_set_get() {
        let store = MemorySecretsKv::new();
        let secret = Secret::new("token-material");

        store.set(1, "acme", "extsvcauth", &secret).await.unwrap();
        let retrieved = store.get(1, "acme", "extsvcauth").await.unwrap();

        assert_eq!(retrieved, Some(secret));
    }

    #[tokio::test]
    async fn test_memory_kv_get_missing() {
        let store = MemorySecretsKv::new();
        let result = store.get(1, "acme", "extsvcauth").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_memory_kv_composite_key_isolation() {
        let store = MemorySecretsKv::new();
        store
            .set(1, "acme", "extsvcauth", &Secret::new("t1"))
            .await
            .unwrap();

        // Different org, slug or kind must not alias the same entry.
        assert!(store.get(2, "acme", "extsvcauth").await.unwrap().is_none());
        assert!(store.get(1, "other", "extsvcauth").await.unwrap().is_none());
        assert!(store.get(1, "acme", "other-kind").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_kv_delete() {
        let store = MemorySecretsKv::new();
        store
            .set(1, "acme", "extsvcauth", &Secret::new("t1"))
            .await
            .unwrap();

        store.delete(1, "acme", "extsvcauth").await.unwrap();
        assert!(store.get(1, "acme", "extsvcauth").await.unwrap().is_none());

        // Deleting an absent key is not an error.
        store.delete(1, "acme", "extsvcauth").await.unwrap();
    }
}
