//! Permission store abstraction.
//!
//! The access-control engine owns permission evaluation; this crate only
//! needs to hand it a named bundle per external service and to tear that
//! bundle down again. Saving is a wholesale overwrite, never a diff/merge.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use crate::model::Permission;

/// Error type for permission store operations.
#[derive(Debug, Error)]
pub enum PermissionStoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },
}

/// Abstraction over the access-control engine's external service roles.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Save the permission bundle for an external service, replacing any
    /// existing bundle for the same service.
    async fn save_role(
        &self,
        external_service_id: &str,
        account_id: i64,
        permissions: &[Permission],
    ) -> Result<(), PermissionStoreError>;

    /// Delete the permission bundle of an external service.
    ///
    /// Succeeds even if no bundle exists.
    async fn delete_role(&self, external_service_id: &str) -> Result<(), PermissionStoreError>;
}

#[derive(Debug, Clone)]
struct StoredRole {
    account_id: i64,
    permissions: Vec<Permission>,
}

/// In-memory permission store for testing and development.
#[derive(Default)]
pub struct MemoryPermissionStore {
    roles: RwLock<HashMap<String, StoredRole>>,
}

impl MemoryPermissionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the stored bundle for a service, for assertions in tests.
    pub fn permissions(&self, external_service_id: &str) -> Option<Vec<Permission>> {
        self.roles
            .read()
            .ok()
            .and_then(|r| r.get(external_service_id).map(|s| s.permissions.clone()))
    }

    /// The account the bundle is attached to, if any.
    pub fn assigned_account(&self, external_service_id: &str) -> Option<i64> {
        self.roles
            .read()
            .ok()
            .and_then(|r| r.get(external_service_id).map(|s| s.account_id))
    }

    /// Number of stored bundles.
    pub fn len(&self) -> usize {
        self.roles.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store holds no bundles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn save_role(
        &self,
        external_service_id: &str,
        account_id: i64,
        permissions: &[Permission],
    ) -> Result<(), PermissionStoreError> {
        let mut roles = self
            .roles
            .write()
            .map_err(|e| PermissionStoreError::BackendError {
                message: format!("lock poisoned: {e}"),
            })?;
        roles.insert(
            external_service_id.to_string(),
            StoredRole {
                account_id,
                permissions: permissions.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete_role(&self, external_service_id: &str) -> Result<(), PermissionStoreError> {
        let mut roles = self
            .roles
            .write()
            .map_err(|e| PermissionStoreError::BackendError {
                message: format!("lock poisoned: {e}"),
            })?;
        roles.remove(external_service_id);
        Ok(())
    }
}
