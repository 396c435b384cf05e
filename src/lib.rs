//! # External Service Accounts
//!
//! Lifecycle management for the service accounts backing external services
//! (plugins and third-party API clients). Each external service is bound
//! 1:1 to a managed service account and an API credential; this crate keeps
//! that triple consistent with the service's requested permission set and
//! enablement state.
//!
//! This crate provides:
//! - Domain types for external service identities, accounts and permissions
//! - Traits for the account, permission and credential store collaborators
//! - In-memory store implementations for tests and lightweight embedders
//! - [`ExtSvcAccountManager`], the stateless lifecycle orchestrator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use extsvc_accounts::{
//!     ApiKeyGenerator, EventBus, ExtSvcAccountManager, MemoryAccountStore,
//!     MemoryPermissionStore, MemorySecretsKv, Metrics, Permission,
//!     SaveExternalServiceRequest, StaticFlags,
//!     features::FLAG_EXTERNAL_SERVICE_ACCOUNTS,
//! };
//!
//! let bus = EventBus::new();
//! let manager = ExtSvcAccountManager::provide(
//!     Arc::new(MemoryAccountStore::new()),
//!     Arc::new(MemoryPermissionStore::new()),
//!     Arc::new(MemorySecretsKv::new()),
//!     Arc::new(ApiKeyGenerator::new()),
//!     Arc::new(StaticFlags::with_enabled([FLAG_EXTERNAL_SERVICE_ACCOUNTS])),
//!     &bus,
//!     Metrics::detached()?,
//! );
//!
//! let registered = manager
//!     .save_external_service(SaveExternalServiceRequest {
//!         name: "Acme App".to_string(),
//!         org_id: 1,
//!         enabled: true,
//!         permissions: vec![Permission::new("users:read", "users:*")],
//!     })
//!     .await?;
//! ```

pub mod accounts;
pub mod error;
pub mod events;
pub mod features;
pub mod keygen;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod permissions;
pub mod secrets;

// Re-export commonly used types at crate root
pub use model::{
    ACCOUNT_NAME_PREFIX, Credentials, ExtSvcSlug, ExternalService, Permission, Role,
    SaveExternalServiceRequest, SaveRequest, ServiceAccount,
};

pub use accounts::{AccountStoreError, MemoryAccountStore, ServiceAccountStore};

pub use permissions::{MemoryPermissionStore, PermissionStore, PermissionStoreError};

pub use secrets::{MemorySecretsKv, Secret, SecretsKvError, SecretsKvStore};

pub use keygen::{ApiKeyGenerator, KeyGenerator, KeyMaterial, KeygenError};

pub use features::{FeatureGate, StaticFlags};

pub use events::{EnablementListener, EventBus, EventSource, StateChangeEvent};

pub use error::ExtSvcError;

pub use metrics::Metrics;

pub use manager::{CREDENTIAL_KIND, DEFAULT_ORG_ID, ExtSvcAccountManager, TOKEN_NAME_PREFIX};
