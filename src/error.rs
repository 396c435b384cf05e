//! Top-level error type for the lifecycle manager.

use thiserror::Error;

use crate::accounts::AccountStoreError;
use crate::keygen::KeygenError;
use crate::permissions::PermissionStoreError;
use crate::secrets::SecretsKvError;

/// Errors surfaced by lifecycle manager operations.
///
/// Collaborator failures are propagated verbatim; the manager performs no
/// retries and no rollback of steps that already succeeded.
#[derive(Debug, Error)]
pub enum ExtSvcError {
    /// No service account exists for the external service.
    ///
    /// Only surfaced by operations that require an existing account; lookup
    /// paths treat absence as a branch, not a failure.
    #[error("no service account for external service {slug} in org {org_id}")]
    AccountNotFound { org_id: i64, slug: String },

    /// No credential is stored for the external service.
    #[error("no credentials found for external service {slug}")]
    CredentialsNotFound { slug: String },

    /// Error from the service account store.
    #[error("account store error: {0}")]
    Account(#[from] AccountStoreError),

    /// Error from the permission store.
    #[error("permission store error: {0}")]
    Permissions(#[from] PermissionStoreError),

    /// Error from the credential store.
    #[error("credential store error: {0}")]
    Credentials(#[from] SecretsKvError),

    /// Token material generation failed before any store mutation.
    #[error("keygen error: {0}")]
    Keygen(#[from] KeygenError),
}
