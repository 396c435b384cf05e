//! External service account lifecycle manager.
//!
//! [`ExtSvcAccountManager`] keeps a 1:1 binding between an external service
//! and a managed service account plus its API credential, synchronized with
//! the service's requested permission set and enablement state. It holds no
//! state of its own: current state is re-derived from the account store on
//! every call, which makes the manager restart-safe and every save
//! idempotent with respect to the target state.
//!
//! Multi-step mutations are applied sequentially without rollback. A failure
//! partway through leaves the collaborators partially updated and surfaces
//! the error; retrying the same request reconciles the leftover state.
//! Same-identity concurrent calls are not serialized here; conflict handling
//! is owed by the underlying stores.

use std::sync::Arc;

use async_trait::async_trait;

use crate::accounts::ServiceAccountStore;
use crate::error::ExtSvcError;
use crate::events::{EnablementListener, EventSource, StateChangeEvent};
use crate::features::{FLAG_EXTERNAL_SERVICE_ACCOUNTS, FLAG_EXTERNAL_SERVICE_AUTH, FeatureGate};
use crate::keygen::KeyGenerator;
use crate::metrics::Metrics;
use crate::model::{
    Credentials, ExtSvcSlug, ExternalService, Role, SaveExternalServiceRequest, SaveRequest,
    ServiceAccount,
};
use crate::permissions::PermissionStore;
use crate::secrets::{Secret, SecretsKvStore};

/// Organization all external service accounts live in.
pub const DEFAULT_ORG_ID: i64 = 1;

/// Name prefix of the token registered on each account.
pub const TOKEN_NAME_PREFIX: &str = "extsvc-token";

/// Kind segment of the credential store composite key.
pub const CREDENTIAL_KIND: &str = "extsvcauth";

/// Lifecycle manager for external service accounts.
///
/// Construct with [`ExtSvcAccountManager::provide`], which also wires the
/// manager to the enablement event source when the capability gate is open.
pub struct ExtSvcAccountManager {
    accounts: Arc<dyn ServiceAccountStore>,
    permissions: Arc<dyn PermissionStore>,
    secrets: Arc<dyn SecretsKvStore>,
    keygen: Arc<dyn KeyGenerator>,
    features: Arc<dyn FeatureGate>,
    metrics: Metrics,
}

impl ExtSvcAccountManager {
    /// Build the manager and register it as an enablement listener.
    ///
    /// Registration only happens when one of the capability flags is on,
    /// so a gated deployment never reacts to events either.
    pub fn provide(
        accounts: Arc<dyn ServiceAccountStore>,
        permissions: Arc<dyn PermissionStore>,
        secrets: Arc<dyn SecretsKvStore>,
        keygen: Arc<dyn KeyGenerator>,
        features: Arc<dyn FeatureGate>,
        events: &dyn EventSource,
        metrics: Metrics,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            accounts,
            permissions,
            secrets,
            keygen,
            features,
            metrics,
        });

        if manager.gate_open() {
            events.add_listener(manager.clone());
        }

        manager
    }

    fn gate_open(&self) -> bool {
        self.features.is_enabled(FLAG_EXTERNAL_SERVICE_ACCOUNTS)
            || self.features.is_enabled(FLAG_EXTERNAL_SERVICE_AUTH)
    }

    /// Register an external service end to end: account, permissions and
    /// credential.
    ///
    /// Returns `None` when the request resolved to no account (gated call,
    /// empty name, or empty permission list). Otherwise returns the identity
    /// together with its live bearer secret, minting one only on the first
    /// registration.
    pub async fn save_external_service(
        &self,
        req: SaveExternalServiceRequest,
    ) -> Result<Option<ExternalService>, ExtSvcError> {
        // Double proofing: callers are expected to have checked the flags
        // already.
        if !self.gate_open() {
            tracing::warn!("external service accounts are behind a capability flag, skipping save");
            return Ok(None);
        }

        let slug = ExtSvcSlug::new(&req.name);

        let account_id = self
            .save(SaveRequest {
                slug: slug.clone(),
                org_id: req.org_id,
                enabled: req.enabled,
                permissions: req.permissions,
            })
            .await?;

        if account_id <= 0 {
            tracing::debug!(service = %slug, "skipping service account token creation");
            return Ok(None);
        }

        let secret = match self
            .issue_or_get_credential(req.org_id, account_id, &slug)
            .await
        {
            Ok(secret) => secret,
            Err(e) => {
                tracing::error!(
                    service = %slug,
                    account_id,
                    error = %e,
                    "could not get the external service token"
                );
                return Err(e);
            }
        };

        Ok(Some(ExternalService {
            name: req.name,
            id: slug,
            secret,
        }))
    }

    /// Drive the account/permission/credential collaborators to the state
    /// described by `req`.
    ///
    /// An empty permission list means the account must not exist and triggers
    /// full teardown; otherwise the account is created if missing, its
    /// enablement set, and its permission bundle replaced wholesale. Returns
    /// the account id, or 0 when no account exists after the call.
    pub async fn save(&self, req: SaveRequest) -> Result<i64, ExtSvcError> {
        // Double proofing, same as the registration entry point.
        if !self.gate_open() {
            tracing::warn!("external service accounts are behind a capability flag, skipping save");
            return Ok(0);
        }

        if req.slug.is_empty() {
            tracing::warn!("received an empty external service identifier, skipping save");
            return Ok(0);
        }

        let name = req.slug.account_name();
        let existing = self.accounts.find_id_by_name(req.org_id, &name).await?;

        if req.permissions.is_empty() {
            if let Some(account_id) = existing {
                if let Err(e) = self
                    .delete_account(req.org_id, &req.slug, account_id)
                    .await
                {
                    tracing::error!(
                        service = %req.slug,
                        account_id,
                        error = %e,
                        "error occurred while deleting service account"
                    );
                    return Err(e);
                }
                self.metrics.deleted_total.inc();
            }
            tracing::info!(
                service = %req.slug,
                "skipping service account creation, no permission"
            );
            return Ok(0);
        }

        let account_id = match existing {
            Some(account_id) => account_id,
            None => {
                tracing::debug!(service = %req.slug, org_id = req.org_id, "create service account");
                let account = self
                    .accounts
                    .create(req.org_id, &name, Role::None, true)
                    .await?;
                account.id
            }
        };

        tracing::debug!(
            service = %req.slug,
            account_id,
            enabled = req.enabled,
            "set service account state"
        );
        self.accounts
            .set_enabled(req.org_id, account_id, req.enabled)
            .await?;

        tracing::debug!(service = %req.slug, account_id, "update role permissions");
        self.permissions
            .save_role(req.slug.as_str(), account_id, &req.permissions)
            .await?;

        self.metrics.saved_total.inc();
        Ok(account_id)
    }

    /// Tear down everything bound to an external service identity.
    ///
    /// Resolves the account by name; absence is a no-op. Gated calls are
    /// logged no-ops as well.
    pub async fn delete_external_service(
        &self,
        org_id: i64,
        slug: &ExtSvcSlug,
    ) -> Result<(), ExtSvcError> {
        if !self.gate_open() {
            tracing::warn!(
                "external service accounts are behind a capability flag, skipping delete"
            );
            return Ok(());
        }

        let existing = self
            .accounts
            .find_id_by_name(org_id, &slug.account_name())
            .await?;

        match existing {
            Some(account_id) => {
                self.delete_account(org_id, slug, account_id).await?;
                self.metrics.deleted_total.inc();
                Ok(())
            }
            None => {
                tracing::debug!(service = %slug, "no service account to delete");
                Ok(())
            }
        }
    }

    /// Delete the account, then its permission bundle, then its credential.
    ///
    /// The order is fixed: removing the account first means the identity is
    /// no longer resolvable even if a later step fails. The first failure
    /// aborts the remaining steps.
    async fn delete_account(
        &self,
        org_id: i64,
        slug: &ExtSvcSlug,
        account_id: i64,
    ) -> Result<(), ExtSvcError> {
        tracing::info!(service = %slug, org_id, account_id, "delete service account");
        self.accounts.delete(org_id, account_id).await?;
        self.permissions.delete_role(slug.as_str()).await?;
        self.delete_credentials(org_id, slug).await
    }

    /// Enable or disable the account bound to an external service.
    pub async fn enable_external_service(
        &self,
        org_id: i64,
        slug: &ExtSvcSlug,
        enabled: bool,
    ) -> Result<(), ExtSvcError> {
        if !self.gate_open() {
            tracing::warn!(
                "external service accounts are behind a capability flag, skipping enable"
            );
            return Ok(());
        }

        let account_id = self
            .accounts
            .find_id_by_name(org_id, &slug.account_name())
            .await?
            .ok_or_else(|| ExtSvcError::AccountNotFound {
                org_id,
                slug: slug.to_string(),
            })?;

        self.enable_account(org_id, account_id, enabled).await
    }

    /// Pure passthrough toggle to the account store.
    pub async fn enable_account(
        &self,
        org_id: i64,
        account_id: i64,
        enabled: bool,
    ) -> Result<(), ExtSvcError> {
        self.accounts
            .set_enabled(org_id, account_id, enabled)
            .await?;
        Ok(())
    }

    /// Fetch the account bound to an external service by id.
    pub async fn retrieve_account(
        &self,
        org_id: i64,
        account_id: i64,
    ) -> Result<Option<ServiceAccount>, ExtSvcError> {
        Ok(self.accounts.retrieve(org_id, account_id).await?)
    }

    /// Return the live credential for an identity, minting one on first use.
    ///
    /// Idempotent: once a secret has been issued it is returned as-is on
    /// every subsequent call, never regenerated. When minting, the hashed
    /// key is registered with the account store before the bearer form is
    /// persisted, so a failure in between leaves no queryable credential.
    pub async fn issue_or_get_credential(
        &self,
        org_id: i64,
        account_id: i64,
        slug: &ExtSvcSlug,
    ) -> Result<Secret, ExtSvcError> {
        tracing::debug!(service = %slug, org_id, "get service account token from store");
        if let Some(secret) = self
            .secrets
            .get(org_id, slug.as_str(), CREDENTIAL_KIND)
            .await?
        {
            return Ok(secret);
        }

        tracing::info!(service = %slug, org_id, "generate new service account token");
        let material = self.keygen.generate(slug.as_str())?;

        tracing::debug!(service = %slug, org_id, "add service account token");
        self.accounts
            .add_token(
                account_id,
                &format!("{TOKEN_NAME_PREFIX}-{slug}"),
                &material.hashed_key,
            )
            .await?;

        self.save_credentials(org_id, slug, &material.client_secret)
            .await?;

        Ok(material.client_secret)
    }

    /// Read the stored credential of an external service.
    ///
    /// Errors with [`ExtSvcError::CredentialsNotFound`] when none is stored.
    pub async fn get_credentials(
        &self,
        org_id: i64,
        slug: &ExtSvcSlug,
    ) -> Result<Credentials, ExtSvcError> {
        let secret = self
            .secrets
            .get(org_id, slug.as_str(), CREDENTIAL_KIND)
            .await?
            .ok_or_else(|| ExtSvcError::CredentialsNotFound {
                slug: slug.to_string(),
            })?;
        Ok(Credentials { secret })
    }

    /// Store the credential of an external service.
    pub async fn save_credentials(
        &self,
        org_id: i64,
        slug: &ExtSvcSlug,
        secret: &Secret,
    ) -> Result<(), ExtSvcError> {
        tracing::debug!(service = %slug, org_id, "save service account token in store");
        self.secrets
            .set(org_id, slug.as_str(), CREDENTIAL_KIND, secret)
            .await?;
        Ok(())
    }

    /// Remove the credential of an external service.
    pub async fn delete_credentials(
        &self,
        org_id: i64,
        slug: &ExtSvcSlug,
    ) -> Result<(), ExtSvcError> {
        tracing::debug!(service = %slug, org_id, "delete service account token from store");
        self.secrets
            .delete(org_id, slug.as_str(), CREDENTIAL_KIND)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EnablementListener for ExtSvcAccountManager {
    /// Toggle the bound account when an external service is enabled or
    /// disabled elsewhere.
    ///
    /// Permission-blind: only the enabled flag changes. An event for an
    /// identity that was never provisioned is a benign no-op.
    async fn state_changed(&self, event: &StateChangeEvent) -> Result<(), ExtSvcError> {
        tracing::info!(
            service = %event.service_id,
            enabled = event.enabled,
            "external service state changed"
        );

        let slug = ExtSvcSlug::new(&event.service_id);
        let existing = self
            .accounts
            .find_id_by_name(DEFAULT_ORG_ID, &slug.account_name())
            .await?;

        match existing {
            Some(account_id) => {
                self.enable_account(DEFAULT_ORG_ID, account_id, event.enabled)
                    .await
            }
            None => {
                tracing::debug!(service = %slug, "no service account for this external service");
                Ok(())
            }
        }
    }
}
