//! Integration tests for the external service account lifecycle.
//!
//! These tests run the full provision/update/teardown cycle against the
//! in-memory collaborator implementations:
//! - Registering a service creates an account, bundle and credential
//! - Re-registering is idempotent and keeps the issued secret
//! - An empty permission list tears everything down
//! - Enablement events toggle the account without touching permissions

use std::sync::Arc;

use extsvc_accounts::{
    ApiKeyGenerator, DEFAULT_ORG_ID, EventBus, ExtSvcAccountManager, ExtSvcError, ExtSvcSlug,
    MemoryAccountStore, MemoryPermissionStore, MemorySecretsKv, Metrics, Permission,
    SaveExternalServiceRequest, SaveRequest, StateChangeEvent, StaticFlags,
    features::FLAG_EXTERNAL_SERVICE_ACCOUNTS,
};

struct Harness {
    accounts: Arc<MemoryAccountStore>,
    permissions: Arc<MemoryPermissionStore>,
    secrets: Arc<MemorySecretsKv>,
    bus: EventBus,
    manager: Arc<ExtSvcAccountManager>,
}

fn harness() -> Harness {
    let accounts = Arc::new(MemoryAccountStore::new());
    let permissions = Arc::new(MemoryPermissionStore::new());
    let secrets = Arc::new(MemorySecretsKv::new());
    let bus = EventBus::new();

    let manager = ExtSvcAccountManager::provide(
        accounts.clone(),
        permissions.clone(),
        secrets.clone(),
        Arc::new(ApiKeyGenerator::new()),
        Arc::new(StaticFlags::with_enabled([FLAG_EXTERNAL_SERVICE_ACCOUNTS])),
        &bus,
        Metrics::detached().unwrap(),
    );

    Harness {
        accounts,
        permissions,
        secrets,
        bus,
        manager,
    }
}

fn permissions() -> Vec<Permission> {
    vec![
        Permission::new("users:read", "users:*"),
        Permission::new("teams:read", "teams:*"),
    ]
}

#[tokio::test]
async fn test_provision_then_teardown() {
    let h = harness();

    // Provision: one enabled account named after the slug, holding the
    // requested bundle.
    let id = h
        .manager
        .save(SaveRequest {
            slug: ExtSvcSlug::new("acme"),
            org_id: DEFAULT_ORG_ID,
            enabled: true,
            permissions: permissions(),
        })
        .await
        .unwrap();

    assert_eq!(id, 1);
    let account = h
        .manager
        .retrieve_account(DEFAULT_ORG_ID, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.name, "extsvc-acme");
    assert!(!account.disabled);
    assert_eq!(h.permissions.permissions("acme"), Some(permissions()));

    // Teardown: saving with no permissions removes account, bundle and
    // credential.
    let id = h
        .manager
        .save(SaveRequest {
            slug: ExtSvcSlug::new("acme"),
            org_id: DEFAULT_ORG_ID,
            enabled: true,
            permissions: vec![],
        })
        .await
        .unwrap();

    assert_eq!(id, 0);
    assert!(h.accounts.is_empty());
    assert!(h.permissions.is_empty());
    assert!(h.secrets.is_empty());
}

#[tokio::test]
async fn test_registration_issues_a_stable_secret() {
    let h = harness();

    let request = SaveExternalServiceRequest {
        name: "Acme App".to_string(),
        org_id: DEFAULT_ORG_ID,
        enabled: true,
        permissions: permissions(),
    };

    let first = h
        .manager
        .save_external_service(request.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.name, "Acme App");
    assert_eq!(first.id.as_str(), "acme-app");

    // A second registration reuses the issued secret rather than rotating it.
    let second = h
        .manager
        .save_external_service(request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.secret, second.secret);

    // The read-only credential surface agrees.
    let stored = h
        .manager
        .get_credentials(DEFAULT_ORG_ID, &first.id)
        .await
        .unwrap();
    assert_eq!(stored.secret, first.secret);
}

#[tokio::test]
async fn test_teardown_removes_credentials() {
    let h = harness();

    let registered = h
        .manager
        .save_external_service(SaveExternalServiceRequest {
            name: "acme".to_string(),
            org_id: DEFAULT_ORG_ID,
            enabled: true,
            permissions: permissions(),
        })
        .await
        .unwrap()
        .unwrap();

    h.manager
        .delete_external_service(DEFAULT_ORG_ID, &registered.id)
        .await
        .unwrap();

    assert!(h.accounts.is_empty());
    assert!(h.permissions.is_empty());
    let result = h
        .manager
        .get_credentials(DEFAULT_ORG_ID, &registered.id)
        .await;
    assert!(matches!(
        result,
        Err(ExtSvcError::CredentialsNotFound { .. })
    ));
}

#[tokio::test]
async fn test_enablement_event_round_trip() {
    let h = harness();

    let id = h
        .manager
        .save(SaveRequest {
            slug: ExtSvcSlug::new("acme"),
            org_id: DEFAULT_ORG_ID,
            enabled: true,
            permissions: permissions(),
        })
        .await
        .unwrap();

    h.bus
        .publish(StateChangeEvent {
            service_id: "acme".to_string(),
            enabled: false,
        })
        .await;

    let account = h
        .manager
        .retrieve_account(DEFAULT_ORG_ID, id)
        .await
        .unwrap()
        .unwrap();
    assert!(account.disabled);
    assert_eq!(h.permissions.permissions("acme"), Some(permissions()));

    // Events for identities that were never provisioned are swallowed.
    h.bus
        .publish(StateChangeEvent {
            service_id: "not-a-service".to_string(),
            enabled: true,
        })
        .await;
    assert_eq!(h.accounts.len(), 1);
}

#[tokio::test]
async fn test_accounts_are_isolated_per_slug() {
    let h = harness();

    let first = h
        .manager
        .save_external_service(SaveExternalServiceRequest {
            name: "acme".to_string(),
            org_id: DEFAULT_ORG_ID,
            enabled: true,
            permissions: permissions(),
        })
        .await
        .unwrap()
        .unwrap();
    let second = h
        .manager
        .save_external_service(SaveExternalServiceRequest {
            name: "globex".to_string(),
            org_id: DEFAULT_ORG_ID,
            enabled: true,
            permissions: vec![Permission::new("dashboards:read", "dashboards:*")],
        })
        .await
        .unwrap()
        .unwrap();

    assert_ne!(first.secret, second.secret);
    assert_eq!(h.accounts.len(), 2);
    assert_eq!(h.permissions.len(), 2);

    // Tearing one down leaves the other untouched.
    h.manager
        .save(SaveRequest {
            slug: first.id.clone(),
            org_id: DEFAULT_ORG_ID,
            enabled: true,
            permissions: vec![],
        })
        .await
        .unwrap();

    assert_eq!(h.accounts.len(), 1);
    assert!(h.permissions.permissions("globex").is_some());
    assert!(
        h.manager
            .get_credentials(DEFAULT_ORG_ID, &second.id)
            .await
            .is_ok()
    );
}
