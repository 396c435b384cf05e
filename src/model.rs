//! Domain model types for external service accounts.
//!
//! This module defines the core types used throughout the crate:
//! - [`ExtSvcSlug`] - Normalized identifier for an external service
//! - [`ServiceAccount`] - The managed account bound to an external service
//! - [`Permission`] - A single action/scope grant
//! - [`SaveRequest`] / [`SaveExternalServiceRequest`] - Per-call commands
//! - [`ExternalService`] - Registration result handed back to the caller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::secrets::Secret;

/// Prefix of every managed service account name.
///
/// Account names are always `extsvc-{slug}`; callers never set them directly.
pub const ACCOUNT_NAME_PREFIX: &str = "extsvc-";

/// Normalized identifier for an external service.
///
/// Slugs are derived deterministically from a human-readable name: lowercased,
/// with every run of non-alphanumeric characters collapsed to a single `-` and
/// leading/trailing separators trimmed. The slug is the sole external key for
/// an identity; one slug maps to at most one service account.
///
/// # Examples
///
/// ```
/// use extsvc_accounts::ExtSvcSlug;
///
/// let slug = ExtSvcSlug::new("Acme App (beta)");
/// assert_eq!(slug.as_str(), "acme-app-beta");
/// assert_eq!(slug.account_name(), "extsvc-acme-app-beta");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtSvcSlug(String);

impl ExtSvcSlug {
    /// Derive a slug from a human-readable service name.
    pub fn new(name: impl AsRef<str>) -> Self {
        let mut slug = String::with_capacity(name.as_ref().len());
        let mut pending_sep = false;
        for c in name.as_ref().chars() {
            if c.is_ascii_alphanumeric() {
                if pending_sep && !slug.is_empty() {
                    slug.push('-');
                }
                pending_sep = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_sep = true;
            }
        }
        Self(slug)
    }

    /// Get the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the source name normalized down to nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derived name of the service account bound to this slug.
    pub fn account_name(&self) -> String {
        format!("{ACCOUNT_NAME_PREFIX}{}", self.0)
    }
}

impl fmt::Display for ExtSvcSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExtSvcSlug {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExtSvcSlug {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Basic role attached to a service account.
///
/// External service accounts always carry [`Role::None`]; their effective
/// access comes from the permission bundle saved alongside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    None,
    Viewer,
    Editor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

/// A managed service account.
///
/// `id` is assigned by the account store; an id of zero or below means the
/// account does not exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccount {
    /// Store-assigned identifier.
    pub id: i64,

    /// Organization the account is scoped to.
    pub org_id: i64,

    /// Derived name, `extsvc-{slug}`.
    pub name: String,

    /// Basic role; always [`Role::None`] for external service accounts.
    pub role: Role,

    /// Whether the account is currently disabled.
    pub disabled: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// A single action/scope grant in a permission bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// The action granted, e.g. `dashboards:read`.
    pub action: String,

    /// The scope the action applies to, e.g. `dashboards:*`.
    pub scope: String,
}

impl Permission {
    pub fn new(action: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            scope: scope.into(),
        }
    }
}

/// Command driving a single save of an external service account.
///
/// Constructed per call, never persisted. An empty permission list means
/// "no account should exist" and triggers full teardown.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Normalized external service identifier.
    pub slug: ExtSvcSlug,

    /// Organization scope.
    pub org_id: i64,

    /// Desired enablement state.
    pub enabled: bool,

    /// Target permission bundle; replaces any existing bundle wholesale.
    pub permissions: Vec<Permission>,
}

/// Top-level registration command, carrying the human-readable service name.
///
/// The slug is derived from `name` inside the manager.
#[derive(Debug, Clone)]
pub struct SaveExternalServiceRequest {
    /// Human-readable external service name.
    pub name: String,

    /// Organization scope.
    pub org_id: i64,

    /// Desired enablement state.
    pub enabled: bool,

    /// Target permission bundle.
    pub permissions: Vec<Permission>,
}

/// Registration result: the provisioned identity and its bearer secret.
#[derive(Debug, Clone)]
pub struct ExternalService {
    /// The human-readable name the service registered under.
    pub name: String,

    /// The derived slug identifying the service.
    pub id: ExtSvcSlug,

    /// The live API credential for the account.
    pub secret: Secret,
}

/// Stored credential material for an external service.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// The bearer secret proving the service's identity.
    pub secret: Secret,
}
