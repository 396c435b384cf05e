//! Capability flag gate.
//!
//! The lifecycle manager is deployed behind capability flags; every mutating
//! entry point consults the gate first and becomes a logged no-op when the
//! capability is off. The flag evaluation engine itself lives outside this
//! crate; [`FeatureGate`] is the narrow contract injected into the manager,
//! and [`StaticFlags`] is a plain registry implementation for embedders and
//! tests.

use std::collections::HashMap;
use std::sync::RwLock;

/// Flag enabling managed accounts for external services.
pub const FLAG_EXTERNAL_SERVICE_ACCOUNTS: &str = "external-service-accounts";

/// Flag enabling the wider external service auth flow.
pub const FLAG_EXTERNAL_SERVICE_AUTH: &str = "external-service-auth";

/// Boolean capability check consulted before any mutating call.
pub trait FeatureGate: Send + Sync {
    /// Whether the named capability flag is on.
    ///
    /// Unknown flags are off.
    fn is_enabled(&self, flag: &str) -> bool;
}

/// Flag registry backed by a plain map.
///
/// # Examples
///
/// ```
/// use extsvc_accounts::features::{FeatureGate, StaticFlags, FLAG_EXTERNAL_SERVICE_ACCOUNTS};
///
/// let flags = StaticFlags::with_enabled([FLAG_EXTERNAL_SERVICE_ACCOUNTS]);
/// assert!(flags.is_enabled(FLAG_EXTERNAL_SERVICE_ACCOUNTS));
/// assert!(!flags.is_enabled("something-else"));
/// ```
#[derive(Default)]
pub struct StaticFlags {
    flags: RwLock<HashMap<String, bool>>,
}

impl StaticFlags {
    /// Create an empty registry; every flag evaluates to off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the given flags switched on.
    pub fn with_enabled<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flags = names.into_iter().map(|n| (n.into(), true)).collect();
        Self {
            flags: RwLock::new(flags),
        }
    }

    /// Set a flag's state, registering it if unknown.
    ///
    /// The most recently set state wins, matching merge semantics of flag
    /// registries that layer config sources.
    pub fn set(&self, name: impl Into<String>, enabled: bool) {
        if let Ok(mut flags) = self.flags.write() {
            flags.insert(name.into(), enabled);
        }
    }
}

impl FeatureGate for StaticFlags {
    fn is_enabled(&self, flag: &str) -> bool {
        self.flags
            .read()
            .map(|f| f.get(flag).copied().unwrap_or(false))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_flag_is_off() {
        let flags = StaticFlags::new();
        assert!(!flags.is_enabled(FLAG_EXTERNAL_SERVICE_ACCOUNTS));
    }

    #[test]
    fn test_with_enabled() {
        let flags = StaticFlags::with_enabled([FLAG_EXTERNAL_SERVICE_AUTH]);
        assert!(flags.is_enabled(FLAG_EXTERNAL_SERVICE_AUTH));
        assert!(!flags.is_enabled(FLAG_EXTERNAL_SERVICE_ACCOUNTS));
    }

    #[test]
    fn test_set_overrides() {
        let flags = StaticFlags::with_enabled([FLAG_EXTERNAL_SERVICE_ACCOUNTS]);
        flags.set(FLAG_EXTERNAL_SERVICE_ACCOUNTS, false);
        assert!(!flags.is_enabled(FLAG_EXTERNAL_SERVICE_ACCOUNTS));
    }
}
