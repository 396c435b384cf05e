//! Metrics for lifecycle manager outcomes.

use prometheus::{IntCounter, Registry};

/// Counters tracking save/delete outcomes of the lifecycle manager.
#[derive(Clone)]
pub struct Metrics {
    /// Incremented on every successful save of an external service account.
    pub saved_total: IntCounter,

    /// Incremented on every successful teardown of an external service account.
    pub deleted_total: IntCounter,
}

impl Metrics {
    fn build() -> Result<Self, prometheus::Error> {
        Ok(Self {
            saved_total: IntCounter::new(
                "extsvc_accounts_saved_total",
                "Number of external service accounts saved",
            )?,
            deleted_total: IntCounter::new(
                "extsvc_accounts_deleted_total",
                "Number of external service accounts deleted",
            )?,
        })
    }

    /// Create the counters and register them with the given registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::build()?;
        registry.register(Box::new(metrics.saved_total.clone()))?;
        registry.register(Box::new(metrics.deleted_total.clone()))?;
        Ok(metrics)
    }

    /// Create the counters without registering them anywhere.
    ///
    /// Useful in tests and in embedders that do not scrape metrics.
    pub fn detached() -> Result<Self, prometheus::Error> {
        Self::build()
    }
}
