//! Enablement state-change events.
//!
//! External services can be enabled or disabled outside this crate (for
//! example by a plugin management flow). The lifecycle manager learns about
//! those transitions through an injected [`EventSource`]: it registers a
//! typed [`EnablementListener`] at construction time and reacts by toggling
//! the bound account's enabled flag, never its permissions.
//!
//! [`EventBus`] is an in-process implementation with at-least-once delivery:
//! every registered listener sees every published event, and a failing
//! listener is logged without stopping delivery to the others.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::error::ExtSvcError;

/// Notification that an external service was enabled or disabled.
#[derive(Debug, Clone)]
pub struct StateChangeEvent {
    /// Identifier of the external service, slugified by the listener.
    pub service_id: String,

    /// The new enablement state.
    pub enabled: bool,
}

/// Handler for [`StateChangeEvent`] deliveries.
#[async_trait]
pub trait EnablementListener: Send + Sync {
    /// React to a state change.
    ///
    /// The returned result is consumed by the event source's delivery loop.
    async fn state_changed(&self, event: &StateChangeEvent) -> Result<(), ExtSvcError>;
}

/// Source of enablement events.
///
/// The manager registers one listener at construction, conditioned on the
/// feature gate being open.
pub trait EventSource: Send + Sync {
    /// Register a listener for subsequent events.
    fn add_listener(&self, listener: Arc<dyn EnablementListener>);
}

/// In-process event bus.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EnablementListener>>>,
}

impl EventBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every registered listener, in registration order.
    ///
    /// Listener failures are logged and do not abort delivery to the rest.
    pub async fn publish(&self, event: StateChangeEvent) {
        let listeners: Vec<_> = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(e) => {
                tracing::error!(error = %e, "event bus listener registry poisoned");
                return;
            }
        };

        for listener in listeners {
            if let Err(e) = listener.state_changed(&event).await {
                tracing::error!(
                    service = %event.service_id,
                    enabled = event.enabled,
                    error = %e,
                    "enablement listener failed"
                );
            }
        }
    }
}

impl EventSource for EventBus {
    fn add_listener(&self, listener: Arc<dyn EnablementListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EnablementListener for CountingListener {
        async fn state_changed(&self, _event: &StateChangeEvent) -> Result<(), ExtSvcError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingListener;

    #[async_trait]
    impl EnablementListener for FailingListener {
        async fn state_changed(&self, event: &StateChangeEvent) -> Result<(), ExtSvcError> {
            Err(ExtSvcError::AccountNotFound {
                org_id: 1,
                slug: event.service_id.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_all_listeners() {
        let bus = EventBus::new();
        let first = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
        });
        let second = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
        });
        bus.add_listener(first.clone());
        bus.add_listener(second.clone());

        bus.publish(StateChangeEvent {
            service_id: "acme".to_string(),
            enabled: true,
        })
        .await;

        assert_eq!(first.seen.load(Ordering::SeqCst), 1);
        assert_eq!(second.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_delivery() {
        let bus = EventBus::new();
        let counting = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
        });
        bus.add_listener(Arc::new(FailingListener));
        bus.add_listener(counting.clone());

        bus.publish(StateChangeEvent {
            service_id: "acme".to_string(),
            enabled: false,
        })
        .await;

        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
    }
}
