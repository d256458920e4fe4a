use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::error::CoreError;

/// Receives the raw body of an inbound webhook call.
pub trait InboundWebhook: Send + Sync {
    /// Returns how many events were dispatched.
    fn handle(&self, body: &[u8]) -> usize;
}

/// Webhook id → handler. At most one handler per id.
#[derive(Clone, Default)]
pub struct WebhookRegistry {
    bindings: Arc<DashMap<String, Arc<dyn InboundWebhook>>>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `id`. Fails if `id` is already bound.
    pub fn register(&self, id: &str, handler: Arc<dyn InboundWebhook>) -> Result<(), CoreError> {
        match self.bindings.entry(id.to_owned()) {
            Entry::Occupied(_) => Err(CoreError::WebhookInUse { id: id.to_owned() }),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                debug!(webhook_id = id, "webhook bound");
                Ok(())
            }
        }
    }

    /// Returns `true` if a binding was removed.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.bindings.remove(id).is_some();
        if removed {
            debug!(webhook_id = id, "webhook unbound");
        }
        removed
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Hand `body` to the handler bound to `id`. `None` if unbound.
    pub fn dispatch(&self, id: &str, body: &[u8]) -> Option<usize> {
        let handler = self.bindings.get(id).map(|h| Arc::clone(h.value()))?;
        Some(handler.handle(body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl InboundWebhook for Counting {
        fn handle(&self, _body: &[u8]) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst);
            1
        }
    }

    #[test]
    fn second_binding_for_same_id_is_rejected() {
        let registry = WebhookRegistry::new();
        registry.register("hook", Arc::new(Counting::default())).unwrap();
        let err = registry
            .register("hook", Arc::new(Counting::default()))
            .unwrap_err();
        assert!(matches!(err, CoreError::WebhookInUse { .. }));
    }

    #[test]
    fn unbind_then_bind_delivers_once() {
        let registry = WebhookRegistry::new();
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        registry.register("hook", first.clone()).unwrap();
        assert!(registry.unregister("hook"));
        registry.register("hook", second.clone()).unwrap();

        assert_eq!(registry.dispatch("hook", b""), Some(1));
        assert_eq!(first.0.load(Ordering::SeqCst), 0);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
        assert_eq!(registry.dispatch("other", b""), None);
    }
}
