//! Request contexts and the registry that hands them out.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

pub trait RequestContext: Send + Sync {
    fn activate(&self);

    fn deactivate(&self);

    /// Mark every instance for destruction on the next deactivation.
    fn invalidate(&self);

    fn is_active(&self) -> bool;
}

/// Request contexts of a container, keyed by activation id.
pub trait RequestContextRegistry: Send + Sync {
    fn find_active(&self, activation_id: &str) -> Option<Arc<dyn RequestContext>>;

    fn create_unbound(&self, activation_id: &str) -> Arc<dyn RequestContext>;
}

type Destroyer = Box<dyn FnOnce() + Send>;

/// Request context owned by whoever created it, not bound to any thread.
pub struct UnboundRequestContext {
    id: String,
    active: AtomicBool,
    invalid: AtomicBool,
    activations: AtomicUsize,
    instances: Mutex<Vec<Destroyer>>,
}

impl UnboundRequestContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
            activations: AtomicUsize::new(0),
            instances: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::Acquire)
    }

    /// Track a contextual instance; `destroy` runs when an invalidated
    /// context is deactivated.
    pub fn put_instance(&self, destroy: impl FnOnce() + Send + 'static) {
        self.instances.lock().push(Box::new(destroy));
    }

    pub fn instances(&self) -> usize {
        self.instances.lock().len()
    }
}

impl RequestContext for UnboundRequestContext {
    fn activate(&self) {
        self.active.store(true, Ordering::Release);
        self.activations.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(context = %self.id, "request context activated");
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        if self.invalid.load(Ordering::Acquire) {
            let instances = std::mem::take(&mut *self.instances.lock());
            tracing::trace!(
                context = %self.id,
                destroyed = instances.len(),
                "request context destroyed"
            );
            for destroy in instances {
                destroy();
            }
        }
        tracing::trace!(context = %self.id, "request context deactivated");
    }

    fn invalidate(&self) {
        self.invalid.store(true, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl fmt::Debug for UnboundRequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundRequestContext")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}

/// In-memory [`RequestContextRegistry`].
#[derive(Default)]
pub struct ContextRegistry {
    contexts: DashMap<String, Vec<Arc<dyn RequestContext>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an externally managed context visible under `activation_id`.
    pub fn register(&self, activation_id: impl Into<String>, context: Arc<dyn RequestContext>) {
        self.contexts
            .entry(activation_id.into())
            .or_default()
            .push(context);
    }

    pub fn contexts(&self, activation_id: &str) -> usize {
        self.contexts.get(activation_id).map_or(0, |c| c.len())
    }
}

impl RequestContextRegistry for ContextRegistry {
    fn find_active(&self, activation_id: &str) -> Option<Arc<dyn RequestContext>> {
        self.contexts
            .get(activation_id)?
            .iter()
            .find(|c| c.is_active())
            .cloned()
    }

    fn create_unbound(&self, activation_id: &str) -> Arc<dyn RequestContext> {
        Arc::new(UnboundRequestContext::new(activation_id))
    }
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("activation_ids", &self.contexts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidated_context_destroys_instances_on_deactivate() {
        let ctx = UnboundRequestContext::new("c1");
        let destroyed = Arc::new(AtomicUsize::new(0));
        let d = destroyed.clone();
        ctx.put_instance(move || {
            d.fetch_add(1, Ordering::SeqCst);
        });

        ctx.activate();
        ctx.deactivate();
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);

        ctx.activate();
        ctx.invalidate();
        ctx.deactivate();
        assert!(!ctx.is_active());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(ctx.is_invalidated());
        assert_eq!(ctx.instances(), 0);
        assert_eq!(ctx.activations(), 2);
    }

    #[test]
    fn registry_finds_only_active_contexts() {
        let registry = ContextRegistry::new();
        let ctx = Arc::new(UnboundRequestContext::new("c1"));
        registry.register("c1", ctx.clone());
        assert!(registry.find_active("c1").is_none());

        ctx.activate();
        assert!(registry.find_active("c1").is_some());
        assert!(registry.find_active("c2").is_none());
        assert!(!registry.create_unbound("c2").is_active());
        assert_eq!(registry.contexts("c1"), 1);
        assert_eq!(registry.contexts("c2"), 0);
    }
}
