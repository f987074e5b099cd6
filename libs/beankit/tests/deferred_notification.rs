//! Deferred observer notification and request context handling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use beankit::event::{
    ContextRegistry, CurrentEventMetadata, DeferredEventNotification, EventMetadata,
    MethodObserver, NotificationPhase, ObserverMethod, RequestContext, RequestContextRegistry,
    UnboundRequestContext,
};
use beankit::invoke::FnMethod;
use beankit::types::Type;

#[derive(Clone, Debug)]
struct OrderPlaced {
    id: u32,
}

enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

/// Observer recording the events it saw and the metadata depth at the time.
struct Recording {
    behaviour: Behaviour,
    seen: Mutex<Vec<(u32, usize)>>,
    current: CurrentEventMetadata,
}

impl Recording {
    fn new(behaviour: Behaviour, current: &CurrentEventMetadata) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            seen: Mutex::new(Vec::new()),
            current: current.clone(),
        })
    }
}

impl ObserverMethod<OrderPlaced> for Recording {
    fn notify(&self, event: &OrderPlaced) -> Result<()> {
        self.seen.lock().push((event.id, self.current.depth()));
        match self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => Err(anyhow!("observer rejected order {}", event.id)),
            Behaviour::Panic => panic!("observer crashed on order {}", event.id),
        }
    }

    fn describe(&self) -> String {
        "Recording::on_order".to_owned()
    }
}

/// Registry that keeps every unbound context it hands out.
#[derive(Default)]
struct TrackingRegistry {
    inner: ContextRegistry,
    created: Mutex<Vec<Arc<UnboundRequestContext>>>,
}

impl RequestContextRegistry for TrackingRegistry {
    fn find_active(&self, activation_id: &str) -> Option<Arc<dyn RequestContext>> {
        self.inner.find_active(activation_id)
    }

    fn create_unbound(&self, activation_id: &str) -> Arc<dyn RequestContext> {
        let ctx = Arc::new(UnboundRequestContext::new(activation_id));
        self.created.lock().push(ctx.clone());
        ctx
    }
}

fn notification(
    observer: Arc<dyn ObserverMethod<OrderPlaced>>,
    current: &CurrentEventMetadata,
    contexts: Arc<dyn RequestContextRegistry>,
) -> DeferredEventNotification<OrderPlaced> {
    DeferredEventNotification::new(
        "ctx-1",
        OrderPlaced { id: 7 },
        EventMetadata::new(Type::class("OrderPlaced")).with_qualifier("Default"),
        observer,
        current.clone(),
        contexts,
    )
}

#[test]
fn observer_runs_inside_fresh_context_which_is_cleaned_up() {
    let current = CurrentEventMetadata::new();
    let observer = Recording::new(Behaviour::Succeed, &current);
    let registry = Arc::new(TrackingRegistry::default());

    notification(observer.clone(), &current, registry.clone()).run();

    assert_eq!(*observer.seen.lock(), vec![(7, 1)]);
    assert_eq!(current.depth(), 0);
    let created = registry.created.lock();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].activations(), 1);
    assert!(!created[0].is_active());
    assert!(created[0].is_invalidated());
}

#[test]
fn failing_observer_does_not_propagate_and_context_is_released() {
    let current = CurrentEventMetadata::new();
    let observer = Recording::new(Behaviour::Fail, &current);
    let registry = Arc::new(TrackingRegistry::default());

    notification(observer.clone(), &current, registry.clone()).run();

    assert_eq!(observer.seen.lock().len(), 1);
    assert_eq!(current.depth(), 0);
    let created = registry.created.lock();
    assert!(!created[0].is_active());
    assert!(created[0].is_invalidated());
}

#[test]
fn panicking_observer_is_contained() {
    let current = CurrentEventMetadata::new();
    let observer = Recording::new(Behaviour::Panic, &current);
    let registry = Arc::new(TrackingRegistry::default());

    notification(observer.clone(), &current, registry.clone()).run();

    assert_eq!(observer.seen.lock().len(), 1);
    assert_eq!(current.depth(), 0);
    let created = registry.created.lock();
    assert!(!created[0].is_active());
    assert!(created[0].is_invalidated());
}

#[test]
fn failing_observer_leaves_pre_existing_context_active() {
    let current = CurrentEventMetadata::new();
    let observer = Recording::new(Behaviour::Fail, &current);
    let registry = Arc::new(TrackingRegistry::default());
    let existing = Arc::new(UnboundRequestContext::new("ctx-1"));
    existing.activate();
    registry.inner.register("ctx-1", existing.clone());

    notification(observer.clone(), &current, registry.clone()).run();

    assert_eq!(observer.seen.lock().len(), 1);
    assert!(registry.created.lock().is_empty());
    assert!(existing.is_active());
    assert!(!existing.is_invalidated());
    assert_eq!(existing.activations(), 1);
}

#[test]
fn phase_and_display() {
    let current = CurrentEventMetadata::new();
    let observer = Recording::new(Behaviour::Succeed, &current);
    let task = notification(observer, &current, Arc::new(ContextRegistry::new()))
        .in_phase(NotificationPhase::Success, true);

    assert_eq!(task.phase(), NotificationPhase::Success);
    assert!(task.is_before());
    assert!(task.phase().matches(true));
    assert!(!task.phase().matches(false));
    assert!(NotificationPhase::Any.matches(false));
    assert_eq!(
        task.to_string(),
        "deferred notification [event: OrderPlaced @Default, observer: Recording::on_order, phase: success, before: true]"
    );
}

struct Ledger {
    entries: Mutex<Vec<u32>>,
}

#[test]
fn method_observer_receives_the_event() {
    let ledger = Arc::new(Ledger {
        entries: Mutex::new(Vec::new()),
    });
    let observer = Arc::new(MethodObserver::new(
        ledger.clone(),
        FnMethod::private("record", |ledger: &Ledger, event: OrderPlaced| {
            ledger.entries.lock().push(event.id);
            Ok(())
        }),
    ));
    assert_eq!(observer.describe(), "observer method 'record'");

    let current = CurrentEventMetadata::new();
    notification(observer, &current, Arc::new(ContextRegistry::new())).run();

    assert_eq!(*ledger.entries.lock(), vec![7]);
}

#[tokio::test]
async fn spawned_notifications_run_on_blocking_pool() {
    let current = CurrentEventMetadata::new();
    let registry = Arc::new(TrackingRegistry::default());
    let delivered = Arc::new(AtomicUsize::new(0));

    struct Counter(Arc<AtomicUsize>);
    impl ObserverMethod<OrderPlaced> for Counter {
        fn notify(&self, _event: &OrderPlaced) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("always fails"))
        }
        fn describe(&self) -> String {
            "Counter".to_owned()
        }
    }

    let observer: Arc<dyn ObserverMethod<OrderPlaced>> = Arc::new(Counter(delivered.clone()));
    let handle = tokio::runtime::Handle::current();
    let tasks: Vec<_> = (0..8)
        .map(|_| notification(observer.clone(), &current, registry.clone()).spawn(&handle))
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(delivered.load(Ordering::SeqCst), 8);
    let created = registry.created.lock();
    assert_eq!(created.len(), 8);
    assert!(created.iter().all(|c| !c.is_active() && c.is_invalidated()));
}

/// Context whose activation always panics.
#[derive(Default)]
struct BrokenContext {
    invalidated: AtomicUsize,
    deactivated: AtomicUsize,
}

impl RequestContext for BrokenContext {
    fn activate(&self) {
        panic!("context storage unavailable");
    }

    fn deactivate(&self) {
        self.deactivated.fetch_add(1, Ordering::SeqCst);
    }

    fn invalidate(&self) {
        self.invalidated.fetch_add(1, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        false
    }
}

struct BrokenRegistry(Arc<BrokenContext>);

impl RequestContextRegistry for BrokenRegistry {
    fn find_active(&self, _activation_id: &str) -> Option<Arc<dyn RequestContext>> {
        None
    }

    fn create_unbound(&self, _activation_id: &str) -> Arc<dyn RequestContext> {
        self.0.clone()
    }
}

#[test]
fn context_is_cleaned_up_when_activation_fails() {
    let current = CurrentEventMetadata::new();
    let observer = Recording::new(Behaviour::Succeed, &current);
    let ctx = Arc::new(BrokenContext::default());

    notification(observer.clone(), &current, Arc::new(BrokenRegistry(ctx.clone()))).run();

    assert!(observer.seen.lock().is_empty());
    assert_eq!(ctx.invalidated.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.deactivated.load(Ordering::SeqCst), 1);
    assert_eq!(current.depth(), 0);
}
