use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::invoke::{invoke, Method};

use super::context::{RequestContext, RequestContextRegistry};
use super::metadata::{CurrentEventMetadata, EventMetadata};

/// A method observing events of type `E`.
pub trait ObserverMethod<E>: Send + Sync {
    fn notify(&self, event: &E) -> anyhow::Result<()>;

    fn describe(&self) -> String;
}

/// When a deferred notification should be delivered relative to the
/// outcome of the enclosing unit of work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NotificationPhase {
    #[default]
    Any,
    Success,
    Failure,
}

impl NotificationPhase {
    pub fn matches(self, committed: bool) -> bool {
        match self {
            NotificationPhase::Any => true,
            NotificationPhase::Success => committed,
            NotificationPhase::Failure => !committed,
        }
    }
}

impl fmt::Display for NotificationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationPhase::Any => "any",
            NotificationPhase::Success => "success",
            NotificationPhase::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// Delivery of one event to one observer, executed later on some worker.
///
/// The observer runs inside the request context active for the activation
/// id, or inside a fresh unbound context that is invalidated and deactivated
/// afterwards. Observer failures never escape [`run`](Self::run).
pub struct DeferredEventNotification<E> {
    activation_id: String,
    event: E,
    metadata: Arc<EventMetadata>,
    observer: Arc<dyn ObserverMethod<E>>,
    current_event: CurrentEventMetadata,
    contexts: Arc<dyn RequestContextRegistry>,
    phase: NotificationPhase,
    before: bool,
}

impl<E> DeferredEventNotification<E> {
    pub fn new(
        activation_id: impl Into<String>,
        event: E,
        metadata: EventMetadata,
        observer: Arc<dyn ObserverMethod<E>>,
        current_event: CurrentEventMetadata,
        contexts: Arc<dyn RequestContextRegistry>,
    ) -> Self {
        Self {
            activation_id: activation_id.into(),
            event,
            metadata: Arc::new(metadata),
            observer,
            current_event,
            contexts,
            phase: NotificationPhase::Any,
            before: false,
        }
    }

    /// Deliver in `phase`, before completion when `before` is set.
    #[must_use]
    pub fn in_phase(mut self, phase: NotificationPhase, before: bool) -> Self {
        self.phase = phase;
        self.before = before;
        self
    }

    pub fn phase(&self) -> NotificationPhase {
        self.phase
    }

    pub fn is_before(&self) -> bool {
        self.before
    }

    pub fn activation_id(&self) -> &str {
        &self.activation_id
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Deliver the event. Observer errors and panics are logged, never returned.
    pub fn run(self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.deliver()));
        match outcome {
            Ok(Ok(())) => {
                tracing::trace!(
                    observer = %self.observer.describe(),
                    event = %self.metadata,
                    "deferred notification delivered"
                );
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    observer = %self.observer.describe(),
                    event = %self.metadata,
                    error = %err,
                    "Asynchronous observer failed"
                );
            }
            Err(payload) => {
                tracing::warn!(
                    observer = %self.observer.describe(),
                    event = %self.metadata,
                    panic = panic_message(payload.as_ref()),
                    "Asynchronous observer panicked"
                );
            }
        }
    }

    fn deliver(&self) -> anyhow::Result<()> {
        if self.contexts.find_active(&self.activation_id).is_some() {
            return self.notify_observer();
        }
        let ctx = self.contexts.create_unbound(&self.activation_id);
        let _active = ActivationGuard(ctx.clone());
        ctx.activate();
        self.notify_observer()
    }

    fn notify_observer(&self) -> anyhow::Result<()> {
        self.current_event.push(self.metadata.clone());
        let _pop = PopGuard(&self.current_event);
        self.observer.notify(&self.event)
    }
}

impl<E: Send + 'static> DeferredEventNotification<E> {
    /// Run on the blocking pool of `runtime`.
    pub fn spawn(self, runtime: &Handle) -> JoinHandle<()> {
        runtime.spawn_blocking(move || self.run())
    }
}

impl<E> fmt::Display for DeferredEventNotification<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deferred notification [event: {}, observer: {}, phase: {}, before: {}]",
            self.metadata,
            self.observer.describe(),
            self.phase,
            self.before
        )
    }
}

impl<E> fmt::Debug for DeferredEventNotification<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEventNotification")
            .field("activation_id", &self.activation_id)
            .field("metadata", &self.metadata)
            .field("observer", &self.observer.describe())
            .field("phase", &self.phase)
            .field("before", &self.before)
            .finish_non_exhaustive()
    }
}

struct ActivationGuard(Arc<dyn RequestContext>);

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        self.0.invalidate();
        self.0.deactivate();
    }
}

struct PopGuard<'a>(&'a CurrentEventMetadata);

impl Drop for PopGuard<'_> {
    fn drop(&mut self) {
        self.0.pop();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// [`ObserverMethod`] backed by a method handle on an observer bean instance.
///
/// The method receives its own copy of the event.
pub struct MethodObserver<B, E> {
    receiver: Arc<B>,
    method: Box<dyn Method<B, E, ()>>,
}

impl<B: Send + Sync, E: Clone> MethodObserver<B, E> {
    pub fn new(receiver: Arc<B>, method: impl Method<B, E, ()> + 'static) -> Self {
        Self {
            receiver,
            method: Box::new(method),
        }
    }
}

impl<B: Send + Sync, E: Clone> ObserverMethod<E> for MethodObserver<B, E> {
    fn notify(&self, event: &E) -> anyhow::Result<()> {
        invoke(self.receiver.as_ref(), self.method.as_ref(), event.clone())
    }

    fn describe(&self) -> String {
        format!("observer method '{}'", self.method.name())
    }
}
