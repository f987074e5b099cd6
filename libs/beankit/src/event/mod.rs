//! Deferred delivery of events to observers.

mod context;
mod metadata;
mod notification;

pub use context::{ContextRegistry, RequestContext, RequestContextRegistry, UnboundRequestContext};
pub use metadata::{CurrentEventMetadata, EventMetadata};
pub use notification::{
    DeferredEventNotification, MethodObserver, NotificationPhase, ObserverMethod,
};
