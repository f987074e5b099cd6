use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::scope::Scope;

type Destroyer = Box<dyn FnOnce() + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Parameter,
}

/// Where a product is about to be injected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionPoint {
    /// Scope of the bean owning the member, `None` for non-bean targets.
    pub bean_scope: Option<Scope>,
    pub member: MemberKind,
    pub transient: bool,
    pub name: String,
}

impl InjectionPoint {
    pub fn field(name: impl Into<String>, bean_scope: Scope) -> Self {
        Self {
            bean_scope: Some(bean_scope),
            member: MemberKind::Field,
            transient: false,
            name: name.into(),
        }
    }

    pub fn parameter(name: impl Into<String>, bean_scope: Option<Scope>) -> Self {
        Self {
            bean_scope,
            member: MemberKind::Parameter,
            transient: false,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.member {
            MemberKind::Field => "field",
            MemberKind::Parameter => "parameter",
        };
        write!(f, "{kind} '{}'", self.name)
    }
}

struct Inner {
    id: Uuid,
    injection_point: Option<InjectionPoint>,
    dependents: Mutex<Vec<Destroyer>>,
    released: AtomicBool,
}

/// Handle for a single creation call.
///
/// Clones share state. Destroyers registered with [`push_dependent`] run
/// once, in reverse registration order, on the first [`release`].
///
/// [`push_dependent`]: CreationalContext::push_dependent
/// [`release`]: CreationalContext::release
#[derive(Clone)]
pub struct CreationalContext {
    inner: Arc<Inner>,
}

impl Default for CreationalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CreationalContext {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn for_injection_point(injection_point: InjectionPoint) -> Self {
        Self::build(Some(injection_point))
    }

    fn build(injection_point: Option<InjectionPoint>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                injection_point,
                dependents: Mutex::new(Vec::new()),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn injection_point(&self) -> Option<&InjectionPoint> {
        self.inner.injection_point.as_ref()
    }

    /// Register a dependent instance destroyer. After release it runs immediately.
    pub fn push_dependent(&self, destroy: impl FnOnce() + Send + 'static) {
        let mut dependents = self.inner.dependents.lock();
        if self.is_released() {
            drop(dependents);
            destroy();
            return;
        }
        dependents.push(Box::new(destroy));
    }

    pub fn dependents(&self) -> usize {
        self.inner.dependents.lock().len()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    pub fn release(&self) {
        // Flipped under the dependents lock, which `push_dependent` also holds.
        let dependents = {
            let mut guard = self.inner.dependents.lock();
            if self.inner.released.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *guard)
        };
        tracing::trace!(
            ctx = %self.inner.id,
            count = dependents.len(),
            "releasing creational context"
        );
        for destroy in dependents.into_iter().rev() {
            destroy();
        }
    }
}

impl fmt::Debug for CreationalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationalContext")
            .field("id", &self.inner.id)
            .field("injection_point", &self.inner.injection_point)
            .field("released", &self.is_released())
            .finish()
    }
}
