//! Method-handle dispatch shared by producers and observers.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::types::{RawClass, TypeClosure, TypeInfo, TypeIntrospector};

#[derive(Debug, Error)]
pub enum InvocationError {
    /// The target method itself failed.
    #[error("method '{method}' failed")]
    Target {
        method: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("method '{0}' is not accessible")]
    Inaccessible(String),
}

/// A callable member of `T` taking `A` and returning `R`.
pub trait Method<T: ?Sized, A, R>: Send + Sync {
    fn name(&self) -> &str;

    fn is_accessible(&self) -> bool;

    fn set_accessible(&self, accessible: bool);

    fn call(&self, target: &T, args: A) -> Result<R, InvocationError>;
}

/// Call `method` on `target`, lifting visibility first.
///
/// Failures of the method itself are returned as their original cause.
pub fn invoke<T, A, R, M>(target: &T, method: &M, args: A) -> anyhow::Result<R>
where
    T: ?Sized,
    M: Method<T, A, R> + ?Sized,
{
    if !method.is_accessible() {
        tracing::trace!(method = method.name(), "making method accessible");
        method.set_accessible(true);
    }
    match method.call(target, args) {
        Ok(value) => Ok(value),
        Err(InvocationError::Target { source, .. }) => Err(source),
        Err(e) => Err(e.into()),
    }
}

/// Base class for a proxy of an instance with the given type closure.
///
/// The most specific class other than the root object class; else the first
/// interface; else the root object class.
pub fn compute_instance_type(
    closure: &TypeClosure,
    introspector: &dyn TypeIntrospector,
) -> RawClass {
    let info = TypeInfo::of(introspector, closure.iter());
    let class = info.super_class();
    if !class.is_object() {
        return class;
    }
    info.super_interface().cloned().unwrap_or(class)
}

/// [`Method`] backed by a closure.
pub struct FnMethod<T: ?Sized, A, R, F> {
    name: String,
    accessible: AtomicBool,
    f: F,
    _marker: PhantomData<fn(&T, A) -> R>,
}

impl<T, A, R, F> FnMethod<T, A, R, F>
where
    T: ?Sized,
    F: Fn(&T, A) -> anyhow::Result<R> + Send + Sync,
{
    /// Publicly accessible method.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self::build(name.into(), true, f)
    }

    /// Method that must be made accessible before it can be called.
    pub fn private(name: impl Into<String>, f: F) -> Self {
        Self::build(name.into(), false, f)
    }

    fn build(name: String, accessible: bool, f: F) -> Self {
        Self {
            name,
            accessible: AtomicBool::new(accessible),
            f,
            _marker: PhantomData,
        }
    }
}

impl<T, A, R, F> Method<T, A, R> for FnMethod<T, A, R, F>
where
    T: ?Sized,
    F: Fn(&T, A) -> anyhow::Result<R> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    fn set_accessible(&self, accessible: bool) {
        self.accessible.store(accessible, Ordering::Release);
    }

    fn call(&self, target: &T, args: A) -> Result<R, InvocationError> {
        if !self.is_accessible() {
            return Err(InvocationError::Inaccessible(self.name.clone()));
        }
        (self.f)(target, args).map_err(|source| InvocationError::Target {
            method: self.name.clone(),
            source,
        })
    }
}

impl<T: ?Sized, A, R, F> fmt::Debug for FnMethod<T, A, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMethod")
            .field("name", &self.name)
            .field("accessible", &self.accessible.load(Ordering::Relaxed))
            .finish()
    }
}
