//! Producer-backed beans and their contextual lifecycle.

mod creational;
mod errors;
mod managed;
mod producer;
mod scope;
mod serialization;

use std::fmt;
use std::sync::Arc;

use crate::types::{ResolverConfig, TypeIntrospector};

pub use creational::{CreationalContext, InjectionPoint, MemberKind};
pub use errors::{BeanError, DeploymentError, IllegalProductError};
pub use managed::{DeclaringBean, ManagedBean};
pub use producer::{
    MethodProducer, PassivationFlags, Producer, ProducerBean, ResolvedBean, RuntimeClass,
};
pub use scope::{Scope, ScopeClassifier, ScopeKind, ScopeRegistry};
pub use serialization::SerializationCheckCache;

/// Collaborators shared by every bean of one container.
#[derive(Clone)]
pub struct BeanEnvironment {
    pub introspector: Arc<dyn TypeIntrospector>,
    pub scopes: Arc<dyn ScopeClassifier>,
    pub serialization: SerializationCheckCache,
    pub resolver: ResolverConfig,
}

impl BeanEnvironment {
    /// Builtin scopes, and a serialization cache answering from `introspector`.
    pub fn new(introspector: Arc<dyn TypeIntrospector>) -> Self {
        Self {
            serialization: SerializationCheckCache::from_introspector(introspector.clone()),
            introspector,
            scopes: Arc::new(ScopeRegistry::new()),
            resolver: ResolverConfig::default(),
        }
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Arc<dyn ScopeClassifier>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_serialization(mut self, serialization: SerializationCheckCache) -> Self {
        self.serialization = serialization;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }
}

impl fmt::Debug for BeanEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanEnvironment")
            .field("serialization", &self.serialization)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
