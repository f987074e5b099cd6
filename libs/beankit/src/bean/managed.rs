use std::fmt;
use std::sync::OnceLock;

use crate::types::{HierarchyDiscovery, RawClass, Type, TypeClosure};

use super::errors::BeanError;
use super::scope::Scope;
use super::BeanEnvironment;

/// The bean that declares a producer.
pub trait DeclaringBean: Send + Sync {
    fn initialize(&self) -> Result<(), BeanError>;

    fn bean_class(&self) -> &RawClass;

    fn scope(&self) -> &Scope;

    fn is_dependent(&self) -> bool {
        self.scope().is_dependent()
    }
}

/// A bean backed directly by a class.
pub struct ManagedBean {
    class: RawClass,
    scope: Scope,
    env: BeanEnvironment,
    closure: OnceLock<TypeClosure>,
}

impl ManagedBean {
    pub fn new(class: RawClass, scope: Scope, env: BeanEnvironment) -> Self {
        Self {
            class,
            scope,
            env,
            closure: OnceLock::new(),
        }
    }

    /// Type closure, once initialized.
    pub fn types(&self) -> Option<&TypeClosure> {
        self.closure.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.closure.get().is_some()
    }
}

impl DeclaringBean for ManagedBean {
    fn initialize(&self) -> Result<(), BeanError> {
        if self.closure.get().is_some() {
            return Ok(());
        }
        let closure = HierarchyDiscovery::new(
            self.env.introspector.as_ref(),
            Type::Class(self.class.clone()),
        )
        .with_config(self.env.resolver)
        .discover()?;
        if self.closure.set(closure).is_ok() {
            tracing::debug!(bean = %self.class, scope = %self.scope, "managed bean initialized");
        }
        Ok(())
    }

    fn bean_class(&self) -> &RawClass {
        &self.class
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl fmt::Debug for ManagedBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedBean")
            .field("class", &self.class)
            .field("scope", &self.scope)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
