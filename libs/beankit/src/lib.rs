//! # BeanKit - Contextual Bean Core
//!
//! The resolution and lifecycle core of a contextual dependency-injection
//! container.
//!
//! ## Features
//!
//! - **Type closures**: every type a class satisfies, with generic type
//!   variables substituted through the class hierarchy
//! - **Producer beans**: create/destroy lifecycle with passivation checks
//! - **Deferred notifications**: observer delivery inside a request context
//!   that is activated and cleaned up around the call
//!
//! ## Resolving a type closure
//!
//! ```rust
//! use beankit::types::{ClassDef, ClassTable, HierarchyDiscovery, Type};
//!
//! let table = ClassTable::new()
//!     .with(ClassDef::class("Parent").type_param("P"))
//!     .with(
//!         ClassDef::class("Child")
//!             .type_param("T")
//!             .extends(Type::parameterized("Parent", [Type::var("Child", "T")])),
//!     )
//!     .with(
//!         ClassDef::class("Grandchild")
//!             .extends(Type::parameterized("Child", [Type::class("String")])),
//!     );
//!
//! let closure = HierarchyDiscovery::new(&table, Type::class("Grandchild"))
//!     .discover()
//!     .unwrap();
//! assert!(closure.contains(&Type::parameterized("Parent", [Type::class("String")])));
//! ```

pub use anyhow::Result;

pub mod bean;
pub mod event;
pub mod invoke;
pub mod types;

pub use bean::{
    BeanEnvironment, BeanError, CreationalContext, DeclaringBean, ManagedBean, Producer,
    ProducerBean, Scope, ScopeRegistry,
};
pub use event::{ContextRegistry, DeferredEventNotification, EventMetadata, ObserverMethod};
pub use invoke::{compute_instance_type, invoke, FnMethod, InvocationError, Method};
pub use types::{HierarchyDiscovery, RawClass, ResolverConfig, Type, TypeClosure};
