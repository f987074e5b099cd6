use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::invoke::{compute_instance_type, invoke, Method};
use crate::types::{raw_type, HierarchyDiscovery, RawClass, Type, TypeClosure};

use super::creational::{CreationalContext, MemberKind};
use super::errors::{BeanError, DeploymentError, IllegalProductError};
use super::managed::DeclaringBean;
use super::scope::Scope;
use super::BeanEnvironment;

/// Creates and disposes of instances on behalf of a bean.
pub trait Producer<T>: Send + Sync {
    /// `Ok(None)` is a null product; only dependent beans may return it.
    fn produce(&self, ctx: &CreationalContext) -> anyhow::Result<Option<T>>;

    fn dispose(&self, instance: T, ctx: &CreationalContext) -> anyhow::Result<()>;

    fn describe(&self) -> String;
}

/// Concrete class of a produced value.
pub trait RuntimeClass {
    fn runtime_class(&self) -> RawClass;
}

impl<T: RuntimeClass + ?Sized> RuntimeClass for Arc<T> {
    fn runtime_class(&self) -> RawClass {
        (**self).runtime_class()
    }
}

impl<T: RuntimeClass + ?Sized> RuntimeClass for Box<T> {
    fn runtime_class(&self) -> RawClass {
        (**self).runtime_class()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassivationFlags {
    /// The declared type is not final, or is serializable.
    pub capable_bean: bool,
    /// The bean can be injected into a passivating bean.
    pub capable_dependency: bool,
}

/// Everything [`ProducerBean::initialize`] computes.
#[derive(Debug)]
pub struct ResolvedBean {
    closure: TypeClosure,
    instance_type: RawClass,
    flags: PassivationFlags,
    passivating: bool,
}

impl ResolvedBean {
    pub fn types(&self) -> &TypeClosure {
        &self.closure
    }

    pub fn instance_type(&self) -> &RawClass {
        &self.instance_type
    }

    pub fn flags(&self) -> PassivationFlags {
        self.flags
    }
}

/// A bean whose instances come from a [`Producer`] declared on another bean.
pub struct ProducerBean<T> {
    declaring: Arc<dyn DeclaringBean>,
    declared_type: Type,
    scope: Scope,
    producer: Box<dyn Producer<T>>,
    env: BeanEnvironment,
    resolved: Mutex<Option<Arc<ResolvedBean>>>,
}

impl<T: RuntimeClass> ProducerBean<T> {
    pub fn new(
        declaring: Arc<dyn DeclaringBean>,
        declared_type: Type,
        scope: Scope,
        producer: impl Producer<T> + 'static,
        env: BeanEnvironment,
    ) -> Self {
        Self {
            declaring,
            declared_type,
            scope,
            producer: Box::new(producer),
            env,
            resolved: Mutex::new(None),
        }
    }

    pub fn declared_type(&self) -> &Type {
        &self.declared_type
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn declaring_bean(&self) -> &Arc<dyn DeclaringBean> {
        &self.declaring
    }

    pub fn is_initialized(&self) -> bool {
        self.resolved.lock().is_some()
    }

    pub fn resolved(&self) -> Option<Arc<ResolvedBean>> {
        self.resolved.lock().clone()
    }

    pub fn flags(&self) -> Option<PassivationFlags> {
        self.resolved.lock().as_ref().map(|r| r.flags)
    }

    /// Type closure of the declared type; `None` until initialized.
    pub fn types(&self) -> Option<TypeClosure> {
        self.resolved.lock().as_ref().map(|r| r.closure.clone())
    }

    /// Class a client proxy of this bean would extend.
    pub fn instance_type(&self) -> Option<RawClass> {
        self.resolved.lock().as_ref().map(|r| r.instance_type.clone())
    }

    /// Initialize the declaring bean, resolve the type closure and derive the
    /// passivation flags.
    ///
    /// Calling it again after success is a no-op. A failure leaves the bean
    /// uninitialized.
    pub fn initialize(&self) -> Result<(), BeanError> {
        if self.is_initialized() {
            return Ok(());
        }

        // Outside the lock: the declaring bean may query this bean while it initializes.
        self.declaring
            .initialize()
            .map_err(|source| BeanError::DeclaringBean {
                bean: self.declared_type.to_string(),
                source: Box::new(source),
            })?;

        let mut slot = self.resolved.lock();
        if slot.is_some() {
            return Ok(());
        }

        let introspector = self.env.introspector.as_ref();
        let closure = HierarchyDiscovery::new(introspector, self.declared_type.clone())
            .with_config(self.env.resolver)
            .discover()?;

        let declared =
            raw_type(introspector, &self.declared_type).unwrap_or_else(RawClass::object);
        let capable_bean =
            !introspector.is_final(&declared) || introspector.is_serializable(&declared);
        let normal = self.env.scopes.is_normal_scope(&self.scope);
        let passivating = self.env.scopes.is_passivating_scope(&self.scope);
        let flags = PassivationFlags {
            capable_bean,
            capable_dependency: normal || (self.scope.is_dependent() && capable_bean),
        };

        if passivating && !capable_bean {
            let err = DeploymentError::PassivatingBeanNeedsSerializableImpl {
                bean: self.declared_type.to_string(),
                scope: self.scope.clone(),
            };
            tracing::error!(error = %err, "producer bean rejected");
            return Err(err.into());
        }

        let instance_type = compute_instance_type(&closure, introspector);
        tracing::debug!(
            bean = %self.declared_type,
            scope = %self.scope,
            types = closure.len(),
            passivation_capable = flags.capable_bean,
            "producer bean initialized"
        );
        *slot = Some(Arc::new(ResolvedBean {
            closure,
            instance_type,
            flags,
            passivating,
        }));
        Ok(())
    }

    /// Produce an instance and validate it for this bean's scope and the
    /// context's injection point.
    pub fn create(&self, ctx: &CreationalContext) -> Result<Option<T>, BeanError> {
        let resolved = self
            .resolved()
            .ok_or_else(|| BeanError::NotInitialized(self.declared_type.to_string()))?;
        let instance = self
            .producer
            .produce(ctx)
            .map_err(|source| BeanError::Produce {
                bean: self.declared_type.to_string(),
                source,
            })?;
        self.check_return_value(instance.as_ref(), ctx, &resolved)?;
        Ok(instance)
    }

    /// Dispose of an instance. The context is released afterwards when the
    /// declaring bean is dependent, whatever the disposal outcome.
    pub fn destroy(&self, instance: T, ctx: &CreationalContext) -> Result<(), BeanError> {
        let _release = ReleaseGuard {
            ctx,
            armed: self.declaring.is_dependent(),
        };
        self.producer
            .dispose(instance, ctx)
            .map_err(|source| BeanError::Dispose {
                bean: self.declared_type.to_string(),
                source,
            })
    }

    fn check_return_value(
        &self,
        instance: Option<&T>,
        ctx: &CreationalContext,
        resolved: &ResolvedBean,
    ) -> Result<(), IllegalProductError> {
        let Some(instance) = instance else {
            if self.scope.is_dependent() {
                return Ok(());
            }
            return Err(IllegalProductError::NullNotAllowed {
                producer: self.producer.describe(),
            });
        };

        if resolved.passivating {
            let class = instance.runtime_class();
            if !self.env.serialization.is_serializable(&class) {
                return Err(IllegalProductError::NonSerializableProduct {
                    producer: self.producer.describe(),
                    class: class.to_string(),
                    scope: self.scope.clone(),
                });
            }
        }

        if let Some(ip) = ctx.injection_point() {
            let into_passivating_bean = ip
                .bean_scope
                .as_ref()
                .is_some_and(|s| self.env.scopes.is_passivating_scope(s));
            if into_passivating_bean && ip.member == MemberKind::Field && !ip.transient {
                let class = instance.runtime_class();
                if !self.env.serialization.is_serializable(&class) {
                    return Err(IllegalProductError::NonSerializableFieldInjection {
                        bean: self.declared_type.to_string(),
                        class: class.to_string(),
                        injection_point: ip.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for ProducerBean<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerBean")
            .field("declared_type", &self.declared_type)
            .field("scope", &self.scope)
            .field("producer", &self.producer.describe())
            .field("initialized", &self.resolved.lock().is_some())
            .finish()
    }
}

struct ReleaseGuard<'a> {
    ctx: &'a CreationalContext,
    armed: bool,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.ctx.release();
        }
    }
}

/// [`Producer`] backed by a producer method and an optional disposer method
/// on the declaring bean's instance.
pub struct MethodProducer<B, T> {
    receiver: Arc<B>,
    producer: Box<dyn Method<B, (), Option<T>>>,
    disposer: Option<Box<dyn Method<B, T, ()>>>,
}

impl<B: Send + Sync, T> MethodProducer<B, T> {
    pub fn new(receiver: Arc<B>, producer: impl Method<B, (), Option<T>> + 'static) -> Self {
        Self {
            receiver,
            producer: Box::new(producer),
            disposer: None,
        }
    }

    #[must_use]
    pub fn with_disposer(mut self, disposer: impl Method<B, T, ()> + 'static) -> Self {
        self.disposer = Some(Box::new(disposer));
        self
    }
}

impl<B: Send + Sync, T> Producer<T> for MethodProducer<B, T> {
    fn produce(&self, _ctx: &CreationalContext) -> anyhow::Result<Option<T>> {
        invoke(self.receiver.as_ref(), self.producer.as_ref(), ())
    }

    fn dispose(&self, instance: T, _ctx: &CreationalContext) -> anyhow::Result<()> {
        match &self.disposer {
            Some(disposer) => invoke(self.receiver.as_ref(), disposer.as_ref(), instance),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        format!("producer method '{}'", self.producer.name())
    }
}
