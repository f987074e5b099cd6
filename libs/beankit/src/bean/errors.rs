use thiserror::Error;

use crate::types::ResolutionError;

use super::scope::Scope;

/// Invalid bean definition, reported once at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeploymentError {
    #[error("bean '{bean}' declares passivating scope '{scope}' but its type is final and not serializable")]
    PassivatingBeanNeedsSerializableImpl { bean: String, scope: Scope },
}

/// A producer returned an instance the container must not hand out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalProductError {
    #[error("producer {producer} returned no instance for a non-dependent bean")]
    NullNotAllowed { producer: String },
    #[error("producer {producer} returned an instance of non-serializable class '{class}' for passivating scope '{scope}'")]
    NonSerializableProduct {
        producer: String,
        class: String,
        scope: Scope,
    },
    #[error("bean '{bean}' produced non-serializable class '{class}' for non-transient field {injection_point} of a passivating bean")]
    NonSerializableFieldInjection {
        bean: String,
        class: String,
        injection_point: String,
    },
}

#[derive(Debug, Error)]
pub enum BeanError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error(transparent)]
    IllegalProduct(#[from] IllegalProductError),

    #[error("bean '{0}' is used before initialization")]
    NotInitialized(String),

    #[error("declaring bean of '{bean}' failed to initialize")]
    DeclaringBean {
        bean: String,
        #[source]
        source: Box<BeanError>,
    },

    #[error("producer of '{bean}' failed")]
    Produce {
        bean: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("disposal of a '{bean}' instance failed")]
    Dispose {
        bean: String,
        #[source]
        source: anyhow::Error,
    },
}
