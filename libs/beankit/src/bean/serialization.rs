use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{RawClass, TypeIntrospector};

type Check = Arc<dyn Fn(&RawClass) -> bool + Send + Sync>;

/// Memoized "is this runtime class serializable" answers.
///
/// The check runs at most once per class, even under contention.
#[derive(Clone)]
pub struct SerializationCheckCache {
    answers: Arc<DashMap<RawClass, bool>>,
    check: Check,
}

impl SerializationCheckCache {
    pub fn new(check: impl Fn(&RawClass) -> bool + Send + Sync + 'static) -> Self {
        Self {
            answers: Arc::new(DashMap::new()),
            check: Arc::new(check),
        }
    }

    pub fn from_introspector(introspector: Arc<dyn TypeIntrospector>) -> Self {
        Self::new(move |class| introspector.is_serializable(class))
    }

    pub fn is_serializable(&self, class: &RawClass) -> bool {
        if let Some(hit) = self.answers.get(class) {
            return *hit;
        }
        // The shard stays write-locked while the check runs.
        *self
            .answers
            .entry(class.clone())
            .or_insert_with(|| {
                let answer = (self.check)(class);
                tracing::trace!(class = %class, serializable = answer, "serialization check");
                answer
            })
            .value()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl fmt::Debug for SerializationCheckCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationCheckCache")
            .field("entries", &self.answers.len())
            .finish()
    }
}
