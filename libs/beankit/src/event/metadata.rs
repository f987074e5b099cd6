use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::types::Type;

/// Information about the event being delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventMetadata {
    pub event_type: Type,
    pub qualifiers: Vec<String>,
    pub fired_at: DateTime<Utc>,
}

impl EventMetadata {
    pub fn new(event_type: Type) -> Self {
        Self {
            event_type,
            qualifiers: Vec::new(),
            fired_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifiers.push(qualifier.into());
        self
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_type)?;
        for q in &self.qualifiers {
            write!(f, " @{q}")?;
        }
        Ok(())
    }
}

/// Per-thread stacks of the metadata of events being delivered.
#[derive(Clone, Debug, Default)]
pub struct CurrentEventMetadata {
    stacks: Arc<DashMap<ThreadId, Vec<Arc<EventMetadata>>>>,
}

impl CurrentEventMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, metadata: Arc<EventMetadata>) {
        self.stacks
            .entry(thread::current().id())
            .or_default()
            .push(metadata);
    }

    pub fn pop(&self) -> Option<Arc<EventMetadata>> {
        let id = thread::current().id();
        let popped = self.stacks.get_mut(&id)?.pop();
        self.stacks.remove_if(&id, |_, stack| stack.is_empty());
        popped
    }

    /// Metadata of the innermost event delivered on this thread.
    pub fn peek(&self) -> Option<Arc<EventMetadata>> {
        self.stacks
            .get(&thread::current().id())
            .and_then(|stack| stack.last().cloned())
    }

    pub fn depth(&self) -> usize {
        self.stacks
            .get(&thread::current().id())
            .map_or(0, |stack| stack.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_are_per_thread() {
        let current = CurrentEventMetadata::new();
        current.push(Arc::new(EventMetadata::new(Type::class("Started"))));
        current.push(Arc::new(EventMetadata::new(Type::class("Stopped"))));

        let other = current.clone();
        std::thread::spawn(move || assert_eq!(other.depth(), 0))
            .join()
            .unwrap();

        assert_eq!(current.depth(), 2);
        assert_eq!(current.pop().unwrap().event_type, Type::class("Stopped"));
        assert_eq!(current.peek().unwrap().event_type, Type::class("Started"));
        current.pop();
        assert!(current.pop().is_none());
        assert!(current.stacks.is_empty());
    }

    #[test]
    fn display_lists_qualifiers() {
        let meta = EventMetadata::new(Type::parameterized("List", [Type::class("String")]))
            .with_qualifier("Updated");
        assert_eq!(meta.to_string(), "List<String> @Updated");
    }
}
