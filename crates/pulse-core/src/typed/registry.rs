//! TypedRegistry: handlers by task kind.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;
use crate::domain::{TaskKind, TaskType};

/// Handlers stored behind `DynHandler`, one per [`TaskKind`].
///
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<CalculateChurn, _>(handler)?;
/// let handler = registry.get(envelope.task_type());
/// ```
#[derive(Default, Clone)]
pub struct TypedRegistry {
    handlers: HashMap<TaskKind, Arc<dyn DynHandler>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task type '{0}' is already registered")]
    AlreadyRegistered(TaskKind),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&T::KIND) {
            return Err(RegistryError::AlreadyRegistered(T::KIND));
        }
        self.handlers
            .insert(T::KIND, Arc::new(TypedHandler::new(handler)));
        Ok(())
    }

    /// `None` for unregistered kinds and for unknown wire names.
    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn DynHandler>> {
        let kind = task_type.kind()?;
        self.handlers.get(&kind).cloned()
    }

    pub fn registered_kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<TaskKind> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
