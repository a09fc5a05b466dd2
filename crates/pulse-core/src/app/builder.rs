//! AppBuilder: wires handlers into an [`App`] and checks at startup that
//! every expected task kind has a handler.

use crate::domain::{TaskKind, TaskType};
use crate::typed::{DynHandler, Handler, RegistryError, Task, TypedRegistry};
use std::sync::Arc;

/// ```ignore
/// let app = AppBuilder::new()
///     .register::<CalculateChurn, _>(churn_handler)?
///     .expect_kinds(&TaskKind::ALL)
///     .build()?;
/// ```
pub struct AppBuilder {
    registry: TypedRegistry,
    expected: Option<Vec<TaskKind>>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<TaskKind>),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: TypedRegistry::new(),
            expected: None,
        }
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn expect_kinds(mut self, kinds: &[TaskKind]) -> Self {
        self.expected = Some(kinds.to_vec());
        self
    }

    /// Fails with [`BuildError::MissingTaskTypes`] if an expected kind has
    /// no handler.
    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected {
            let registered = self.registry.registered_kinds();
            let missing: Vec<TaskKind> = expected
                .iter()
                .filter(|k| !registered.contains(k))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing));
            }
        }
        Ok(App {
            registry: self.registry,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The handler set a worker pool dispatches to.
pub struct App {
    registry: TypedRegistry,
}

impl App {
    pub fn handler_for(&self, task_type: &TaskType) -> Option<Arc<dyn DynHandler>> {
        self.registry.get(task_type)
    }

    pub fn kinds(&self) -> Vec<TaskKind> {
        self.registry.registered_kinds()
    }
}
