//! Handler traits.
//!
//! - `Handler<T>`: typed, one per payload type
//! - `DynHandler`: object-safe, takes raw bytes
//! - `TypedHandler<T, H>`: erases `T` so handlers fit one registry map

use std::marker::PhantomData;

use async_trait::async_trait;

use super::codec::PayloadCodec;
use super::task::Task;
use crate::domain::{TaskError, TaskKind};

#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T) -> Result<(), TaskError>;
}

#[async_trait]
pub trait DynHandler: Send + Sync {
    /// Decode `payload` and run. Decode errors are validation faults.
    async fn handle_dyn(&self, payload: &[u8]) -> Result<(), TaskError>;

    fn kind(&self) -> TaskKind;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, payload: &[u8]) -> Result<(), TaskError> {
        let task: T = PayloadCodec::decode(payload)?;
        self.handler.handle(task).await
    }

    fn kind(&self) -> TaskKind {
        T::KIND
    }
}

#[async_trait]
impl<T: Task, H: Handler<T> + ?Sized> Handler<T> for std::sync::Arc<H> {
    async fn handle(&self, task: T) -> Result<(), TaskError> {
        (**self).handle(task).await
    }
}
