//! PayloadCodec: typed payload <-> task bytes (JSON).

use super::task::Task;
use crate::domain::{TaskError, TaskKind};
use crate::queue::QueueError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("cannot encode {kind} payload: {message}")]
    Encode { kind: TaskKind, message: String },

    #[error("cannot decode {kind} payload: {message}")]
    Decode { kind: TaskKind, message: String },
}

/// A payload that does not decode can never succeed.
impl From<CodecError> for TaskError {
    fn from(err: CodecError) -> Self {
        TaskError::validation(err.to_string())
    }
}

impl From<CodecError> for QueueError {
    fn from(err: CodecError) -> Self {
        QueueError::Encode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec;

impl PayloadCodec {
    pub fn encode<T: Task>(task: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(task).map_err(|e| CodecError::Encode {
            kind: T::KIND,
            message: e.to_string(),
        })
    }

    pub fn decode<T: Task>(bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            kind: T::KIND,
            message: e.to_string(),
        })
    }
}
