//! Task trait: binds a payload type to its wire kind.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{Priority, TaskKind};

/// A payload type that can be enqueued and handled.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct CalculateChurn { user_id: i64, company_id: i64 }
///
/// impl Task for CalculateChurn {
///     const KIND: TaskKind = TaskKind::CalculateChurn;
/// }
/// ```
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: TaskKind;

    /// Class used when the producer does not pick one.
    const PRIORITY: Priority = Priority::Default;
}
