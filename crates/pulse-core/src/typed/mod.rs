//! Typed task API.
//!
//! Two layers:
//! - surface: `Task`, `Handler<T>`, concrete payloads (type-safe)
//! - inside: `DynHandler` (object-safe, type-erased)

pub mod codec;
pub mod handler;
pub mod payloads;
pub mod registry;
pub mod task;

pub use self::codec::{CodecError, PayloadCodec};
pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::payloads::{CalculateChurn, ProcessSurvey, SendNotification, SurveyInvitation};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::Task;
