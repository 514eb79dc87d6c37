//! Type definitions shared across the relay
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `TaskId`, `PhoneNumber`)
//! - [`target`] - Dispatch recipients
//! - [`session`] - Session state machine
//! - [`task`] - Dispatch task state and snapshots
//! - [`groups`] - Group listing types
//! - [`options`] - Runtime configuration

pub mod groups;
pub mod identifiers;
pub mod options;
pub mod session;
pub mod target;
pub mod task;

pub use groups::{GroupFilter, GroupInfo, GroupSummary};
pub use identifiers::{PhoneNumber, SessionId, TaskId};
pub use options::{RelayOptions, RelayOptionsBuilder};
pub use session::{Session, SessionStatus, SessionTransition};
pub use target::{Target, TargetKind};
pub use task::{DispatchRequest, Task, TaskSnapshot, TaskStatus};
