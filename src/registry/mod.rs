//! Concurrency-safe stores for session and task state
//!
//! Both registries are mutex-guarded maps shared by cloning. Locks are held
//! only for the duration of a single read or update and never across an
//! `.await`, so a session's event-driven update and a dispatcher's
//! read-check-send cycle always see whole records.

mod sessions;
mod tasks;

pub use sessions::{SessionLease, SessionRegistry};
pub use tasks::TaskRegistry;
