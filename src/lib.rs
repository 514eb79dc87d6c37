//! # Session Relay
//!
//! Keeps many concurrent, independently reconnecting connections to an
//! external messaging network (one per session, each bound to a phone-number
//! identity) and runs long-lived, cancellable bulk-send jobs over them at a
//! caller-chosen rate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use session_relay::transport::loopback::LoopbackClient;
//! use session_relay::{DispatchRequest, Relay, RelayOptions, Target};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let relay = Relay::with_file_credentials(Arc::new(LoopbackClient::new()), RelayOptions::default());
//!
//! let pairing = relay.pair("+91 98765 43210").await?;
//! let task_id = relay.submit(DispatchRequest {
//!     session_id: pairing.session_id,
//!     target: Target::individual("+1 555 0100"),
//!     messages: vec!["hello".into(), "world".into()],
//!     prefix: Some("VIP".into()),
//!     delay_seconds: 2.0,
//! })?;
//!
//! let snapshot = relay.dispatcher().wait(&task_id).await?;
//! log::info!("sent {}/{}", snapshot.sent_count, snapshot.total_messages);
//! relay.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`registry`]: `SessionRegistry` and `TaskRegistry`, the only shared mutable state
//! - [`supervisor`]: `ConnectionSupervisor`, connection lifecycle and fixed-interval reconnects
//! - [`dispatch`]: `MessageDispatcher`, one cooperative send loop per task
//! - [`keepalive`]: `KeepAliveScheduler`, periodic best-effort liveness signals
//! - [`transport`]: the `MessagingClient` trait the network client is adapted to
//! - [`credentials`]: persistence of credential updates
//! - [`relay`]: `Relay`, which wires everything together
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, RelayError>`](Result). Send
//! failures and connection losses are recovered inside the crate and only
//! logged; validation and lookup failures are returned to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod keepalive;
pub mod registry;
pub mod relay;
pub mod supervisor;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use credentials::{CredentialStore, FileCredentialStore};
pub use dispatch::{MessageDispatcher, compose_text, parse_message_lines};
pub use error::{RelayError, Result};
pub use keepalive::{KeepAliveReport, KeepAliveScheduler};
pub use registry::{SessionRegistry, TaskRegistry};
pub use relay::{Relay, ShutdownSummary};
pub use supervisor::{ConnectionSupervisor, PairingOutcome, ReconnectPolicy};
pub use transport::{ConnectionEvent, DisconnectReason, MessagingClient};

pub use types::groups::{GroupFilter, GroupInfo, GroupSummary};
pub use types::identifiers::{PhoneNumber, SessionId, TaskId};
pub use types::options::{RelayOptions, RelayOptionsBuilder};
pub use types::session::{Session, SessionStatus, SessionTransition};
pub use types::target::{Target, TargetKind};
pub use types::task::{DispatchRequest, Task, TaskSnapshot, TaskStatus};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
