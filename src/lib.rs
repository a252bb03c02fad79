//! helmsman - local control-plane broker.
//!
//! An unprivileged client asks a long-running broker, over a per-user Unix
//! socket, to perform a fixed set of sensitive operations: notifications,
//! permission checks, screen capture, command execution and relaying
//! messages to a remote agent.
//!
//! # Architecture
//!
//! ```text
//! commands::client ─► protocol::encode ─► socket::ControlClient
//!                                               │ one exchange
//!                                               ▼
//!                    socket::ControlServer ─► protocol::decode
//!                                               │
//!                                               ▼
//!                    dispatch::Dispatcher ─► providers (notify, shell, ...)
//! ```
//!
//! # Modules
//!
//! - [`protocol`] - request/response shapes and the JSON codec
//! - [`socket`] - one-shot Unix socket exchanges, client and server
//! - [`dispatch`] - pause gate and per-operation policy
//! - [`providers`] - capability provider traits and host implementations
//! - [`commands`] - client shim and the `serve` runtime
//! - [`config`] - configuration loading/saving

pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod providers;
pub mod socket;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{Dispatcher, PauseFlag, PauseState};
pub use error::{ClientError, ProtocolError, TransportError};
pub use protocol::{Capability, Request, Response};
pub use providers::Providers;
pub use socket::{ControlClient, ControlServer};
