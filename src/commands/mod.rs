//! CLI subcommand implementations for helmsman.
//!
//! - [`client`] - send one request to the broker and report the response
//! - [`serve`] - run the broker until SIGINT/SIGTERM
//!
//! # Usage
//!
//! ```ignore
//! use helmsman::commands;
//!
//! let code = commands::client::run(&socket_path, &Request::Status, None).await;
//! std::process::exit(code);
//! ```

pub mod client;
pub mod serve;

#[doc(inline)]
pub use client::{EXIT_FAILED, EXIT_OK, EXIT_UNAVAILABLE};
