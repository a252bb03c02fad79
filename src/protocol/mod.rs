//! Wire protocol for the control socket.
//!
//! A closed set of [`Request`] variants and a single [`Response`] shape,
//! both carried as one JSON document per direction per connection.
//!
//! ```text
//! client ──── {"type":"screenshot","displayID":1} ────► broker
//! client ◄──── {"ok":true,"payload":"iVBORw0KGgo..."} ──── broker
//! ```
//!
//! See [`codec`] for encoding rules and size ceilings.

pub mod codec;
pub mod types;

pub use codec::{decode, encode, WireMessage};
pub use types::{Capability, Delivery, Priority, Request, Response, Thinking};
