//! JSON codec for control messages.
//!
//! Each direction carries exactly one JSON document per connection, with no
//! length prefix: end-of-stream is the frame boundary (see
//! [`socket`](crate::socket)). The codec itself only has to bound the size
//! and turn serde failures into [`ProtocolError`].

use serde::{de::DeserializeOwned, Serialize};

use super::types::{Request, Response};
use crate::constants::{MAX_REQUEST_BYTES, MAX_RESPONSE_BYTES};
use crate::error::ProtocolError;

/// A message that can travel over the control socket.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Size ceiling for the encoded form.
    const MAX_BYTES: usize;
}

impl WireMessage for Request {
    const MAX_BYTES: usize = MAX_REQUEST_BYTES;
}

impl WireMessage for Response {
    const MAX_BYTES: usize = MAX_RESPONSE_BYTES;
}

/// Encode a message into its wire form.
///
/// # Errors
///
/// Returns [`ProtocolError::TooLarge`] if the encoded message wouldn't be
/// accepted by the peer.
pub fn encode<T: WireMessage>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let bytes =
        serde_json::to_vec(message).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if bytes.len() > T::MAX_BYTES {
        return Err(ProtocolError::TooLarge {
            size: bytes.len(),
            limit: T::MAX_BYTES,
        });
    }
    Ok(bytes)
}

/// Decode a message from its wire form.
///
/// The size ceiling is checked before any parsing happens.
pub fn decode<T: WireMessage>(bytes: &[u8]) -> Result<T, ProtocolError> {
    if bytes.len() > T::MAX_BYTES {
        return Err(ProtocolError::TooLarge {
            size: bytes.len(),
            limit: T::MAX_BYTES,
        });
    }
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
