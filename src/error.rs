//! Error taxonomy for the wire protocol and the socket transport.
//!
//! Only failures that happen *outside* dispatch live here. Permission
//! denial, the pause gate and provider failures are ordinary
//! [`Response`](crate::protocol::Response)s with `ok: false`.

use std::path::PathBuf;

/// Failure to encode or decode a wire message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The bytes are not a valid message: bad JSON, unknown tag, missing field.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The message exceeds the size ceiling for its direction.
    #[error("malformed message: {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Observed size in bytes (a lower bound when reading was cut off).
        size: usize,
        /// Ceiling that was exceeded.
        limit: usize,
    },
}

impl ProtocolError {
    /// Every protocol error is a malformed-message failure; oversize included.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::TooLarge { .. })
    }
}

/// Failure to carry an exchange over the control socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint is missing or nobody is listening on it.
    #[error("broker unavailable at {}: {source}", path.display())]
    Unavailable {
        /// Socket path that was dialed.
        path: PathBuf,
        /// Underlying connect error.
        #[source]
        source: std::io::Error,
    },

    /// The socket path doesn't fit in `sun_path`.
    #[error("socket path too long ({len} bytes, max {max}): {}", path.display())]
    NameTooLong {
        /// Offending path.
        path: PathBuf,
        /// Its length in bytes.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// The peer closed the connection without sending a reply.
    #[error("connection reset: broker closed the connection without a reply")]
    ConnectionReset,

    /// Any other I/O failure during the exchange.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that can go wrong on the client side of an exchange.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting, writing or reading failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request couldn't be encoded or the reply couldn't be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
