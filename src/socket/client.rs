//! Client side of a one-shot exchange.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use super::{read_to_eof, validate_socket_path};
use crate::constants::MAX_RESPONSE_BYTES;
use crate::error::{ClientError, TransportError};
use crate::protocol::{codec, Request, Response};

/// Sends requests to a running broker.
///
/// Each call to [`ControlClient::send`] opens a fresh connection.
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    /// Create a client for the broker listening at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Path of the broker endpoint.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Encode `request`, perform the exchange and decode the reply.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let bytes = codec::encode(request)?;
        log::debug!(
            "[Control] Sending {} ({} bytes) to {}",
            request.kind(),
            bytes.len(),
            self.socket_path.display()
        );
        let reply = self.exchange(&bytes).await?;
        Ok(codec::decode(&reply)?)
    }

    /// Perform one raw exchange: write, half-close, read to EOF.
    ///
    /// # Errors
    ///
    /// - [`TransportError::NameTooLong`] if the path can't be a socket address
    /// - [`TransportError::Unavailable`] if nothing is listening
    /// - [`TransportError::ConnectionReset`] if the broker closed without replying
    pub async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        validate_socket_path(&self.socket_path)?;

        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound | ErrorKind::ConnectionRefused => TransportError::Unavailable {
                    path: self.socket_path.clone(),
                    source,
                },
                _ => TransportError::Io(source),
            })?;

        stream.write_all(request).await.map_err(reset_or_io)?;
        // Half-close: the broker reads until EOF, we keep our read side open.
        stream.shutdown().await.map_err(reset_or_io)?;

        let reply = read_to_eof(&mut stream, MAX_RESPONSE_BYTES)
            .await
            .map_err(reset_or_io)?;
        if reply.is_empty() {
            return Err(TransportError::ConnectionReset);
        }
        Ok(reply)
    }
}

fn reset_or_io(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => TransportError::ConnectionReset,
        _ => TransportError::Io(e),
    }
}
