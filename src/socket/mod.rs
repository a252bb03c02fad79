//! Unix domain socket transport for client↔broker exchanges.
//!
//! Every connection carries exactly one exchange. There is no length prefix:
//! end-of-stream is the only framing signal.
//!
//! # Architecture
//!
//! ```text
//! Client Process (helmsman notify)        Broker Process (helmsman serve)
//! ┌──────────────────┐                    ┌──────────────────┐
//! │ ControlClient    │  1. request bytes  │ ControlServer    │
//! │  UnixStream      │───────────────────►│  UnixListener    │
//! │                  │  2. shutdown(Write)│  one task per    │
//! │                  │───────────────────►│  connection      │
//! │                  │  3. response bytes │                  │
//! │                  │◄───────────────────│  4. close        │
//! └──────────────────┘                    └────────┬─────────┘
//!                                                  │ Request
//!                                                  ▼
//!                                              Dispatcher
//! ```
//!
//! The endpoint is created owner-only (0600), which is the only access
//! control: same-user isolation.

pub mod client;
pub mod connection;
pub mod server;

pub use client::ControlClient;
pub use server::ControlServer;

use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::MAX_SOCKET_PATH;
use crate::error::TransportError;

/// Reject socket paths that don't fit in `sun_path`.
///
/// Checked before any syscall so the failure is reported as
/// [`TransportError::NameTooLong`] instead of an opaque `EINVAL`.
pub fn validate_socket_path(path: &Path) -> Result<(), TransportError> {
    let len = path.as_os_str().len();
    if len >= MAX_SOCKET_PATH {
        return Err(TransportError::NameTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_SOCKET_PATH - 1,
        });
    }
    Ok(())
}

/// Read until the peer half-closes, keeping at most `limit + 1` bytes.
///
/// Stopping one byte past the limit lets the codec report the message as
/// oversize without buffering the rest of it.
pub(crate) async fn read_to_eof<R>(reader: R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut buf = Vec::new();
    reader.take(cap).read_to_end(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_short_path_is_accepted() {
        assert!(validate_socket_path(Path::new("/tmp/helmsman/control.sock")).is_ok());
    }

    #[test]
    fn test_long_path_is_name_too_long() {
        let path = PathBuf::from("/tmp").join("a".repeat(200)).join("control.sock");
        match validate_socket_path(&path) {
            Err(TransportError::NameTooLong { len, max, .. }) => {
                assert_eq!(len, path.as_os_str().len());
                assert_eq!(max, MAX_SOCKET_PATH - 1);
            }
            other => panic!("Expected NameTooLong, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_to_eof_stops_one_byte_past_limit() {
        let data = vec![7u8; 100];
        let read = read_to_eof(data.as_slice(), 10).await.unwrap();
        assert_eq!(read.len(), 11);

        let read = read_to_eof(data.as_slice(), 1000).await.unwrap();
        assert_eq!(read, data);
    }
}
