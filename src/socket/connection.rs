//! Broker side of a single accepted connection.
//!
//! Read the request to EOF, dispatch it, write the response, close. Nothing
//! that happens here can reach the accept loop: every failure is either
//! answered on the connection or logged and dropped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use super::read_to_eof;
use crate::constants::MAX_REQUEST_BYTES;
use crate::dispatch::Dispatcher;
use crate::protocol::{codec, Request, Response};

/// Fallback reply when the real response can't be encoded.
const INTERNAL_ERROR_REPLY: &[u8] = br#"{"ok":false,"message":"internal error"}"#;

/// Serve one exchange on an accepted stream.
pub(crate) async fn serve_connection(conn_id: String, stream: UnixStream, dispatcher: Arc<Dispatcher>) {
    let (mut reader, mut writer) = stream.into_split();

    let bytes = match read_to_eof(&mut reader, MAX_REQUEST_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("[Control] Read error for {}: {e}", conn_id);
            return;
        }
    };

    let response = match codec::decode::<Request>(&bytes) {
        Ok(request) => {
            let kind = request.kind();
            log::debug!("[Control] {} -> {}", conn_id, kind);
            let response = run_dispatch(&conn_id, &dispatcher, request).await;
            log::info!(
                "[Control] {} {} ok={} message={:?}",
                conn_id,
                kind,
                response.ok,
                response.message
            );
            response
        }
        Err(e) => {
            log::warn!("[Control] Rejecting malformed request from {}: {e}", conn_id);
            Response::error(e.to_string())
        }
    };

    let encoded = codec::encode(&response).unwrap_or_else(|e| {
        log::error!("[Control] Failed to encode response for {}: {e}", conn_id);
        INTERNAL_ERROR_REPLY.to_vec()
    });

    // The client may already be gone; the dispatch has happened either way.
    if let Err(e) = writer.write_all(&encoded).await {
        log::debug!("[Control] Client {} went away before the reply: {e}", conn_id);
        return;
    }
    if let Err(e) = writer.shutdown().await {
        log::debug!("[Control] Shutdown error for {}: {e}", conn_id);
    }
}

/// Run the dispatcher, converting a provider panic into an error response.
async fn run_dispatch(conn_id: &str, dispatcher: &Dispatcher, request: Request) -> Response {
    match AssertUnwindSafe(dispatcher.dispatch(request))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(_) => {
            log::error!("[Control] Dispatch panicked for {}", conn_id);
            Response::error("internal error")
        }
    }
}
