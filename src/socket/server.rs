//! Unix domain socket server for the broker endpoint.
//!
//! Listens on the control socket and spawns one task per accepted
//! connection, so a slow operation (a permission prompt, a long command)
//! never holds up the accept loop or other exchanges.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::connection::serve_connection;
use super::validate_socket_path;
use crate::constants::ACCEPT_ERROR_BACKOFF;
use crate::dispatch::Dispatcher;

/// The broker's control socket.
///
/// Binds a `UnixListener` and runs the accept loop on a tokio task until
/// [`ControlServer::shutdown`] is called.
#[derive(Debug)]
pub struct ControlServer {
    /// Path to the socket file (for cleanup).
    socket_path: PathBuf,
    /// Stops the accept loop.
    cancel: CancellationToken,
    /// Handle to the accept loop task.
    accept_handle: JoinHandle<()>,
}

impl ControlServer {
    /// Start the server at the given path.
    ///
    /// Validates the path length, removes any stale socket file, creates the
    /// parent directory, binds the listener, sets permissions to 0600, and
    /// spawns the accept loop. Must be called from inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is too long or the socket cannot be bound.
    pub fn start(socket_path: PathBuf, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        validate_socket_path(&socket_path)?;

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket dir: {}", parent.display()))?;
        }

        // Remove stale socket file (unconditional: avoids TOCTOU race with exists()+remove())
        match std::fs::remove_file(&socket_path) {
            Ok(()) => log::debug!("[Control] Removed stale socket {}", socket_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to remove stale socket: {}", socket_path.display())
                })
            }
        }

        let listener = std::os::unix::net::UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket: {}", socket_path.display()))?;

        // Owner-only: same-user isolation is the endpoint's only access control.
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&socket_path, perms)?;
        }

        listener.set_nonblocking(true)?;
        let listener = UnixListener::from_std(listener)?;

        log::info!("[Control] Listening on {}", socket_path.display());

        let cancel = CancellationToken::new();
        let accept_handle = tokio::spawn(Self::accept_loop(listener, dispatcher, cancel.clone()));

        Ok(Self {
            socket_path,
            cancel,
            accept_handle,
        })
    }

    /// Accept loop — runs as a tokio task.
    async fn accept_loop(listener: UnixListener, dispatcher: Arc<Dispatcher>, cancel: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                () = cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, _addr)) => {
                    let conn_id = generate_conn_id();
                    log::debug!("[Control] Accepted {}", conn_id);
                    tokio::spawn(serve_connection(conn_id, stream, Arc::clone(&dispatcher)));
                }
                Err(e) => {
                    log::error!("[Control] Accept error: {e}");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
        log::info!("[Control] Accept loop stopped");
    }

    /// Stop accepting and remove the socket file.
    ///
    /// Exchanges already in flight run to completion on their own tasks.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.accept_handle.await {
            log::warn!("[Control] Accept loop ended abnormally: {e}");
        }
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "[Control] Failed to remove socket {}: {e}",
                self.socket_path.display()
            ),
        }
    }

    /// Path to the socket file.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Generate a unique connection ID using a monotonic counter + random suffix.
fn generate_conn_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let rand: u16 = rand::random();
    format!("ctl:{seq:x}{rand:04x}")
}
