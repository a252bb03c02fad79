//! Client shim: one request, one JSON line, one exit code.

use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};

use crate::error::ClientError;
use crate::protocol::{Request, Response};
use crate::socket::ControlClient;

/// The broker answered `ok: true`.
pub const EXIT_OK: i32 = 0;
/// The broker answered `ok: false`.
pub const EXIT_FAILED: i32 = 1;
/// No well-formed answer: transport, codec or local I/O failure.
pub const EXIT_UNAVAILABLE: i32 = 2;

/// Exit code for the outcome of an exchange.
pub fn exit_code(outcome: &Result<Response, ClientError>) -> i32 {
    match outcome {
        Ok(response) if response.ok => EXIT_OK,
        Ok(_) => EXIT_FAILED,
        Err(_) => EXIT_UNAVAILABLE,
    }
}

/// JSON rendering of a response for stdout.
///
/// The payload is shown as UTF-8 text when it decodes, otherwise as an empty
/// string; an absent payload is `null`.
pub fn render(response: &Response) -> Value {
    let payload = response
        .payload
        .as_deref()
        .map(|bytes| std::str::from_utf8(bytes).map(str::to_string).unwrap_or_default());
    json!({
        "ok": response.ok,
        "message": response.message,
        "payload": payload,
    })
}

/// Send `request` to the broker at `socket_path`, print the result and
/// return the process exit code.
///
/// With `out`, a payload is written to that file instead of being printed.
pub async fn run(socket_path: &Path, request: &Request, out: Option<&Path>) -> i32 {
    let outcome = ControlClient::new(socket_path).send(request).await;
    let mut response = match &outcome {
        Ok(response) => response.clone(),
        Err(e) => {
            log::debug!("Exchange failed: {e:?}");
            eprintln!("helmsman: {e}");
            return exit_code(&outcome);
        }
    };

    if let (Some(path), Some(payload)) = (out, response.payload.take()) {
        if let Err(e) = std::fs::write(path, &payload) {
            eprintln!("helmsman: failed to write {}: {e}", path.display());
            return EXIT_UNAVAILABLE;
        }
        if response.message.is_none() {
            response.message = Some(format!("wrote {} bytes to {}", payload.len(), path.display()));
        }
    }

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", render(&response)) {
        log::debug!("Failed to write to stdout: {e}");
    }
    exit_code(&outcome)
}
