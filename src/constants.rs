//! Application-wide constants for helmsman.
//!
//! This module centralizes the size ceilings, path limits and defaults shared
//! by the client and the broker. Constants are grouped by domain.
//!
//! # Categories
//!
//! - **Wire**: message size ceilings
//! - **Socket**: endpoint naming and limits
//! - **Dispatch**: fixed strings and defaults used when building responses
//! - **Shell**: subprocess output limits
//! - **Gateway**: remote agent defaults

use std::time::Duration;

/// The current version of helmsman, derived from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Wire
// ============================================================================

/// Maximum encoded request size (1 MiB).
///
/// The broker stops reading a connection once this many bytes have arrived
/// and answers it as malformed, so a runaway client cannot grow server memory.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Maximum encoded response size (64 MiB).
///
/// Screenshots of large displays are several megabytes once base64-encoded.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// Socket
// ============================================================================

/// Maximum socket path length in bytes.
///
/// `sun_path` is 104 bytes on macOS and 108 on Linux; the smaller limit is
/// used everywhere so a path that works on one platform works on both.
pub const MAX_SOCKET_PATH: usize = 104;

/// File name of the control socket inside the application data directory.
pub const SOCKET_FILE_NAME: &str = "control.sock";

/// Application directory name under the platform data/config directories.
pub const APP_DIR_NAME: &str = "helmsman";

/// Backoff after a failed `accept()` so a persistent error doesn't spin.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// ============================================================================
// Dispatch
// ============================================================================

/// Session key used for agent messages that don't name one.
pub const DEFAULT_AGENT_SESSION: &str = "main";

/// Image format requested by screenshot when none is given.
pub const DEFAULT_SCREENSHOT_FORMAT: &str = "png";

// ============================================================================
// Shell
// ============================================================================

/// Most stderr quoted in a failed command's message: the last 64 KiB.
pub const MAX_SHELL_STDERR_BYTES: usize = 64 * 1024;

/// Encoded bytes reserved for everything in a shell response but stdout.
///
/// Covers the message (quoted stderr can grow sixfold when JSON-escaped,
/// and a spawn or wait failure echoes the program name) plus the framing.
pub const SHELL_RESPONSE_OVERHEAD: usize = 2 * 1024 * 1024;

/// Most stdout kept per command.
///
/// Its base64 form plus [`SHELL_RESPONSE_OVERHEAD`] fits under
/// [`MAX_RESPONSE_BYTES`], so a shell response always encodes.
pub const MAX_SHELL_OUTPUT_BYTES: usize = (MAX_RESPONSE_BYTES - SHELL_RESPONSE_OVERHEAD) / 4 * 3;

/// How long to wait for output pipes to close once the child is gone.
pub const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

// ============================================================================
// Gateway
// ============================================================================

/// Default base URL of the agent gateway.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:18789";

/// Default request timeout for agent gateway calls.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);
