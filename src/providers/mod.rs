//! Capability providers: the privileged operations the broker delegates to.
//!
//! The dispatcher only sees these traits. The host implementations in the
//! submodules drive platform tools (`osascript`, `screencapture`,
//! `notify-send`, `grim`), the agent gateway over HTTP, and subprocesses.
//!
//! - [`shell`] - argv execution with timeout and process-group kill
//! - [`notify`] - system notifications and the stderr overlay
//! - [`capture`] - screen capture via platform tools
//! - [`permissions`] - configured permission table
//! - [`gateway`] - remote agent over HTTP

pub mod capture;
pub mod gateway;
pub mod notify;
pub mod permissions;
pub mod shell;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::protocol::{Capability, Priority, Response, Thinking};

/// Posts notifications through the OS notification center.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Returns `true` if the notification was authorized and delivered.
    async fn send(&self, title: &str, body: &str, sound: Option<&str>, priority: Option<Priority>) -> bool;
}

/// Shows a transient notification without involving the OS.
#[async_trait]
pub trait OverlayPresenter: Send + Sync {
    /// Present the overlay. Infallible.
    async fn present(&self, title: &str, body: &str);
}

/// Checks (and, when interactive, requests) capabilities.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Status of each requested capability. Omitted entries count as missing.
    async fn ensure(&self, caps: &[Capability], interactive: bool) -> HashMap<Capability, bool>;
}

/// Acquires screen pixels.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Encoded image bytes, or `None` if capture failed.
    async fn capture(&self, display_id: Option<u32>, window_id: Option<u32>) -> Option<Vec<u8>>;
}

/// Runs commands on behalf of the client.
///
/// The provider owns timeout enforcement: on expiry it must terminate the
/// subprocess and return a failure.
#[async_trait]
pub trait ShellProvider: Send + Sync {
    /// Run `command` (argv) and describe the outcome.
    async fn run(
        &self,
        command: &[String],
        cwd: Option<&str>,
        env: Option<&BTreeMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Response;
}

/// A message addressed to the remote agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMessage {
    /// Trimmed, non-empty message text.
    pub text: String,
    /// Reasoning effort.
    pub thinking: Option<Thinking>,
    /// Session the message belongs to.
    pub session_key: String,
    /// Deliver the agent's reply to `to`.
    pub deliver: bool,
    /// Recipient for delivered replies.
    pub to: Option<String>,
}

/// Outcome of [`RemoteAgent::send`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentReply {
    /// Whether the agent accepted the message.
    pub ok: bool,
    /// Agent's reply text.
    pub text: Option<String>,
    /// Failure description.
    pub error: Option<String>,
}

/// Outcome of [`RemoteAgent::status`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentStatus {
    /// Whether the agent backend is reachable and healthy.
    pub ok: bool,
    /// Failure description.
    pub error: Option<String>,
}

/// The external agent messaging backend.
#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Relay a message.
    async fn send(&self, message: AgentMessage) -> AgentReply;
    /// Probe backend health.
    async fn status(&self) -> AgentStatus;
}

/// The full set of providers a [`Dispatcher`](crate::dispatch::Dispatcher) delegates to.
#[derive(Clone)]
pub struct Providers {
    /// System notification center.
    pub notifications: Arc<dyn NotificationProvider>,
    /// In-process overlay.
    pub overlay: Arc<dyn OverlayPresenter>,
    /// Permission table / prompts.
    pub permissions: Arc<dyn PermissionProvider>,
    /// Screen capture.
    pub capture: Arc<dyn CaptureProvider>,
    /// Command execution.
    pub shell: Arc<dyn ShellProvider>,
    /// Remote agent backend.
    pub agent: Arc<dyn RemoteAgent>,
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

impl Providers {
    /// Host providers configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway HTTP client can't be built.
    pub fn host(config: &Config) -> Result<Self> {
        Ok(Self {
            notifications: Arc::new(notify::SystemNotifier::new()),
            overlay: Arc::new(notify::StderrOverlay),
            permissions: Arc::new(permissions::ConfiguredPermissions::new(
                config.denied_capabilities.iter().copied(),
            )),
            capture: Arc::new(capture::ScreenCapture::new()),
            shell: Arc::new(shell::ShellRunner),
            agent: Arc::new(gateway::GatewayClient::new(
                &config.gateway_url,
                config.gateway_timeout(),
            )?),
        })
    }

    /// Providers that refuse everything except the overlay.
    ///
    /// Permissions are all denied, capture and notifications fail, commands
    /// are not run and the agent backend is unreachable.
    pub fn unavailable() -> Self {
        Self {
            notifications: Arc::new(Unavailable),
            overlay: Arc::new(notify::StderrOverlay),
            permissions: Arc::new(Unavailable),
            capture: Arc::new(Unavailable),
            shell: Arc::new(Unavailable),
            agent: Arc::new(Unavailable),
        }
    }
}

/// Provider that fails every operation.
#[derive(Debug, Clone, Copy)]
struct Unavailable;

#[async_trait]
impl NotificationProvider for Unavailable {
    async fn send(&self, _: &str, _: &str, _: Option<&str>, _: Option<Priority>) -> bool {
        false
    }
}

#[async_trait]
impl PermissionProvider for Unavailable {
    async fn ensure(&self, caps: &[Capability], _: bool) -> HashMap<Capability, bool> {
        caps.iter().map(|cap| (*cap, false)).collect()
    }
}

#[async_trait]
impl CaptureProvider for Unavailable {
    async fn capture(&self, _: Option<u32>, _: Option<u32>) -> Option<Vec<u8>> {
        None
    }
}

#[async_trait]
impl ShellProvider for Unavailable {
    async fn run(
        &self,
        _: &[String],
        _: Option<&str>,
        _: Option<&BTreeMap<String, String>>,
        _: Option<Duration>,
    ) -> Response {
        Response::error("shell execution unavailable")
    }
}

#[async_trait]
impl RemoteAgent for Unavailable {
    async fn send(&self, _: AgentMessage) -> AgentReply {
        AgentReply {
            ok: false,
            text: None,
            error: Some("agent gateway unavailable".to_string()),
        }
    }

    async fn status(&self) -> AgentStatus {
        AgentStatus {
            ok: false,
            error: Some("agent gateway unavailable".to_string()),
        }
    }
}
