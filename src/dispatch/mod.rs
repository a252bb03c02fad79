//! Dispatch engine: turns a decoded [`Request`] into a [`Response`].
//!
//! Every request passes the pause gate first. After that each variant has
//! its own policy: an optional permission gate, a delegation to exactly one
//! provider (two for `auto` notifications, as an ordered fallback), and a
//! fixed mapping from the provider's answer to a response.
//!
//! [`Dispatcher::dispatch`] never fails; every failure is `ok: false`.

pub mod delivery;
pub mod pause;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub use pause::{PauseFlag, PauseState};
pub use crate::providers::Providers;

use self::delivery::DeliveryStep;
use crate::constants::DEFAULT_AGENT_SESSION;
use crate::protocol::{Capability, Delivery, Priority, Request, Response, Thinking};
use crate::providers::AgentMessage;

/// Reply to any request while the broker is paused.
pub const MSG_PAUSED: &str = "paused";
/// Reply to `status`.
pub const MSG_READY: &str = "ready";
/// `ensurePermissions` success message.
pub const MSG_ALL_GRANTED: &str = "all granted";
/// Screen recording gate denial.
pub const MSG_SCREEN_RECORDING_MISSING: &str = "screen recording permission missing";
/// Capture provider returned nothing.
pub const MSG_SCREENSHOT_FAILED: &str = "screenshot failed";
/// `agent` text was blank.
pub const MSG_MESSAGE_EMPTY: &str = "message empty";
/// Agent accepted the message without reply text.
pub const MSG_SENT: &str = "sent";
/// Agent refused the message without an error text.
pub const MSG_SEND_FAILED: &str = "failed to send";
/// Agent status probe failed without an error text.
pub const MSG_RPC_UNAVAILABLE: &str = "agent gateway unavailable";

/// Routes requests to capability providers.
#[derive(Clone)]
pub struct Dispatcher {
    providers: Providers,
    pause: Arc<dyn PauseState>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("paused", &self.pause.is_paused())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher over `providers`, gated by `pause`.
    pub fn new(providers: Providers, pause: Arc<dyn PauseState>) -> Self {
        Self { providers, pause }
    }

    /// Handle one request.
    pub async fn dispatch(&self, request: Request) -> Response {
        // One read per exchange: a flip mid-exchange applies to the next one.
        if self.pause.is_paused() {
            log::debug!("[Dispatch] Refusing {} while paused", request.kind());
            return Response::error(MSG_PAUSED);
        }

        match request {
            Request::Notify {
                title,
                body,
                sound,
                priority,
                delivery,
            } => {
                self.notify(&title, &body, sound.as_deref(), priority, delivery.unwrap_or_default())
                    .await
            }
            Request::EnsurePermissions { caps, interactive } => {
                self.ensure_permissions(&caps, interactive).await
            }
            Request::Screenshot {
                display_id,
                window_id,
                format,
            } => self.screenshot(display_id, window_id, &format).await,
            Request::RunShell {
                command,
                cwd,
                env,
                timeout_sec,
                needs_screen_recording,
            } => {
                self.run_shell(
                    &command,
                    cwd.as_deref(),
                    env.as_ref(),
                    timeout_sec,
                    needs_screen_recording,
                )
                .await
            }
            Request::Status => Response::ok_with_message(MSG_READY),
            Request::RpcStatus => self.rpc_status().await,
            Request::Agent {
                message,
                thinking,
                session,
                deliver,
                to,
            } => self.agent(&message, thinking, session.as_deref(), deliver, to).await,
        }
    }

    /// Run the delivery plan, stopping at the first step that delivers.
    async fn notify(
        &self,
        title: &str,
        body: &str,
        sound: Option<&str>,
        priority: Option<Priority>,
        policy: Delivery,
    ) -> Response {
        let sound = sound.map(str::trim).filter(|s| !s.is_empty());
        let mut failed: Vec<DeliveryStep> = Vec::new();

        for &step in delivery::plan(policy) {
            let delivered = match step {
                DeliveryStep::System => {
                    self.providers
                        .notifications
                        .send(title, body, sound, priority)
                        .await
                }
                DeliveryStep::Overlay => {
                    self.providers.overlay.present(title, body).await;
                    true
                }
            };

            if delivered {
                return match delivery::success_note(&failed, step) {
                    Some(note) => Response::ok_with_message(note),
                    None => Response::ok(),
                };
            }
            log::debug!("[Dispatch] Notification step {} failed", step.name());
            failed.push(step);
        }

        Response::error(delivery::failure_message(&failed))
    }

    async fn ensure_permissions(&self, caps: &[Capability], interactive: bool) -> Response {
        let source: &[Capability] = if caps.is_empty() { &Capability::ALL } else { caps };
        let mut requested: Vec<Capability> = Vec::with_capacity(source.len());
        for &cap in source {
            if !requested.contains(&cap) {
                requested.push(cap);
            }
        }

        let status = self.providers.permissions.ensure(&requested, interactive).await;
        let missing: Vec<&str> = requested
            .iter()
            .filter(|cap| !status.get(cap).copied().unwrap_or(false))
            .map(|cap| cap.as_str())
            .collect();

        if missing.is_empty() {
            Response::ok_with_message(MSG_ALL_GRANTED)
        } else {
            Response::error(format!("missing: {}", missing.join(", ")))
        }
    }

    /// Non-interactive screen recording check. Never prompts.
    ///
    /// Returns the denial response to short-circuit with, or `None` if granted.
    async fn gate_screen_recording(&self) -> Option<Response> {
        let cap = Capability::ScreenRecording;
        let status = self.providers.permissions.ensure(&[cap], false).await;
        if status.get(&cap).copied().unwrap_or(false) {
            None
        } else {
            log::info!("[Dispatch] {} not granted", cap);
            Some(Response::error(MSG_SCREEN_RECORDING_MISSING))
        }
    }

    async fn screenshot(&self, display_id: Option<u32>, window_id: Option<u32>, format: &str) -> Response {
        if let Some(denied) = self.gate_screen_recording().await {
            return denied;
        }
        if !format.eq_ignore_ascii_case("png") {
            log::debug!("[Dispatch] Ignoring screenshot format {:?}, capturing png", format);
        }

        match self.providers.capture.capture(display_id, window_id).await {
            Some(png) => Response::ok_with_payload(png),
            None => Response::error(MSG_SCREENSHOT_FAILED),
        }
    }

    async fn run_shell(
        &self,
        command: &[String],
        cwd: Option<&str>,
        env: Option<&BTreeMap<String, String>>,
        timeout_sec: Option<f64>,
        needs_screen_recording: bool,
    ) -> Response {
        if needs_screen_recording {
            if let Some(denied) = self.gate_screen_recording().await {
                return denied;
            }
        }
        // Negative or NaN timeouts are treated as absent.
        let timeout = timeout_sec.and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        self.providers.shell.run(command, cwd, env, timeout).await
    }

    async fn agent(
        &self,
        message: &str,
        thinking: Option<Thinking>,
        session: Option<&str>,
        deliver: bool,
        to: Option<String>,
    ) -> Response {
        let text = message.trim();
        if text.is_empty() {
            return Response::error(MSG_MESSAGE_EMPTY);
        }
        let session_key = session
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_AGENT_SESSION)
            .to_string();

        let reply = self
            .providers
            .agent
            .send(AgentMessage {
                text: text.to_string(),
                thinking,
                session_key,
                deliver,
                to,
            })
            .await;

        if reply.ok {
            Response::ok_with_message(non_empty(reply.text).unwrap_or_else(|| MSG_SENT.to_string()))
        } else {
            Response::error(non_empty(reply.error).unwrap_or_else(|| MSG_SEND_FAILED.to_string()))
        }
    }

    async fn rpc_status(&self) -> Response {
        let status = self.providers.agent.status().await;
        if status.ok {
            Response::ok()
        } else {
            Response::error(non_empty(status.error).unwrap_or_else(|| MSG_RPC_UNAVAILABLE.to_string()))
        }
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}
