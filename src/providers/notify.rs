//! Notification presentation.
//!
//! [`SystemNotifier`] posts through the platform notification tool:
//! `osascript` on macOS, `notify-send` everywhere else. A tool that is
//! missing or exits non-zero counts as "not authorized", which is what lets
//! `auto` delivery fall back to the overlay.
//!
//! [`StderrOverlay`] is the in-process presentation path. The broker has no
//! window of its own, so the overlay is the broker's stderr (or log file).

use async_trait::async_trait;
use tokio::process::Command;

use super::{NotificationProvider, OverlayPresenter};
use crate::protocol::Priority;

/// Posts to the OS notification center via a platform tool.
#[derive(Debug, Clone)]
pub struct SystemNotifier {
    program: String,
}

impl Default for SystemNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemNotifier {
    /// Notifier using the platform default tool.
    pub fn new() -> Self {
        let program = if cfg!(target_os = "macos") {
            "osascript"
        } else {
            "notify-send"
        };
        Self::with_program(program)
    }

    /// Notifier using an explicit tool (argv conventions follow the tool name).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to the tool for one notification.
    fn args(&self, title: &str, body: &str, sound: Option<&str>, priority: Option<Priority>) -> Vec<String> {
        if self.program.ends_with("osascript") {
            let mut script = format!(
                "display notification {} with title {}",
                applescript_string(body),
                applescript_string(title)
            );
            // Passive notifications stay silent even if a sound was named.
            if let Some(sound) = sound.filter(|_| priority != Some(Priority::Passive)) {
                script.push_str(" sound name ");
                script.push_str(&applescript_string(sound));
            }
            vec!["-e".to_string(), script]
        } else {
            vec![
                "--app-name=helmsman".to_string(),
                format!("--urgency={}", urgency(priority)),
                "--".to_string(),
                title.to_string(),
                body.to_string(),
            ]
        }
    }
}

#[async_trait]
impl NotificationProvider for SystemNotifier {
    async fn send(&self, title: &str, body: &str, sound: Option<&str>, priority: Option<Priority>) -> bool {
        let args = self.args(title, body, sound, priority);
        match Command::new(&self.program).args(&args).output().await {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                log::info!(
                    "[Notify] {} refused notification ({}): {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                log::info!("[Notify] {} unavailable: {e}", self.program);
                false
            }
        }
    }
}

/// `notify-send` urgency for a priority.
fn urgency(priority: Option<Priority>) -> &'static str {
    match priority {
        Some(Priority::Passive) => "low",
        Some(Priority::Active) | None => "normal",
        Some(Priority::TimeSensitive) => "critical",
    }
}

/// Quote `text` as an AppleScript string literal.
fn applescript_string(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

/// Writes notifications to the broker's stderr. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrOverlay;

#[async_trait]
impl OverlayPresenter for StderrOverlay {
    async fn present(&self, title: &str, body: &str) {
        log::info!("[Notify] Overlay: {}", title);
        eprintln!("[helmsman] {title}: {body}");
    }
}
