//! Request and response shapes exchanged over the control socket.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SCREENSHOT_FORMAT;

/// A sensitive OS feature that gates one or more operations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Posting to the system notification center.
    Notifications,
    /// Accessibility (UI scripting) access.
    Accessibility,
    /// Screen recording / capture.
    ScreenRecording,
    /// Apple Events automation of other apps.
    Automation,
    /// Microphone input.
    Microphone,
    /// On-device speech recognition.
    SpeechRecognition,
}

impl Capability {
    /// Every known capability, in canonical order.
    pub const ALL: [Capability; 6] = [
        Capability::Notifications,
        Capability::Accessibility,
        Capability::ScreenRecording,
        Capability::Automation,
        Capability::Microphone,
        Capability::SpeechRecognition,
    ];

    /// Human-readable name used in messages and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Notifications => "notifications",
            Capability::Accessibility => "accessibility",
            Capability::ScreenRecording => "screen-recording",
            Capability::Automation => "automation",
            Capability::Microphone => "microphone",
            Capability::SpeechRecognition => "speech-recognition",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interruption level of a system notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    /// Delivered quietly, no sound or banner.
    Passive,
    /// Default interruption level.
    Active,
    /// Breaks through focus modes.
    TimeSensitive,
}

/// Which presentation path a notification takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Delivery {
    /// The OS notification center.
    #[default]
    System,
    /// The broker's own transient overlay, no OS permission involved.
    Overlay,
    /// System first, overlay when the system path is not authorized.
    Auto,
}

/// Reasoning effort requested from the remote agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Thinking {
    /// Minimal reasoning.
    Low,
    /// The agent's default.
    Default,
    /// Extended reasoning.
    High,
}

impl Thinking {
    /// Wire name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Thinking::Low => "low",
            Thinking::Default => "default",
            Thinking::High => "high",
        }
    }
}

fn default_format() -> String {
    DEFAULT_SCREENSHOT_FORMAT.to_string()
}

/// One operation the client asks the broker to perform.
///
/// Encoded as a JSON object whose `type` field names the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    /// Show a notification.
    Notify {
        /// Notification title.
        title: String,
        /// Notification body.
        body: String,
        /// Named system sound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sound: Option<String>,
        /// Interruption level.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        /// Presentation path; `system` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delivery: Option<Delivery>,
    },

    /// Check (and optionally prompt for) a set of capabilities.
    EnsurePermissions {
        /// Capabilities to check. Empty means all of them.
        caps: Vec<Capability>,
        /// Whether the OS may prompt the user.
        #[serde(default)]
        interactive: bool,
    },

    /// Capture a display or a single window.
    Screenshot {
        /// Display to capture; the main display when absent.
        #[serde(rename = "displayID", default, skip_serializing_if = "Option::is_none")]
        display_id: Option<u32>,
        /// Window to capture instead of a whole display.
        #[serde(rename = "windowID", default, skip_serializing_if = "Option::is_none")]
        window_id: Option<u32>,
        /// Image format.
        #[serde(default = "default_format")]
        format: String,
    },

    /// Run a command (argv, no shell interpretation).
    RunShell {
        /// Program followed by its arguments.
        command: Vec<String>,
        /// Working directory.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
        /// Variables layered over the broker's environment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        env: Option<BTreeMap<String, String>>,
        /// Kill the command after this many seconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_sec: Option<f64>,
        /// Refuse to run unless screen recording is granted.
        #[serde(default)]
        needs_screen_recording: bool,
    },

    /// Broker liveness check.
    Status,

    /// Liveness of the remote agent gateway.
    RpcStatus,

    /// Relay a message to the remote agent.
    Agent {
        /// Message text.
        message: String,
        /// Reasoning effort.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thinking: Option<Thinking>,
        /// Session key; `main` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
        /// Deliver the agent's reply to the recipient.
        #[serde(default)]
        deliver: bool,
        /// Recipient for delivered replies.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
}

impl Request {
    /// Wire tag of this variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Notify { .. } => "notify",
            Request::EnsurePermissions { .. } => "ensurePermissions",
            Request::Screenshot { .. } => "screenshot",
            Request::RunShell { .. } => "runShell",
            Request::Status => "status",
            Request::RpcStatus => "rpcStatus",
            Request::Agent { .. } => "agent",
        }
    }
}

/// The broker's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Cause of a failure, or an informational note on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Binary result (PNG bytes, captured stdout).
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_payload")]
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Success with no message.
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
            payload: None,
        }
    }

    /// Success carrying a note.
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
            payload: None,
        }
    }

    /// Success carrying binary data.
    pub fn ok_with_payload(payload: Vec<u8>) -> Self {
        Self {
            ok: true,
            message: None,
            payload: Some(payload),
        }
    }

    /// Failure with a cause.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            payload: None,
        }
    }

    /// Attach a payload to this response.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Serde adapter carrying `Option<Vec<u8>>` as standard base64 text.
mod base64_payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option, reason = "signature dictated by serde's `with`")]
    pub(super) fn serialize<S: Serializer>(
        payload: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match payload {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
