//! Command-line surface.
//!
//! Every client subcommand maps its flags to exactly one [`Request`];
//! `serve` runs the broker itself.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::constants::{DEFAULT_SCREENSHOT_FORMAT, VERSION};
use crate::protocol::{Capability, Delivery, Priority, Request, Thinking};

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "helmsman")]
#[command(version = VERSION)]
#[command(about = "Ask the local helmsman broker to perform privileged operations")]
pub struct Cli {
    /// Control socket path (overrides config and HELMSMAN_SOCKET).
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the broker in the foreground.
    Serve,
    /// Show a notification.
    Notify(NotifyArgs),
    /// Check (and optionally request) OS permissions.
    EnsurePermissions(EnsurePermissionsArgs),
    /// Capture the screen as PNG.
    Screenshot(ScreenshotArgs),
    /// Run a command through the broker.
    Run(RunArgs),
    /// Check that the broker is up.
    Status,
    /// Check that the agent gateway is up.
    RpcStatus,
    /// Send a message to the remote agent.
    Agent(AgentArgs),
}

/// `notify` flags.
#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Notification title.
    #[arg(long)]
    pub title: String,
    /// Notification body.
    #[arg(long, default_value = "")]
    pub body: String,
    /// System sound name.
    #[arg(long)]
    pub sound: Option<String>,
    /// Interruption level.
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,
    /// Presentation path.
    #[arg(long, value_enum)]
    pub delivery: Option<Delivery>,
}

/// `ensure-permissions` flags.
#[derive(Args, Debug)]
pub struct EnsurePermissionsArgs {
    /// Capability to check; repeat for several. All of them when omitted.
    #[arg(long = "cap", value_enum)]
    pub caps: Vec<Capability>,
    /// Allow the OS to prompt.
    #[arg(long)]
    pub interactive: bool,
}

/// `screenshot` flags.
#[derive(Args, Debug)]
pub struct ScreenshotArgs {
    /// Display to capture.
    #[arg(long)]
    pub display_id: Option<u32>,
    /// Window to capture.
    #[arg(long)]
    pub window_id: Option<u32>,
    /// Write the PNG here instead of printing it.
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// `run` flags.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Working directory.
    #[arg(long)]
    pub cwd: Option<String>,
    /// Extra environment variable; repeat for several.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
    /// Kill the command after this many seconds.
    #[arg(long, value_name = "SECONDS", value_parser = parse_timeout)]
    pub timeout: Option<f64>,
    /// Refuse to run unless screen recording is granted.
    #[arg(long)]
    pub needs_screen_recording: bool,
    /// Program and arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// `agent` flags.
#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Message text.
    #[arg(long)]
    pub message: String,
    /// Reasoning effort.
    #[arg(long, value_enum)]
    pub thinking: Option<Thinking>,
    /// Session key (default "main").
    #[arg(long)]
    pub session: Option<String>,
    /// Deliver the reply to the recipient.
    #[arg(long)]
    pub deliver: bool,
    /// Recipient for delivered replies.
    #[arg(long)]
    pub to: Option<String>,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

/// Parse `--timeout`. JSON has no infinity or NaN, so those would reach the
/// broker as "no timeout".
fn parse_timeout(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(format!("expected a non-negative number of seconds, got {raw:?}"))
    }
}

impl Command {
    /// The request this subcommand sends, or `None` for `serve`.
    pub fn request(&self) -> Option<Request> {
        let request = match self {
            Command::Serve => return None,
            Command::Notify(args) => Request::Notify {
                title: args.title.clone(),
                body: args.body.clone(),
                sound: args.sound.clone(),
                priority: args.priority,
                delivery: args.delivery,
            },
            Command::EnsurePermissions(args) => Request::EnsurePermissions {
                // Defaulting happens here, on the client side.
                caps: if args.caps.is_empty() {
                    Capability::ALL.to_vec()
                } else {
                    args.caps.clone()
                },
                interactive: args.interactive,
            },
            Command::Screenshot(args) => Request::Screenshot {
                display_id: args.display_id,
                window_id: args.window_id,
                format: DEFAULT_SCREENSHOT_FORMAT.to_string(),
            },
            Command::Run(args) => Request::RunShell {
                command: args.command.clone(),
                cwd: args.cwd.clone(),
                env: (!args.env.is_empty())
                    .then(|| args.env.iter().cloned().collect::<BTreeMap<_, _>>()),
                timeout_sec: args.timeout,
                needs_screen_recording: args.needs_screen_recording,
            },
            Command::Status => Request::Status,
            Command::RpcStatus => Request::RpcStatus,
            Command::Agent(args) => Request::Agent {
                message: args.message.clone(),
                thinking: args.thinking,
                session: args.session.clone(),
                deliver: args.deliver,
                to: args.to.clone(),
            },
        };
        Some(request)
    }

    /// Whether this subcommand runs the broker.
    pub fn is_serve(&self) -> bool {
        matches!(self, Command::Serve)
    }
}
