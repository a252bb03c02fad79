//! helmsman CLI: the broker (`helmsman serve`) and its client subcommands.
//!
//! This is the main binary entry point. See the `helmsman` library for the
//! protocol, transport and dispatch engine.

use anyhow::{Context, Result};
use clap::Parser;
use helmsman::cli::{Cli, Command};
use helmsman::commands::{self, EXIT_UNAVAILABLE};
use helmsman::Config;
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Set up logging.
///
/// The broker logs at `info` by default, clients at `warn` so their stdout
/// stays a single JSON line. `HELMSMAN_LOG_FILE` redirects output to a file.
fn init_logging(serving: bool) -> Result<()> {
    let default_filter = if serving { "info" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    builder.format_timestamp_secs();

    if let Ok(path) = std::env::var("HELMSMAN_LOG_FILE") {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

fn run(cli: Cli) -> Result<i32> {
    init_logging(cli.command.is_serve())?;

    let mut config = Config::load()?;
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    match cli.command.request() {
        None => {
            runtime.block_on(commands::serve::run(config))?;
            Ok(0)
        }
        Some(request) => {
            let out = match &cli.command {
                Command::Screenshot(args) => args.out.clone(),
                _ => None,
            };
            Ok(runtime.block_on(commands::client::run(
                &config.socket_path,
                &request,
                out.as_deref(),
            )))
        }
    }
}

fn main() {
    // Usage errors exit 2, --help/--version exit 0 (clap's defaults).
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("helmsman: {e:#}");
            EXIT_UNAVAILABLE
        }
    };
    std::process::exit(code);
}
