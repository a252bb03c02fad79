//! `helmsman serve`: the broker process.
//!
//! Owns the pause flag. SIGUSR1 pauses, SIGUSR2 resumes, SIGINT/SIGTERM
//! stop accepting and remove the socket.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};

use crate::config::Config;
use crate::constants::VERSION;
use crate::dispatch::{Dispatcher, PauseFlag, PauseState, Providers};
use crate::socket::ControlServer;

/// Run the broker with host providers until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let providers = Providers::host(&config)?;
    let pause = PauseFlag::new(config.start_paused);

    let mut signals = PauseSignals::install()?;
    let watcher = pause.clone();
    serve_until(&config, providers, pause, async move {
        signals.run(&watcher).await;
    })
    .await
}

/// Serve on `config.socket_path` until `shutdown` completes.
pub async fn serve_until<F>(config: &Config, providers: Providers, pause: PauseFlag, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let dispatcher = Arc::new(Dispatcher::new(providers, Arc::new(pause.clone())));
    let server = ControlServer::start(config.socket_path.clone(), dispatcher)
        .context("Failed to start control server")?;

    proctitle::set_title(format!("helmsman serve {}", server.socket_path().display()));
    log::info!(
        "helmsman v{} ready on {} (paused={})",
        VERSION,
        server.socket_path().display(),
        pause.is_paused()
    );

    shutdown.await;

    log::info!("Shutting down...");
    server.shutdown().await;
    Ok(())
}

/// Signal streams the broker reacts to.
struct PauseSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    pause: tokio::signal::unix::Signal,
    resume: tokio::signal::unix::Signal,
}

impl PauseSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("SIGTERM handler")?,
            pause: signal(SignalKind::user_defined1()).context("SIGUSR1 handler")?,
            resume: signal(SignalKind::user_defined2()).context("SIGUSR2 handler")?,
        })
    }

    /// Flip `flag` on SIGUSR1/SIGUSR2; return on SIGINT/SIGTERM.
    async fn run(&mut self, flag: &PauseFlag) {
        loop {
            tokio::select! {
                _ = self.interrupt.recv() => break,
                _ = self.terminate.recv() => break,
                _ = self.pause.recv() => {
                    flag.pause();
                    log::info!("Paused (SIGUSR1)");
                }
                _ = self.resume.recv() => {
                    flag.resume();
                    log::info!("Resumed (SIGUSR2)");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Request, Response};
    use crate::socket::ControlClient;

    #[tokio::test]
    async fn test_serve_until_answers_and_cleans_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            socket_path: tmp.path().join("control.sock"),
            ..Config::default()
        };
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let pause = PauseFlag::default();

        let serve_config = config.clone();
        let serve_pause = pause.clone();
        let server = tokio::spawn(async move {
            serve_until(&serve_config, Providers::unavailable(), serve_pause, async {
                let _ = stop_rx.await;
            })
            .await
        });

        let client = ControlClient::new(&config.socket_path);
        let mut response = None;
        for _ in 0..100 {
            if let Ok(r) = client.send(&Request::Status).await {
                response = Some(r);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(response, Some(Response::ok_with_message("ready")));

        pause.pause();
        assert_eq!(
            client.send(&Request::Status).await.unwrap(),
            Response::error("paused")
        );

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(!config.socket_path.exists());
    }
}
