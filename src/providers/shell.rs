//! Subprocess execution for `runShell`.
//!
//! Commands are exec'd directly from argv (no shell), in their own process
//! group, with stdin closed. On timeout the whole group is killed with
//! SIGKILL and the child is reaped before the response is built, so nothing
//! the command started outlives the exchange.
//!
//! # Response contract
//!
//! | Outcome            | `ok`  | `message`                      | `payload`          |
//! |--------------------|-------|--------------------------------|--------------------|
//! | exit 0             | true  | none                           | stdout             |
//! | non-zero exit      | false | `exit status N: <stderr>`      | stdout             |
//! | killed by signal   | false | `terminated by signal N`       | stdout             |
//! | timeout            | false | `timed out after Ns`           | stdout so far      |
//! | empty argv         | false | `command empty`                | none               |
//! | spawn failure      | false | `failed to spawn <prog>: <e>`  | none               |
//!
//! Stdout is cut at [`MAX_SHELL_OUTPUT_BYTES`]. Only the last
//! [`MAX_SHELL_STDERR_BYTES`] of stderr are quoted, prefixed with
//! `[stderr truncated]` when more was written. Both limits keep every
//! response under the encoded response ceiling.

use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::ShellProvider;
use crate::constants::{MAX_SHELL_OUTPUT_BYTES, MAX_SHELL_STDERR_BYTES, PIPE_DRAIN_GRACE};
use crate::protocol::Response;

/// Runs commands as children of the broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl ShellProvider for ShellRunner {
    async fn run(
        &self,
        command: &[String],
        cwd: Option<&str>,
        env: Option<&BTreeMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Response {
        let Some((program, args)) = command.split_first() else {
            return Response::error("command empty");
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        if let Some(vars) = env {
            cmd.envs(vars);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::warn!("[Shell] Failed to spawn {}: {e}", program);
                return Response::error(format!("failed to spawn {program}: {e}"));
            }
        };
        log::debug!("[Shell] Spawned {} (pid {:?})", program, child.id());

        let stdout = child.stdout.take().map(|pipe| tokio::spawn(drain(pipe)));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(drain_tail(pipe, MAX_SHELL_STDERR_BYTES)));

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => Outcome::Exited(waited),
                Err(_) => {
                    log::info!("[Shell] {} timed out after {:?}, killing group", program, limit);
                    kill_group(&mut child).await;
                    Outcome::TimedOut(limit)
                }
            },
            None => Outcome::Exited(child.wait().await),
        };

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;

        match outcome {
            Outcome::TimedOut(limit) => {
                Response::error(format!("timed out after {}s", limit.as_secs_f64())).with_payload(stdout)
            }
            Outcome::Exited(Err(e)) => {
                log::warn!("[Shell] Failed waiting on {}: {e}", program);
                Response::error(format!("failed to wait for {program}: {e}")).with_payload(stdout)
            }
            Outcome::Exited(Ok(status)) if status.success() => Response::ok_with_payload(stdout),
            Outcome::Exited(Ok(status)) => {
                Response::error(describe_failure(status, &stderr)).with_payload(stdout)
            }
        }
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut(Duration),
}

/// SIGKILL the child's process group, then kill and reap the child itself.
async fn kill_group(child: &mut Child) {
    if let Some(pgid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        // SAFETY: killpg only sends a signal. The group id is the pid of a
        // child we spawned as a group leader and have not yet reaped, so it
        // cannot have been recycled for an unrelated group.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc != 0 {
            log::debug!(
                "[Shell] killpg({}) failed: {}",
                pgid,
                std::io::Error::last_os_error()
            );
        }
    }
    if let Err(e) = child.kill().await {
        log::debug!("[Shell] kill after killpg failed: {e}");
    }
}

/// Read a pipe to EOF, keeping the first [`MAX_SHELL_OUTPUT_BYTES`].
///
/// Output past the cap is read and discarded so the child never blocks on a
/// full pipe.
async fn drain<R: AsyncRead + Unpin>(pipe: R) -> Vec<u8> {
    let cap = u64::try_from(MAX_SHELL_OUTPUT_BYTES).unwrap_or(u64::MAX);
    let mut limited = pipe.take(cap);
    let mut buf = Vec::new();
    if let Err(e) = limited.read_to_end(&mut buf).await {
        log::debug!("[Shell] Pipe read error: {e}");
        return buf;
    }
    let mut rest = limited.into_inner();
    if let Err(e) = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await {
        log::debug!("[Shell] Pipe drain error: {e}");
    }
    buf
}

/// The end of a stream, and whether anything before it was dropped.
#[derive(Debug, Default)]
struct Tail {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Read a pipe to EOF, keeping only its last `cap` bytes.
async fn drain_tail<R: AsyncRead + Unpin>(mut pipe: R, cap: usize) -> Tail {
    let mut tail = Tail::default();
    let mut chunk = vec![0u8; 8 * 1024];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                tail.bytes.extend_from_slice(&chunk[..n]);
                // Trim in batches so long streams aren't shifted on every read.
                if tail.bytes.len() > cap * 2 {
                    tail.keep_last(cap);
                }
            }
            Err(e) => {
                log::debug!("[Shell] Pipe read error: {e}");
                break;
            }
        }
    }
    tail.keep_last(cap);
    tail
}

impl Tail {
    fn keep_last(&mut self, cap: usize) {
        if self.bytes.len() > cap {
            let excess = self.bytes.len() - cap;
            self.bytes.drain(..excess);
            self.truncated = true;
        }
    }
}

/// Join a pipe reader, giving up if something outside the group holds the
/// pipe open.
async fn collect<T: Default>(handle: Option<JoinHandle<T>>) -> T {
    let Some(mut handle) = handle else {
        return T::default();
    };
    match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            log::warn!("[Shell] Pipe reader failed: {e}");
            T::default()
        }
        Err(_) => {
            log::warn!("[Shell] Output pipe still open after exit, abandoning it");
            handle.abort();
            T::default()
        }
    }
}

fn describe_failure(status: ExitStatus, stderr: &Tail) -> String {
    let head = match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit status {code}"),
        (None, Some(signal)) => format!("terminated by signal {signal}"),
        (None, None) => "exited abnormally".to_string(),
    };
    let text = String::from_utf8_lossy(&stderr.bytes);
    let text = text.trim();
    match (text.is_empty(), stderr.truncated) {
        (true, _) => head,
        (false, false) => format!("{head}: {text}"),
        (false, true) => format!("{head}: [stderr truncated] {text}"),
    }
}
