//! Screen capture through platform tools.
//!
//! macOS uses `screencapture`, which understands both display and window ids.
//! Elsewhere `grim` (wlroots) captures the whole output; display and window
//! ids have no meaning there and a window capture is refused.
//!
//! The tool writes into a uniquely named temp file which is read back and
//! removed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::CaptureProvider;

/// Which capture tool, and therefore which argv convention, to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTool {
    /// macOS `screencapture`.
    ScreenCapture,
    /// Wayland `grim`.
    Grim,
}

impl CaptureTool {
    /// The tool for the current platform.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::ScreenCapture
        } else {
            Self::Grim
        }
    }

    fn program(self) -> &'static str {
        match self {
            Self::ScreenCapture => "screencapture",
            Self::Grim => "grim",
        }
    }

    /// Arguments for capturing into `out`, or `None` if the tool can't
    /// capture what was asked for.
    fn args(self, display_id: Option<u32>, window_id: Option<u32>, out: &Path) -> Option<Vec<String>> {
        let out = out.to_string_lossy().into_owned();
        match self {
            Self::ScreenCapture => {
                // -x: no shutter sound
                let mut args = vec!["-x".to_string(), "-t".to_string(), "png".to_string()];
                if let Some(window) = window_id {
                    args.push(format!("-l{window}"));
                } else if let Some(display) = display_id {
                    args.push(format!("-D{display}"));
                }
                args.push(out);
                Some(args)
            }
            Self::Grim => {
                if window_id.is_some() {
                    return None;
                }
                if let Some(display) = display_id {
                    log::debug!("[Capture] grim ignores display id {}", display);
                }
                Some(vec!["-t".to_string(), "png".to_string(), out])
            }
        }
    }
}

/// Captures the screen by shelling out to a platform tool.
#[derive(Debug, Clone)]
pub struct ScreenCapture {
    tool: CaptureTool,
    scratch_dir: PathBuf,
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenCapture {
    /// Capture with the platform tool into the system temp directory.
    pub fn new() -> Self {
        Self::with_tool(CaptureTool::platform_default(), std::env::temp_dir())
    }

    /// Capture with an explicit tool and scratch directory.
    pub fn with_tool(tool: CaptureTool, scratch_dir: PathBuf) -> Self {
        Self { tool, scratch_dir }
    }
}

#[async_trait]
impl CaptureProvider for ScreenCapture {
    async fn capture(&self, display_id: Option<u32>, window_id: Option<u32>) -> Option<Vec<u8>> {
        let out = self
            .scratch_dir
            .join(format!("helmsman-capture-{}.png", uuid::Uuid::new_v4()));
        let Some(args) = self.tool.args(display_id, window_id, &out) else {
            log::info!("[Capture] {} cannot capture window {:?}", self.tool.program(), window_id);
            return None;
        };

        let status = Command::new(self.tool.program())
            .args(&args)
            .kill_on_drop(true)
            .status()
            .await;

        let image = match status {
            Ok(status) if status.success() => match tokio::fs::read(&out).await {
                Ok(bytes) if !bytes.is_empty() => Some(bytes),
                Ok(_) => {
                    log::warn!("[Capture] {} wrote an empty image", self.tool.program());
                    None
                }
                Err(e) => {
                    log::warn!("[Capture] Failed to read {}: {e}", out.display());
                    None
                }
            },
            Ok(status) => {
                log::warn!("[Capture] {} exited with {}", self.tool.program(), status);
                None
            }
            Err(e) => {
                log::warn!("[Capture] {} unavailable: {e}", self.tool.program());
                None
            }
        };

        match tokio::fs::remove_file(&out).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::debug!("[Capture] Failed to remove {}: {e}", out.display()),
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screencapture_args() {
        let out = Path::new("/tmp/x.png");
        assert_eq!(
            CaptureTool::ScreenCapture.args(None, None, out).unwrap(),
            vec!["-x", "-t", "png", "/tmp/x.png"]
        );
        assert_eq!(
            CaptureTool::ScreenCapture.args(Some(2), None, out).unwrap(),
            vec!["-x", "-t", "png", "-D2", "/tmp/x.png"]
        );
        // A window id wins over a display id.
        assert_eq!(
            CaptureTool::ScreenCapture.args(Some(2), Some(77), out).unwrap(),
            vec!["-x", "-t", "png", "-l77", "/tmp/x.png"]
        );
    }

    #[test]
    fn test_grim_args() {
        let out = Path::new("/tmp/x.png");
        assert_eq!(
            CaptureTool::Grim.args(Some(1), None, out).unwrap(),
            vec!["-t", "png", "/tmp/x.png"]
        );
        assert_eq!(CaptureTool::Grim.args(None, Some(5), out), None);
    }

    #[tokio::test]
    async fn test_grim_window_capture_is_refused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let capture = ScreenCapture::with_tool(CaptureTool::Grim, tmp.path().to_path_buf());
        assert_eq!(capture.capture(None, Some(1)).await, None);
    }

    #[tokio::test]
    async fn test_failed_capture_leaves_no_scratch_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let capture = ScreenCapture::with_tool(CaptureTool::platform_default(), tmp.path().to_path_buf());
        // Headless test hosts have no display; either way nothing may linger.
        let _ = capture.capture(None, None).await;
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
