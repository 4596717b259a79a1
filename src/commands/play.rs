//! Open a recording in the system video player.

use crate::capture::CaptureError;
use std::path::Path;
use std::process::Command;

/// Plays back a recording with the system's default video player.
///
/// # Errors
/// - If the file does not exist
/// - If no player could be started
pub async fn handle_play(video: &Path) -> Result<(), anyhow::Error> {
    tracing::info!("=== duorec play ===");
    preview(video).await
}

/// Opens `video` with the platform's default application.
///
/// On macOS uses `open`. On Linux tries xdg-open first, then falls back to
/// mpv, vlc and ffplay. On Windows uses `start`.
pub async fn preview(video: &Path) -> Result<(), anyhow::Error> {
    if !video.exists() {
        return Err(CaptureError::ArtifactNotFound(video.to_path_buf()).into());
    }
    tracing::info!("Opening {} in the system player", video.display());

    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(video)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to open video player: {e}"))?
            .wait()
            .map_err(|e| anyhow::anyhow!("Video player error: {e}"))?;
    }

    #[cfg(target_os = "linux")]
    {
        match Command::new("xdg-open").arg(video).spawn() {
            Ok(mut child) => {
                child
                    .wait()
                    .map_err(|e| anyhow::anyhow!("Video player error: {e}"))?;
            }
            Err(_) => {
                let played = ["mpv", "vlc", "ffplay"].iter().any(|player| {
                    match Command::new(player).arg(video).spawn() {
                        Ok(mut child) => {
                            let _ = child.wait();
                            true
                        }
                        Err(_) => false,
                    }
                });

                if !played {
                    return Err(anyhow::anyhow!(
                        "No video player found. Install xdg-utils, mpv, vlc or ffplay"
                    ));
                }
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(video)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to open video player: {e}"))?
            .wait()
            .map_err(|e| anyhow::anyhow!("Video player error: {e}"))?;
    }

    Ok(())
}
