//! Video encoding through an ffmpeg subprocess.
//!
//! Each destination gets its own ffmpeg process that reads packed RGB24 frames
//! from stdin and muxes them into the configured container. Closing stdin
//! flushes and finalizes the file.

use super::encoder::{EncoderFactory, EncoderSpec, VideoEncoder};
use super::error::{CaptureError, CaptureResult};
use super::frame::VideoFrame;
use crate::store::VideoFormat;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Locates the ffmpeg binary on the system.
///
/// Checks the usual installation locations for the current platform, then
/// falls back to searching PATH.
pub fn find_ffmpeg() -> io::Result<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &["/opt/homebrew/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/usr/bin/ffmpeg"]
    } else if cfg!(target_os = "linux") {
        &["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/snap/bin/ffmpeg"]
    } else if cfg!(target_os = "windows") {
        &[
            "C:\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
        ]
    } else {
        &[]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let search_cmd = if cfg!(target_os = "windows") { "where" } else { "which" };
    let output = Command::new(search_cmd).arg("ffmpeg").output()?;
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            tracing::debug!("Found ffmpeg in PATH at: {}", first);
            return Ok(PathBuf::from(first));
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "ffmpeg not found. Please install ffmpeg:\n\
         macOS: brew install ffmpeg\n\
         Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
         Windows: Download from https://ffmpeg.org/download.html",
    ))
}

/// Command-line arguments for encoding a raw RGB24 stream into `output`.
pub(crate) fn encoder_args(spec: &EncoderSpec, output: &Path) -> Vec<OsString> {
    let muxer = match spec.format {
        VideoFormat::Mp4 => "mp4",
        VideoFormat::Avi => "avi",
    };

    let video_size = spec.frame_size.to_string();
    let framerate = spec.fps.to_string();

    let mut args: Vec<OsString> = [
        "-loglevel", "error",
        "-y",
        "-f", "rawvideo",
        "-pixel_format", "rgb24",
        "-video_size", video_size.as_str(),
        "-framerate", framerate.as_str(),
        "-i", "pipe:0",
        "-an",
        "-c:v", "mpeg4",
        "-vtag", spec.format.fourcc(),
        "-q:v", "5",
        "-pix_fmt", "yuv420p",
        "-f", muxer,
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(output.as_os_str().to_owned());
    args
}

/// Spawns one ffmpeg process per destination.
pub struct FfmpegEncoderFactory {
    ffmpeg: PathBuf,
}

impl FfmpegEncoderFactory {
    /// Uses the ffmpeg binary found by [`find_ffmpeg`].
    pub fn locate() -> io::Result<Self> {
        Ok(Self {
            ffmpeg: find_ffmpeg()?,
        })
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn open(&self, path: &Path, spec: &EncoderSpec) -> CaptureResult<Box<dyn VideoEncoder>> {
        let mut process = Command::new(&self.ffmpeg)
            .args(encoder_args(spec, path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptureError::encoder_init(path, format!("failed to start ffmpeg: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| CaptureError::encoder_init(path, "ffmpeg stdin unavailable"))?;

        tracing::info!(
            "Started ffmpeg encoder: {} @ {}fps, {} -> {}",
            spec.frame_size,
            spec.fps,
            spec.format,
            path.display()
        );

        Ok(Box::new(FfmpegEncoder {
            path: path.to_path_buf(),
            process,
            stdin: Some(stdin),
            frame_len: spec.frame_size.rgb24_len(),
            frames: 0,
        }))
    }
}

struct FfmpegEncoder {
    path: PathBuf,
    process: Child,
    stdin: Option<ChildStdin>,
    frame_len: usize,
    frames: u64,
}

impl VideoEncoder for FfmpegEncoder {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &VideoFrame) -> CaptureResult<()> {
        if frame.data.len() != self.frame_len {
            return Err(CaptureError::write(
                &self.path,
                format!(
                    "frame is {} bytes, encoder expects {} ({})",
                    frame.data.len(),
                    self.frame_len,
                    frame.size
                ),
            ));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CaptureError::write(&self.path, "encoder already closed"))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| CaptureError::write(&self.path, format!("ffmpeg rejected frame: {e}")))?;

        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> CaptureResult<u64> {
        let FfmpegEncoder {
            path,
            process,
            stdin,
            frames,
            ..
        } = *self;
        // EOF on stdin tells ffmpeg to flush and write the trailer.
        drop(stdin);

        let output = process
            .wait_with_output()
            .map_err(|e| CaptureError::write(&path, format!("failed to wait for ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!("ffmpeg exited with {} for {}: {}", output.status, path.display(), stderr);
            return Err(CaptureError::write(&path, stderr.trim()));
        }

        tracing::info!("ffmpeg encoder finished: {} frames -> {}", frames, path.display());
        Ok(frames)
    }

    fn abort(mut self: Box<Self>) {
        drop(self.stdin.take());
        if let Err(e) = self.process.kill() {
            tracing::debug!("ffmpeg already exited: {}", e);
        }
        let _ = self.process.wait();
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
        tracing::debug!("ffmpeg encoder aborted for {}", self.path.display());
    }
}
