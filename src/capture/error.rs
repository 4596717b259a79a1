//! Error taxonomy for the capture subsystem.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the devices, the dual sink and the capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Camera or microphone cannot be opened.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A destination container/codec could not be opened.
    #[error("failed to open encoder for {}: {reason}", path.display())]
    EncoderInitError { path: PathBuf, reason: String },

    /// A device stopped producing data mid-recording.
    #[error("device read failed: {0}")]
    ReadError(String),

    #[error("device read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("capture device stopped producing frames")]
    EndOfStream,

    /// A sink failed to persist a frame or a finished file.
    #[error("failed to write {}: {reason}", path.display())]
    WriteError { path: PathBuf, reason: String },

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("recording not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    /// The file name does not follow the `video_<YYYYMMDD_HHMMSS>.<ext>` contract.
    #[error("not a recording file name: {}", .0.display())]
    InvalidArtifactName(PathBuf),

    #[error("capture thread panicked; devices were lost")]
    CaptureThreadPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub(crate) fn encoder_init(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::EncoderInitError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WriteError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error ended a capture loop because a device went away.
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            Self::ReadError(_) | Self::ReadTimeout(_) | Self::EndOfStream
        )
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
