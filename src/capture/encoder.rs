//! Video encoder abstraction used by the dual sink.

use super::error::CaptureResult;
use super::frame::{FrameSize, VideoFrame};
use crate::store::VideoFormat;
use std::path::Path;

/// Container, dimensions and rate shared by both encoders of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSpec {
    pub format: VideoFormat,
    pub frame_size: FrameSize,
    pub fps: u32,
}

/// One open video file being written frame by frame.
pub trait VideoEncoder: Send {
    fn path(&self) -> &Path;

    fn write_frame(&mut self, frame: &VideoFrame) -> CaptureResult<()>;

    /// Flushes and closes the file. Returns the number of frames written.
    fn finish(self: Box<Self>) -> CaptureResult<u64>;

    /// Stops encoding and removes the partial file.
    fn abort(self: Box<Self>);
}

/// Opens encoders for destination paths.
pub trait EncoderFactory: Send + Sync {
    fn open(&self, path: &Path, spec: &EncoderSpec) -> CaptureResult<Box<dyn VideoEncoder>>;
}
