//! Fixed capture formats and the buffers that flow from the devices to the sink.

use std::fmt;
use std::time::Instant;

/// Frame rate written into both video containers.
pub const TARGET_FPS: u32 = 20;

pub const AUDIO_CHANNELS: u16 = 2;
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const AUDIO_BITS_PER_SAMPLE: u16 = 16;

/// Sample-frames per audio chunk.
pub const FRAMES_PER_CHUNK: usize = 1024;

/// Interleaved i16 values per audio chunk.
pub const SAMPLES_PER_CHUNK: usize = FRAMES_PER_CHUNK * AUDIO_CHANNELS as usize;

/// Negotiated camera frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of one packed RGB24 frame.
    pub fn rgb24_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One camera frame as packed RGB24 pixels.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub size: FrameSize,
    pub captured_at: Instant,
}

/// One fixed-size block of interleaved stereo i16 samples.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    pub captured_at: Instant,
}

impl AudioChunk {
    /// Number of sample-frames (one value per channel) in the chunk.
    pub fn frames(&self) -> usize {
        self.samples.len() / AUDIO_CHANNELS as usize
    }
}
