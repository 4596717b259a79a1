//! Synchronized camera and microphone capture into two destinations.

mod audio;
mod camera;
pub mod device;
pub mod encoder;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod session;
pub mod sink;

pub use device::{list_devices, DeviceSettings, DeviceSource};
pub use error::{CaptureError, CaptureResult};
pub use ffmpeg::FfmpegEncoderFactory;
pub use frame::TARGET_FPS;
pub use session::{CaptureSession, RecordingOutcome};

/// Fake devices and encoders for exercising the session without hardware.
#[cfg(test)]
pub(crate) mod testing {
    use super::device::CaptureDevice;
    use super::encoder::{EncoderFactory, EncoderSpec, VideoEncoder};
    use super::error::{CaptureError, CaptureResult};
    use super::frame::{AudioChunk, FrameSize, VideoFrame, SAMPLES_PER_CHUNK, TARGET_FPS};
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    const SIZE: FrameSize = FrameSize { width: 4, height: 2 };

    /// How a scripted camera behaves once its frames run out.
    #[derive(Clone, Copy)]
    enum FrameEnd {
        Unplugged,
        Stalled,
    }

    /// Produces 4x2 frames and one audio chunk per frame.
    pub struct ScriptedDevice {
        frames_left: Option<usize>,
        frame_end: FrameEnd,
        frame_rate: u32,
        fail_start_audio: bool,
        closes: Arc<AtomicUsize>,
        audio_starts: Arc<AtomicUsize>,
    }

    impl ScriptedDevice {
        /// Produces frames until stopped, pacing itself slightly.
        pub fn endless() -> Self {
            Self {
                frames_left: None,
                frame_end: FrameEnd::Unplugged,
                frame_rate: TARGET_FPS,
                fail_start_audio: false,
                closes: Arc::new(AtomicUsize::new(0)),
                audio_starts: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Produces `frames` frames, then reports an unplugged camera.
        pub fn disconnecting_after(frames: usize) -> Self {
            Self {
                frames_left: Some(frames),
                ..Self::endless()
            }
        }

        /// Produces `frames` frames, then times out on every read.
        pub fn stalling_after(frames: usize) -> Self {
            Self {
                frames_left: Some(frames),
                frame_end: FrameEnd::Stalled,
                ..Self::endless()
            }
        }

        /// Reports `fps` as the negotiated camera rate.
        pub fn with_frame_rate(mut self, fps: u32) -> Self {
            self.frame_rate = fps;
            self
        }

        pub fn failing_audio(mut self) -> Self {
            self.fail_start_audio = true;
            self
        }

        pub fn closes(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.closes)
        }

        pub fn audio_starts(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.audio_starts)
        }
    }

    impl CaptureDevice for ScriptedDevice {
        fn frame_size(&self) -> FrameSize {
            SIZE
        }

        fn frame_rate(&self) -> u32 {
            self.frame_rate
        }

        fn start_audio(&mut self) -> CaptureResult<()> {
            if self.fail_start_audio {
                return Err(CaptureError::DeviceUnavailable("no microphone".to_string()));
            }
            self.audio_starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn read_frame(&mut self) -> CaptureResult<VideoFrame> {
            match self.frames_left.as_mut() {
                Some(0) => {
                    return Err(match self.frame_end {
                        FrameEnd::Unplugged => CaptureError::ReadError("camera unplugged".to_string()),
                        FrameEnd::Stalled => CaptureError::ReadTimeout(Duration::from_millis(50)),
                    })
                }
                Some(left) => *left -= 1,
                None => thread::sleep(Duration::from_millis(2)),
            }
            Ok(VideoFrame {
                data: vec![0x40; SIZE.rgb24_len()],
                size: SIZE,
                captured_at: Instant::now(),
            })
        }

        fn read_audio_chunk(&mut self) -> CaptureResult<AudioChunk> {
            Ok(AudioChunk {
                samples: vec![100; SAMPLES_PER_CHUNK],
                captured_at: Instant::now(),
            })
        }

        fn try_read_audio_chunk(&mut self) -> CaptureResult<Option<AudioChunk>> {
            Ok(None)
        }

        fn stop_audio(&mut self) {}

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Writes raw frame bytes straight to the destination file.
    #[derive(Default)]
    pub struct FileEncoderFactory {
        failing_dir: Option<PathBuf>,
        write_limit: Option<u64>,
    }

    impl FileEncoderFactory {
        /// Fails to open any encoder whose file is inside `dir`.
        pub fn failing_in(dir: impl Into<PathBuf>) -> Self {
            Self {
                failing_dir: Some(dir.into()),
                ..Self::default()
            }
        }

        /// Opens encoders that reject every frame after the first `frames`.
        pub fn failing_write_after(frames: u64) -> Self {
            Self {
                write_limit: Some(frames),
                ..Self::default()
            }
        }
    }

    impl EncoderFactory for FileEncoderFactory {
        fn open(&self, path: &Path, _spec: &EncoderSpec) -> CaptureResult<Box<dyn VideoEncoder>> {
            if self.failing_dir.as_deref() == path.parent() {
                return Err(CaptureError::encoder_init(path, "codec unavailable"));
            }
            let file = File::create(path).map_err(|e| CaptureError::encoder_init(path, e))?;
            Ok(Box::new(FileEncoder {
                path: path.to_path_buf(),
                file,
                frames: 0,
                write_limit: self.write_limit,
            }))
        }
    }

    struct FileEncoder {
        path: PathBuf,
        file: File,
        frames: u64,
        write_limit: Option<u64>,
    }

    impl VideoEncoder for FileEncoder {
        fn path(&self) -> &Path {
            &self.path
        }

        fn write_frame(&mut self, frame: &VideoFrame) -> CaptureResult<()> {
            if self.write_limit.is_some_and(|limit| self.frames >= limit) {
                return Err(CaptureError::write(&self.path, "disk full"));
            }
            self.file
                .write_all(&frame.data)
                .map_err(|e| CaptureError::write(&self.path, e))?;
            self.frames += 1;
            Ok(())
        }

        fn finish(mut self: Box<Self>) -> CaptureResult<u64> {
            self.file.flush().map_err(|e| CaptureError::write(&self.path, e))?;
            Ok(self.frames)
        }

        fn abort(self: Box<Self>) {
            let FileEncoder { path, file, .. } = *self;
            drop(file);
            let _ = fs::remove_file(path);
        }
    }
}
