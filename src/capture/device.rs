//! Pull-based access to the camera and the microphone.

use super::audio::{self, AudioWorker};
use super::camera::{self, CameraWorker};
use super::error::{CaptureError, CaptureResult};
use super::frame::{AudioChunk, FrameSize, VideoFrame, TARGET_FPS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub use super::audio::AudioInputInfo;
pub use super::camera::CameraInfo;

/// Frame and sample acquisition as seen by the capture loop.
///
/// Implementations are moved onto the capture thread for the duration of a
/// recording and handed back to the session when it stops.
pub trait CaptureDevice: Send {
    /// Negotiated camera resolution.
    fn frame_size(&self) -> FrameSize;

    /// Negotiated camera frame rate, which may differ from the requested one.
    fn frame_rate(&self) -> u32;

    /// Opens the audio input stream for a new recording.
    fn start_audio(&mut self) -> CaptureResult<()>;

    /// Blocks until the next video frame is available.
    fn read_frame(&mut self) -> CaptureResult<VideoFrame>;

    /// Blocks until the next fixed-size audio chunk is available.
    fn read_audio_chunk(&mut self) -> CaptureResult<AudioChunk>;

    /// Returns an audio chunk only if one is already queued.
    fn try_read_audio_chunk(&mut self) -> CaptureResult<Option<AudioChunk>>;

    /// Stops and closes the audio input stream. Idempotent.
    fn stop_audio(&mut self);

    /// Releases both devices. Idempotent.
    fn close(&mut self);
}

/// Device selection and read bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    pub camera_index: u32,
    pub fps: u32,
    pub read_timeout: Duration,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            fps: TARGET_FPS,
            read_timeout: Duration::from_secs(3),
        }
    }
}

static HARDWARE_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Process-wide claim on the capture hardware; released on drop.
#[derive(Debug)]
pub(crate) struct HardwareLease(());

impl HardwareLease {
    pub fn acquire() -> CaptureResult<Self> {
        HARDWARE_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(()))
            .map_err(|_| {
                CaptureError::DeviceUnavailable(
                    "camera and microphone are already held by another capture session"
                        .to_string(),
                )
            })
    }
}

impl Drop for HardwareLease {
    fn drop(&mut self) {
        HARDWARE_CLAIMED.store(false, Ordering::Release);
    }
}

/// The default camera and default microphone of this machine.
pub struct DeviceSource {
    camera: Option<CameraWorker>,
    microphone: Option<AudioWorker>,
    frame_size: FrameSize,
    frame_rate: u32,
    read_timeout: Duration,
    lease: Option<HardwareLease>,
}

impl DeviceSource {
    /// Acquires both devices.
    ///
    /// # Errors
    /// - `DeviceUnavailable` if either device cannot be opened, or if another
    ///   `DeviceSource` in this process still holds them
    pub fn open(settings: &DeviceSettings) -> CaptureResult<Self> {
        let lease = HardwareLease::acquire()?;
        let camera = CameraWorker::spawn(settings.camera_index, settings.fps)?;
        let microphone = AudioWorker::spawn()?;

        tracing::info!(
            "Capture devices opened: camera '{}' ({} @ {}fps), microphone '{}'",
            camera.name(),
            camera.frame_size(),
            camera.frame_rate(),
            microphone.device_name()
        );

        Ok(Self {
            frame_size: camera.frame_size(),
            frame_rate: camera.frame_rate(),
            camera: Some(camera),
            microphone: Some(microphone),
            read_timeout: settings.read_timeout,
            lease: Some(lease),
        })
    }

    fn camera(&self) -> CaptureResult<&CameraWorker> {
        self.camera
            .as_ref()
            .ok_or_else(|| CaptureError::DeviceUnavailable("camera is closed".to_string()))
    }

    fn microphone(&mut self) -> CaptureResult<&mut AudioWorker> {
        self.microphone
            .as_mut()
            .ok_or_else(|| CaptureError::DeviceUnavailable("microphone is closed".to_string()))
    }
}

impl CaptureDevice for DeviceSource {
    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn start_audio(&mut self) -> CaptureResult<()> {
        self.camera()?.discard_pending();
        self.microphone()?.start()
    }

    fn read_frame(&mut self) -> CaptureResult<VideoFrame> {
        self.camera()?.next_frame(self.read_timeout)
    }

    fn read_audio_chunk(&mut self) -> CaptureResult<AudioChunk> {
        let timeout = self.read_timeout;
        self.microphone()?.next_chunk(timeout)
    }

    fn try_read_audio_chunk(&mut self) -> CaptureResult<Option<AudioChunk>> {
        self.microphone()?.try_next_chunk()
    }

    fn stop_audio(&mut self) {
        if let Some(microphone) = self.microphone.as_mut() {
            microphone.stop();
        }
    }

    fn close(&mut self) {
        if self.lease.is_none() {
            return;
        }
        // Workers join their threads on drop.
        self.microphone = None;
        self.camera = None;
        self.lease = None;
        tracing::info!("Capture devices released");
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cameras and audio inputs visible to this process.
#[derive(Debug, Clone, Default)]
pub struct DeviceListing {
    pub cameras: Vec<CameraInfo>,
    pub microphones: Vec<AudioInputInfo>,
}

/// Enumerates capture hardware without opening it.
///
/// # Errors
/// - `DeviceUnavailable` if neither backend can be queried
pub fn list_devices() -> CaptureResult<DeviceListing> {
    let cameras = camera::list_cameras();
    let microphones = audio::list_inputs();

    match (cameras, microphones) {
        (Err(camera_err), Err(audio_err)) => Err(CaptureError::DeviceUnavailable(format!(
            "{camera_err}; {audio_err}"
        ))),
        (cameras, microphones) => Ok(DeviceListing {
            cameras: cameras.unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                Vec::new()
            }),
            microphones: microphones.unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                Vec::new()
            }),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_lease_is_exclusive() {
        let first = HardwareLease::acquire().unwrap();
        assert!(matches!(
            HardwareLease::acquire(),
            Err(CaptureError::DeviceUnavailable(_))
        ));

        drop(first);
        let again = HardwareLease::acquire();
        assert!(again.is_ok());
    }

    #[test]
    fn test_default_settings() {
        let settings = DeviceSettings::default();
        assert_eq!(settings.fps, 20);
        assert_eq!(settings.camera_index, 0);
        assert_eq!(settings.read_timeout, Duration::from_secs(3));
    }
}
