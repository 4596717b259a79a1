//! Camera capture using nokhwa.
//!
//! `nokhwa::Camera` cannot leave the thread that opened it, so a worker thread
//! owns the camera, decodes each frame to RGB24 and hands it over a small
//! bounded queue. When nobody is reading (between recordings) the queue fills
//! up and further frames are dropped.

use super::error::{CaptureError, CaptureResult};
use super::frame::{FrameSize, VideoFrame};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const FRAME_QUEUE_CAPACITY: usize = 4;

/// What the worker reports once the stream is running.
struct OpenedCamera {
    name: String,
    frame_size: FrameSize,
    frame_rate: u32,
}

enum CameraMessage {
    Frame(VideoFrame),
    Failed(String),
}

/// Handle to the thread that owns the camera.
pub(crate) struct CameraWorker {
    frames: Receiver<CameraMessage>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    frame_size: FrameSize,
    frame_rate: u32,
    name: String,
}

impl CameraWorker {
    /// Opens camera `index` and starts streaming. Returns once the camera has
    /// reported its negotiated resolution and frame rate.
    pub fn spawn(index: u32, fps: u32) -> CaptureResult<Self> {
        let (init_tx, init_rx) = mpsc::channel();
        let (frame_tx, frame_rx) = mpsc::sync_channel(FRAME_QUEUE_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("duorec-camera".to_string())
            .spawn(move || run_camera(index, fps, init_tx, frame_tx, thread_running))
            .map_err(|e| CaptureError::DeviceUnavailable(format!("camera worker: {e}")))?;

        match init_rx.recv() {
            Ok(Ok(opened)) => Ok(Self {
                frames: frame_rx,
                running,
                handle: Some(handle),
                frame_size: opened.frame_size,
                frame_rate: opened.frame_rate,
                name: opened.name,
            }),
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(CaptureError::DeviceUnavailable(reason))
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::DeviceUnavailable(
                    "camera worker exited during startup".to_string(),
                ))
            }
        }
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drops frames captured before the caller started reading.
    pub fn discard_pending(&self) {
        let mut dropped = 0usize;
        while let Ok(CameraMessage::Frame(_)) = self.frames.try_recv() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::trace!("Discarded {} stale camera frames", dropped);
        }
    }

    pub fn next_frame(&self, timeout: Duration) -> CaptureResult<VideoFrame> {
        match self.frames.recv_timeout(timeout) {
            Ok(CameraMessage::Frame(frame)) => Ok(frame),
            Ok(CameraMessage::Failed(reason)) => Err(CaptureError::ReadError(reason)),
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::ReadTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::EndOfStream),
        }
    }
}

impl Drop for CameraWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Camera worker thread panicked");
            }
        }
    }
}

/// A camera as reported by the platform backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub index: String,
    pub name: String,
    pub description: String,
}

pub(crate) fn list_cameras() -> Result<Vec<CameraInfo>, String> {
    let cameras =
        nokhwa::query(ApiBackend::Auto).map_err(|e| format!("Failed to enumerate cameras: {e}"))?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraInfo {
            index: match info.index() {
                CameraIndex::Index(i) => i.to_string(),
                CameraIndex::String(s) => s.clone(),
            },
            name: info.human_name(),
            description: info.description().to_string(),
        })
        .collect())
}

fn open_camera(index: u32, fps: u32) -> Result<Camera, String> {
    let camera_index = CameraIndex::Index(index);

    // Prefer the target rate; fall back to whatever the device offers.
    let preferred = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestFrameRate(fps));
    let mut camera = match Camera::new(camera_index.clone(), preferred) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::debug!("Camera has no {}fps mode ({}), using device default", fps, e);
            let fallback = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
            Camera::new(camera_index.clone(), fallback)
                .map_err(|e| format!("Failed to open camera {camera_index:?}: {e}"))?
        }
    };

    camera
        .open_stream()
        .map_err(|e| format!("Failed to open camera stream: {e}"))?;
    Ok(camera)
}

fn run_camera(
    index: u32,
    fps: u32,
    init: Sender<Result<OpenedCamera, String>>,
    frames: SyncSender<CameraMessage>,
    running: Arc<AtomicBool>,
) {
    let mut camera = match open_camera(index, fps) {
        Ok(camera) => camera,
        Err(reason) => {
            tracing::error!("{}", reason);
            let _ = init.send(Err(reason));
            return;
        }
    };

    let resolution = camera.resolution();
    let frame_size = FrameSize::new(resolution.width(), resolution.height());
    let name = camera.info().human_name();
    let frame_rate = camera.frame_rate();
    tracing::info!(
        "Camera opened: {} at {} @ {}fps (format {:?})",
        name,
        frame_size,
        frame_rate,
        camera.frame_format()
    );
    if frame_rate != fps {
        tracing::warn!("Camera runs at {}fps instead of {}fps; videos use the camera rate", frame_rate, fps);
    }
    let opened = OpenedCamera {
        name,
        frame_size,
        frame_rate,
    };
    if init.send(Ok(opened)).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    let mut dropped = 0u64;
    while running.load(Ordering::SeqCst) {
        let message = match camera.frame() {
            Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                Ok(image) => {
                    let size = FrameSize::new(image.width(), image.height());
                    CameraMessage::Frame(VideoFrame {
                        data: image.into_raw(),
                        size,
                        captured_at: Instant::now(),
                    })
                }
                Err(e) => {
                    tracing::debug!("Failed to decode camera frame: {}", e);
                    continue;
                }
            },
            Err(e) => {
                tracing::error!("Camera read failed: {}", e);
                let _ = frames.try_send(CameraMessage::Failed(e.to_string()));
                break;
            }
        };

        match frames.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => dropped += 1,
            Err(TrySendError::Disconnected(_)) => break,
        }
    }

    if dropped > 0 {
        tracing::debug!("Camera dropped {} frames while nobody was reading", dropped);
    }
    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {}", e);
    }
    tracing::debug!("Camera worker exited");
}
