//! The recording state machine.
//!
//! A session owns the capture devices for its whole lifetime. Each recording
//! moves the devices, the dual sink and a fresh audio buffer onto a dedicated
//! capture thread; `stop()` joins that thread and gets all three back, so the
//! audio buffer is never shared between threads.

use super::device::CaptureDevice;
use super::encoder::{EncoderFactory, EncoderSpec};
use super::error::{CaptureError, CaptureResult};
use super::frame::{AudioChunk, AUDIO_SAMPLE_RATE};
use super::sink::{self, DualSink};
use crate::store::{RecordingPaths, RecordingTargets};
use chrono::Local;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timestamps tried before giving up on a destination that already holds
/// recordings with the current one.
const TIMESTAMP_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
}

/// What a finished recording produced.
#[derive(Debug)]
pub struct RecordingOutcome {
    pub targets: RecordingTargets,
    /// Frames in the (static, custom) video files.
    pub frames_written: [u64; 2],
    /// Sample-frames in each WAV file.
    pub audio_frames: u64,
    /// Frame rate both videos were encoded at.
    pub fps: u32,
    /// Wall time between start and stop.
    pub elapsed: Duration,
    /// Video duration minus audio duration, in seconds.
    pub drift_secs: f64,
    /// The read or write error that ended the capture loop early, if any.
    pub capture_error: Option<CaptureError>,
}

impl RecordingOutcome {
    /// The (static, custom) video paths.
    pub fn video_paths(&self) -> (&Path, &Path) {
        (&self.targets.static_video, &self.targets.custom_video)
    }

    pub fn video_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames_written[0] as f64 / self.fps.max(1) as f64)
    }

    pub fn audio_duration(&self) -> Duration {
        Duration::from_secs_f64(self.audio_frames as f64 / AUDIO_SAMPLE_RATE as f64)
    }
}

/// Everything the capture thread owned, handed back on join.
struct CaptureRun {
    device: Box<dyn CaptureDevice>,
    sink: DualSink,
    audio: Vec<AudioChunk>,
    error: Option<CaptureError>,
}

struct ActiveRecording {
    targets: RecordingTargets,
    fps: u32,
    stop: Arc<AtomicBool>,
    /// Yields `None` only if the devices never reached the thread.
    handle: JoinHandle<Option<CaptureRun>>,
    started_at: Instant,
}

/// Drives recordings from one set of devices into two destinations.
pub struct CaptureSession {
    paths: RecordingPaths,
    encoders: Box<dyn EncoderFactory>,
    fps: u32,
    device: Option<Box<dyn CaptureDevice>>,
    active: Option<ActiveRecording>,
}

impl CaptureSession {
    /// Creates an idle session. The static destination is created now; the
    /// custom one on each `start()`.
    pub fn new(
        paths: RecordingPaths,
        device: Box<dyn CaptureDevice>,
        encoders: Box<dyn EncoderFactory>,
        fps: u32,
    ) -> CaptureResult<Self> {
        fs::create_dir_all(paths.static_dir())?;
        tracing::debug!("Static destination ready: {}", paths.static_dir().display());

        Ok(Self {
            paths,
            encoders,
            fps,
            device: Some(device),
            active: None,
        })
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Recording
        } else {
            SessionState::Idle
        }
    }

    /// Whether the capture loop of the current recording has already ended on
    /// its own, typically because a device failed. `stop()` is still needed to
    /// finalize the files.
    pub fn capture_finished(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.handle.is_finished())
    }

    /// Starts a new recording and returns the four files it will produce.
    ///
    /// # Errors
    /// - `AlreadyRecording` while a recording is in progress; it is unaffected
    /// - `EncoderInitError` if either destination cannot be opened, or still
    ///   holds files of an earlier recording after a few timestamps
    /// - `DeviceUnavailable` if the audio stream cannot be opened
    pub fn start(&mut self) -> CaptureResult<RecordingTargets> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let mut device = self.device.take().ok_or_else(|| {
            CaptureError::DeviceUnavailable("capture devices were lost".to_string())
        })?;

        let (targets, sink, fps) = match self.prepare(device.as_mut()) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.device = Some(device);
                return Err(e);
            }
        };

        // The thread receives the devices only once it exists, so a failed
        // spawn leaves them here to be recovered.
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let (handoff, inbox) = mpsc::channel::<(Box<dyn CaptureDevice>, DualSink)>();
        let spawned = thread::Builder::new()
            .name("duorec-capture".to_string())
            .spawn(move || {
                inbox
                    .recv()
                    .ok()
                    .map(|(device, sink)| capture_loop(device, sink, thread_stop))
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to spawn capture thread: {}", e);
                self.abandon(device, sink);
                return Err(CaptureError::Io(e));
            }
        };
        if let Err(mpsc::SendError((device, sink))) = handoff.send((device, sink)) {
            tracing::error!("Capture thread exited before it received the devices");
            let _ = handle.join();
            self.abandon(device, sink);
            return Err(CaptureError::CaptureThreadPanicked);
        }

        tracing::info!("Recording started: {}", targets.timestamp);
        self.active = Some(ActiveRecording {
            targets: targets.clone(),
            fps,
            stop,
            handle,
            started_at: Instant::now(),
        });
        Ok(targets)
    }

    fn prepare(
        &self,
        device: &mut dyn CaptureDevice,
    ) -> CaptureResult<(RecordingTargets, DualSink, u32)> {
        let custom_dir = self.paths.custom_dir();
        fs::create_dir_all(custom_dir).map_err(|e| CaptureError::encoder_init(custom_dir, e))?;

        let fps = match device.frame_rate() {
            0 => self.fps,
            negotiated => negotiated,
        };
        if fps != self.fps {
            tracing::warn!("Encoding at the camera's {}fps instead of {}fps", fps, self.fps);
        }

        let targets = self.unused_targets()?;
        let spec = EncoderSpec {
            format: self.paths.format(),
            frame_size: device.frame_size(),
            fps,
        };
        let sink = DualSink::open(self.encoders.as_ref(), &targets, &spec)?;

        if let Err(e) = device.start_audio() {
            sink.abort();
            return Err(e);
        }
        Ok((targets, sink, fps))
    }

    /// Targets named after the current second. While any of the four files
    /// already exists, waits for the next second instead.
    fn unused_targets(&self) -> CaptureResult<RecordingTargets> {
        let mut attempt = 1;
        loop {
            let targets = self.paths.resolve_now();
            let taken = targets
                .videos()
                .into_iter()
                .chain(targets.audios())
                .find(|path| path.exists())
                .map(Path::to_path_buf);

            match taken {
                None => return Ok(targets),
                Some(path) if attempt >= TIMESTAMP_ATTEMPTS => {
                    return Err(CaptureError::encoder_init(
                        path,
                        "a recording with this timestamp already exists",
                    ));
                }
                Some(path) => {
                    tracing::debug!("{} exists, waiting for the next timestamp", path.display());
                    thread::sleep(until_next_second());
                    attempt += 1;
                }
            }
        }
    }

    /// Discards a recording that never started capturing: removes its video
    /// files and keeps the devices for the next `start()`.
    fn abandon(&mut self, mut device: Box<dyn CaptureDevice>, sink: DualSink) {
        sink.abort();
        device.stop_audio();
        self.device = Some(device);
    }

    /// Ends the current recording and finalizes all four files.
    ///
    /// Blocks until the capture thread has exited, which takes at most about
    /// one device read timeout. A device failure that ended the capture loop
    /// early is reported in [`RecordingOutcome::capture_error`]; the files
    /// still hold everything captured up to that point.
    ///
    /// # Errors
    /// - `NotRecording` when idle; no file is touched
    /// - `WriteError` if a file could not be finalized; the session is idle
    /// - `CaptureThreadPanicked` if the capture thread died with the devices
    pub fn stop(&mut self) -> CaptureResult<RecordingOutcome> {
        let active = self.active.take().ok_or(CaptureError::NotRecording)?;

        active.stop.store(true, Ordering::SeqCst);
        let run = match active.handle.join() {
            Ok(Some(run)) => run,
            Ok(None) | Err(_) => {
                tracing::error!("Capture thread panicked; devices are lost");
                return Err(CaptureError::CaptureThreadPanicked);
            }
        };
        let elapsed = active.started_at.elapsed();

        let CaptureRun {
            mut device,
            sink,
            audio,
            error,
        } = run;

        let video = sink.finalize_video();
        device.stop_audio();
        self.device = Some(device);
        let audio_frames = sink::finalize_audio(&audio, &active.targets);

        let frames_written = video?;
        let audio_frames = audio_frames?;

        let outcome = RecordingOutcome {
            targets: active.targets,
            frames_written,
            audio_frames,
            fps: active.fps,
            elapsed,
            drift_secs: 0.0,
            capture_error: error,
        };
        let drift_secs = outcome.video_duration().as_secs_f64()
            - outcome.audio_duration().as_secs_f64();

        tracing::info!(
            "Recording stopped after {:.1}s: {} video frames, {} audio frames, A/V drift {:+.3}s",
            elapsed.as_secs_f64(),
            frames_written[0],
            audio_frames,
            drift_secs
        );
        if let Some(e) = &outcome.capture_error {
            tracing::warn!("Capture loop ended early: {}", e);
        }

        Ok(RecordingOutcome {
            drift_secs,
            ..outcome
        })
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::warn!(
                "Session dropped while recording {}; discarding",
                active.targets.timestamp
            );
            active.stop.store(true, Ordering::SeqCst);
            match active.handle.join() {
                Ok(Some(run)) => self.abandon(run.device, run.sink),
                Ok(None) | Err(_) => tracing::error!("Capture thread panicked during teardown"),
            }
        }

        if let Some(mut device) = self.device.take() {
            device.close();
        }
    }
}

fn until_next_second() -> Duration {
    let nanos = Local::now().timestamp_subsec_nanos().min(999_999_999);
    Duration::from_nanos(u64::from(1_000_000_000 - nanos)) + Duration::from_millis(5)
}

fn capture_loop(
    mut device: Box<dyn CaptureDevice>,
    mut sink: DualSink,
    stop: Arc<AtomicBool>,
) -> CaptureRun {
    let mut audio = Vec::new();
    let mut error = None;
    let mut first_frame_at = None;

    while !stop.load(Ordering::SeqCst) {
        match capture_tick(device.as_mut(), &mut sink, &mut audio) {
            Ok(captured_at) => {
                first_frame_at.get_or_insert(captured_at);
            }
            Err(e) => {
                tracing::error!("Capture loop stopped: {}", e);
                error = Some(e);
                break;
            }
        }
    }

    if let (Some(video_start), Some(chunk)) = (first_frame_at, audio.first()) {
        tracing::debug!(
            "First audio chunk arrived {:?} after the first frame",
            chunk.captured_at.saturating_duration_since(video_start)
        );
    }
    tracing::debug!(
        "Capture loop exited after {} frames and {} audio chunks",
        sink.frames_written(),
        audio.len()
    );
    CaptureRun {
        device,
        sink,
        audio,
        error,
    }
}

/// Moves one frame and the audio queued alongside it into the recording.
/// Returns the capture instant of the frame.
fn capture_tick(
    device: &mut dyn CaptureDevice,
    sink: &mut DualSink,
    audio: &mut Vec<AudioChunk>,
) -> CaptureResult<Instant> {
    let frame = device.read_frame()?;
    sink.write_frame(&frame)?;

    audio.push(device.read_audio_chunk()?);
    while let Some(chunk) = device.try_read_audio_chunk()? {
        audio.push(chunk);
    }
    Ok(frame.captured_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::FRAMES_PER_CHUNK;
    use crate::capture::testing::{FileEncoderFactory, ScriptedDevice};
    use crate::store::VideoFormat;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        _root: tempfile::TempDir,
        static_dir: PathBuf,
        custom_dir: PathBuf,
        closes: Arc<AtomicUsize>,
    }

    fn session_with(device: ScriptedDevice, factory: FileEncoderFactory) -> (CaptureSession, Fixture) {
        let root = tempfile::tempdir().unwrap();
        let static_dir = root.path().join("static");
        let custom_dir = root.path().join("custom");
        let closes = device.closes();
        let paths = RecordingPaths::new(&static_dir, &custom_dir, VideoFormat::Mp4);
        let session = CaptureSession::new(paths, Box::new(device), Box::new(factory), 20).unwrap();
        (
            session,
            Fixture {
                _root: root,
                static_dir,
                custom_dir,
                closes,
            },
        )
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn wait_for_capture_end(session: &CaptureSession) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !session.capture_finished() {
            assert!(Instant::now() < deadline, "capture loop did not end");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_new_creates_static_dir_only() {
        let (session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());
        assert!(fixture.static_dir.is_dir());
        assert!(!fixture.custom_dir.exists());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_stop_produces_four_files() {
        let (mut session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        let targets = session.start().unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        thread::sleep(Duration::from_millis(40));
        let outcome = session.stop().unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(outcome.targets, targets);
        assert!(outcome.capture_error.is_none());

        let expected = vec![
            format!("audio_{}.wav", targets.timestamp),
            format!("video_{}.mp4", targets.timestamp),
        ];
        assert_eq!(file_names(&fixture.static_dir), expected);
        assert_eq!(file_names(&fixture.custom_dir), expected);

        let (static_video, custom_video) = outcome.video_paths();
        assert_eq!(static_video, fixture.static_dir.join(&expected[1]));
        assert_eq!(custom_video, fixture.custom_dir.join(&expected[1]));
    }

    #[test]
    fn test_both_destinations_get_identical_data() {
        let (mut session, _fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        let targets = session.start().unwrap();
        thread::sleep(Duration::from_millis(40));
        let outcome = session.stop().unwrap();

        let [a, b] = outcome.frames_written;
        assert!(a > 0);
        assert_eq!(a, b);
        assert_eq!(
            fs::read(&targets.static_video).unwrap(),
            fs::read(&targets.custom_video).unwrap()
        );

        // One chunk per tick from the scripted device.
        assert_eq!(outcome.audio_frames, a * FRAMES_PER_CHUNK as u64);
        let first = hound::WavReader::open(&targets.static_audio).unwrap();
        let second = hound::WavReader::open(&targets.custom_audio).unwrap();
        assert_eq!(first.spec(), sink::wav_spec());
        assert_eq!(first.spec(), second.spec());
        assert_eq!(first.duration(), second.duration());
        assert_eq!(first.duration() as u64, outcome.audio_frames);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (mut session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        let targets = session.start().unwrap();
        assert!(matches!(session.start(), Err(CaptureError::AlreadyRecording)));
        assert_eq!(session.state(), SessionState::Recording);

        let outcome = session.stop().unwrap();
        assert_eq!(outcome.targets, targets);
        assert_eq!(file_names(&fixture.custom_dir).len(), 2);
    }

    #[test]
    fn test_stop_while_idle_touches_nothing() {
        let (mut session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        assert!(matches!(session.stop(), Err(CaptureError::NotRecording)));
        assert!(file_names(&fixture.static_dir).is_empty());
        assert!(!fixture.custom_dir.exists());
    }

    #[test]
    fn test_session_is_reusable() {
        let (mut session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        let mut timestamps = Vec::new();
        for _ in 0..2 {
            timestamps.push(session.start().unwrap().timestamp);
            thread::sleep(Duration::from_millis(10));
            session.stop().unwrap();
        }

        assert_eq!(session.state(), SessionState::Idle);
        assert_ne!(timestamps[0], timestamps[1]);
        assert_eq!(file_names(&fixture.static_dir).len(), 4);
        assert_eq!(file_names(&fixture.custom_dir).len(), 4);
    }

    #[test]
    fn test_failed_start_keeps_earlier_recording_with_same_timestamp() {
        let root = tempfile::tempdir().unwrap();
        let static_dir = root.path().join("static");
        let other_custom = root.path().join("custom2");

        let mut first = CaptureSession::new(
            RecordingPaths::new(&static_dir, root.path().join("custom1"), VideoFormat::Mp4),
            Box::new(ScriptedDevice::endless()),
            Box::new(FileEncoderFactory::default()),
            20,
        )
        .unwrap();
        let targets = first.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        first.stop().unwrap();
        let recorded = fs::read(&targets.static_video).unwrap();

        // Shares the static directory; its custom destination cannot be opened.
        let mut second = CaptureSession::new(
            RecordingPaths::new(&static_dir, &other_custom, VideoFormat::Mp4),
            Box::new(ScriptedDevice::endless()),
            Box::new(FileEncoderFactory::failing_in(&other_custom)),
            20,
        )
        .unwrap();
        assert!(matches!(second.start(), Err(CaptureError::EncoderInitError { .. })));

        assert_eq!(fs::read(&targets.static_video).unwrap(), recorded);
        assert!(targets.static_audio.exists());
        assert_eq!(file_names(&static_dir).len(), 2);
        assert!(file_names(&other_custom).is_empty());
    }

    #[test]
    fn test_abandoned_start_removes_files_and_keeps_devices() {
        let (mut session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        let mut device = session.device.take().unwrap();
        let (targets, sink, _) = session.prepare(device.as_mut()).unwrap();
        assert!(targets.static_video.exists());
        session.abandon(device, sink);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(file_names(&fixture.static_dir).is_empty());
        assert!(file_names(&fixture.custom_dir).is_empty());

        session.start().unwrap();
        session.stop().unwrap();
        assert_eq!(fixture.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unwritable_custom_destination_fails_start() {
        let root = tempfile::tempdir().unwrap();
        let static_dir = root.path().join("static");
        // A regular file where the custom directory should be.
        let blocker = root.path().join("custom");
        fs::write(&blocker, b"").unwrap();

        let paths = RecordingPaths::new(&static_dir, &blocker, VideoFormat::Mp4);
        let mut session = CaptureSession::new(
            paths,
            Box::new(ScriptedDevice::endless()),
            Box::new(FileEncoderFactory::default()),
            20,
        )
        .unwrap();

        assert!(matches!(session.start(), Err(CaptureError::EncoderInitError { .. })));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(file_names(&static_dir).is_empty());
    }

    #[test]
    fn test_encoder_failure_on_second_destination_leaves_first_empty() {
        let root = tempfile::tempdir().unwrap();
        let custom_dir = root.path().join("custom");
        let factory = FileEncoderFactory::failing_in(&custom_dir);
        let device = ScriptedDevice::endless();
        let starts = device.audio_starts();

        let paths = RecordingPaths::new(root.path().join("static"), &custom_dir, VideoFormat::Avi);
        let mut session = CaptureSession::new(paths, Box::new(device), Box::new(factory), 20).unwrap();

        assert!(matches!(session.start(), Err(CaptureError::EncoderInitError { .. })));
        assert!(file_names(&root.path().join("static")).is_empty());
        assert!(file_names(&custom_dir).is_empty());
        assert_eq!(starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_audio_start_failure_aborts_sink() {
        let (mut session, fixture) =
            session_with(ScriptedDevice::endless().failing_audio(), FileEncoderFactory::default());

        assert!(matches!(session.start(), Err(CaptureError::DeviceUnavailable(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(file_names(&fixture.static_dir).is_empty());
        assert!(file_names(&fixture.custom_dir).is_empty());
    }

    #[test]
    fn test_device_disconnect_still_finalizes() {
        let (mut session, fixture) =
            session_with(ScriptedDevice::disconnecting_after(3), FileEncoderFactory::default());

        session.start().unwrap();
        wait_for_capture_end(&session);
        assert_eq!(session.state(), SessionState::Recording);

        let outcome = session.stop().unwrap();

        assert!(matches!(outcome.capture_error, Some(CaptureError::ReadError(_))));
        assert_eq!(outcome.frames_written, [3, 3]);
        assert_eq!(outcome.audio_frames, 3 * FRAMES_PER_CHUNK as u64);
        assert_eq!(file_names(&fixture.static_dir).len(), 2);
        assert_eq!(file_names(&fixture.custom_dir).len(), 2);
    }

    #[test]
    fn test_write_failure_ends_capture_and_still_finalizes() {
        let (mut session, fixture) =
            session_with(ScriptedDevice::endless(), FileEncoderFactory::failing_write_after(4));

        session.start().unwrap();
        wait_for_capture_end(&session);
        let outcome = session.stop().unwrap();

        assert!(matches!(outcome.capture_error, Some(CaptureError::WriteError { .. })));
        let [a, b] = outcome.frames_written;
        assert_eq!(a, 4);
        assert!(a.abs_diff(b) <= 1);
        assert_eq!(outcome.audio_frames, 4 * FRAMES_PER_CHUNK as u64);
        assert_eq!(file_names(&fixture.static_dir).len(), 2);
        assert_eq!(file_names(&fixture.custom_dir).len(), 2);
    }

    #[test]
    fn test_read_timeout_ends_capture_and_still_finalizes() {
        let (mut session, fixture) =
            session_with(ScriptedDevice::stalling_after(5), FileEncoderFactory::default());

        session.start().unwrap();
        wait_for_capture_end(&session);
        let outcome = session.stop().unwrap();

        assert!(matches!(outcome.capture_error, Some(CaptureError::ReadTimeout(_))));
        assert!(outcome.capture_error.as_ref().unwrap().is_device_failure());
        assert_eq!(outcome.frames_written, [5, 5]);
        assert_eq!(outcome.audio_frames, 5 * FRAMES_PER_CHUNK as u64);
        assert_eq!(file_names(&fixture.static_dir).len(), 2);
        assert_eq!(file_names(&fixture.custom_dir).len(), 2);
    }

    #[test]
    fn test_videos_use_negotiated_frame_rate() {
        let (mut session, _fixture) = session_with(
            ScriptedDevice::disconnecting_after(30).with_frame_rate(30),
            FileEncoderFactory::default(),
        );

        session.start().unwrap();
        wait_for_capture_end(&session);
        let outcome = session.stop().unwrap();

        assert_eq!(outcome.fps, 30);
        assert_eq!(outcome.frames_written, [30, 30]);
        assert!((outcome.video_duration().as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_while_recording_discards_everything() {
        let (mut session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        session.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(session);

        assert!(file_names(&fixture.static_dir).is_empty());
        assert!(file_names(&fixture.custom_dir).is_empty());
        assert_eq!(fixture.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes_device_once() {
        let (mut session, fixture) = session_with(ScriptedDevice::endless(), FileEncoderFactory::default());

        session.start().unwrap();
        session.stop().unwrap();
        drop(session);

        assert_eq!(fixture.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drift_is_measured() {
        let (mut session, _fixture) =
            session_with(ScriptedDevice::disconnecting_after(20), FileEncoderFactory::default());

        session.start().unwrap();
        wait_for_capture_end(&session);
        let outcome = session.stop().unwrap();

        // 20 frames at 20fps is 1s of video; 20 chunks of 1024 frames at 44.1kHz is ~0.464s.
        let expected = 1.0 - (20.0 * 1024.0 / 44_100.0);
        assert!((outcome.drift_secs - expected).abs() < 1e-6);
    }
}
