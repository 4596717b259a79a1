//! Microphone capture.
//!
//! The cpal input stream is not `Send`, so it is built and owned by a dedicated
//! worker thread. The worker takes start/stop commands over a channel and the
//! stream callback pushes fixed-size stereo i16 chunks back to the reader.
//! Audio is always delivered as 2 channels, 16-bit, 44.1 kHz regardless of the
//! device's native layout.

use super::error::{CaptureError, CaptureResult};
use super::frame::{AudioChunk, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE, SAMPLES_PER_CHUNK};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

enum AudioCommand {
    Start(Sender<CaptureResult<()>>),
    Stop(Sender<()>),
    Shutdown,
}

enum AudioMessage {
    Chunk(AudioChunk),
    Failed(String),
}

/// Handle to the thread that owns the default audio input device.
pub(crate) struct AudioWorker {
    commands: Sender<AudioCommand>,
    chunks: Receiver<AudioMessage>,
    handle: Option<JoinHandle<()>>,
    device_name: String,
    streaming: bool,
}

impl AudioWorker {
    /// Acquires the default input device and checks it can deliver 44.1 kHz.
    ///
    /// The stream itself is not opened until [`AudioWorker::start`].
    pub fn spawn() -> CaptureResult<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel();
        let (init_tx, init_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("duorec-audio".to_string())
            .spawn(move || run_worker(command_rx, chunk_tx, init_tx))
            .map_err(|e| CaptureError::DeviceUnavailable(format!("audio worker: {e}")))?;

        match init_rx.recv() {
            Ok(Ok(device_name)) => Ok(Self {
                commands: command_tx,
                chunks: chunk_rx,
                handle: Some(handle),
                device_name,
                streaming: false,
            }),
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(CaptureError::DeviceUnavailable(reason))
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::DeviceUnavailable(
                    "audio worker exited during startup".to_string(),
                ))
            }
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Opens and plays the input stream. Chunks left over from a previous
    /// recording are discarded first.
    pub fn start(&mut self) -> CaptureResult<()> {
        if self.streaming {
            return Ok(());
        }
        while self.chunks.try_recv().is_ok() {}

        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(AudioCommand::Start(reply_tx))
            .map_err(|_| CaptureError::DeviceUnavailable("audio worker is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::DeviceUnavailable("audio worker is gone".to_string()))??;

        self.streaming = true;
        tracing::debug!("Audio stream started on {}", self.device_name);
        Ok(())
    }

    /// Stops and closes the input stream. Safe to call when not streaming.
    pub fn stop(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;

        let (reply_tx, reply_rx) = mpsc::channel();
        if self.commands.send(AudioCommand::Stop(reply_tx)).is_ok() {
            let _ = reply_rx.recv();
        }
        tracing::debug!("Audio stream stopped");
    }

    /// Blocks until one chunk is available or `timeout` elapses.
    pub fn next_chunk(&self, timeout: Duration) -> CaptureResult<AudioChunk> {
        match self.chunks.recv_timeout(timeout) {
            Ok(AudioMessage::Chunk(chunk)) => Ok(chunk),
            Ok(AudioMessage::Failed(reason)) => Err(CaptureError::ReadError(reason)),
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::ReadTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CaptureError::ReadError("audio stream closed".to_string()))
            }
        }
    }

    /// Returns an already-queued chunk without blocking.
    pub fn try_next_chunk(&self) -> CaptureResult<Option<AudioChunk>> {
        match self.chunks.try_recv() {
            Ok(AudioMessage::Chunk(chunk)) => Ok(Some(chunk)),
            Ok(AudioMessage::Failed(reason)) => Err(CaptureError::ReadError(reason)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(CaptureError::ReadError("audio stream closed".to_string()))
            }
        }
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        self.stop();
        let _ = self.commands.send(AudioCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Audio worker thread panicked");
            }
        }
    }
}

fn run_worker(
    commands: Receiver<AudioCommand>,
    chunks: Sender<AudioMessage>,
    init: Sender<Result<String, String>>,
) {
    let opened = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| "No audio input device available".to_string())?;
        let (config, format) = select_stream_config(&device)?;
        Ok((device, config, format))
    });

    let (device, config, format) = match opened {
        Ok(opened) => opened,
        Err(reason) => {
            tracing::error!("Failed to open audio input: {}", reason);
            let _ = init.send(Err(reason));
            return;
        }
    };

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!(
        "Audio device: {} ({} channels, {:?} @ {}Hz)",
        device_name,
        config.channels,
        format,
        config.sample_rate.0
    );
    if init.send(Ok(device_name)).is_err() {
        return;
    }

    let mut stream: Option<cpal::Stream> = None;
    for command in commands {
        match command {
            AudioCommand::Start(reply) => {
                let result = match stream {
                    Some(_) => Ok(()),
                    None => open_stream(&device, &config, format, chunks.clone()).map(|s| {
                        stream = Some(s);
                    }),
                };
                let _ = reply.send(result);
            }
            AudioCommand::Stop(reply) => {
                if let Some(active) = stream.take() {
                    if let Err(e) = active.pause() {
                        tracing::debug!("Failed to pause audio stream: {}", e);
                    }
                }
                let _ = reply.send(());
            }
            AudioCommand::Shutdown => break,
        }
    }
    drop(stream);
    tracing::debug!("Audio worker exited");
}

/// Picks an input configuration that runs at 44.1 kHz, preferring stereo and
/// native i16 samples.
fn select_stream_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), String> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| format!("Failed to query audio input configurations: {e}"))?;

    let rate = cpal::SampleRate(AUDIO_SAMPLE_RATE);
    let best = ranges
        .filter(|range| range.min_sample_rate() <= rate && range.max_sample_rate() >= rate)
        .filter(|range| is_supported_format(range.sample_format()))
        .max_by_key(|range| {
            let stereo = u8::from(range.channels() == AUDIO_CHANNELS) * 2;
            let native = u8::from(range.sample_format() == SampleFormat::I16);
            stereo + native
        })
        .ok_or_else(|| {
            format!("Audio input device does not support {AUDIO_SAMPLE_RATE}Hz capture")
        })?;

    let supported = best.with_sample_rate(rate);
    Ok((supported.config(), supported.sample_format()))
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::I16 | SampleFormat::U16 | SampleFormat::F32
    )
}

fn open_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    chunks: Sender<AudioMessage>,
) -> CaptureResult<cpal::Stream> {
    let stream = match format {
        SampleFormat::I16 => build_stream::<i16>(device, config, chunks),
        SampleFormat::U16 => build_stream::<u16>(device, config, chunks),
        SampleFormat::F32 => build_stream::<f32>(device, config, chunks),
        other => {
            return Err(CaptureError::DeviceUnavailable(format!(
                "unsupported audio sample format {other:?}"
            )))
        }
    }
    .map_err(|e| CaptureError::DeviceUnavailable(format!("Failed to open audio stream: {e}")))?;

    stream
        .play()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("Failed to start audio stream: {e}")))?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    chunks: Sender<AudioMessage>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = config.channels as usize;
    let error_tx = chunks.clone();
    let mut assembler = ChunkAssembler::new();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let stereo = to_stereo_i16(data, channels);
            for chunk in assembler.push(&stereo) {
                let _ = chunks.send(AudioMessage::Chunk(chunk));
            }
        },
        move |err| {
            tracing::error!("Audio stream error: {}", err);
            let _ = error_tx.send(AudioMessage::Failed(err.to_string()));
        },
        None,
    )
}

/// Converts interleaved device samples to interleaved stereo i16.
///
/// Mono input is duplicated into both channels; inputs with more than two
/// channels keep the first two.
pub(crate) fn to_stereo_i16<T>(data: &[T], channels: usize) -> Vec<i16>
where
    T: Sample,
    i16: FromSample<T>,
{
    let channels = channels.max(1);
    let mut stereo = Vec::with_capacity(data.len() / channels * 2);

    for frame in data.chunks_exact(channels) {
        let left = i16::from_sample(frame[0]);
        let right = if channels == 1 {
            left
        } else {
            i16::from_sample(frame[1])
        };
        stereo.push(left);
        stereo.push(right);
    }
    stereo
}

/// Re-blocks arbitrary callback buffers into chunks of exactly
/// [`SAMPLES_PER_CHUNK`] values.
pub(crate) struct ChunkAssembler {
    pending: Vec<i16>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(SAMPLES_PER_CHUNK * 2),
        }
    }

    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioChunk> {
        self.pending.extend_from_slice(samples);

        let mut ready = Vec::new();
        while self.pending.len() >= SAMPLES_PER_CHUNK {
            let rest = self.pending.split_off(SAMPLES_PER_CHUNK);
            let samples = std::mem::replace(&mut self.pending, rest);
            ready.push(AudioChunk {
                samples,
                captured_at: Instant::now(),
            });
        }
        ready
    }
}

/// An audio input device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInputInfo {
    pub name: String,
    pub is_default: bool,
    /// Default sample rate and channel count, when the device reports them.
    pub default_config: Option<(u32, u16)>,
}

/// Enumerates the audio input devices of the default host.
pub(crate) fn list_inputs() -> Result<Vec<AudioInputInfo>, String> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| format!("Failed to enumerate audio devices: {e}"))?;

        Ok(devices
            .filter_map(|device| {
                // Devices that cannot report a name are not usable.
                let name = device.name().ok()?;
                let default_config = device
                    .default_input_config()
                    .ok()
                    .map(|config| (config.sample_rate().0, config.channels()));
                Some(AudioInputInfo {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    default_config,
                })
            })
            .collect())
    })
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String>,
{
    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        return f();
    };

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String>,
{
    f()
}
