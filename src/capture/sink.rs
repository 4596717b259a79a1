//! Writes one recording to two destinations at once.
//!
//! Video goes to both encoders frame by frame while recording. Audio is
//! buffered by the capture loop and written to both WAV files after stop.

use super::encoder::{EncoderFactory, EncoderSpec, VideoEncoder};
use super::error::{CaptureError, CaptureResult};
use super::frame::{AudioChunk, VideoFrame, AUDIO_BITS_PER_SAMPLE, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};
use crate::store::RecordingTargets;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Format of both WAV files.
pub fn wav_spec() -> WavSpec {
    WavSpec {
        channels: AUDIO_CHANNELS,
        sample_rate: AUDIO_SAMPLE_RATE,
        bits_per_sample: AUDIO_BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

/// The (static, custom) pair of video encoders of one recording.
pub struct DualSink {
    encoders: [Box<dyn VideoEncoder>; 2],
    frames_written: u64,
}

impl DualSink {
    /// Opens both video encoders with identical settings.
    ///
    /// # Errors
    /// - `EncoderInitError` if either destination cannot be opened; no file of
    ///   this recording is left behind
    pub fn open(
        factory: &dyn EncoderFactory,
        targets: &RecordingTargets,
        spec: &EncoderSpec,
    ) -> CaptureResult<Self> {
        let [static_video, custom_video] = targets.videos();

        let first = open_one(factory, static_video, spec)?;
        let second = match open_one(factory, custom_video, spec) {
            Ok(encoder) => encoder,
            Err(e) => {
                tracing::error!("Second destination failed, aborting first: {}", e);
                first.abort();
                return Err(e);
            }
        };

        tracing::info!(
            "Dual sink opened: {} and {} ({} {} @ {}fps)",
            first.path().display(),
            second.path().display(),
            spec.format,
            spec.frame_size,
            spec.fps
        );

        Ok(Self {
            encoders: [first, second],
            frames_written: 0,
        })
    }

    /// Writes `frame` to both encoders, static first.
    pub fn write_frame(&mut self, frame: &VideoFrame) -> CaptureResult<()> {
        for encoder in self.encoders.iter_mut() {
            encoder.write_frame(frame)?;
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Frames written to both destinations.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Closes both encoders. Returns per-destination frame counts.
    ///
    /// Both are closed before the first error, if any, is reported.
    pub fn finalize_video(self) -> CaptureResult<[u64; 2]> {
        let [first, second] = self.encoders;
        let first = first.finish();
        let second = second.finish();
        Ok([first?, second?])
    }

    /// Stops both encoders and removes their files.
    pub fn abort(self) {
        for encoder in self.encoders {
            encoder.abort();
        }
        tracing::info!("Dual sink aborted, partial video files removed");
    }
}

fn open_one(
    factory: &dyn EncoderFactory,
    path: &Path,
    spec: &EncoderSpec,
) -> CaptureResult<Box<dyn VideoEncoder>> {
    // Creating the file up front makes an unwritable destination fail now
    // instead of inside the encoder process. An existing file belongs to
    // another recording and is never opened.
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| CaptureError::encoder_init(path, e))?;

    factory.open(path, spec).inspect_err(|_| {
        let _ = fs::remove_file(path);
    })
}

/// Writes the buffered audio to both WAV destinations.
///
/// Returns the number of sample-frames in each file. Both destinations are
/// attempted; the first failure is returned.
pub fn finalize_audio(chunks: &[AudioChunk], targets: &RecordingTargets) -> CaptureResult<u64> {
    let [static_audio, custom_audio] = targets.audios();
    let first = write_wav(static_audio, chunks);
    let second = write_wav(custom_audio, chunks);
    let frames = first?;
    second?;
    Ok(frames)
}

fn part_path(path: &Path) -> PathBuf {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Writes `chunks` to `<path>.part` and renames it into place once the header
/// has been finalized.
fn write_wav(path: &Path, chunks: &[AudioChunk]) -> CaptureResult<u64> {
    let part = part_path(path);
    let result = write_wav_part(&part, chunks).and_then(|frames| {
        fs::rename(&part, path).map_err(|e| CaptureError::write(path, e))?;
        Ok(frames)
    });

    match &result {
        Ok(frames) => tracing::info!("Wrote {} audio frames to {}", frames, path.display()),
        Err(e) => {
            tracing::error!("Failed to write audio {}: {}", path.display(), e);
            let _ = fs::remove_file(&part);
        }
    }
    result
}

fn write_wav_part(part: &Path, chunks: &[AudioChunk]) -> CaptureResult<u64> {
    let mut writer = WavWriter::create(part, wav_spec()).map_err(|e| CaptureError::write(part, e))?;

    let mut frames = 0u64;
    for chunk in chunks {
        let mut samples = writer.get_i16_writer(chunk.samples.len() as u32);
        for &sample in &chunk.samples {
            samples.write_sample(sample);
        }
        samples.flush().map_err(|e| CaptureError::write(part, e))?;
        frames += chunk.frames() as u64;
    }

    writer.finalize().map_err(|e| CaptureError::write(part, e))?;
    Ok(frames)
}
