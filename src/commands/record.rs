//! Video and audio recording.
//!
//! Opens the devices, records until Enter, Ctrl-C, a time limit or a device
//! failure, then finalizes both destinations and prints where the files went.

use crate::capture::{CaptureSession, DeviceSource, FfmpegEncoderFactory, RecordingOutcome};
use crate::commands::play::preview;
use crate::config::ConfigFile;
use crate::store::{default_static_dir, RecordingPaths};
use std::future;
use std::io;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Enter,
    Interrupt,
    TimeLimit,
    CaptureEnded,
}

/// Records one session into both destinations.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If ffmpeg or the capture devices are unavailable
/// - If either destination cannot be opened or finalized
pub async fn handle_record(duration: Option<u64>, open_preview: bool) -> Result<(), anyhow::Error> {
    tracing::info!("=== duorec recording ===");

    let config_file = ConfigFile::open().inspect_err(|e| {
        tracing::error!("Failed to load configuration: {e}");
    })?;
    let config = config_file.config().clone();
    let settings = config.capture.device_settings();
    let paths = RecordingPaths::new(
        default_static_dir(),
        &config.custom_save_path,
        config.video_format,
    );

    tracing::info!(
        "Configuration loaded: static={}, custom={}, format={}, fps={}, read_timeout={:?}",
        paths.static_dir().display(),
        paths.custom_dir().display(),
        paths.format(),
        settings.fps,
        settings.read_timeout
    );

    let (mut session, targets) = tokio::task::spawn_blocking(move || {
        let encoders = FfmpegEncoderFactory::locate()?;
        tracing::debug!("Using ffmpeg at {}", encoders.ffmpeg().display());
        let device = DeviceSource::open(&settings)?;
        let mut session =
            CaptureSession::new(paths, Box::new(device), Box::new(encoders), settings.fps)?;
        let targets = session.start()?;
        Ok::<_, anyhow::Error>((session, targets))
    })
    .await??;

    println!("Recording {}", targets.timestamp);
    println!("  {}", targets.static_video.display());
    println!("  {}", targets.custom_video.display());
    match duration {
        Some(secs) => println!("Press Enter or Ctrl-C to stop (stops by itself after {secs}s)."),
        None => println!("Press Enter or Ctrl-C to stop."),
    }

    let reason = wait_for_stop(&session, duration.map(Duration::from_secs)).await;
    tracing::info!("Stopping recording ({:?}): {:?}", session.state(), reason);
    if reason == StopReason::CaptureEnded {
        println!("Capture ended unexpectedly, saving what was recorded...");
    } else {
        println!("Saving...");
    }

    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = session.stop();
        drop(session);
        outcome
    })
    .await?
    .inspect_err(|e| tracing::error!("Failed to finalize recording: {e}"))?;

    print_outcome(&outcome);

    if open_preview {
        let (_, custom_video) = outcome.video_paths();
        preview(custom_video).await?;
    }

    Ok(())
}

async fn wait_for_stop(session: &CaptureSession, limit: Option<Duration>) -> StopReason {
    let interrupt = tokio::signal::ctrl_c();
    let enter = enter_pressed();
    let time_limit = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => future::pending().await,
        }
    };
    tokio::pin!(interrupt, enter, time_limit);

    let mut poll = tokio::time::interval(CAPTURE_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut interrupt => return StopReason::Interrupt,
            _ = &mut enter => return StopReason::Enter,
            _ = &mut time_limit => return StopReason::TimeLimit,
            _ = poll.tick() => {
                if session.capture_finished() {
                    return StopReason::CaptureEnded;
                }
            }
        }
    }
}

/// Resolves when a line is read from stdin. Never resolves if stdin is closed.
async fn enter_pressed() {
    let (tx, rx) = oneshot::channel();
    // A plain thread, so an unanswered read does not hold up runtime shutdown.
    let spawned = thread::Builder::new()
        .name("duorec-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            if matches!(io::stdin().read_line(&mut line), Ok(n) if n > 0) {
                let _ = tx.send(());
            }
        });

    if spawned.is_err() || rx.await.is_err() {
        future::pending::<()>().await;
    }
}

fn print_outcome(outcome: &RecordingOutcome) {
    let targets = &outcome.targets;
    println!();
    println!(
        "Saved recording {} ({:.1}s)",
        targets.timestamp,
        outcome.elapsed.as_secs_f64()
    );
    for path in targets.videos().into_iter().chain(targets.audios()) {
        println!("  {}", path.display());
    }
    println!(
        "  {} frames ({:.1}s video), {:.1}s audio, A/V drift {:+.2}s",
        outcome.frames_written[0],
        outcome.video_duration().as_secs_f64(),
        outcome.audio_duration().as_secs_f64(),
        outcome.drift_secs
    );
    match &outcome.capture_error {
        Some(e) if e.is_device_failure() => {
            println!("  Recording ended early, a capture device stopped: {e}");
        }
        Some(e) => println!("  Recording ended early: {e}"),
        None => {}
    }
}
