//! Delete a recording's video and paired audio file.

use crate::store;
use std::path::Path;

/// Deletes `video` and the `audio_<timestamp>.wav` next to it.
///
/// Only the given directory is touched; the copy in the other destination
/// stays.
///
/// # Errors
/// - If the file name does not follow the recording naming scheme
/// - If the video file does not exist or cannot be removed
pub fn handle_delete(video: &Path) -> Result<(), anyhow::Error> {
    let deleted = store::delete_artifact(video).inspect_err(|e| {
        tracing::error!("Failed to delete {}: {e}", video.display());
    })?;

    println!("Deleted {}", deleted.video.display());
    match deleted.audio {
        Some(audio) => println!("Deleted {}", audio.display()),
        None => println!("No paired audio file was present"),
    }
    Ok(())
}
