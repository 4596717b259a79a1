//! List the recordings of one destination.

use crate::config::ConfigFile;
use crate::store::{self, default_static_dir};

/// Prints the recordings of the custom destination, or of the static one when
/// `static_dir` is set, newest first.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the directory cannot be read
pub fn handle_recordings(static_dir: bool) -> Result<(), anyhow::Error> {
    let dir = if static_dir {
        default_static_dir()
    } else {
        ConfigFile::open()?.config().custom_save_path.clone()
    };

    if !dir.exists() {
        println!("No recordings yet in {}", dir.display());
        return Ok(());
    }

    let entries = store::list_recordings(&dir)?;
    if entries.is_empty() {
        println!("No recordings yet in {}", dir.display());
        return Ok(());
    }

    println!("Recordings in {}:", dir.display());
    println!();
    for (index, entry) in entries.iter().enumerate() {
        let file_name = entry
            .video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let audio = if entry.audio.is_some() { "" } else { "  (audio missing)" };
        println!(
            "  {:>3}  {}  {}{}",
            index + 1,
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            file_name,
            audio
        );
    }
    Ok(())
}
