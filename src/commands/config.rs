//! Configuration display, changes and editing.

use crate::app::ConfigAction;
use crate::config::ConfigFile;
use crate::store::default_static_dir;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Prints the configuration, or applies `action` to it.
///
/// # Errors
/// - If the configuration cannot be loaded or saved
/// - If no editor can be started
pub fn handle_config(action: Option<ConfigAction>) -> anyhow::Result<()> {
    let mut file = ConfigFile::open()?;

    match action {
        None => print_config(&file),
        Some(ConfigAction::SetPath { dir }) => {
            let dir = absolute(&dir)?;
            file.set_custom_path(&dir)?;
            println!("Custom save path set to {}", dir.display());
        }
        Some(ConfigAction::SetFormat { format }) => {
            file.set_video_format(format)?;
            println!("Video format set to {format}");
        }
        Some(ConfigAction::Edit) => edit(file.path())?,
    }
    Ok(())
}

fn print_config(file: &ConfigFile) {
    let config = file.config();
    println!("Config file:      {}", file.path().display());
    println!("Static save path: {}", default_static_dir().display());
    println!("Custom save path: {}", config.custom_save_path.display());
    println!("Video format:     {}", config.video_format);
    println!("Camera index:     {}", config.capture.camera_index);
    println!("Frame rate:       {} fps", config.capture.fps);
    println!("Read timeout:     {} ms", config.capture.read_timeout_ms);
}

fn absolute(dir: &Path) -> anyhow::Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(dir))
}

/// Opens the configuration file in the user's preferred editor.
///
/// Tries $EDITOR, then nano, then vi.
fn edit(config_path: &Path) -> anyhow::Result<()> {
    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    // Catch mistakes now rather than at the next recording.
    ConfigFile::open_at(config_path)?;
    tracing::info!("Config file edited successfully");
    Ok(())
}

fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    for editor in &["nano", "vi"] {
        if is_editor_available(editor) {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!(
        "No editor found. Please set the $EDITOR environment variable."
    ))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        let dir = Path::new("/media/backup");
        assert_eq!(absolute(dir).unwrap(), PathBuf::from("/media/backup"));
    }

    #[test]
    fn test_absolute_resolves_relative_paths() {
        let resolved = absolute(Path::new("rec")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("rec"));
    }
}
