//! Configuration file management for duorec.
//!
//! Configuration lives in `~/.config/duorec/duorec.toml`. The file is created
//! with defaults on first run and rewritten on every change.

use crate::capture::{DeviceSettings, TARGET_FPS};
use crate::store::{default_custom_dir, VideoFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device settings; every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Camera index as listed by `duorec list-devices`
    #[serde(default)]
    pub camera_index: u32,
    /// Frame rate requested from the camera and written into the videos
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Longest wait for a frame or audio chunk before the recording is ended
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_fps() -> u32 {
    TARGET_FPS
}

fn default_read_timeout_ms() -> u64 {
    3000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            fps: default_fps(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl CaptureConfig {
    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            camera_index: self.camera_index,
            fps: self.fps.max(1),
            read_timeout: Duration::from_millis(self.read_timeout_ms.max(1)),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuorecConfig {
    /// User-chosen second destination for every recording
    #[serde(default = "default_custom_dir")]
    pub custom_save_path: PathBuf,
    /// Container of both video files: "mp4" or "avi"
    #[serde(default)]
    pub video_format: VideoFormat,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl Default for DuorecConfig {
    fn default() -> Self {
        Self {
            custom_save_path: default_custom_dir(),
            video_format: VideoFormat::default(),
            capture: CaptureConfig::default(),
        }
    }
}

/// A loaded configuration bound to the file it came from.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    config: DuorecConfig,
}

impl ConfigFile {
    /// Loads the user's configuration, creating it with defaults if missing.
    ///
    /// # Errors
    /// - If the home directory cannot be determined
    /// - If the file cannot be read, parsed or created
    pub fn open() -> anyhow::Result<Self> {
        Self::open_at(config_path()?)
    }

    /// Loads the configuration at `path`, creating it with defaults if missing.
    pub fn open_at(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        if !path.exists() {
            let file = Self {
                path,
                config: DuorecConfig::default(),
            };
            file.save()?;
            tracing::info!("Created default configuration at {}", file.path.display());
            return Ok(file);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        let config: DuorecConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration in {}: {e}", path.display()))?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DuorecConfig {
        &self.config
    }

    /// Changes the custom destination and saves.
    pub fn set_custom_path(&mut self, dir: impl Into<PathBuf>) -> anyhow::Result<()> {
        self.config.custom_save_path = dir.into();
        self.save()?;
        tracing::info!(
            "Custom save path set to {}",
            self.config.custom_save_path.display()
        );
        Ok(())
    }

    /// Changes the video container and saves.
    pub fn set_video_format(&mut self, format: VideoFormat) -> anyhow::Result<()> {
        self.config.video_format = format;
        self.save()?;
        tracing::info!("Video format set to {}", format);
        Ok(())
    }

    /// Writes the configuration back to its file.
    ///
    /// # Errors
    /// - If the parent directory cannot be created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.config)?;
        fs::write(&self.path, content)?;
        tracing::debug!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}

/// Path of the user's configuration file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".config").join("duorec").join("duorec.toml"))
}
