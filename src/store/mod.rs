//! Where recordings go and what they are called.
//!
//! Every recording is written to two directories: a fixed archive directory
//! and a user-configurable one. Each directory receives a
//! `video_<YYYYMMDD_HHMMSS>.<ext>` file and an `audio_<YYYYMMDD_HHMMSS>.wav`
//! file that share the same timestamp token.

pub mod artifact;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub use artifact::{delete_artifact, list_recordings};

/// strftime pattern of the timestamp token shared by all files of a recording.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const VIDEO_PREFIX: &str = "video_";
pub const AUDIO_PREFIX: &str = "audio_";
pub const AUDIO_EXTENSION: &str = "wav";

/// Container format of the video files.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// MPEG-4 Part 2 video in an MP4 container
    #[default]
    Mp4,
    /// XVID-tagged MPEG-4 video in an AVI container
    Avi,
}

impl VideoFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "avi" => Some(Self::Avi),
            _ => None,
        }
    }

    /// FourCC written into the container for the video stream.
    pub fn fourcc(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4v",
            Self::Avi => "XVID",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

pub fn video_file_name(timestamp: &str, format: VideoFormat) -> String {
    format!("{VIDEO_PREFIX}{timestamp}.{}", format.extension())
}

pub fn audio_file_name(timestamp: &str) -> String {
    format!("{AUDIO_PREFIX}{timestamp}.{AUDIO_EXTENSION}")
}

pub fn timestamp_token(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// The user's Videos folder, or `~/Videos` where the platform has none.
pub fn default_videos_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("Videos"))
}

/// The fixed archive destination.
pub fn default_static_dir() -> PathBuf {
    default_videos_dir().join("StaticRecordings")
}

/// Initial value of the user-configurable destination.
pub fn default_custom_dir() -> PathBuf {
    default_videos_dir().join("Recordings")
}

/// The two destination directories and the container format of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPaths {
    static_dir: PathBuf,
    custom_dir: PathBuf,
    format: VideoFormat,
}

impl RecordingPaths {
    pub fn new(static_dir: impl Into<PathBuf>, custom_dir: impl Into<PathBuf>, format: VideoFormat) -> Self {
        Self {
            static_dir: static_dir.into(),
            custom_dir: custom_dir.into(),
            format,
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn custom_dir(&self) -> &Path {
        &self.custom_dir
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    /// Concrete file paths for a recording identified by `timestamp`.
    pub fn resolve(&self, timestamp: &str) -> RecordingTargets {
        let video = video_file_name(timestamp, self.format);
        let audio = audio_file_name(timestamp);
        RecordingTargets {
            timestamp: timestamp.to_string(),
            static_video: self.static_dir.join(&video),
            custom_video: self.custom_dir.join(&video),
            static_audio: self.static_dir.join(&audio),
            custom_audio: self.custom_dir.join(&audio),
        }
    }

    pub fn resolve_now(&self) -> RecordingTargets {
        self.resolve(&timestamp_token(Local::now()))
    }
}

/// The four files of one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingTargets {
    pub timestamp: String,
    pub static_video: PathBuf,
    pub custom_video: PathBuf,
    pub static_audio: PathBuf,
    pub custom_audio: PathBuf,
}

impl RecordingTargets {
    /// Video paths in (static, custom) order.
    pub fn videos(&self) -> [&Path; 2] {
        [&self.static_video, &self.custom_video]
    }

    /// Audio paths in (static, custom) order.
    pub fn audios(&self) -> [&Path; 2] {
        [&self.static_audio, &self.custom_audio]
    }
}
