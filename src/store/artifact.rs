//! Finished recordings on disk: pairing, listing and deletion.

use super::{audio_file_name, VideoFormat, TIMESTAMP_FORMAT, VIDEO_PREFIX};
use crate::capture::{CaptureError, CaptureResult};
use chrono::NaiveDateTime;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Extracts the `<YYYYMMDD_HHMMSS>` token from `video_<token>.<mp4|avi>`.
pub fn timestamp_of(video: &Path) -> Option<&str> {
    let extension = video.extension()?.to_str()?;
    VideoFormat::from_extension(extension)?;

    let token = video.file_stem()?.to_str()?.strip_prefix(VIDEO_PREFIX)?;
    NaiveDateTime::parse_from_str(token, TIMESTAMP_FORMAT).ok()?;
    Some(token)
}

/// The audio file that belongs to `video`, whether or not it exists.
///
/// # Errors
/// - `InvalidArtifactName` if `video` does not follow the naming contract
pub fn paired_audio_path(video: &Path) -> CaptureResult<PathBuf> {
    let token =
        timestamp_of(video).ok_or_else(|| CaptureError::InvalidArtifactName(video.to_path_buf()))?;
    let dir = video.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(audio_file_name(token)))
}

/// What [`delete_artifact`] removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedArtifact {
    pub video: PathBuf,
    /// `None` when the paired audio file was already gone.
    pub audio: Option<PathBuf>,
}

/// Deletes a video file and its paired audio file.
///
/// A missing audio file is not an error.
///
/// # Errors
/// - `InvalidArtifactName` if the name cannot be paired; nothing is deleted
/// - `ArtifactNotFound` if the video file does not exist
pub fn delete_artifact(video: &Path) -> CaptureResult<DeletedArtifact> {
    let audio = paired_audio_path(video)?;

    match fs::remove_file(video) {
        Ok(()) => tracing::info!("Deleted video {}", video.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CaptureError::ArtifactNotFound(video.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    }

    let audio = match fs::remove_file(&audio) {
        Ok(()) => {
            tracing::info!("Deleted audio {}", audio.display());
            Some(audio)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("Paired audio {} already absent", audio.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to delete paired audio {}: {}", audio.display(), e);
            None
        }
    };

    Ok(DeletedArtifact {
        video: video.to_path_buf(),
        audio,
    })
}

/// One recording found in a destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingEntry {
    pub recorded_at: NaiveDateTime,
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
}

/// Lists the recordings of `dir`, newest first. Files that do not follow the
/// naming contract are ignored.
pub fn list_recordings(dir: &Path) -> CaptureResult<Vec<RecordingEntry>> {
    let mut entries: Vec<RecordingEntry> = fs::read_dir(dir)?
        .filter_map(|entry| {
            let video = entry.ok()?.path();
            let token = timestamp_of(&video)?;
            let recorded_at = NaiveDateTime::parse_from_str(token, TIMESTAMP_FORMAT).ok()?;
            let audio = dir.join(audio_file_name(token));
            Some(RecordingEntry {
                recorded_at,
                audio: audio.exists().then_some(audio),
                video,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then_with(|| a.video.cmp(&b.video)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_timestamp_of_valid_names() {
        assert_eq!(
            timestamp_of(Path::new("/v/video_20240101_120000.mp4")),
            Some("20240101_120000")
        );
        assert_eq!(
            timestamp_of(Path::new("video_20240101_120000.AVI")),
            Some("20240101_120000")
        );
    }

    #[test]
    fn test_timestamp_of_rejects_other_names() {
        assert_eq!(timestamp_of(Path::new("/v/video_20240101.mp4")), None);
        assert_eq!(timestamp_of(Path::new("/v/audio_20240101_120000.wav")), None);
        assert_eq!(timestamp_of(Path::new("/v/video_20240101_120000.mkv")), None);
        assert_eq!(timestamp_of(Path::new("/v/clip.mp4")), None);
        assert_eq!(timestamp_of(Path::new("/v/video_20241301_120000.mp4")), None);
    }

    #[test]
    fn test_paired_audio_path() {
        let audio = paired_audio_path(Path::new("/rec/video_20240101_120000.avi")).unwrap();
        assert_eq!(audio, PathBuf::from("/rec/audio_20240101_120000.wav"));

        assert!(matches!(
            paired_audio_path(Path::new("/rec/holiday.mp4")),
            Err(CaptureError::InvalidArtifactName(_))
        ));
    }

    #[test]
    fn test_delete_removes_video_and_audio() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video_20240101_120000.mp4");
        let audio = dir.path().join("audio_20240101_120000.wav");
        touch(&video);
        touch(&audio);

        let deleted = delete_artifact(&video).unwrap();

        assert_eq!(deleted.audio.as_deref(), Some(audio.as_path()));
        assert!(!video.exists());
        assert!(!audio.exists());
    }

    #[test]
    fn test_delete_tolerates_missing_audio() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video_20240101_120000.mp4");
        touch(&video);

        let deleted = delete_artifact(&video).unwrap();

        assert_eq!(deleted.audio, None);
        assert!(!video.exists());
    }

    #[test]
    fn test_delete_missing_video_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video_20240101_120000.mp4");
        let audio = dir.path().join("audio_20240101_120000.wav");
        touch(&audio);

        assert!(matches!(
            delete_artifact(&video),
            Err(CaptureError::ArtifactNotFound(_))
        ));
        assert!(audio.exists(), "audio must survive a failed delete");
    }

    #[test]
    fn test_delete_invalid_name_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("holiday.mp4");
        touch(&video);

        assert!(matches!(
            delete_artifact(&video),
            Err(CaptureError::InvalidArtifactName(_))
        ));
        assert!(video.exists());
    }

    #[test]
    fn test_delete_leaves_other_recordings_alone() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video_20240101_120000.mp4");
        let other_video = dir.path().join("video_20240101_120001.mp4");
        let other_audio = dir.path().join("audio_20240101_120001.wav");
        touch(&video);
        touch(&other_video);
        touch(&other_audio);

        delete_artifact(&video).unwrap();

        assert!(other_video.exists());
        assert!(other_audio.exists());
    }

    #[test]
    fn test_list_recordings_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("video_20240101_120000.mp4"));
        touch(&dir.path().join("audio_20240101_120000.wav"));
        touch(&dir.path().join("video_20240205_080000.avi"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("audio_20231231_000000.wav"));

        let entries = list_recordings(dir.path()).unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].video.ends_with("video_20240205_080000.avi"));
        assert_eq!(entries[0].audio, None);
        assert!(entries[1].video.ends_with("video_20240101_120000.mp4"));
        assert!(entries[1]
            .audio
            .as_ref()
            .is_some_and(|a| a.ends_with("audio_20240101_120000.wav")));
    }
}
