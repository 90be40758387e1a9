//! Media capture collaborator and the recording toggle
//!
//! The recorder is a two-state toggle: starting while recording and
//! stopping while idle are both no-ops. The capture collaborator itself
//! is a trait so the transcription pathway can be driven headless.

use crate::error::{PolymodeError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// A finished audio capture
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// Local path of the captured audio
    pub path: PathBuf,
    /// MIME type, e.g. "audio/wav"
    pub mime: String,
}

/// External media capture collaborator
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Begin capturing
    async fn start(&self) -> Result<()>;

    /// Finish capturing and hand back the artifact
    async fn stop(&self) -> Result<AudioArtifact>;
}

/// File-backed capture: "recording" hands back an existing audio file
///
/// Stands in for platform microphone capture so the transcription pathway
/// works in any environment.
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    /// Capture collaborator that yields the given file on stop
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MediaCapture for FileCapture {
    async fn start(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(PolymodeError::Validation(format!(
                "audio source not found: {}",
                self.path.display()
            ))
            .into());
        }
        Ok(())
    }

    async fn stop(&self) -> Result<AudioArtifact> {
        let mime = match self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp3") => "audio/mpeg",
            Some("ogg") => "audio/ogg",
            _ => "audio/wav",
        };
        Ok(AudioArtifact {
            path: self.path.clone(),
            mime: mime.to_string(),
        })
    }
}

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RecorderState {
    #[default]
    Idle,
    Recording,
}

/// Two-state recording toggle
///
/// # Examples
///
/// ```
/// use polymode::orchestrator::Recorder;
///
/// let recorder = Recorder::default();
/// assert!(!recorder.is_recording());
/// ```
#[derive(Debug, Default)]
pub struct Recorder {
    state: RecorderState,
}

impl Recorder {
    /// Start recording; a no-op when already recording
    ///
    /// # Returns
    ///
    /// `true` when recording actually started.
    pub async fn start(&mut self, capture: &dyn MediaCapture) -> Result<bool> {
        if self.state == RecorderState::Recording {
            return Ok(false);
        }
        capture.start().await?;
        self.state = RecorderState::Recording;
        Ok(true)
    }

    /// Stop recording; a no-op when idle
    ///
    /// # Returns
    ///
    /// The captured artifact, or `None` when nothing was recording.
    pub async fn stop(&mut self, capture: &dyn MediaCapture) -> Result<Option<AudioArtifact>> {
        if self.state == RecorderState::Idle {
            return Ok(None);
        }
        let artifact = capture.stop().await?;
        self.state = RecorderState::Idle;
        Ok(Some(artifact))
    }

    /// Whether a capture is in progress
    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_file() -> (tempfile::TempDir, FileCapture) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("take.wav");
        std::fs::write(&path, b"RIFFfakewav").unwrap();
        (dir, FileCapture::new(path))
    }

    #[tokio::test]
    async fn test_toggle_round_trip() {
        let (_dir, capture) = capture_file();
        let mut recorder = Recorder::default();

        assert!(recorder.start(&capture).await.unwrap());
        assert!(recorder.is_recording());

        let artifact = recorder.stop(&capture).await.unwrap().unwrap();
        assert_eq!(artifact.mime, "audio/wav");
        assert!(!recorder.is_recording());
    }

    #[tokio::test]
    async fn test_start_while_recording_is_noop() {
        let (_dir, capture) = capture_file();
        let mut recorder = Recorder::default();

        assert!(recorder.start(&capture).await.unwrap());
        assert!(!recorder.start(&capture).await.unwrap());
        assert!(recorder.is_recording());
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let (_dir, capture) = capture_file();
        let mut recorder = Recorder::default();

        let artifact = recorder.stop(&capture).await.unwrap();
        assert!(artifact.is_none());
    }

    #[tokio::test]
    async fn test_start_with_missing_source_fails() {
        let capture = FileCapture::new("/nonexistent/take.wav");
        let mut recorder = Recorder::default();
        assert!(recorder.start(&capture).await.is_err());
        assert!(!recorder.is_recording());
    }
}
