use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use super::choice::ChoiceSet;
use super::item::ContentError;
use super::text::PromptText;
use crate::model::ids::CheckpointId;

//
// ─── ERRORS (domain validation) ────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MediaValidationError {
    #[error("media URI cannot be empty")]
    EmptyMediaUri,

    #[error("media URI is not a valid URL: {0}")]
    InvalidUrl(String),

    #[error("media duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("checkpoint timestamp must be non-negative and finite, got {0}")]
    InvalidTimestamp(f64),
}

//
// ─── MEDIA URI ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaUri {
    FilePath(PathBuf),
    Url(Url),
}

impl MediaUri {
    /// # Errors
    ///
    /// Returns `MediaValidationError::EmptyMediaUri` for an empty path.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, MediaValidationError> {
        let p = path.into();
        if p.as_os_str().is_empty() {
            return Err(MediaValidationError::EmptyMediaUri);
        }
        Ok(MediaUri::FilePath(p))
    }

    /// # Errors
    ///
    /// Returns `MediaValidationError` for blank or unparsable URLs.
    pub fn from_url(url: impl AsRef<str>) -> Result<Self, MediaValidationError> {
        let s = url.as_ref().trim();
        if s.is_empty() {
            return Err(MediaValidationError::EmptyMediaUri);
        }
        let u = Url::parse(s).map_err(|e| MediaValidationError::InvalidUrl(e.to_string()))?;
        Ok(MediaUri::Url(u))
    }

    /// Accepts either a URL (anything with a scheme) or a file path.
    ///
    /// # Errors
    ///
    /// Returns `MediaValidationError` when the input is blank or a malformed URL.
    pub fn parse(raw: &str) -> Result<Self, MediaValidationError> {
        if raw.contains("://") {
            Self::from_url(raw)
        } else {
            Self::from_file(raw.trim())
        }
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            MediaUri::FilePath(p) => Some(p.as_path()),
            MediaUri::Url(_) => None,
        }
    }

    #[must_use]
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            MediaUri::Url(u) => Some(u),
            MediaUri::FilePath(_) => None,
        }
    }

    /// String form used for persistence.
    #[must_use]
    pub fn to_storage_string(&self) -> String {
        match self {
            MediaUri::FilePath(p) => p.to_string_lossy().into_owned(),
            MediaUri::Url(u) => u.to_string(),
        }
    }
}

//
// ─── VIDEO ─────────────────────────────────────────────────────────────────────
//

/// The lesson video a learner must watch in full.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    uri: MediaUri,
    duration_secs: f64,
}

impl VideoAsset {
    /// # Errors
    ///
    /// Returns `MediaValidationError::InvalidDuration` unless the duration is
    /// positive and finite.
    pub fn new(uri: MediaUri, duration_secs: f64) -> Result<Self, MediaValidationError> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(MediaValidationError::InvalidDuration(duration_secs));
        }
        Ok(Self { uri, duration_secs })
    }

    #[must_use]
    pub fn uri(&self) -> &MediaUri {
        &self.uri
    }

    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}

//
// ─── CHECKPOINT ────────────────────────────────────────────────────────────────
//

/// A multiple-choice question anchored to a timestamp of the lesson video.
///
/// Playback cannot continue past `timestamp_secs` until it has been answered
/// correctly.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointChallenge {
    id: CheckpointId,
    timestamp_secs: f64,
    prompt: PromptText,
    choices: ChoiceSet,
}

impl CheckpointChallenge {
    /// # Errors
    ///
    /// Returns `ContentError` for a blank prompt, invalid choices, or a
    /// negative/non-finite timestamp.
    pub fn new(
        id: CheckpointId,
        timestamp_secs: f64,
        prompt: impl Into<String>,
        choices: Vec<String>,
        correct: usize,
    ) -> Result<Self, ContentError> {
        if !timestamp_secs.is_finite() || timestamp_secs < 0.0 {
            return Err(MediaValidationError::InvalidTimestamp(timestamp_secs).into());
        }
        let prompt = PromptText::parse(prompt).map_err(ContentError::Prompt)?;
        let choices = ChoiceSet::new(choices, correct).map_err(ContentError::Choices)?;
        Ok(Self {
            id,
            timestamp_secs,
            prompt,
            choices,
        })
    }

    #[must_use]
    pub fn id(&self) -> CheckpointId {
        self.id
    }

    #[must_use]
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_secs
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        self.prompt.as_str()
    }

    #[must_use]
    pub fn choices(&self) -> &ChoiceSet {
        &self.choices
    }
}
