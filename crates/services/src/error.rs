//! Shared error types for the services crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use lesson_core::model::{Eligibility, TopicId};
use lesson_core::phase::{Phase, TransitionRejected};
use lesson_core::playback::PlaybackError;
use lesson_core::policy::PolicyError;
use lesson_core::scheduler::SchedulerError;
use lesson_core::scoring::ScoringError;
use lesson_core::selector::SelectionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Authored piece of a topic a session cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentArtifact {
    InquiryPrompt,
    Video,
    Checkpoints,
    QuizPool,
    CaseStudy,
}

impl fmt::Display for ContentArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentArtifact::InquiryPrompt => "inquiry prompt",
            ContentArtifact::Video => "video",
            ContentArtifact::Checkpoints => "checkpoints",
            ContentArtifact::QuizPool => "quiz pool",
            ContentArtifact::CaseStudy => "case study",
        })
    }
}

/// Errors emitted by case-study graders.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GradingError {
    #[error("grader is not configured")]
    Disabled,
    #[error("grader returned an empty response")]
    EmptyResponse,
    #[error("grader response could not be parsed: {0}")]
    MalformedResponse(String),
    #[error("grader request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while reading services configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read policy file {path}: {source}")]
    PolicyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Errors emitted by the session orchestrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("topic {0} does not exist")]
    UnknownTopic(TopicId),

    #[error("topic is missing its {0}")]
    MissingContent(ContentArtifact),

    #[error("session cannot start: {eligibility:?}")]
    NotEligible { eligibility: Eligibility },

    #[error(transparent)]
    Rejected(#[from] TransitionRejected),

    #[error("operation needs phase {expected}, session is in {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("playback has not been started")]
    PlaybackNotStarted,

    #[error("playback is already running")]
    PlaybackRunning,

    #[error("choice {selected} is out of range for {len} choices")]
    InvalidChoice { selected: usize, len: usize },

    #[error("no quiz item is awaiting an answer")]
    QuizFinished,

    #[error("case study needs {expected} answers, got {got}")]
    AnswerCount { expected: usize, got: usize },

    #[error("session results have not been fully persisted")]
    NotPersisted,

    #[error("override not authorized")]
    Unauthorized,

    #[error("session state lock poisoned")]
    Poisoned,

    #[error("failed to persist session results: {0}")]
    Persistence(#[source] StorageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Errors emitted while bootstrapping services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
