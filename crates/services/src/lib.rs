#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod grading;
pub mod sessions;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use config::{GraderConfig, ServicesConfig};
pub use error::{AppServicesError, ConfigError, ContentArtifact, GradingError, SessionError};
pub use grading::{
    CaseStudyGrader, GradingPart, GradingRequest, HttpCaseStudyGrader, grade_with_fallback,
};
pub use sessions::{
    MediaPlayer, PersistProgress, PlaybackEvent, PlaybackSupervisor, PlayerError, QuizAnswer,
    SessionContext, SessionOrchestrator, SessionOutcome,
};
