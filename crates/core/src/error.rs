use thiserror::Error;

use crate::model::{
    CaseStudyError, ContentError, GradeError, LearningSessionError, MediaValidationError,
    TextError,
};
use crate::phase::{OverrideDenied, TransitionRejected};
use crate::playback::PlaybackError;
use crate::policy::PolicyError;
use crate::scheduler::SchedulerError;
use crate::scoring::ScoringError;
use crate::selector::SelectionError;

/// Any failure raised by the domain layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    MediaValidation(#[from] MediaValidationError),
    #[error(transparent)]
    TextValidation(#[from] TextError),
    #[error(transparent)]
    CaseStudy(#[from] CaseStudyError),
    #[error(transparent)]
    Grade(#[from] GradeError),
    #[error(transparent)]
    LearningSession(#[from] LearningSessionError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Transition(#[from] TransitionRejected),
    #[error(transparent)]
    Override(#[from] OverrideDenied),
}
