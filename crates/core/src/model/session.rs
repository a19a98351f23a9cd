use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::attempt::SessionKind;
use crate::model::ids::{LearnerId, SessionId, TopicId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearningSessionError {
    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("final score {0} is above 100")]
    ScoreOutOfRange(u32),
}

/// Summary row written once a session reaches its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningSessionRecord {
    pub session_id: SessionId,
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// `true` when the final score met the pass threshold.
    pub completed: bool,
    /// Review count the session ran at; 0 for a first pass.
    pub review_number: u32,
    pub final_score: u32,
    /// Case-study grade was the neutral fallback rather than a real grade.
    pub grade_fallback: bool,
    /// At least one phase was force-completed.
    pub overridden: bool,
}

impl LearningSessionRecord {
    /// # Errors
    ///
    /// Returns `LearningSessionError` if the time range is inverted or the
    /// score is not a percentage.
    pub fn validate(self) -> Result<Self, LearningSessionError> {
        if self.ended_at < self.started_at {
            return Err(LearningSessionError::InvalidTimeRange);
        }
        if self.final_score > 100 {
            return Err(LearningSessionError::ScoreOutOfRange(self.final_score));
        }
        Ok(self)
    }
}
