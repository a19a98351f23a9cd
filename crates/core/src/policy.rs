//! Tunable constants for sessions, loaded from JSON with per-field defaults.
//!
//! Every field has a default matching the production lesson flow, so an
//! empty `{}` document is a valid policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Difficulty;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("failed to parse session policy: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("pass threshold must be within 0..=100, got {0}")]
    InvalidPassThreshold(u32),

    #[error("score weights must be non-negative and sum to 1, got {objective} and {subjective}")]
    InvalidWeights { objective: f64, subjective: f64 },

    #[error("first-pass strata must select at least one item")]
    EmptyStrata,

    #[error("review quiz size must be > 0")]
    InvalidReviewQuizSize,

    #[error("review interval table must be non-empty with every interval >= 1 day")]
    InvalidIntervals,

    #[error("failed review retry must be at least 1 day")]
    InvalidRetryDays,

    #[error("invalid playback setting: {0}")]
    InvalidPlayback(&'static str),

    #[error("poll interval of {poll_secs} s must be shorter than the {slack_secs} s seek slack")]
    PollExceedsSeekSlack { poll_secs: f64, slack_secs: f64 },

    #[error("grader timeout must be > 0 seconds")]
    InvalidGraderTimeout,
}

const fn default_pass_threshold() -> u32 {
    70
}

const fn default_min_inquiry_chars() -> usize {
    20
}

const fn default_objective_weight() -> f64 {
    0.6
}

const fn default_subjective_weight() -> f64 {
    0.4
}

const fn default_review_quiz_size() -> usize {
    10
}

fn default_review_intervals() -> Vec<u32> {
    vec![1, 3, 7, 14, 21, 30]
}

const fn default_retry_days() -> u32 {
    1
}

const fn default_grader_timeout() -> u64 {
    30
}

/// How many items of each difficulty a first-pass quiz draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strata {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl Strata {
    #[must_use]
    pub fn count(&self, difficulty: Difficulty) -> usize {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.easy + self.medium + self.hard
    }
}

impl Default for Strata {
    fn default() -> Self {
        Self {
            easy: 4,
            medium: 4,
            hard: 2,
        }
    }
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_seek_slack_secs() -> f64 {
    1.5
}

const fn default_lookback_secs() -> f64 {
    30.0
}

const fn default_completion_epsilon_secs() -> f64 {
    1.0
}

/// Timing contract of the video playback guard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPolicy {
    /// How often the media position is polled.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Forward movement beyond the high-water mark tolerated per poll.
    #[serde(default = "default_seek_slack_secs")]
    pub seek_slack_secs: f64,

    /// How far before a checkpoint playback rewinds after a wrong answer.
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: f64,

    /// Distance from the end of the video that counts as watched.
    #[serde(default = "default_completion_epsilon_secs")]
    pub completion_epsilon_secs: f64,
}

impl PlaybackPolicy {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.poll_interval_ms == 0 {
            return Err(PolicyError::InvalidPlayback("poll interval must be > 0"));
        }
        if !self.seek_slack_secs.is_finite() || self.seek_slack_secs < 0.0 {
            return Err(PolicyError::InvalidPlayback("seek slack must be >= 0"));
        }
        if !self.lookback_secs.is_finite() || self.lookback_secs < 0.0 {
            return Err(PolicyError::InvalidPlayback("look-back window must be >= 0"));
        }
        if !self.completion_epsilon_secs.is_finite() || self.completion_epsilon_secs < 0.0 {
            return Err(PolicyError::InvalidPlayback("completion epsilon must be >= 0"));
        }
        // 1x playback advances one poll interval between observations
        let poll_secs = self.poll_interval().as_secs_f64();
        if poll_secs >= self.seek_slack_secs {
            return Err(PolicyError::PollExceedsSeekSlack {
                poll_secs,
                slack_secs: self.seek_slack_secs,
            });
        }
        Ok(())
    }
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            seek_slack_secs: default_seek_slack_secs(),
            lookback_secs: default_lookback_secs(),
            completion_epsilon_secs: default_completion_epsilon_secs(),
        }
    }
}

/// Policy shared by every session the orchestrator runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPolicy {
    /// Minimum final percentage that counts as a pass.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u32,

    /// Minimum trimmed length of the inquiry response.
    #[serde(default = "default_min_inquiry_chars")]
    pub min_inquiry_chars: usize,

    #[serde(default = "default_objective_weight")]
    pub objective_weight: f64,

    #[serde(default = "default_subjective_weight")]
    pub subjective_weight: f64,

    #[serde(default)]
    pub first_pass_strata: Strata,

    #[serde(default = "default_review_quiz_size")]
    pub review_quiz_size: usize,

    /// Days until the next review, indexed by review count.
    #[serde(default = "default_review_intervals")]
    pub review_intervals_days: Vec<u32>,

    /// Retry window after a failed review.
    #[serde(default = "default_retry_days")]
    pub failed_review_retry_days: u32,

    #[serde(default)]
    pub playback: PlaybackPolicy,

    #[serde(default = "default_grader_timeout")]
    pub grader_timeout_secs: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            min_inquiry_chars: default_min_inquiry_chars(),
            objective_weight: default_objective_weight(),
            subjective_weight: default_subjective_weight(),
            first_pass_strata: Strata::default(),
            review_quiz_size: default_review_quiz_size(),
            review_intervals_days: default_review_intervals(),
            failed_review_retry_days: default_retry_days(),
            playback: PlaybackPolicy::default(),
            grader_timeout_secs: default_grader_timeout(),
        }
    }
}

impl SessionPolicy {
    /// Parse and validate a JSON policy document.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::Parse` for malformed JSON, or the first
    /// validation failure.
    pub fn from_json_str(raw: &str) -> Result<Self, PolicyError> {
        let policy: Self = serde_json::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    /// # Errors
    ///
    /// Returns the first inconsistent setting found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.pass_threshold > 100 {
            return Err(PolicyError::InvalidPassThreshold(self.pass_threshold));
        }
        let weights_ok = self.objective_weight.is_finite()
            && self.subjective_weight.is_finite()
            && self.objective_weight >= 0.0
            && self.subjective_weight >= 0.0
            && ((self.objective_weight + self.subjective_weight) - 1.0).abs() < 1e-9;
        if !weights_ok {
            return Err(PolicyError::InvalidWeights {
                objective: self.objective_weight,
                subjective: self.subjective_weight,
            });
        }
        if self.first_pass_strata.total() == 0 {
            return Err(PolicyError::EmptyStrata);
        }
        if self.review_quiz_size == 0 {
            return Err(PolicyError::InvalidReviewQuizSize);
        }
        if self.review_intervals_days.is_empty() || self.review_intervals_days.contains(&0) {
            return Err(PolicyError::InvalidIntervals);
        }
        if self.failed_review_retry_days == 0 {
            return Err(PolicyError::InvalidRetryDays);
        }
        if self.grader_timeout_secs == 0 {
            return Err(PolicyError::InvalidGraderTimeout);
        }
        self.playback.validate()
    }

    #[must_use]
    pub fn grader_timeout(&self) -> Duration {
        Duration::from_secs(self.grader_timeout_secs)
    }

    #[must_use]
    pub fn passes(&self, final_score: u32) -> bool {
        final_score >= self.pass_threshold
    }
}
