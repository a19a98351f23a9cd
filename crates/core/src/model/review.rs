use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::model::attempt::ParseTagError;
use crate::model::ids::{LearnerId, TopicId};

//
// ─── URGENCY ──────────────────────────────────────────────────────────────────
//

/// Coarse label summarizing how at-risk a topic is for a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UrgencyStatus {
    Low,
    Medium,
    Critical,
}

impl UrgencyStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyStatus::Low => "Low",
            UrgencyStatus::Medium => "Medium",
            UrgencyStatus::Critical => "Critical",
        }
    }
}

impl fmt::Display for UrgencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyStatus {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(UrgencyStatus::Low),
            "Medium" => Ok(UrgencyStatus::Medium),
            "Critical" => Ok(UrgencyStatus::Critical),
            other => Err(ParseTagError::new("urgency status", other)),
        }
    }
}

//
// ─── REVIEW STATE ─────────────────────────────────────────────────────────────
//

/// Persisted spaced-repetition progress for one (learner, topic) pair.
///
/// Only the scheduler produces new values; sessions read it at start to
/// decide which flow is eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewState {
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub review_count: u32,
    pub last_review_score: Option<u32>,
    pub next_review_date: Option<DateTime<Utc>>,
    pub urgency_status: UrgencyStatus,
    pub new_session_completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl ReviewState {
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date.is_none_or(|at| at <= now)
    }

    /// Urgency as seen at `now`: a low-urgency topic whose review date has
    /// passed reads as `Medium`; `Critical` is sticky until the next passing
    /// review.
    #[must_use]
    pub fn urgency_at(&self, now: DateTime<Utc>) -> UrgencyStatus {
        match self.urgency_status {
            UrgencyStatus::Critical => UrgencyStatus::Critical,
            stored if self.new_session_completed && self.is_due(now) => {
                stored.max(UrgencyStatus::Medium)
            }
            stored => stored,
        }
    }
}

//
// ─── ELIGIBILITY ──────────────────────────────────────────────────────────────
//

/// Which session, if any, a learner may start for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// No completed first pass yet.
    NewTopic,
    ReviewDue { urgency: UrgencyStatus },
    NotYetDue { next_review_date: DateTime<Utc> },
}

impl Eligibility {
    #[must_use]
    pub fn of(state: Option<&ReviewState>, now: DateTime<Utc>) -> Self {
        let Some(state) = state.filter(|s| s.new_session_completed) else {
            return Eligibility::NewTopic;
        };
        match state.next_review_date {
            Some(next_review_date) if next_review_date > now => {
                Eligibility::NotYetDue { next_review_date }
            }
            _ => Eligibility::ReviewDue {
                urgency: state.urgency_at(now),
            },
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
